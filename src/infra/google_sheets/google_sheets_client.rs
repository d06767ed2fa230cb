// =============================================================================
// GOOGLE SHEETS CLIENT
// =============================================================================
//
// Inserts memo rows at the top of a worksheet (just below the header), so the
// sheet reads newest-first.
//
// **Flow for one append:**
// 1. Find the spreadsheet id: configured directly, or looked up by exact name
//    through the Drive v3 files.list endpoint.
// 2. Find the worksheet's numeric sheetId by tab title (spreadsheets.get).
// 3. Send one batchUpdate with insertDimension + updateCells so the new row
//    is created and filled atomically.
//
// Resolved ids are cached; a failed append drops the cache so a renamed
// spreadsheet or tab is picked up on the next try.

use super::service_account::ServiceAccountAuth;
use crate::core::memo::{SheetAppender, SheetRow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;
use thiserror::Error;
use tokio::sync::RwLock;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";
const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// Zero-based index of the inserted row: row 2 in the sheet UI, right under the header.
pub const INSERT_ROW_INDEX: u32 = 1;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Invalid service account credentials: {0}")]
    Credentials(String),

    #[error("Google authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("No spreadsheet named '{0}' is shared with the service account")]
    SpreadsheetNotFound(String),

    #[error("Spreadsheet has no tab named '{0}'")]
    WorksheetNotFound(String),
}

/// Which spreadsheet and tab rows go to.
#[derive(Debug, Clone)]
pub struct SheetTarget {
    pub spreadsheet_name: String,
    /// Skips the Drive lookup when set.
    pub spreadsheet_id: Option<String>,
    pub tab_name: String,
}

#[derive(Debug, Clone, PartialEq)]
struct ResolvedTarget {
    spreadsheet_id: String,
    sheet_id: i64,
}

// =============================================================================
// API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoogleSheetsClient {
    client: Client,
    auth: ServiceAccountAuth,
    target: SheetTarget,
    sheets_base_url: String,
    drive_base_url: String,
    resolved: RwLock<Option<ResolvedTarget>>,
}

impl GoogleSheetsClient {
    pub fn new(auth: ServiceAccountAuth, target: SheetTarget) -> Self {
        Self::with_base_urls(auth, target, SHEETS_BASE_URL, DRIVE_BASE_URL)
    }

    /// Same as [`GoogleSheetsClient::new`] but talking to other API hosts.
    pub fn with_base_urls(
        auth: ServiceAccountAuth,
        target: SheetTarget,
        sheets_base_url: &str,
        drive_base_url: &str,
    ) -> Self {
        Self {
            client: Client::new(),
            auth,
            target,
            sheets_base_url: sheets_base_url.trim_end_matches('/').to_string(),
            drive_base_url: drive_base_url.trim_end_matches('/').to_string(),
            resolved: RwLock::new(None),
        }
    }

    pub fn target(&self) -> &SheetTarget {
        &self.target
    }

    /// Inserts `cells` as a new row at [`INSERT_ROW_INDEX`].
    pub async fn insert_row(&self, cells: &[&str]) -> Result<(), SheetsError> {
        let result = self.try_insert_row(cells).await;

        if result.is_err() {
            *self.resolved.write().await = None;
        }

        result
    }

    async fn try_insert_row(&self, cells: &[&str]) -> Result<(), SheetsError> {
        let token = self.auth.get_access_token().await?;
        let target = self.resolve(&token).await?;

        let url = format!(
            "{}/spreadsheets/{}:batchUpdate",
            self.sheets_base_url, target.spreadsheet_id
        );
        let body = insert_row_request(target.sheet_id, INSERT_ROW_INDEX, cells);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<ResolvedTarget, SheetsError> {
        if let Some(resolved) = self.resolved.read().await.as_ref() {
            return Ok(resolved.clone());
        }

        let spreadsheet_id = match &self.target.spreadsheet_id {
            Some(id) => id.clone(),
            None => self.find_spreadsheet_id(token).await?,
        };
        let sheet_id = self.find_sheet_id(token, &spreadsheet_id).await?;

        let resolved = ResolvedTarget {
            spreadsheet_id,
            sheet_id,
        };
        tracing::info!(
            spreadsheet = %resolved.spreadsheet_id,
            sheet_id = resolved.sheet_id,
            tab = %self.target.tab_name,
            "Resolved target worksheet"
        );

        *self.resolved.write().await = Some(resolved.clone());
        Ok(resolved)
    }

    async fn find_spreadsheet_id(&self, token: &str) -> Result<String, SheetsError> {
        let url = format!("{}/files", self.drive_base_url);
        let query = drive_query(&self.target.spreadsheet_name);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("pageSize", "10"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;

        let list: DriveFileList = check_status(response).await?.json().await?;
        list.files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| SheetsError::SpreadsheetNotFound(self.target.spreadsheet_name.clone()))
    }

    async fn find_sheet_id(&self, token: &str, spreadsheet_id: &str) -> Result<i64, SheetsError> {
        let url = format!("{}/spreadsheets/{}", self.sheets_base_url, spreadsheet_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .send()
            .await?;

        let meta: SpreadsheetMeta = check_status(response).await?.json().await?;
        sheet_id_for_tab(&meta, &self.target.tab_name)
            .ok_or_else(|| SheetsError::WorksheetNotFound(self.target.tab_name.clone()))
    }
}

#[async_trait]
impl SheetAppender for GoogleSheetsClient {
    async fn append_row(&self, row: &SheetRow) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.insert_row(&row.cells()).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(SheetsError::Api { status, body })
}

/// Drive search for a non-trashed spreadsheet with exactly this name.
fn drive_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escaped, SPREADSHEET_MIME_TYPE
    )
}

fn sheet_id_for_tab(meta: &SpreadsheetMeta, tab_name: &str) -> Option<i64> {
    meta.sheets
        .iter()
        .find(|s| s.properties.title == tab_name)
        .map(|s| s.properties.sheet_id)
}

/// batchUpdate body that opens an empty row at `row_index` and fills it.
///
/// Values are written as plain strings so timestamps and leading `=`/`+`
/// characters are stored as typed.
fn insert_row_request(sheet_id: i64, row_index: u32, cells: &[&str]) -> Value {
    let values: Vec<Value> = cells
        .iter()
        .map(|cell| json!({ "userEnteredValue": { "stringValue": cell } }))
        .collect();

    json!({
        "requests": [
            {
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": row_index,
                        "endIndex": row_index + 1
                    },
                    "inheritFromBefore": false
                }
            },
            {
                "updateCells": {
                    "start": {
                        "sheetId": sheet_id,
                        "rowIndex": row_index,
                        "columnIndex": 0
                    },
                    "rows": [ { "values": values } ],
                    "fields": "userEnteredValue"
                }
            }
        ]
    })
}
