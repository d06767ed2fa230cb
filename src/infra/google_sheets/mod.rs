// =============================================================================
// GOOGLE SHEETS MODULE
// =============================================================================
//
// Writes memo rows to a shared Google Sheet. Lives in the infra layer because
// it is pure external I/O; core only knows about the SheetAppender port.
//
// **Authentication:**
// Service account only. The sheet must be shared with the service account's
// email address, otherwise the Drive lookup comes back empty.

pub mod google_sheets_client;
pub mod service_account;

#[cfg(test)]
mod test_support;

pub use google_sheets_client::{GoogleSheetsClient, SheetTarget};
pub use service_account::ServiceAccountAuth;
