// The memo workflow controller.
// Like the rest of core/, this file has NO Discord code. It owns the per-session
// WorkflowState and drives the input -> summarize -> review -> submit cycle,
// talking to the outside world only through the two ports below.

use super::memo_models::{AuthorRoster, SheetClock, SheetRow, Stage, WorkflowState};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::error::Error;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum MemoError {
    #[error("Please paste some memo text first.")]
    EmptyInput,

    #[error("The summary is empty. Write something before sending it.")]
    EmptySummary,

    #[error("The model returned an empty summary.")]
    EmptyResponse,

    #[error("Unknown author: {0}")]
    UnknownAuthor(String),

    #[error("This action needs the {expected} screen, but the session is on {actual}.")]
    WrongStage { expected: Stage, actual: Stage },

    #[error("Session {0} has expired.")]
    UnknownSession(u64),

    #[error("AI error: {0}")]
    Summarization(String),

    #[error("Sheet write failed: {0}")]
    SheetWrite(String),
}

impl MemoError {
    /// Warnings are local validation problems; everything else came from
    /// an external call or a stale session.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            MemoError::EmptyInput
                | MemoError::EmptySummary
                | MemoError::EmptyResponse
                | MemoError::UnknownAuthor(_)
                | MemoError::WrongStage { .. }
        )
    }
}

// ============================================================================
// PORTS
// ============================================================================

/// Turns a raw memo into a short summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Writes one row to the shared sheet.
#[async_trait]
pub trait SheetAppender: Send + Sync {
    async fn append_row(&self, row: &SheetRow) -> Result<(), Box<dyn Error + Send + Sync>>;
}

// ============================================================================
// SERVICE
// ============================================================================

#[derive(Debug, Clone)]
pub struct MemoSettings {
    pub roster: AuthorRoster,
    pub clock: SheetClock,
    /// How long the success notice stays up before the input screen returns.
    pub reset_delay: Duration,
}

impl Default for MemoSettings {
    fn default() -> Self {
        Self {
            roster: AuthorRoster::default(),
            clock: SheetClock::default(),
            reset_delay: Duration::from_millis(1200),
        }
    }
}

/// What a successful submit hands back to the presentation layer.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub row: SheetRow,
    pub reset_delay: Duration,
    /// State after the reset.
    pub state: WorkflowState,
}

pub struct MemoService<S: Summarizer, A: SheetAppender> {
    summarizer: S,
    sheet: A,
    settings: MemoSettings,
    // Session id -> state. Guards are never held across an await.
    sessions: DashMap<u64, WorkflowState>,
}

impl<S: Summarizer, A: SheetAppender> MemoService<S, A> {
    pub fn new(summarizer: S, sheet: A, settings: MemoSettings) -> Self {
        Self {
            summarizer,
            sheet,
            settings,
            sessions: DashMap::new(),
        }
    }

    pub fn roster(&self) -> &AuthorRoster {
        &self.settings.roster
    }

    /// Create a fresh session. `author` must be on the roster when given.
    pub fn open_session(
        &self,
        session_id: u64,
        author: Option<&str>,
    ) -> Result<WorkflowState, MemoError> {
        let author = match author {
            Some(name) => self.resolve_author(name)?,
            None => self.settings.roster.default_author().to_string(),
        };

        let state = WorkflowState::new(author);
        self.sessions.insert(session_id, state.clone());
        tracing::info!(
            session = session_id,
            author = %state.selected_author,
            active = self.sessions.len(),
            "Memo session opened"
        );
        Ok(state)
    }

    pub fn close_session(&self, session_id: u64) {
        if self.sessions.remove(&session_id).is_some() {
            tracing::debug!(session = session_id, "Memo session closed");
        }
    }

    pub fn state(&self, session_id: u64) -> Result<WorkflowState, MemoError> {
        self.sessions
            .get(&session_id)
            .map(|s| s.clone())
            .ok_or(MemoError::UnknownSession(session_id))
    }

    pub fn select_author(&self, session_id: u64, name: &str) -> Result<WorkflowState, MemoError> {
        let author = self.resolve_author(name)?;
        self.update(session_id, |state| {
            state.selected_author = author;
            Ok(())
        })
    }

    /// Summarize `raw_text` and move the session to review.
    ///
    /// On any failure the session stays on the input screen with the raw
    /// text retained so nothing the user pasted is lost.
    pub async fn summarize(
        &self,
        session_id: u64,
        raw_text: &str,
    ) -> Result<WorkflowState, MemoError> {
        let state = self.state(session_id)?;
        expect_stage(&state, Stage::Input)?;

        if raw_text.trim().is_empty() {
            tracing::warn!(session = session_id, "Summarize requested with empty memo");
            return Err(MemoError::EmptyInput);
        }

        // Keep what they typed even if the call below fails.
        self.update(session_id, |state| {
            state.raw_text = raw_text.to_string();
            Ok(())
        })?;

        let summary = match self.summarizer.summarize(raw_text).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(session = session_id, "Summarization failed: {}", e);
                return Err(MemoError::Summarization(e.to_string()));
            }
        };

        if summary.trim().is_empty() {
            tracing::warn!(session = session_id, "Model returned an empty summary");
            return Err(MemoError::EmptyResponse);
        }

        tracing::info!(
            session = session_id,
            chars = raw_text.chars().count(),
            summary_chars = summary.chars().count(),
            "Memo summarized"
        );

        self.update(session_id, |state| {
            expect_stage(state, Stage::Input)?;
            state.begin_review(raw_text.to_string(), summary);
            Ok(())
        })
    }

    /// Replace the summary with the user's edit.
    pub fn edit_summary(&self, session_id: u64, edited: &str) -> Result<WorkflowState, MemoError> {
        self.update(session_id, |state| {
            expect_stage(state, Stage::Review)?;
            state.summary_text = edited.to_string();
            Ok(())
        })
    }

    /// Discard the summary and return to the input screen.
    pub fn back(&self, session_id: u64) -> Result<WorkflowState, MemoError> {
        self.update(session_id, |state| {
            state.back_to_input();
            Ok(())
        })
    }

    /// Append the edited summary to the sheet and reset the session.
    ///
    /// A failed write leaves the session on review with the edit preserved.
    /// There is no retry.
    pub async fn submit(
        &self,
        session_id: u64,
        edited: &str,
    ) -> Result<SubmitReceipt, MemoError> {
        let state = self.state(session_id)?;
        expect_stage(&state, Stage::Review)?;

        if edited.trim().is_empty() {
            tracing::warn!(session = session_id, "Submit requested with empty summary");
            return Err(MemoError::EmptySummary);
        }

        let state = self.edit_summary(session_id, edited)?;
        let row = SheetRow::new(
            &self.settings.clock,
            Utc::now(),
            &state.selected_author,
            &state.summary_text,
        );

        if let Err(e) = self.sheet.append_row(&row).await {
            tracing::error!(session = session_id, "Sheet append failed: {}", e);
            return Err(MemoError::SheetWrite(e.to_string()));
        }

        tracing::info!(
            session = session_id,
            author = %row.author,
            timestamp = %row.timestamp,
            "Memo appended to sheet"
        );

        let state = self.update(session_id, |state| {
            state.reset();
            Ok(())
        })?;

        Ok(SubmitReceipt {
            row,
            reset_delay: self.settings.reset_delay,
            state,
        })
    }

    fn resolve_author(&self, name: &str) -> Result<String, MemoError> {
        self.settings
            .roster
            .resolve(name)
            .map(str::to_string)
            .ok_or_else(|| MemoError::UnknownAuthor(name.to_string()))
    }

    /// Apply `f` to the session in place and return a snapshot.
    /// Nothing is written if `f` fails.
    fn update<F>(&self, session_id: u64, f: F) -> Result<WorkflowState, MemoError>
    where
        F: FnOnce(&mut WorkflowState) -> Result<(), MemoError>,
    {
        let mut entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or(MemoError::UnknownSession(session_id))?;

        let mut next = entry.clone();
        f(&mut next)?;
        *entry = next.clone();
        Ok(next)
    }
}

fn expect_stage(state: &WorkflowState, expected: Stage) -> Result<(), MemoError> {
    if state.stage == expected {
        Ok(())
    } else {
        Err(MemoError::WrongStage {
            expected,
            actual: state.stage,
        })
    }
}
