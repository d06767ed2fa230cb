pub mod memo_models;
pub mod memo_service;

pub use memo_models::{AuthorRoster, SheetClock, SheetRow, Stage, WorkflowState};
pub use memo_service::{MemoError, MemoService, MemoSettings, SheetAppender, Summarizer};
