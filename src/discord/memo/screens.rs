// Renders the two memo screens (input and review) as one Discord message.
// No I/O here: the command in commands/memo.rs decides what to show and when.

use crate::core::memo::{AuthorRoster, MemoError, Stage, WorkflowState};
use poise::serenity_prelude::{self as serenity, CreateEmbed, CreateEmbedFooter};

pub const AUTHOR_SELECT_ID: &str = "memo_author";
pub const WRITE_BUTTON_ID: &str = "memo_write";
pub const BACK_BUTTON_ID: &str = "memo_back";
pub const EDIT_BUTTON_ID: &str = "memo_edit";
pub const SUBMIT_BUTTON_ID: &str = "memo_submit";

/// Discord caps paragraph text inputs at 4000 characters.
pub const MODAL_TEXT_LIMIT: usize = 4000;

// Embed descriptions stop at 4096; leave room for the heading.
const DESCRIPTION_LIMIT: usize = 3900;
const FIELD_LIMIT: usize = 1000;
// Select menus hold at most 25 options.
const MAX_AUTHOR_OPTIONS: usize = 25;

const ACCENT: u32 = 0xFF8C42;

/// What a component interaction on the screen asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectAuthor,
    Write,
    Back,
    Edit,
    Submit,
}

impl Action {
    pub fn from_custom_id(id: &str) -> Option<Self> {
        match id {
            AUTHOR_SELECT_ID => Some(Action::SelectAuthor),
            WRITE_BUTTON_ID => Some(Action::Write),
            BACK_BUTTON_ID => Some(Action::Back),
            EDIT_BUTTON_ID => Some(Action::Edit),
            SUBMIT_BUTTON_ID => Some(Action::Submit),
            _ => None,
        }
    }
}

/// A one-line status shown under the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Busy(String),
    Success(String),
    Warning(String),
    Error(String),
}

impl Notice {
    pub fn from_error(err: &MemoError) -> Self {
        if err.is_warning() {
            Notice::Warning(err.to_string())
        } else {
            Notice::Error(err.to_string())
        }
    }

    fn heading(&self) -> &'static str {
        match self {
            Notice::Info(_) => "ℹ️ Note",
            Notice::Busy(_) => "⏳ Working",
            Notice::Success(_) => "✅ Done",
            Notice::Warning(_) => "⚠️ Warning",
            Notice::Error(_) => "❌ Error",
        }
    }

    fn text(&self) -> &str {
        match self {
            Notice::Info(t)
            | Notice::Busy(t)
            | Notice::Success(t)
            | Notice::Warning(t)
            | Notice::Error(t) => t,
        }
    }

    fn colour(&self) -> Option<u32> {
        match self {
            Notice::Success(_) => Some(0x43B581),
            Notice::Warning(_) => Some(0xFAA61A),
            Notice::Error(_) => Some(0xF04747),
            Notice::Info(_) | Notice::Busy(_) => None,
        }
    }
}

/// Whether the user can click anything right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenMode {
    Interactive,
    /// Shown while a call is in flight or during the post-submit pause.
    Busy,
    /// Session over; no components at all.
    Closed,
}

pub fn render(
    state: &WorkflowState,
    roster: &AuthorRoster,
    notice: Option<&Notice>,
    mode: ScreenMode,
) -> poise::CreateReply {
    poise::CreateReply::default()
        .embed(build_embed(state, notice))
        .components(build_components(state, roster, mode))
}

pub fn build_embed(state: &WorkflowState, notice: Option<&Notice>) -> CreateEmbed {
    let colour = notice.and_then(Notice::colour).unwrap_or(ACCENT);

    let mut embed = match state.stage {
        Stage::Input => {
            let description = if state.raw_text.trim().is_empty() {
                "Paste a chat or email memo and get a short action summary, \
                 ready to drop into the team sheet."
                    .to_string()
            } else {
                format!("**Last memo**\n{}", preview(&state.raw_text, DESCRIPTION_LIMIT))
            };

            CreateEmbed::new()
                .title("🍊 Memo to Sheet · 1. Memo input")
                .description(description)
                .footer(CreateEmbedFooter::new(
                    "Press \"Paste & summarize\" to open the memo form.",
                ))
        }
        // Discord rejects an empty description
        Stage::Review if state.summary_text.trim().is_empty() => CreateEmbed::new()
            .title("🍊 Memo to Sheet · 2. Review")
            .description("_(empty summary)_")
            .footer(CreateEmbedFooter::new(
                "Use Edit to write a summary before sending it.",
            )),
        Stage::Review => CreateEmbed::new()
            .title("🍊 Memo to Sheet · 2. Review")
            .description(preview(&state.summary_text, DESCRIPTION_LIMIT))
            .footer(CreateEmbedFooter::new(
                "Edit the wording if needed, then send it to the sheet.",
            )),
    };

    embed = embed
        .color(colour)
        .field("Author", state.selected_author.clone(), true);

    if let Some(notice) = notice {
        embed = embed.field(notice.heading(), preview(notice.text(), FIELD_LIMIT), false);
    }

    embed
}

pub fn build_components(
    state: &WorkflowState,
    roster: &AuthorRoster,
    mode: ScreenMode,
) -> Vec<serenity::CreateActionRow> {
    if mode == ScreenMode::Closed {
        return Vec::new();
    }
    let disabled = mode == ScreenMode::Busy;

    let options = roster
        .names()
        .iter()
        .take(MAX_AUTHOR_OPTIONS)
        .map(|name| {
            serenity::CreateSelectMenuOption::new(name.clone(), name.clone())
                .default_selection(*name == state.selected_author)
        })
        .collect();

    let author_menu = serenity::CreateSelectMenu::new(
        AUTHOR_SELECT_ID,
        serenity::CreateSelectMenuKind::String { options },
    )
    .placeholder("👤 Select author")
    .disabled(disabled);

    let buttons = match state.stage {
        Stage::Input => vec![serenity::CreateButton::new(WRITE_BUTTON_ID)
            .label("✨ Paste & summarize")
            .style(serenity::ButtonStyle::Primary)
            .disabled(disabled)],
        Stage::Review => vec![
            serenity::CreateButton::new(BACK_BUTTON_ID)
                .label("⬅️ Rewrite")
                .style(serenity::ButtonStyle::Secondary)
                .disabled(disabled),
            serenity::CreateButton::new(EDIT_BUTTON_ID)
                .label("✏️ Edit")
                .style(serenity::ButtonStyle::Secondary)
                .disabled(disabled),
            serenity::CreateButton::new(SUBMIT_BUTTON_ID)
                .label("🚀 Send to sheet")
                .style(serenity::ButtonStyle::Primary)
                .disabled(disabled),
        ],
    };

    vec![
        serenity::CreateActionRow::SelectMenu(author_menu),
        serenity::CreateActionRow::Buttons(buttons),
    ]
}

/// Shortens `text` to at most `limit` characters for display.
pub fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let mut shortened: String = text.chars().take(limit.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}

/// Text to pre-fill a modal field with; Discord rejects values over the field limit.
pub fn prefill(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.chars().take(MODAL_TEXT_LIMIT).collect())
    }
}
