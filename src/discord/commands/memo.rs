// The /memo command.
//
// **Notice the pattern:**
// 1. Read what the user clicked or typed from the interaction
// 2. Call MemoService (all state changes happen there)
// 3. Redraw the screen from the returned state
//
// One ephemeral message is the whole UI. It is edited in place for every
// step until the session times out.

use crate::core::ai::AiService;
use crate::core::memo::{MemoService, WorkflowState};
use crate::discord::screens::{self, Action, Notice, ScreenMode};
use crate::infra::ai::ChatCompletionsClient;
use crate::infra::google_sheets::GoogleSheetsClient;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

pub type MemoWorkflow = MemoService<AiService<ChatCompletionsClient>, GoogleSheetsClient>;

/// Data that's shared across all commands.
pub struct Data {
    pub memo: Arc<MemoWorkflow>,
    /// How long a /memo screen stays interactive.
    pub session_timeout: Duration,
}

const MODAL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, poise::Modal)]
#[name = "Paste memo"]
struct MemoInputModal {
    #[name = "Chat / email text"]
    #[placeholder = "Paste the memo here..."]
    #[paragraph]
    #[max_length = 4000]
    memo: Option<String>,
}

#[derive(Debug, poise::Modal)]
#[name = "Edit summary"]
struct SummaryEditModal {
    #[name = "Summary"]
    #[paragraph]
    #[max_length = 4000]
    summary: Option<String>,
}

async fn autocomplete_author(ctx: Context<'_>, partial: &str) -> Vec<String> {
    ctx.data()
        .memo
        .roster()
        .matching(partial)
        .map(str::to_string)
        .collect()
}

/// Summarize a pasted memo with AI and file it in the team sheet.
#[poise::command(slash_command)]
pub async fn memo(
    ctx: Context<'_>,
    #[description = "Who is filing this memo"]
    #[autocomplete = "autocomplete_author"]
    author: Option<String>,
) -> Result<(), Error> {
    let service = Arc::clone(&ctx.data().memo);
    let session_id = ctx.id();

    let state = match service.open_session(session_id, author.as_deref()) {
        Ok(state) => state,
        Err(e) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("⚠️ {}", e))
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };

    let handle = ctx
        .send(
            screens::render(&state, service.roster(), None, ScreenMode::Interactive)
                .ephemeral(true),
        )
        .await?;

    let outcome = run_session(ctx, &service, &handle, session_id).await;
    if let Err(e) = &outcome {
        tracing::error!(session = session_id, "Memo session ended with error: {}", e);
    }

    // Leave the last screen visible but inert.
    if let Ok(state) = service.state(session_id) {
        let closed = Notice::Info("Session closed. Run /memo to start another one.".to_string());
        if let Err(e) = handle
            .edit(
                ctx,
                screens::render(&state, service.roster(), Some(&closed), ScreenMode::Closed),
            )
            .await
        {
            tracing::warn!("Failed to close memo screen: {}", e);
        }
    }
    service.close_session(session_id);

    outcome
}

async fn run_session(
    ctx: Context<'_>,
    service: &MemoWorkflow,
    handle: &poise::ReplyHandle<'_>,
    session_id: u64,
) -> Result<(), Error> {
    let msg_id = handle.message().await?.id;
    // The reply handle edits through the /memo token, so the whole session
    // has to end before that token does.
    let deadline = Instant::now() + ctx.data().session_timeout;

    // Interaction loop
    while let Some(left) = time_left(deadline, Instant::now()) {
        let Some(mci) = serenity::ComponentInteractionCollector::new(ctx)
            .author_id(ctx.author().id)
            .channel_id(ctx.channel_id())
            .timeout(left)
            .filter(move |mci| mci.message.id == msg_id)
            .await
        else {
            break;
        };

        let Some(action) = Action::from_custom_id(&mci.data.custom_id) else {
            continue;
        };

        match action {
            Action::Write => {
                let state = service.state(session_id)?;
                let defaults = MemoInputModal {
                    memo: screens::prefill(&state.raw_text),
                };

                let submitted = poise::execute_modal_on_component_interaction(
                    ctx,
                    mci,
                    Some(defaults),
                    Some(MODAL_TIMEOUT.min(left)),
                )
                .await;
                // Dismissed, timed out or failed; the screen is unchanged.
                let Some(input) = modal_reply(submitted, "memo") else {
                    continue;
                };
                let raw_text = input.memo.unwrap_or_default();

                if !raw_text.trim().is_empty() {
                    let mut pending = state.clone();
                    pending.raw_text = raw_text.clone();
                    let busy = Notice::Busy("Summarizing... ☕".to_string());
                    redraw(ctx, service, handle, &pending, Some(busy), ScreenMode::Busy).await?;
                }

                let notice = service
                    .summarize(session_id, &raw_text)
                    .await
                    .err()
                    .map(|e| Notice::from_error(&e));
                redraw_current(ctx, service, handle, session_id, notice).await?;
            }

            Action::Edit => {
                let state = service.state(session_id)?;
                let defaults = SummaryEditModal {
                    summary: screens::prefill(&state.summary_text),
                };

                let submitted = poise::execute_modal_on_component_interaction(
                    ctx,
                    mci,
                    Some(defaults),
                    Some(MODAL_TIMEOUT.min(left)),
                )
                .await;
                let Some(edit) = modal_reply(submitted, "summary") else {
                    continue;
                };

                let notice = service
                    .edit_summary(session_id, &edit.summary.unwrap_or_default())
                    .err()
                    .map(|e| Notice::from_error(&e));
                redraw_current(ctx, service, handle, session_id, notice).await?;
            }

            Action::SelectAuthor => {
                // Defer the update to prevent "Unknown interaction" errors
                if let Err(e) = mci.defer(&ctx.http()).await {
                    tracing::warn!("Error deferring interaction: {:?}", e);
                    continue;
                }

                let notice = match selected_value(&mci) {
                    Some(name) => service
                        .select_author(session_id, name)
                        .err()
                        .map(|e| Notice::from_error(&e)),
                    None => None,
                };
                redraw_current(ctx, service, handle, session_id, notice).await?;
            }

            Action::Back => {
                if let Err(e) = mci.defer(&ctx.http()).await {
                    tracing::warn!("Error deferring interaction: {:?}", e);
                    continue;
                }

                let notice = service.back(session_id).err().map(|e| Notice::from_error(&e));
                redraw_current(ctx, service, handle, session_id, notice).await?;
            }

            Action::Submit => {
                if let Err(e) = mci.defer(&ctx.http()).await {
                    tracing::warn!("Error deferring interaction: {:?}", e);
                    continue;
                }

                let state = service.state(session_id)?;
                if !state.summary_text.trim().is_empty() {
                    let busy = Notice::Busy("Writing to the sheet... 📝".to_string());
                    redraw(ctx, service, handle, &state, Some(busy), ScreenMode::Busy).await?;
                }

                match service.submit(session_id, &state.summary_text).await {
                    Ok(receipt) => {
                        // Show the confirmation on the review screen, then go back to input.
                        let saved = Notice::Success(format!(
                            "Saved at {} as {}. 🍊",
                            receipt.row.timestamp, receipt.row.author
                        ));
                        redraw(ctx, service, handle, &state, Some(saved.clone()), ScreenMode::Busy)
                            .await?;
                        tokio::time::sleep(receipt.reset_delay).await;
                        redraw(
                            ctx,
                            service,
                            handle,
                            &receipt.state,
                            Some(saved),
                            ScreenMode::Interactive,
                        )
                        .await?;
                    }
                    Err(e) => {
                        let notice = Some(Notice::from_error(&e));
                        redraw_current(ctx, service, handle, session_id, notice).await?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Time left before `deadline`, or `None` once it has passed.
fn time_left(deadline: Instant, now: Instant) -> Option<Duration> {
    let left = deadline.saturating_duration_since(now);
    (!left.is_zero()).then_some(left)
}

/// The submitted form, if any. A failed modal only costs that one click.
fn modal_reply<M>(result: Result<Option<M>, serenity::Error>, form: &str) -> Option<M> {
    match result {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(form, "Error showing form: {:?}", e);
            None
        }
    }
}

fn selected_value(mci: &serenity::ComponentInteraction) -> Option<&str> {
    match &mci.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => {
            values.first().map(String::as_str)
        }
        _ => None,
    }
}

async fn redraw(
    ctx: Context<'_>,
    service: &MemoWorkflow,
    handle: &poise::ReplyHandle<'_>,
    state: &WorkflowState,
    notice: Option<Notice>,
    mode: ScreenMode,
) -> Result<(), Error> {
    handle
        .edit(
            ctx,
            screens::render(state, service.roster(), notice.as_ref(), mode),
        )
        .await?;
    Ok(())
}

async fn redraw_current(
    ctx: Context<'_>,
    service: &MemoWorkflow,
    handle: &poise::ReplyHandle<'_>,
    session_id: u64,
    notice: Option<Notice>,
) -> Result<(), Error> {
    let state = service.state(session_id)?;
    redraw(ctx, service, handle, &state, notice, ScreenMode::Interactive).await
}
