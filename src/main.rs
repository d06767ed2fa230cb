// This is the entry point of the memo bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic): the memo workflow and the AI port
// - `infra/` = Implementations of core traits (chat-completion API, Google Sheets)
// - `discord/` = Discord-specific adapters (the /memo command and its screens)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands

mod config;
// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::config::AppConfig;
use crate::core::ai::AiService;
use crate::core::memo::MemoService;
use crate::discord::{Data, Error};
use crate::infra::ai::ChatCompletionsClient;
use crate::infra::google_sheets::{GoogleSheetsClient, ServiceAccountAuth};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // A missing key or credential is fatal: say which one and stop.
    let config = AppConfig::from_env().context("Invalid configuration")?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let ai_client =
        ChatCompletionsClient::new(config.ai.api_key.clone(), config.ai.base_url.clone());
    let ai_service = AiService::new(
        ai_client,
        config.ai.system_prompt.clone(),
        config.ai.config.clone(),
    );
    tracing::info!(model = %ai_service.config().model, "Summarization client ready");

    let auth = ServiceAccountAuth::from_json(&config.service_account_json)
        .context("Failed to load Google service account")?;
    tracing::info!(account = %auth.client_email(), "Loaded Google service account");

    let sheets = GoogleSheetsClient::new(auth, config.sheet.clone());
    tracing::info!(
        spreadsheet = %sheets.target().spreadsheet_name,
        tab = %sheets.target().tab_name,
        "Sheet client ready"
    );

    let memo_service = Arc::new(MemoService::new(ai_service, sheets, config.memo.clone()));

    // Create the data structure that will be shared across all commands
    let data = Data {
        memo: Arc::clone(&memo_service),
        session_timeout: config.session_timeout,
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    // Slash commands and component interactions need no privileged intents.
    let intents = serenity::GatewayIntents::non_privileged();
    let guild_id = config.guild_id;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![discord::commands::memo::memo()],
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                println!("🍊 Memo bot is starting up...");

                match guild_id {
                    // Guild registration is instant, handy while testing
                    Some(id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(id),
                        )
                        .await?
                    }
                    // Global registration can take up to an hour to propagate
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?
                    }
                }

                println!("✅ Commands registered!");
                println!("🚀 Bot is ready!");
                Ok::<Data, Error>(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(config.discord_token.clone(), intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
