// This is the entry point of the moderation bot.
//
// **Architecture Overview:**
// - `core/` = Moderation logic (platform-agnostic)
// - `infra/` = Implementations of core traits (SQLite storage)
// - `telegram/` = Telegram-specific adapters (transport, update handlers)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Telegram dispatcher
// 4. Drop pending timers on shutdown

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "telegram/telegram_layer.rs"]
mod telegram;

mod config;

use crate::config::AppConfig;
use crate::core::moderation::ModerationService;
use crate::infra::moderation::SqliteModerationStore;
use crate::telegram::handlers;
use crate::telegram::TelegramTransport;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use teloxide::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(config.log_filter())
        .init();

    // ========================================================================
    // STORAGE
    // ========================================================================

    if let Some(parent) = Path::new(&config.database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context("Failed to create data directory for SQLite files")?;
        }
    }

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", config.database_path))
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    let store = SqliteModerationStore::new(pool.clone());
    store
        .migrate()
        .await
        .context("Failed to migrate moderation DB")?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let bot = Bot::new(&config.bot_token);

    // Long polling only works without a webhook
    bot.delete_webhook()
        .await
        .context("Failed to delete webhook")?;

    let me = bot.get_me().await.context("Failed to fetch bot identity")?;
    tracing::info!(bot_id = me.id.0, username = ?me.username, "Bot identity resolved");

    let mut moderation_config = config.moderation.clone();
    moderation_config.bot_user_id = Some(me.id.0);

    let transport = Arc::new(TelegramTransport::new(bot.clone(), config.owner_id));
    let moderation = Arc::new(ModerationService::new(
        Arc::new(store),
        Arc::clone(&transport),
        transport,
        moderation_config,
    ));

    // ========================================================================
    // DISPATCHER
    // ========================================================================

    tracing::info!("Moderation bot started");

    Dispatcher::builder(bot, handlers::schema())
        .dependencies(dptree::deps![Arc::clone(&moderation)])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    moderation.shutdown();
    pool.close().await;
    tracing::info!("Moderation bot stopped");

    Ok(())
}
