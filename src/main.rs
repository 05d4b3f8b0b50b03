use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use leadbot::assistant::{reminders, telegram, Assistant, Database, Outcome, TelegramClient, Transport};
use leadbot::config::Config;
use leadbot::telegram_log;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "leadbot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);
    let client = Arc::new(TelegramClient::new(bot.clone()));

    // Setup logging
    let log_dir = config.log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory {}: {e}", log_dir.display());
        std::process::exit(1);
    }
    let file_appender = tracing_appender::rolling::never(&log_dir, "leadbot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        let tg_layer = telegram_log::TelegramLogLayer::new(client.clone(), log_chat_id);
        registry.with(tg_layer).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting leadbot...");
    info!("Loaded config from {config_path}");
    info!("Operator: {}, timezone: {}", config.operator_id, config.timezone);

    let db_path = config.database_path();
    let database = match Database::open(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open database {:?}: {}", db_path, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = client.reset_webhook().await {
        warn!("Failed to drop webhook: {}", e);
    }

    let transport: Arc<dyn Transport> = client;
    let assistant = Arc::new(Assistant::new(config.settings(), database.clone(), transport));
    assistant.announce_startup().await;

    reminders::spawn_reminder_loop(database.clone(), assistant.notifier().clone(), config.reminders);
    if let Some(expr) = config.export_cron.clone() {
        info!("📊 Scheduled export enabled: {}", expr);
        reminders::spawn_scheduled_export(database, assistant.notifier().clone(), expr);
    }

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![assistant])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, assistant: Arc<Assistant>) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(inbound) = telegram::to_inbound(&msg) else {
        return Ok(());
    };

    let user_id = inbound.user_id;
    if let Outcome::LeadCaptured { lead_id: None, .. } = assistant.handle(inbound).await {
        warn!("Form from user {} completed but the lead was not stored", user_id);
    }

    Ok(())
}
