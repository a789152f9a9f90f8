use std::sync::Arc;

use dotenv::dotenv;
use teloxide::Bot;
use tokio::task;
use tracing_subscriber::EnvFilter;

use nglbot::db::{create_pool, run_migrations};
use nglbot::observability::{AlertManager, OperatorNotifier};
use nglbot::services::dispatch::{DispatchWorker, Pacing};
use nglbot::services::gemini::GeminiGenerator;
use nglbot::services::generation::{MessageGenerator, OfflineGenerator};
use nglbot::services::ngl::NglClient;
use nglbot::services::quota::QuotaLimiter;
use nglbot::services::scheduler::Scheduler;
use nglbot::session::Conversation;
use nglbot::store::DispatchStore;
use nglbot::PgStore;

mod bot;
mod config;
mod http_server;

use bot::notify::ChatBatchObserver;
use bot::{run_bot, BotContext};
use config::AppConfig;
use http_server::run_http_server;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nglbot=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let settings = config.engine_settings();

    let pool = create_pool(&config.database_url)?;
    let applied = run_migrations(&pool)?;
    tracing::info!("Database ready ({} migrations applied)", applied);

    let store: Arc<dyn DispatchStore> = Arc::new(PgStore::new(Arc::new(pool)));

    let generator: Arc<dyn MessageGenerator> = match &config.gemini_api_key {
        Some(key) => Arc::new(GeminiGenerator::new(
            config.gemini_api_url.clone(),
            key.clone(),
        )?),
        None => {
            tracing::warn!("GEMINI_API_KEY not set, using offline message templates");
            Arc::new(OfflineGenerator)
        }
    };

    let bot = Bot::new(&config.bot_token);
    let notifier: Arc<dyn OperatorNotifier> = Arc::new(AlertManager::new(
        bot.clone(),
        config.admin_id,
        config.is_operator_alerts_active(),
    ));

    let limiter = QuotaLimiter::new(store.clone(), settings.quota_window);
    let worker = Arc::new(DispatchWorker::new(
        store.clone(),
        Arc::new(NglClient::new(settings.link_prefix.clone())?),
        limiter.clone(),
        notifier.clone(),
        Pacing::new(settings.pacing_min, settings.pacing_max),
        settings.operator_id,
    ));

    let scheduler = Scheduler::new(
        store.clone(),
        worker.clone(),
        limiter.clone(),
        notifier.clone(),
        settings.scheduler_interval,
        settings.operator_id,
    )
    .with_observer(Arc::new(ChatBatchObserver::new(bot.clone())));

    let conversation = Arc::new(Conversation::new(
        store.clone(),
        limiter,
        generator,
        worker,
        notifier.clone(),
        settings,
    ));

    let ctx = BotContext {
        conversation,
        store,
        notifier,
        required_channels: Arc::new(config.required_channels.clone()),
        broadcast_rate: config.broadcast_rate,
    };

    task::spawn(scheduler.run());
    task::spawn(run_bot(bot, ctx));

    run_http_server(config.port).await?;

    Ok(())
}
