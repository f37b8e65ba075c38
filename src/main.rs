//! School Desk - multi-role school chat bot
//!
//! Parents register and talk to the school, teachers record attendance
//! and grades, admins manage classes, teachers and announcements. One
//! conversation state per user, persisted in SQLite.

mod api;
mod config;
mod db;
mod flows;
mod i18n;
mod runtime;
mod state_machine;
mod telegram;

use api::{create_router, AppState};
use config::BotConfig;
use db::Database;
use flows::FlowRegistry;
use i18n::Localizer;
use runtime::identity::IdentityResolver;
use runtime::outbox::{self, OutboxWorker};
use runtime::router::Router;
use runtime::state_manager::StateManager;
use runtime::{DatabaseStorage, Dispatcher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use telegram::TelegramClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_BACKOFF: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "school_desk=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    for user_id in config.admins.user_ids() {
        db.add_admin(Some(user_id), None)?;
    }
    for phone in config.admins.phones() {
        db.add_admin(None, Some(phone))?;
    }
    if config.admins.is_empty() {
        tracing::warn!("No admins configured. Set ADMIN_USER_IDS or ADMIN_PHONES.");
    }

    let storage = Arc::new(DatabaseStorage::new(db));
    let client = Arc::new(TelegramClient::new(&config.api_url, &config.bot_token)?);
    let (outbox, outbox_rx) = outbox::channel();

    let router = Router::new(
        FlowRegistry::standard()?,
        StateManager::new(storage.clone()).with_ttl(config.state_ttl),
        storage,
        client.clone(),
        IdentityResolver::new(config.admins.clone()),
        Localizer::new(config.default_language),
        outbox,
    );
    let dispatcher = Dispatcher::new(Arc::new(router), config.actor_idle);

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(OutboxWorker::new(client.clone(), outbox_rx).run(cancel.clone()));

    let poller = if config.webhook_secret.is_none() {
        client.delete_webhook().await?;
        Some(tokio::spawn(poll_updates(
            client.clone(),
            dispatcher.clone(),
            cancel.clone(),
        )))
    } else {
        None
    };

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown requested"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    let app = create_router(AppState::new(dispatcher, config.webhook_secret.clone()));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let mode = if poller.is_some() { "polling" } else { "webhook" };
    tracing::info!(%addr, mode, "School desk listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await?;

    cancel.cancel();
    if let Some(poller) = poller {
        let _ = poller.await;
    }
    let _ = worker.await;
    Ok(())
}

/// Feed `getUpdates` batches to the dispatcher until cancelled
async fn poll_updates(client: Arc<TelegramClient>, dispatcher: Dispatcher, cancel: CancellationToken) {
    tracing::info!("Long-polling for updates");
    let mut offset = 0;
    loop {
        let batch = tokio::select! {
            () = cancel.cancelled() => break,
            batch = client.get_updates(offset, POLL_TIMEOUT) => batch,
        };
        match batch {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    dispatcher.dispatch(update.into_update()).await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind, "getUpdates failed");
                let delay = e.retry_after.unwrap_or(POLL_BACKOFF);
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    tracing::info!("Polling stopped");
}
