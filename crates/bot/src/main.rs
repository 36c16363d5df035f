use std::{future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use clap::Parser;
use navigator::{AccessPolicy, Navigator, NavigatorSettings, WithDeadline};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod dispatch;
mod telegram;

use app_state::AppState;
use config::{load_settings, prepare_database_url, RunMode};
use telegram::{TelegramClient, Update};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
const MAX_UPDATE_BYTES: usize = 1024 * 1024;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Parser)]
#[command(about = "FAQ navigator bot")]
struct Cli {
    /// Profile name; reads config/config_<profile>.toml when present.
    #[arg(long, default_value = "local")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    settings.validate()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let access = AccessPolicy::new(settings.admins());
    info!(
        profile = %cli.config,
        admins = access.admin_count(),
        page_size = settings.page_size,
        "navigator ready"
    );
    let engine = Navigator::new(
        WithDeadline::new(storage, settings.store_timeout()),
        access,
        NavigatorSettings {
            page_size: settings.page_size,
            default_language: settings.default_language.clone(),
        },
    );

    let client = TelegramClient::new(
        &settings.telegram_api_url,
        &settings.bot_token,
        settings.poll_timeout_seconds,
    )?;
    let state = AppState {
        engine: Arc::new(engine),
        outbound: Arc::new(client.clone()),
        webhook_secret: settings.webhook_secret.clone(),
    };

    let addr: SocketAddr = settings.bind_addr()?;
    let app = build_router(state.clone(), settings.mode == RunMode::Webhook);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, mode = ?settings.mode, "http listening");

    match settings.mode {
        RunMode::Webhook => {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        RunMode::Polling => {
            tokio::select! {
                served = axum::serve(listener, app).into_future() => served?,
                polled = run_polling(state, client, settings.poll_timeout_seconds) => polled?,
                _ = shutdown_signal() => {}
            }
        }
    }

    info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Long-polls `getUpdates`; each update runs in its own task.
async fn run_polling(
    state: AppState,
    client: TelegramClient,
    timeout_seconds: u64,
) -> anyhow::Result<()> {
    let mut offset = 0;
    loop {
        let updates = match client.get_updates(offset, timeout_seconds).await {
            Ok(updates) => updates,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "getUpdates failed; retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            spawn_update(&state, update);
        }
    }
}

fn spawn_update(state: &AppState, update: Update) {
    let state = state.clone();
    tokio::spawn(async move {
        dispatch::process_update(state.engine.as_ref(), state.outbound.as_ref(), update).await;
    });
}

fn build_router(state: AppState, webhook: bool) -> Router {
    let mut router = Router::new().route("/healthz", get(healthz));
    if webhook {
        router = router.route(
            "/telegram/webhook",
            post(telegram_webhook).layer(RequestBodyLimitLayer::new(MAX_UPDATE_BYTES)),
        );
    }
    router.with_state(state)
}

async fn healthz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.storage().health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(error = %format!("{error:#}"), "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = &state.webhook_secret {
        let presented = headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(secret.as_str()) {
            warn!("webhook call with bad secret");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(error) => {
            warn!(%error, "unreadable webhook update");
            return StatusCode::BAD_REQUEST;
        }
    };
    spawn_update(&state, update);
    StatusCode::OK
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
