/*
 * Responsibility
 * - Config 読み込み → backend 選択 → AppState 組み立て
 * - Router 組み立て + middleware の適用
 * - sweeper の起動、axum::serve() と graceful shutdown
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::Config;
use crate::middleware;
use crate::repos::par_repo::ParRepo;
use crate::services::auth::JwtAccessTokenValidator;
use crate::services::auth::dpop::DpopPolicy;
use crate::services::auth::replay::{InMemoryReplayCache, ReplayStore, ValkeyReplayStore};
use crate::services::authorize::{ClientStore, InMemoryClientStore};
use crate::services::cache::ValkeyClient;
use crate::services::clock::system_clock;
use crate::services::message::{
    AuthorizationMessageStore, InMemoryMessageStore, ValkeyMessageStore,
};
use crate::services::par::{InMemoryParStore, ParStore, PostgresParStore, ValkeyParStore};
use crate::services::profile::{
    DirectoryProfileService, InMemoryUserDirectory, ProfileService, TransactionClaimProfileService,
};
use crate::services::sweeper::Sweeper;
use crate::state::{AppState, StateDeps, StateSettings};

const DB_MAX_CONNECTIONS: u32 = 10;
const REPLAY_KEY_PREFIX: &str = "dpop:replay";
const PAR_KEY_PREFIX: &str = "par";
const MESSAGE_KEY_PREFIX: &str = "authz";

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,oidc_core=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing; stderr may be hidden.
        tracing::error!(?info, "panic");

        // Development: crash the whole process so we notice immediately.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let abort_on_panic = !config.app_env.is_production();
    init_panic_hook(abort_on_panic);

    tracing::info!(
        "starting oidc-core in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    tracing::debug!(?config, "configuration loaded");

    let (state, sweeper) = build_state(&config).await?;
    let sweeper = sweeper.spawn(config.par_sweep_interval);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}

/// Build process-level services and pick a backend for each store.
///
/// - PAR: Postgres if `DATABASE_URL`, else Valkey if `VALKEY_URL`, else memory
/// - DPoP replay: Valkey if `VALKEY_URL`, else memory (swept)
/// - parked authorize messages: Valkey if `VALKEY_URL`, else memory (swept)
async fn build_state(config: &Config) -> anyhow::Result<(AppState, Sweeper)> {
    let clock = system_clock();

    let token_validator = JwtAccessTokenValidator::new(
        &config.access_jwt_public_key_pem,
        &config.auth_issuer,
        &config.auth_audience,
        config.access_token_leeway_seconds,
        config.access_token_types.clone(),
    )
    .context("ACCESS_JWT_PUBLIC_KEY_PEM is not a usable Ed25519 public key")?;

    let directory = match &config.user_directory_path {
        Some(path) => InMemoryUserDirectory::load_json_file(path)
            .with_context(|| format!("failed to load user directory from {path}"))?,
        None => {
            tracing::warn!("USER_DIRECTORY_PATH not set; every subject is unknown");
            InMemoryUserDirectory::new()
        }
    };
    tracing::info!(users = directory.len(), "user directory loaded");
    let profile: Arc<dyn ProfileService> = Arc::new(TransactionClaimProfileService::new(
        DirectoryProfileService::new(Arc::new(directory)),
    ));

    let clients: Arc<dyn ClientStore> = match &config.clients_path {
        Some(path) => Arc::new(
            InMemoryClientStore::load_json_file(path)
                .with_context(|| format!("failed to load clients from {path}"))?,
        ),
        None => {
            tracing::warn!("CLIENTS_PATH not set; no client can authorize");
            Arc::new(InMemoryClientStore::new(Vec::new()))
        }
    };

    let valkey = match &config.valkey_url {
        Some(url) => Some(Arc::new(
            ValkeyClient::connect(url)
                .await
                .context("failed to connect to Valkey")?,
        )),
        None => None,
    };

    let mut swept_replay_cache = None;
    let replay_store: Arc<dyn ReplayStore> = match &valkey {
        Some(client) => Arc::new(ValkeyReplayStore::new(client.clone(), REPLAY_KEY_PREFIX)),
        None => {
            let cache = Arc::new(InMemoryReplayCache::new(
                config.replay_cache_capacity,
                clock.clone(),
            ));
            swept_replay_cache = Some(cache.clone());
            cache
        }
    };

    let message_store: Arc<dyn AuthorizationMessageStore> = match &valkey {
        Some(client) => Arc::new(ValkeyMessageStore::new(client.clone(), MESSAGE_KEY_PREFIX)),
        None => Arc::new(InMemoryMessageStore::new()),
    };

    let par_store: Arc<dyn ParStore> = match (&config.database_url, valkey) {
        (Some(database_url), _) => {
            let pool = PgPoolOptions::new()
                .max_connections(DB_MAX_CONNECTIONS)
                .acquire_timeout(config.store_timeout.max(Duration::from_secs(1)))
                .connect(database_url)
                .await
                .context("failed to connect to Postgres")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("failed to run migrations")?;
            Arc::new(PostgresParStore::new(ParRepo::new(pool)))
        }
        (None, Some(client)) => Arc::new(ValkeyParStore::new(client, PAR_KEY_PREFIX)),
        (None, None) => {
            tracing::warn!("no DATABASE_URL or VALKEY_URL; pushed requests are kept in memory");
            Arc::new(InMemoryParStore::new())
        }
    };
    let replay_backend = if swept_replay_cache.is_some() { "memory" } else { "valkey" };
    tracing::info!(
        par_backend = par_store.backend_name(),
        message_backend = message_store.backend_name(),
        replay_backend,
        "stores selected"
    );

    let settings = StateSettings {
        public_origin: config.public_origin.clone(),
        allow_origin_in_return_url: config.allow_origin_in_return_url,
        login_url: config.login_url.clone(),
        consent_url: config.consent_url.clone(),
        return_url_parameter: config.return_url_parameter.clone(),
        dpop_policy: DpopPolicy {
            iat_leeway_seconds: config.dpop_iat_leeway_seconds,
            max_age_seconds: config.dpop_max_age_seconds,
            require_nonce: config.dpop_require_nonce,
        },
        par_ttl: config.par_ttl,
        message_ttl: config.message_ttl,
        store_timeout: config.store_timeout,
    };
    let deps = StateDeps {
        token_validator: Arc::new(token_validator),
        profile,
        clients,
        replay_store,
        par_store,
        message_store,
        clock,
    };

    let state = AppState::build(settings, deps);
    let sweeper = Sweeper::new(
        Some(state.pushed.clone()),
        Some(state.messages.clone()),
        swept_replay_cache,
    );
    Ok((state, sweeper))
}

/// Full router with every cross-cutting layer applied.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/connect", api::connect::routes(state.clone()))
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    let router = middleware::security_headers::apply(router);
    middleware::http::apply(router)
}
