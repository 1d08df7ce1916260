//! Roundhouse - Round & Settlement Engine
//! Mission: One authoritative result per round, every bet settled exactly once
//!
//! Time-sliced betting games (dice, andar bahar, wheel, color) driven by
//! idempotent scheduler ticks. The engine is stateless between invocations;
//! all coordination goes through the store's conditional writes, so the
//! internal loops and an external cron can safely overlap.

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use dotenv::dotenv;
use rand::{rngs::StdRng, SeedableRng};
use std::{sync::Arc, time::Duration};
use tokio::{
    net::TcpListener,
    time::{interval, MissedTickBehavior},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roundhouse_backend::{
    admin::api::admin_router,
    api::public_router,
    auth::JwtHandler,
    clock,
    engine::{self, TickParams, TickReport},
    games::{Game, GameRegistry},
    middleware::{RateLimitConfig, RateLimiter},
    models::{AppState, Config},
    store::{RoundStore, SqliteRoundStore},
};

#[derive(Debug, Parser)]
#[command(name = "roundhouse", about = "Round & settlement engine")]
struct Args {
    /// Listen port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,

    /// Disable the internal per-game scheduler loops
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roundhouse_backend=info,roundhouse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if args.no_scheduler {
        config.scheduler_enabled = false;
    }

    info!(
        db = %config.database_path,
        games = 4,
        grace_secs = config.grace_secs,
        "starting roundhouse"
    );

    let store: Arc<dyn RoundStore> = Arc::new(
        SqliteRoundStore::new(&config.database_path).context("Failed to open round store")?,
    );
    let games = Arc::new(GameRegistry::standard());
    let jwt = Arc::new(JwtHandler::new(config.jwt_secret.clone()));
    let config = Arc::new(config);

    let state = AppState {
        store: store.clone(),
        games: games.clone(),
        config: config.clone(),
        jwt: jwt.clone(),
    };

    // Internal scheduler: one tick loop per game. Each loop is just another
    // at-least-once trigger; the engine tolerates overlap with the HTTP
    // tick endpoint and with other processes.
    if config.scheduler_enabled {
        for game in games.iter() {
            tokio::spawn(game_tick_loop(store.clone(), game.clone(), config.clone()));
        }
        info!(interval_secs = config.tick_secs, "internal scheduler loops started");
    } else {
        info!("internal scheduler disabled; expecting external tick triggers");
    }

    let reopen_limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));

    let app = axum::Router::new()
        .merge(public_router(state.clone()))
        .merge(admin_router(state, jwt, reopen_limiter))
        .layer(cors_layer(&config.allowed_origins));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn game_tick_loop(store: Arc<dyn RoundStore>, game: Arc<dyn Game>, config: Arc<Config>) {
    let params = TickParams {
        grace_secs: config.grace_secs,
        catchup_buckets: config.catchup_buckets,
        retention_days: config.retention_days,
    };

    let mut ticker = interval(Duration::from_secs(config.tick_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let now = clock::local_now(config.tz_offset_minutes);
        let mut rng = StdRng::from_entropy();
        match engine::run_tick(store.as_ref(), game.as_ref(), &mut rng, now, &params).await {
            Ok(TickReport::TooEarly { .. }) => {}
            Ok(TickReport::Acted { round_id, draw, settle, catch_up, .. }) => {
                if settle.settled > 0 || !catch_up.is_empty() {
                    info!(
                        game = game.id(),
                        round = %round_id,
                        ?draw,
                        settled = settle.settled,
                        caught_up = catch_up.len(),
                        "tick complete"
                    );
                }
            }
            Err(e) => {
                // Transient by assumption; the next tick retries safely.
                warn!(game = game.id(), error = %e, "tick failed");
            }
        }
    }
}
