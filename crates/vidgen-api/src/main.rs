//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidgen_api::auth::JwksCache;
use vidgen_api::handlers::health::{DependencyCheck, DirectoryCheck, FirestoreCheck};
use vidgen_api::{create_router, metrics, ApiConfig, AppState};
use vidgen_firestore::FirestoreClient;
use vidgen_worker::{build_intake, Collaborators, VidgenConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Required for rustls 0.23+
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    init_tracing();
    info!("Starting vidgen-api");

    let api_config = ApiConfig::from_env();
    let config = match VidgenConfig::from_env() {
        Ok(config) => config,
        Err(e) => fail("Invalid configuration", e),
    };
    if api_config.firebase_project_id.is_empty() {
        fail("Invalid configuration", "FIREBASE_PROJECT_ID or GCP_PROJECT_ID must be set");
    }

    let temp_dir = config.render.public_dir.join("temp");
    for dir in [&temp_dir, &config.render.work_dir] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            fail(&format!("Cannot create {}", dir.display()), e);
        }
    }

    let collaborators = match Collaborators::from_config(&config).await {
        Ok(c) => c,
        Err(e) => fail("Failed to connect backends", e),
    };
    if collaborators.speech.is_none() {
        warn!("SPEECH_API_KEY not set; quiz submissions are disabled");
    }
    let intake = build_intake(&config, &collaborators);

    let jwks = match JwksCache::new(&api_config.firebase_project_id, &api_config.jwks_url) {
        Ok(jwks) => jwks,
        Err(e) => fail("Failed to create JWKS cache", e),
    };

    let mut checks: Vec<Arc<dyn DependencyCheck>> = vec![
        Arc::new(DirectoryCheck {
            name: "temp_dir",
            path: temp_dir.clone(),
        }),
        Arc::new(DirectoryCheck {
            name: "render_project",
            path: config.render.remotion.project_dir.clone(),
        }),
    ];
    match FirestoreClient::new(config.firestore.clone()).await {
        Ok(client) => checks.push(Arc::new(FirestoreCheck(client))),
        Err(e) => fail("Failed to create Firestore client", e),
    }

    let metrics_handle = if api_config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Metrics disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let addr: SocketAddr = match format!("{}:{}", api_config.host, api_config.port).parse() {
        Ok(addr) => addr,
        Err(e) => fail("Invalid bind address", e),
    };
    let state = AppState::new(api_config, intake, jwks, temp_dir, checks);
    let app = create_router(state, metrics_handle);

    info!("Listening on {}", addr);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => fail("Failed to bind", e),
    };
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", e);
    }

    info!("Server shutdown complete");
}

/// JSON logs with `LOG_FORMAT=json`, coloured text otherwise.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vidgen=info,tower_http=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    error!("{}: {}", context, err);
    std::process::exit(1);
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal; in-flight renders are abandoned");
}
