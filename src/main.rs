use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use axum::{Router, middleware, routing::get};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use http::{
    HeaderName, HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tokio::net::TcpListener;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use dialcast::{
    ServerConfig,
    handlers::health::health_check,
    middleware::{auth_middleware, connection_limit_middleware},
    routes,
    state::AppState,
};

/// Outbound AI calling server.
#[derive(Parser, Debug)]
#[command(name = "dialcast", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must land before config resolution reads the environment.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    // Engine WebSockets, synthesis HTTPS, and optional server TLS all need
    // a process-wide crypto provider installed up front.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install default crypto provider"))?;

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "loading configuration file");
            ServerConfig::from_file(path).map_err(|e| anyhow!(e.to_string()))?
        }
        None => ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?,
    };

    let address: SocketAddr = config
        .address()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.address()))?;
    let tls = config.tls.clone();
    let rate_rps = config.rate_limit_requests_per_second;
    let rate_burst = config.rate_limit_burst_size;
    let cors = cors_layer(config.cors_allowed_origins.as_deref());

    let state = AppState::new(config).await;
    let app = build_app(state, cors, rate_rps, rate_burst);

    match tls {
        Some(tls) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .with_context(|| {
                    format!(
                        "failed to load TLS material from {} / {}",
                        tls.cert_path.display(),
                        tls.key_path.display()
                    )
                })?;
            info!(%address, "listening (TLS)");
            axum_server::bind_rustls(address, rustls_config)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .context("TLS server error")?;
        }
        None => {
            info!(%address, "listening");
            let listener = TcpListener::bind(&address).await?;
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;
        }
    }

    Ok(())
}

/// Assemble the full router.
///
/// Four route groups with distinct protection models, merged then layered:
/// - `/` health: public
/// - `/v1/calls/status`: webhook, protected by body signatures instead of
///   bearer auth
/// - `/v1/*` REST API: bearer auth
/// - `/v1/streams`: connection limits, then auth, then the WS handler
fn build_app(
    state: Arc<AppState>,
    cors: CorsLayer,
    rate_rps: u32,
    rate_burst: u32,
) -> Router {
    let api = routes::api::create_api_router().layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    let streams = routes::ws::create_stream_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            connection_limit_middleware,
        ));

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    // Per-IP rate limiting, disabled at absurd rates so load tests can opt
    // out.
    let governor = if rate_rps < 100_000 {
        let config = GovernorConfigBuilder::default()
            .per_second(rate_rps as u64)
            .burst_size(rate_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("rate limiter config is valid");
        Some(GovernorLayer::new(config))
    } else {
        info!("rate limiting disabled (rate >= 100000/s)");
        None
    };

    Router::new()
        .route("/", get(health_check))
        .merge(routes::webhooks::create_webhook_router())
        .merge(api)
        .merge(streams)
        .with_state(state)
        .layer(cors)
        .layer(tower::util::option_layer(governor))
        .layer(security_headers)
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let allowed_headers = [
        AUTHORIZATION,
        CONTENT_TYPE,
        HeaderName::from_static("x-dialcast-signature"),
    ];
    let allowed_methods = [Method::GET, Method::POST, Method::OPTIONS];

    match origins {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(allowed_methods)
            .allow_headers(allowed_headers)
            .allow_credentials(false),
        Some(list) => {
            let origins: Vec<_> = list.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(allowed_methods)
                .allow_headers(allowed_headers)
                .allow_credentials(true)
        }
        None => {
            // Machine-to-machine API; browsers only get in when origins are
            // configured explicitly.
            info!("CORS not configured, same-origin only");
            CorsLayer::new()
                .allow_methods(allowed_methods)
                .allow_headers(allowed_headers)
                .allow_credentials(false)
        }
    }
}
