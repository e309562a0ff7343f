use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::Method,
    http::Request,
    http::header::{CONTENT_TYPE, HeaderName, HeaderValue},
    middleware,
    middleware::Next,
    response::Response,
    routing::{get, post},
};
use clap::Parser;
use dotenvy::dotenv;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use cm_common::Provider;
use cm_common::catalog::{CatalogSources, ProviderCatalog};
use cm_common::gateway::{Gateway, GatewayConfig};
use cm_common::geo::CityTable;
use cm_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use cm_common::matching::MAX_TOP_K;
use cm_common::registry::EngineRegistry;

pub mod error;
pub mod handlers;

use error::ApiError;
use handlers::{engines, health, matches};

const SHUTDOWN_DRAIN_GRACE: Duration = Duration::from_millis(200);
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(name = "cm-api", about = "Care-provider matching gateway")]
struct Cli {
    /// CSV export of provider rows
    #[arg(long, env = "CM_DATA_PATH")]
    data_path: Option<PathBuf>,

    /// JSON table of city name -> {lat, lng}, merged over the built-in table
    #[arg(long, env = "CM_CITIES_PATH")]
    cities_path: Option<PathBuf>,

    /// Snapshot of normalized providers, written after ingestion and read back
    /// when the CSV cannot be ingested
    #[arg(long, env = "CM_SNAPSHOT_PATH")]
    snapshot_path: Option<PathBuf>,

    /// Server port
    #[arg(long, env = "PORT", default_value_t = 3002)]
    port: u16,

    /// Comma separated list of allowed CORS origins
    #[arg(long, env = "CM_CORS_ORIGINS", default_value = "http://localhost:3000")]
    cors_origins: String,

    /// Comma separated allow-list of engine names (default: all built-in)
    #[arg(long, env = "CM_ENGINES")]
    engines: Option<String>,

    /// Engine used when a request names none (default: first registered)
    #[arg(long, env = "CM_DEFAULT_ENGINE")]
    default_engine: Option<String>,

    #[arg(long, env = "CM_ENGINE_TIMEOUT_MS", default_value_t = 30_000)]
    engine_timeout_ms: u64,

    /// Per-engine timeout for /health
    #[arg(long, env = "CM_HEALTH_TIMEOUT_MS", default_value_t = 1_000)]
    health_timeout_ms: u64,

    /// Per-engine timeout for /engines
    #[arg(long, env = "CM_ENGINES_TIMEOUT_MS", default_value_t = 3_000)]
    engines_timeout_ms: u64,

    #[arg(long, env = "CM_MAX_TOP_K", default_value_t = MAX_TOP_K)]
    max_top_k: usize,

    /// Prometheus exporter port; exporter is off when unset
    #[arg(long, env = "CM_METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub sources: CatalogSources,
    pub cities_path: Option<PathBuf>,
    pub engines: Option<Vec<String>>,
    pub gateway: GatewayConfig,
    pub engines_timeout: Duration,
    pub metrics_port: Option<u16>,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn positive_millis(name: &str, value: u64) -> Result<Duration, ApiError> {
    if value == 0 {
        return Err(ApiError::Config(format!("{name} must be positive")));
    }
    Ok(Duration::from_millis(value))
}

impl AppConfig {
    fn from_cli(cli: Cli) -> Result<Self, ApiError> {
        let cors_origins = split_list(&cli.cors_origins);
        if cors_origins.iter().any(|origin| origin == "*") {
            return Err(ApiError::Config(
                "CM_CORS_ORIGINS must list explicit origins when credentials are enabled".into(),
            ));
        }

        if cli.max_top_k == 0 || cli.max_top_k > MAX_TOP_K {
            return Err(ApiError::Config(format!(
                "CM_MAX_TOP_K must be between 1 and {MAX_TOP_K}"
            )));
        }

        let gateway = GatewayConfig {
            default_engine: cli
                .default_engine
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            engine_timeout: positive_millis("CM_ENGINE_TIMEOUT_MS", cli.engine_timeout_ms)?,
            health_timeout: positive_millis("CM_HEALTH_TIMEOUT_MS", cli.health_timeout_ms)?,
            max_top_k: cli.max_top_k,
        };

        Ok(Self {
            port: cli.port,
            cors_origins,
            sources: CatalogSources {
                data_path: cli.data_path,
                snapshot_path: cli.snapshot_path,
            },
            cities_path: cli.cities_path,
            engines: cli.engines.as_deref().map(split_list),
            gateway,
            engines_timeout: positive_millis("CM_ENGINES_TIMEOUT_MS", cli.engines_timeout_ms)?,
            metrics_port: cli.metrics_port,
        })
    }

    pub fn for_tests() -> Self {
        Self {
            port: 3002,
            cors_origins: vec!["http://localhost:3000".into()],
            sources: CatalogSources::default(),
            cities_path: None,
            engines: None,
            gateway: GatewayConfig::default(),
            engines_timeout: Duration::from_secs(3),
            metrics_port: None,
        }
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub gateway: Gateway,
    pub readiness: Arc<AtomicBool>,
}

pub type SharedState = Arc<AppState>;

fn load_cities(path: Option<&PathBuf>) -> CityTable {
    let builtin = CityTable::builtin();
    let Some(path) = path else {
        return builtin;
    };
    match CityTable::load_json(path) {
        Ok(extra) => {
            info!(path = %path.display(), cities = extra.len(), "city_table_loaded");
            builtin.merge(extra)
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "city_table_load_failed");
            builtin
        }
    }
}

fn build_registry(allowed: Option<&[String]>) -> EngineRegistry {
    let registry = EngineRegistry::builtin();
    match allowed {
        Some(allowed) => registry.retain(allowed),
        None => registry,
    }
}

/// Assemble the immutable request context: city table, provider catalog,
/// engine registry and gateway.
pub fn build_state(config: AppConfig) -> Result<SharedState, ApiError> {
    let cities = load_cities(config.cities_path.as_ref());
    let catalog = ProviderCatalog::load(&config.sources, &cities);
    let registry = build_registry(config.engines.as_deref());
    if registry.is_empty() {
        error!("no engines registered; /match will be unavailable");
    }

    let gateway = Gateway::new(
        Arc::new(registry),
        Arc::new(catalog),
        config.gateway.clone(),
    )
    .map_err(|err| ApiError::Config(err.to_string()))?;

    info!(
        engines = ?gateway.registry().names(),
        providers = gateway.catalog().len(),
        origin = ?gateway.catalog().origin(),
        "gateway_ready"
    );

    Ok(Arc::new(AppState {
        config,
        gateway,
        readiness: Arc::new(AtomicBool::new(true)),
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-request-id")])
        .allow_credentials(true)
}

async fn attach_request_id_context(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    Ok(error::with_request_id(request_id, next.run(req)).await)
}

pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let request_id_header = HeaderName::from_static("x-request-id");
    let trace_header = request_id_header.clone();

    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(&trace_header)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
            status = tracing::field::Empty,
        )
    });

    Router::new()
        .route("/match", post(matches::run_match))
        .route("/engines", get(engines::list_engines))
        .route("/health", get(health::health))
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .layer(middleware::from_fn(attach_request_id_context))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(
            request_id_header,
            MakeRequestUuid::default(),
        ))
        .layer(cors)
        .with_state(state)
}

/// State over an in-memory catalog with every built-in engine.
pub fn test_state(providers: Vec<Provider>) -> SharedState {
    let config = AppConfig::for_tests();
    let gateway = Gateway::new(
        Arc::new(EngineRegistry::builtin()),
        Arc::new(ProviderCatalog::new(providers)),
        config.gateway.clone(),
    )
    .expect("built-in engines include the default");

    Arc::new(AppState {
        config,
        gateway,
        readiness: Arc::new(AtomicBool::new(true)),
    })
}

pub async fn run() -> Result<(), ApiError> {
    dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli)?;

    if let Some(port) = config.metrics_port {
        cm_metrics::init_metrics(port);
    }

    let port = config.port;
    let state = tokio::task::spawn_blocking(move || build_state(config))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let app = create_router(state.clone());

    info!(%addr, "cm-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(())
}

async fn shutdown_signal(state: SharedState) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    state
        .readiness
        .store(false, std::sync::atomic::Ordering::SeqCst);

    // Let load balancers observe /readyz as not ready before new
    // connections are refused.
    tokio::time::sleep(SHUTDOWN_DRAIN_GRACE).await;
}
