use anyhow::{bail, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use clap::Args;
use exporter_config::parse_config_from_file;
use exporter_core::{run_startup, ScriptSpec};
use exporter_metrics::{Aggregator, CONTENT_TYPE};
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on for HTTP requests
    #[arg(short, long, default_value = "0.0.0.0:9654", env = "COMMAND_EXPORTER_LISTEN")]
    pub listen: SocketAddr,

    /// Path under which to expose command metrics
    #[arg(short = 'p', long, default_value = "/command")]
    pub metrics_path: String,

    /// Config file listing the commands to run
    #[arg(short, long, default_value = "./config.yml")]
    pub config_file: PathBuf,

    /// Merge the exporter's own process metrics into every gather
    #[arg(long)]
    pub with_process_metrics: bool,
}

/// Counters about the exporter itself, served on `/metrics`.
#[derive(Clone)]
struct ExporterStats {
    gathers: IntCounter,
    gather_errors: IntCounter,
}

impl ExporterStats {
    fn register(registry: &Registry) -> Result<Self> {
        let gathers = IntCounter::new(
            "command_exporter_gathers_total",
            "Number of gather cycles run",
        )?;
        let gather_errors = IntCounter::new(
            "command_exporter_gather_errors_total",
            "Number of errors recovered during gather cycles",
        )?;
        registry.register(Box::new(gathers.clone()))?;
        registry.register(Box::new(gather_errors.clone()))?;

        Ok(Self {
            gathers,
            gather_errors,
        })
    }
}

#[derive(Clone)]
struct AppState {
    scripts: Arc<[ScriptSpec]>,
    aggregator: Aggregator,
    registry: Registry,
    stats: ExporterStats,
    metrics_path: Arc<str>,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    check_metrics_path(&args.metrics_path)?;

    let config = parse_config_from_file(&args.config_file).await?;
    info!(
        "Loaded {} script(s) from {}",
        config.scripts.len(),
        args.config_file.display()
    );

    if let Some(startup) = &config.startup {
        info!("Running startup script: {}", startup.command().description());
        run_startup(startup).await?;
    }

    let registry = Registry::new();
    #[cfg(target_os = "linux")]
    registry.register(Box::new(
        prometheus::process_collector::ProcessCollector::for_self(),
    ))?;
    let stats = ExporterStats::register(&registry)?;

    let mut aggregator = Aggregator::with_defaults();
    if args.with_process_metrics {
        aggregator = aggregator.with_source(Arc::new(registry.clone()));
    }

    let state = AppState {
        scripts: config.scripts.into(),
        aggregator,
        registry,
        stats,
        metrics_path: args.metrics_path.as_str().into(),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!("Listening on {}", listener.local_addr()?);
    info!("Command metrics at {}", args.metrics_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn check_metrics_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        bail!("metrics path '{}' must start with '/'", path);
    }
    if path == "/" || path == "/metrics" {
        bail!("metrics path '{}' is reserved", path);
    }
    Ok(())
}

fn router(state: AppState) -> Router {
    let metrics_path = state.metrics_path.to_string();

    Router::new()
        .route("/", get(index))
        .route("/metrics", get(own_metrics))
        .route(&metrics_path, get(command_metrics))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Command Exporter</title></head>\n\
         <body>\n\
         <h1>Command Exporter</h1>\n\
         <p>Version {version}</p>\n\
         <p><a href=\"{path}\">Command metrics</a></p>\n\
         <p><a href=\"/metrics\">Exporter metrics</a></p>\n\
         </body>\n\
         </html>\n",
        version = env!("CARGO_PKG_VERSION"),
        path = state.metrics_path,
    ))
}

async fn command_metrics(State(state): State<AppState>) -> Response {
    let (snapshot, errors) = state.aggregator.gather_all(&state.scripts).await;

    state.stats.gathers.inc();
    state.stats.gather_errors.inc_by(errors.len() as u64);

    ([(header::CONTENT_TYPE, CONTENT_TYPE)], snapshot.encode()).into_response()
}

async fn own_metrics(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&state.registry.gather(), &mut buffer) {
        Ok(()) => (
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode exporter metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use exporter_core::Command;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn state(scripts: Vec<ScriptSpec>) -> AppState {
        let registry = Registry::new();
        let stats = ExporterStats::register(&registry).unwrap();

        AppState {
            scripts: scripts.into(),
            aggregator: Aggregator::with_defaults(),
            registry,
            stats,
            metrics_path: "/command".into(),
        }
    }

    async fn fetch(app: Router, path: &str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, addr
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_metrics_path_must_not_shadow_builtin_routes() {
        assert!(check_metrics_path("/command").is_ok());
        assert!(check_metrics_path("command").is_err());
        assert!(check_metrics_path("/").is_err());
        assert!(check_metrics_path("/metrics").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_gather_route_serves_exposition_text() {
        let script = ScriptSpec::builder()
            .name("ok")
            .command(Command::argv(["/bin/echo", "foo 1"]))
            .build()
            .unwrap();
        let state = state(vec![script]);
        let stats = state.stats.clone();

        let response = fetch(router(state), "/command").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(CONTENT_TYPE));
        assert!(response.contains("foo{command=\"ok\"} 1\n"));
        assert!(response.contains("command_success{command=\"ok\"} 1\n"));
        assert_eq!(stats.gathers.get(), 1);
        assert_eq!(stats.gather_errors.get(), 0);
    }

    #[tokio::test]
    async fn test_exporter_metrics_and_index() {
        let app = router(state(Vec::new()));

        let metrics = fetch(app.clone(), "/metrics").await;
        assert!(metrics.contains("command_exporter_gathers_total 0"));

        let index = fetch(app, "/").await;
        assert!(index.contains("<a href=\"/command\">"));
    }
}
