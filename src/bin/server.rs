use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use cutting_stock::exact::is_milp_available;
use cutting_stock::{Algorithm, ErrorKind, OptimizeError, OptimizeResponse, optimize_json};
use serde::Serialize;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
struct AlgorithmInfo {
    name: &'static str,
    exact: bool,
    description: &'static str,
    /// Solver behind an exact algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<&'static str>,
}

fn status_for(response: &OptimizeResponse) -> StatusCode {
    match response.error_kind() {
        None => StatusCode::OK,
        Some(ErrorKind::InvalidInput | ErrorKind::UnknownAlgorithm) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::InfeasibleProblem) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(ErrorKind::SolverError) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn algorithms() -> Json<Vec<AlgorithmInfo>> {
    Json(
        Algorithm::ALL
            .into_iter()
            .map(|a| AlgorithmInfo {
                name: a.name(),
                exact: a.is_exact(),
                description: a.description(),
                backend: a.is_exact().then(|| {
                    if is_milp_available() { "highs" } else { "branch-and-bound" }
                }),
            })
            .collect(),
    )
}

async fn optimize(body: String) -> (StatusCode, Json<OptimizeResponse>) {
    tracing::info!(body = %body, "POST /optimize");

    // Solving is CPU-bound and may run for the whole time limit.
    let response = match tokio::task::spawn_blocking(move || optimize_json(&body)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "optimization worker failed");
            let err = OptimizeError::SolverError(format!("optimization worker failed: {e}"));
            OptimizeResponse::failed(String::new(), &err)
        }
    };

    (status_for(&response), Json(response))
}

fn app() -> Router {
    Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/algorithms", get(algorithms))
        .route("/optimize", post(optimize))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[tokio::main]
async fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    eprintln!("Listening on {addr}");
    axum::serve(listener, app()).await.expect("server error");
}
