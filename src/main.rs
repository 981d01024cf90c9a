use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use question_engine::{
    config::{get_config, init_config, LogFormat},
    middleware::{cors::permissive_cors, rate_limit},
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();
    init_tracing(config.log_format);

    let app_state = AppState::new(config);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let question_api = Router::new()
        .route("/api/questions/detect", post(routes::questions::detect))
        .route("/api/questions/normalize", post(routes::questions::normalize))
        .route(
            "/api/questions/normalize/batch",
            post(routes::questions::normalize_batch),
        )
        .route(
            "/api/questions/validate",
            post(routes::questions::validate_question),
        )
        .route("/api/questions/grade", post(routes::questions::grade_question))
        .route(
            "/api/assessments/grade",
            post(routes::assessments::grade_assessment),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.public_rps),
            rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(question_api)
        .with_state(app_state)
        .layer(permissive_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    let addr: SocketAddr = config.server_address.parse()?;
    info!(
        max_batch = config.max_batch_questions,
        explicit_type_first = config.explicit_type_first,
        "Server listening on {}",
        addr
    );
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
