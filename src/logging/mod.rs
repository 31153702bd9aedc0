use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use slog::{o, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainDecorator, TermDecorator};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::ACTOR_ID_HEADER;

/// Access log settings.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub async_buffer_size: usize,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: 1024,
            use_color: true,
        }
    }
}

/// Builds the asynchronous terminal logger used for the HTTP access log.
pub fn setup_logger(config: LoggerConfig) -> Logger {
    let root = o!("service" => "repairdesk-api", "version" => env!("CARGO_PKG_VERSION"));

    if config.use_color {
        let decorator = TermDecorator::new().force_color().build();
        let drain = FullFormat::new(decorator).build().fuse();
        let drain = Async::new(drain)
            .chan_size(config.async_buffer_size)
            .build()
            .fuse();
        Logger::root(drain, root)
    } else {
        let decorator = PlainDecorator::new(std::io::stdout());
        let drain = FullFormat::new(decorator).build().fuse();
        let drain = Async::new(drain)
            .chan_size(config.async_buffer_size)
            .build()
            .fuse();
        Logger::root(drain, root)
    }
}

#[derive(Clone)]
pub struct LoggingState {
    logger: Logger,
}

impl LoggingState {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

/// Writes one access log line per request, tagged with the calling actor.
pub async fn logging_middleware(
    State(state): State<Arc<LoggingState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let actor = req
        .headers()
        .get(ACTOR_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(req).await;
    let status = response.status().as_u16();
    let duration_ms = start_time.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        slog::error!(
            &state.logger,
            "HTTP request failed";
            "method" => method,
            "path" => path,
            "actor" => actor,
            "status" => status,
            "duration_ms" => duration_ms,
        );
    } else {
        slog::info!(
            &state.logger,
            "HTTP request handled";
            "method" => method,
            "path" => path,
            "actor" => actor,
            "status" => status,
            "duration_ms" => duration_ms,
        );
    }

    response
}
