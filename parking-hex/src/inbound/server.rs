//! HTTP Server configuration and startup.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use parking_types::{ParkingRepository, PaymentGateway};

use super::auth::auth_middleware;
use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::ParkingService;
use crate::openapi::ApiDoc;

/// HTTP Server for the Parking API.
pub struct HttpServer<R: ParkingRepository, P: PaymentGateway> {
    state: Arc<AppState<R, P>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: ParkingRepository, P: PaymentGateway> HttpServer<R, P> {
    /// Creates a new HTTP server with the default rate limit.
    pub fn new(service: ParkingService<R, P>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::default()),
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(service: ParkingService<R, P>, requests_per_minute: u32) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Uses the globally set MeterProvider
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        let api = Router::new()
            .route("/health", get(handlers::health))
            .route("/api/{version}/register", post(handlers::register::<R, P>))
            .route(
                "/api/{version}/authenticate",
                post(handlers::authenticate::<R, P>),
            )
            .route(
                "/api/{version}/account",
                get(handlers::get_account::<R, P>).post(handlers::update_account::<R, P>),
            )
            .route(
                "/api/{version}/account/change_password",
                post(handlers::change_password::<R, P>),
            )
            .route(
                "/api/{version}/logMessage",
                post(handlers::log_message::<R, P>),
            )
            .route("/api/{version}/plans", get(handlers::list_plans::<R, P>))
            .route(
                "/api/{version}/plans/{id}/subscribe",
                post(handlers::subscribe_plan::<R, P>),
            )
            .route(
                "/api/{version}/activities",
                get(handlers::list_activities::<R, P>).post(handlers::start_parking::<R, P>),
            )
            .route(
                "/api/{version}/activities/search",
                get(handlers::search_activities::<R, P>),
            )
            .route(
                "/api/{version}/activities/{id}/exit",
                post(handlers::exit_parking::<R, P>),
            )
            .route(
                "/api/{version}/activities/{id}/status",
                post(handlers::update_activity::<R, P>),
            )
            .route(
                "/api/{version}/sales",
                get(handlers::list_sales::<R, P>).post(handlers::create_sale::<R, P>),
            )
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware::<R, P>,
            ))
            .with_state(self.state.clone());

        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .merge(api)
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
