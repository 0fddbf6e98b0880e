pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{
    init_metrics, BankVerifyClient, CampaignCache, PlatformRepository, ReconciliationService,
    StripeClient,
};

#[derive(Clone)]
pub struct AppState {
    pub db: mongodb::Database,
    pub config: Config,
    pub repository: PlatformRepository,
    pub cache: CampaignCache,
    pub reconciliation: ReconciliationService,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    db: mongodb::Database,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        init_metrics();

        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some("donation-service".to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database.db_name);

        let repository = PlatformRepository::new(&db);
        repository.init_indexes().await?;

        let cache = CampaignCache::connect(&config.cache).await;

        let stripe = StripeClient::new(config.stripe.clone());
        if stripe.is_configured() {
            tracing::info!("Card payment client initialized");
        } else {
            tracing::warn!("Card provider credentials not configured - card checkout disabled");
        }

        let bank_verify = BankVerifyClient::new(config.bank_verify.clone());
        if bank_verify.is_configured() {
            tracing::info!("Bank-transfer verification client initialized");
        } else {
            tracing::warn!(
                "Bank verification endpoint not configured - transfer donations disabled"
            );
        }

        let reconciliation = ReconciliationService::new(
            repository.clone(),
            stripe,
            bank_verify,
            cache.clone(),
            config.currency.clone(),
        );

        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            repository,
            cache,
            reconciliation,
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            // Donation reconciliation endpoints
            .route("/donations/checkout", post(handlers::donations::checkout))
            .route("/donations/webhook", post(handlers::donations::webhook))
            .route("/donations/submit", post(handlers::donations::submit))
            .route("/donations/:id", get(handlers::donations::get_donation))
            // Campaign endpoints
            .route(
                "/campaigns",
                post(handlers::campaigns::create_campaign).get(handlers::campaigns::list_campaigns),
            )
            .route(
                "/campaigns/featured",
                get(handlers::campaigns::featured_campaigns),
            )
            .route(
                "/campaigns/:id",
                get(handlers::campaigns::get_campaign)
                    .delete(handlers::campaigns::delete_campaign),
            )
            .route(
                "/campaigns/:id/submit",
                post(handlers::campaigns::submit_campaign),
            )
            .route(
                "/campaigns/:id/review",
                post(handlers::campaigns::review_campaign),
            )
            .route(
                "/campaigns/:id/pause",
                post(handlers::campaigns::pause_campaign),
            )
            .route(
                "/campaigns/:id/resume",
                post(handlers::campaigns::resume_campaign),
            )
            .route(
                "/campaigns/:id/action-requests",
                post(handlers::campaigns::create_action_request),
            )
            .route(
                "/action-requests/:id/review",
                post(handlers::campaigns::review_action_request),
            )
            .route("/stats", get(handlers::campaigns::global_stats))
            .route_layer(from_fn(metrics_middleware))
            // Receipt screenshots can be a few megabytes.
            .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state);

        // Port 0 binds a random free port, which tests rely on.
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        tracing::info!("Donation service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
            db,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &mongodb::Database {
        &self.db
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
