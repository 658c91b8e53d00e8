use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use skyfare_api::{app, state::{AppState, AuthConfig}};
use skyfare_booking::{
    BookingOrchestrator, MilesCreditHandler, MilesReversalPolicy, NotificationLogSink,
    OrchestratorConfig, StubPaymentAdapter,
};
use skyfare_loyalty::LoyaltyLedger;
use skyfare_queue::{DispatcherConfig, JobDispatcher};
use skyfare_shared::events::{TOPIC_MILES_CREDIT, TOPIC_PURCHASE_NOTIFICATION};
use skyfare_store::{HttpFlightInventory, PgMemberRepository, PgTicketRepository};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyfare_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = skyfare_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Skyfare API on port {}", config.server.port);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");

    let tickets = Arc::new(PgTicketRepository::new(pool.clone()));
    let members = Arc::new(PgMemberRepository::new(pool));
    let ledger = Arc::new(LoyaltyLedger::new(members));

    let inventory = Arc::new(
        HttpFlightInventory::new(
            &config.inventory.base_url,
            Duration::from_millis(config.inventory.request_timeout_ms),
        )
        .expect("Failed to build inventory client"),
    );

    let payment = Arc::new(StubPaymentAdapter::new(
        config.payment.success_rate,
        Duration::from_millis(config.payment.latency_ms),
    ));

    let dispatcher = JobDispatcher::new(DispatcherConfig {
        workers: config.queue.workers,
        capacity: config.queue.capacity,
        max_attempts: config.queue.max_attempts,
        base_backoff: Duration::from_millis(config.queue.base_backoff_ms),
    });
    dispatcher.register_handler(
        TOPIC_MILES_CREDIT,
        Arc::new(MilesCreditHandler::new(ledger.clone())),
    );
    dispatcher.register_handler(TOPIC_PURCHASE_NOTIFICATION, Arc::new(NotificationLogSink));
    dispatcher.start();

    let orchestrator = Arc::new(BookingOrchestrator::new(
        inventory,
        payment,
        ledger.clone(),
        tickets.clone(),
        dispatcher.clone(),
        OrchestratorConfig {
            call_timeout: Duration::from_millis(config.inventory.request_timeout_ms),
            mile_value: config.business_rules.mile_value,
            pnr_max_attempts: config.business_rules.pnr_max_attempts,
            reversal_policy: MilesReversalPolicy::None,
        },
    ));

    let app_state = AppState {
        orchestrator,
        ledger,
        tickets,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .unwrap();

    // Let in-flight miles credits and notifications finish before exit.
    dispatcher.shutdown().await;
}
