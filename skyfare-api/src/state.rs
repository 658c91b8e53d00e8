use skyfare_booking::BookingOrchestrator;
use skyfare_core::repository::TicketRepository;
use skyfare_loyalty::LoyaltyLedger;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BookingOrchestrator>,
    pub ledger: Arc<LoyaltyLedger>,
    pub tickets: Arc<dyn TicketRepository>,
    pub auth: AuthConfig,
}
