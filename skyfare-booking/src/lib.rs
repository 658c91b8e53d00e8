pub mod handlers;
pub mod orchestrator;
pub mod payment;
pub mod pnr;

pub use handlers::{MilesCreditHandler, NotificationLogSink};
pub use orchestrator::{BookingOrchestrator, MilesReversalPolicy, OrchestratorConfig, PurchaseRequest};
pub use payment::StubPaymentAdapter;
