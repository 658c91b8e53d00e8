pub mod app_config;
pub mod inventory_client;
pub mod member_repo;
pub mod memory;
pub mod ticket_repo;

pub use inventory_client::HttpFlightInventory;
pub use member_repo::PgMemberRepository;
pub use ticket_repo::PgTicketRepository;
