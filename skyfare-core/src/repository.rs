use async_trait::async_trait;
use skyfare_shared::TicketStatus;
use uuid::Uuid;

use crate::member::LoyaltyMember;
use crate::ticket::{Pnr, Ticket};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Paged slice of a user's tickets plus the total row count.
#[derive(Debug, Clone)]
pub struct TicketPage {
    pub tickets: Vec<Ticket>,
    pub total: u64,
}

/// Durable ticket store. Rows are inserted once and only ever mutated by
/// status transitions.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn create(&self, ticket: &Ticket) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, RepositoryError>;

    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Option<Ticket>, RepositoryError>;

    /// Newest first. `page` is 1-based.
    async fn find_by_user(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<TicketPage, RepositoryError>;

    /// Compare-and-swap status transition. Returns false when the row was
    /// not in `from` (someone else already transitioned it).
    async fn transition_status(
        &self,
        id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<bool, RepositoryError>;
}

/// Durable loyalty-member store, keyed by user id. Callers serialize
/// mutations per member; the store only persists snapshots.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<LoyaltyMember>, RepositoryError>;

    async fn find_by_user_and_number(
        &self,
        user_id: Uuid,
        membership_number: &str,
    ) -> Result<Option<LoyaltyMember>, RepositoryError>;

    /// Insert-or-update the member row. When `applied_key` is set, the key
    /// is recorded alongside the write so a redelivered credit can be
    /// detected by `key_applied`.
    async fn save(
        &self,
        member: &LoyaltyMember,
        applied_key: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Whether an idempotency key was already applied for this user.
    async fn key_applied(&self, user_id: Uuid, key: &str) -> Result<bool, RepositoryError>;
}
