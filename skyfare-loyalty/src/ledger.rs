use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::Rng;
use skyfare_core::error::LedgerError;
use skyfare_core::member::LoyaltyMember;
use skyfare_core::repository::MemberRepository;
use tracing::info;
use uuid::Uuid;

/// The loyalty-mile ledger. Owns mile balances and tiers, one row per user,
/// created lazily on the first earn or spend event.
///
/// Debit and credit are serialized per member through a keyed lock map so
/// that `available_miles <= total_miles` holds under concurrent purchases:
/// two debits whose combined amount exceeds the balance can never both
/// succeed.
pub struct LoyaltyLedger {
    members: Arc<dyn MemberRepository>,
    // Guards the map only; the per-member async mutex is what is held
    // across repository I/O.
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl LoyaltyLedger {
    pub fn new(members: Arc<dyn MemberRepository>) -> Self {
        Self {
            members,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn member_lock(&self, user_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        // Drop entries nobody holds so the map does not grow one slot per
        // user id for the process lifetime.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(user_id).or_default().clone()
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    /// Add miles to a member, creating the membership if none exists.
    /// Increases both counters and recomputes the tier.
    ///
    /// When `idempotency_key` is set and was already applied for this user,
    /// the credit is a no-op returning the current snapshot. Job handlers
    /// redelivering the same credit rely on this.
    pub async fn credit(
        &self,
        user_id: Uuid,
        miles: i64,
        reason: &str,
        idempotency_key: Option<&str>,
    ) -> Result<LoyaltyMember, LedgerError> {
        if miles <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let lock = self.member_lock(user_id);
        let _guard = lock.lock().await;

        if let Some(key) = idempotency_key {
            if self.members.key_applied(user_id, key).await? {
                info!(%user_id, key, "credit already applied, skipping");
                return self
                    .members
                    .find_by_user(user_id)
                    .await?
                    .ok_or(LedgerError::MemberNotFound);
            }
        }

        let mut member = match self.members.find_by_user(user_id).await? {
            Some(member) => member,
            None => LoyaltyMember::new(user_id, generate_membership_number()),
        };

        member.credit(miles);
        self.members.save(&member, idempotency_key).await?;

        info!(%user_id, miles, reason, tier = %member.tier, "miles credited");
        Ok(member)
    }

    /// Spend miles. Fails when the (user, membership number) pair does not
    /// match or the spendable balance is short. `total_miles` and tier are
    /// unaffected by spending.
    pub async fn debit(
        &self,
        user_id: Uuid,
        membership_number: &str,
        miles: i64,
    ) -> Result<LoyaltyMember, LedgerError> {
        if miles <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let lock = self.member_lock(user_id);
        let _guard = lock.lock().await;

        let mut member = self
            .members
            .find_by_user_and_number(user_id, membership_number)
            .await?
            .ok_or(LedgerError::MemberNotFound)?;

        if member.available_miles < miles {
            return Err(LedgerError::InsufficientMiles {
                required: miles,
                available: member.available_miles,
            });
        }

        member.debit(miles);
        self.members.save(&member, None).await?;

        info!(%user_id, miles, remaining = member.available_miles, "miles debited");
        Ok(member)
    }

    /// Spendable balance. A user with no membership has a balance of 0,
    /// not an error.
    pub async fn balance(
        &self,
        user_id: Uuid,
        membership_number: &str,
    ) -> Result<i64, LedgerError> {
        let member = self
            .members
            .find_by_user_and_number(user_id, membership_number)
            .await?;
        Ok(member.map(|m| m.available_miles).unwrap_or(0))
    }

    pub async fn member_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<LoyaltyMember>, LedgerError> {
        Ok(self.members.find_by_user(user_id).await?)
    }
}

/// Membership numbers are `MS` + 8 digits, generated once and immutable.
fn generate_membership_number() -> String {
    let digits: u32 = rand::thread_rng().gen_range(0..100_000_000);
    format!("MS{:08}", digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyfare_shared::Tier;
    use skyfare_store::memory::InMemoryMemberRepository;

    fn ledger() -> (Arc<LoyaltyLedger>, Arc<InMemoryMemberRepository>) {
        let repo = Arc::new(InMemoryMemberRepository::new());
        (Arc::new(LoyaltyLedger::new(repo.clone())), repo)
    }

    #[tokio::test]
    async fn test_credit_creates_member_lazily() {
        let (ledger, _) = ledger();
        let user_id = Uuid::new_v4();

        let member = ledger.credit(user_id, 500, "ticket purchase", None).await.unwrap();
        assert!(member.membership_number.starts_with("MS"));
        assert_eq!(member.membership_number.len(), 10);
        assert_eq!(member.total_miles, 500);
        assert_eq!(member.available_miles, 500);
        assert_eq!(member.tier, Tier::Classic);
    }

    #[tokio::test]
    async fn test_credit_rejects_zero() {
        let (ledger, _) = ledger();
        let err = ledger.credit(Uuid::new_v4(), 0, "nothing", None).await;
        assert!(matches!(err, Err(LedgerError::InvalidAmount)));
    }

    #[tokio::test]
    async fn test_debit_unknown_member() {
        let (ledger, _) = ledger();
        let err = ledger.debit(Uuid::new_v4(), "MS00000000", 10).await;
        assert!(matches!(err, Err(LedgerError::MemberNotFound)));
    }

    #[tokio::test]
    async fn test_debit_checks_balance_and_preserves_total() {
        let (ledger, _) = ledger();
        let user_id = Uuid::new_v4();
        let member = ledger.credit(user_id, 100, "seed", None).await.unwrap();
        let number = member.membership_number.clone();

        let err = ledger.debit(user_id, &number, 150).await;
        assert!(matches!(
            err,
            Err(LedgerError::InsufficientMiles { required: 150, available: 100 })
        ));

        let member = ledger.debit(user_id, &number, 40).await.unwrap();
        assert_eq!(member.available_miles, 60);
        assert_eq!(member.total_miles, 100);
        assert!(member.available_miles <= member.total_miles);
    }

    #[tokio::test]
    async fn test_balance_zero_when_absent() {
        let (ledger, _) = ledger();
        assert_eq!(ledger.balance(Uuid::new_v4(), "MS99999999").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_debits_cannot_overdraw() {
        let (ledger, _) = ledger();
        let user_id = Uuid::new_v4();
        let member = ledger.credit(user_id, 100, "seed", None).await.unwrap();
        let number = member.membership_number.clone();

        let a = {
            let ledger = ledger.clone();
            let number = number.clone();
            tokio::spawn(async move { ledger.debit(user_id, &number, 60).await })
        };
        let b = {
            let ledger = ledger.clone();
            let number = number.clone();
            tokio::spawn(async move { ledger.debit(user_id, &number, 60).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let shortfalls = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::InsufficientMiles { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(shortfalls, 1);
        assert_eq!(ledger.balance(user_id, &number).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_idle_member_locks_are_pruned() {
        let (ledger, _) = ledger();
        for _ in 0..10 {
            ledger
                .credit(Uuid::new_v4(), 10, "seed", None)
                .await
                .unwrap();
        }
        // Each acquisition drops the idle locks of finished operations, so
        // only the slot taken last survives.
        assert_eq!(ledger.lock_count(), 1);
    }

    #[tokio::test]
    async fn test_credit_idempotency_key() {
        let (ledger, _) = ledger();
        let user_id = Uuid::new_v4();
        let key = format!("{}:miles-credit", Uuid::new_v4());

        let first = ledger.credit(user_id, 100, "job", Some(&key)).await.unwrap();
        assert_eq!(first.total_miles, 100);

        // Redelivered job: same key, no double credit.
        let second = ledger.credit(user_id, 100, "job", Some(&key)).await.unwrap();
        assert_eq!(second.total_miles, 100);
        assert_eq!(second.available_miles, 100);

        // A different key applies normally.
        let third = ledger
            .credit(user_id, 50, "job", Some(&format!("{}:miles-credit", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(third.total_miles, 150);
    }
}
