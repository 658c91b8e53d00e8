use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skyfare_shared::Tier;
use uuid::Uuid;

/// One loyalty membership per user, created lazily on the first earn/spend
/// event. `available_miles <= total_miles` holds at all times; `total_miles`
/// only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyMember {
    pub user_id: Uuid,
    pub membership_number: String,
    pub total_miles: i64,
    pub available_miles: i64,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyMember {
    pub fn new(user_id: Uuid, membership_number: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            membership_number,
            total_miles: 0,
            available_miles: 0,
            tier: Tier::Classic,
            created_at: now,
            updated_at: now,
        }
    }

    /// Increases both counters and recomputes the tier.
    pub fn credit(&mut self, miles: i64) {
        self.total_miles += miles;
        self.available_miles += miles;
        self.tier = Tier::from_total_miles(self.total_miles);
        self.updated_at = Utc::now();
    }

    /// Decreases the spendable balance only. Caller checks sufficiency;
    /// `total_miles` and tier are untouched by spending.
    pub fn debit(&mut self, miles: i64) {
        self.available_miles -= miles;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_moves_both_counters_and_tier() {
        let mut member = LoyaltyMember::new(Uuid::new_v4(), "MS00000001".to_string());
        member.credit(26_000);
        assert_eq!(member.total_miles, 26_000);
        assert_eq!(member.available_miles, 26_000);
        assert_eq!(member.tier, Tier::Elite);

        member.credit(14_000);
        assert_eq!(member.tier, Tier::ElitePlus);
        assert!(member.available_miles <= member.total_miles);
    }

    #[test]
    fn test_debit_leaves_total_and_tier() {
        let mut member = LoyaltyMember::new(Uuid::new_v4(), "MS00000001".to_string());
        member.credit(30_000);
        member.debit(29_000);
        assert_eq!(member.available_miles, 1_000);
        assert_eq!(member.total_miles, 30_000);
        assert_eq!(member.tier, Tier::Elite);
    }
}
