use uuid::Uuid;

/// Topic for deferred mile accrual after a CARD purchase.
pub const TOPIC_MILES_CREDIT: &str = "miles-credit";

/// Topic consumed by the external notification service.
pub const TOPIC_PURCHASE_NOTIFICATION: &str = "purchase-notification";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct MilesCreditJob {
    pub user_id: Uuid,
    pub membership_number: String,
    pub ticket_id: Uuid,
    pub miles: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PurchaseNotificationJob {
    pub user_id: Uuid,
    pub ticket_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub flight_number: String,
    pub passenger_count: u32,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Purchase,
}
