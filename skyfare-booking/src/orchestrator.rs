use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use skyfare_core::error::BookingError;
use skyfare_core::inventory::{FlightInventory, FlightSnapshot, InventoryError};
use skyfare_core::payment::PaymentAdapter;
use skyfare_core::repository::TicketRepository;
use skyfare_core::ticket::Ticket;
use skyfare_loyalty::{calculate_flight_miles, LoyaltyLedger};
use skyfare_queue::JobDispatcher;
use skyfare_shared::events::{
    MilesCreditJob, NotificationKind, PurchaseNotificationJob, TOPIC_MILES_CREDIT,
    TOPIC_PURCHASE_NOTIFICATION,
};
use skyfare_shared::{CabinClass, Passenger, PaymentMethod, TicketStatus};
use tracing::{info, warn};
use uuid::Uuid;

use crate::handlers::miles_refund_key;
use crate::pnr::allocate_pnr;

#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub passengers: Vec<Passenger>,
    pub payment_method: PaymentMethod,
    pub membership_number: Option<String>,
}

/// What happens to loyalty miles when a ticket is cancelled.
///
/// The original system performed no reversal at all: spent miles stayed
/// spent and earned miles stayed earned. That behavior is `None`.
/// `RefundOnCancel` re-credits `miles_used` on a MILES ticket (keyed so a
/// repeated cancel cannot double-refund); earned-mile clawback is not
/// offered since the miles may already be spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilesReversalPolicy {
    None,
    RefundOnCancel,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bound on every outbound call (flight lookup, payment, seat adjust).
    pub call_timeout: Duration,
    /// Currency units one mile is worth when paying with miles.
    pub mile_value: i64,
    pub pnr_max_attempts: u32,
    pub reversal_policy: MilesReversalPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            mile_value: 10,
            pnr_max_attempts: 5,
            reversal_policy: MilesReversalPolicy::None,
        }
    }
}

/// Settlement outcome threaded through one purchase attempt.
struct Settlement {
    reference: String,
    miles_used: i64,
    miles_earned: i64,
}

/// The purchase/cancel saga over three independently-owned stores: the
/// external seat inventory, the ticket store and the loyalty ledger. Steps
/// are strictly sequential; everything before the ticket row is written
/// aborts with zero side effects (the inline miles debit being the one
/// deliberate exception — it gates whether the sale proceeds), everything
/// after is best-effort and never fails the purchase.
pub struct BookingOrchestrator {
    inventory: Arc<dyn FlightInventory>,
    payment: Arc<dyn PaymentAdapter>,
    ledger: Arc<LoyaltyLedger>,
    tickets: Arc<dyn TicketRepository>,
    queue: Arc<JobDispatcher>,
    config: OrchestratorConfig,
}

impl BookingOrchestrator {
    pub fn new(
        inventory: Arc<dyn FlightInventory>,
        payment: Arc<dyn PaymentAdapter>,
        ledger: Arc<LoyaltyLedger>,
        tickets: Arc<dyn TicketRepository>,
        queue: Arc<JobDispatcher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inventory,
            payment,
            ledger,
            tickets,
            queue,
            config,
        }
    }

    /// Bound an outbound call (inventory, payment, ledger, ticket store) by
    /// the configured timeout. Before Persist a timeout aborts the attempt;
    /// after it, callers downgrade the error to a warning.
    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl std::future::Future<Output = T>,
    ) -> Result<T, BookingError> {
        tokio::time::timeout(self.config.call_timeout, fut)
            .await
            .map_err(|_| BookingError::Timeout(what))
    }

    pub async fn purchase(&self, request: PurchaseRequest) -> Result<Ticket, BookingError> {
        if request.passengers.is_empty() {
            return Err(BookingError::InvalidRequest(
                "at least one passenger is required".to_string(),
            ));
        }
        let passenger_count = request.passengers.len() as u32;

        // FlightLookup
        let flight = self
            .bounded("flight lookup", self.inventory.get_flight(request.flight_id))
            .await??
            .ok_or(BookingError::FlightNotFound)?;

        // CapacityCheck. Advisory only: the later seat decrement is a
        // separate unguarded call, so two concurrent purchases can both
        // pass this check for the last seat (see DESIGN.md).
        if flight.available_seats < passenger_count as i32 {
            return Err(BookingError::InsufficientCapacity {
                requested: passenger_count,
                available: flight.available_seats,
            });
        }

        // A non-positive fare would charge the card and then fail the
        // ticket's price invariant; reject the snapshot before settling.
        if flight.unit_price <= 0 {
            return Err(BookingError::Inventory(InventoryError::Upstream(
                "flight has no usable fare".to_string(),
            )));
        }

        let total = flight.unit_price * passenger_count as i64;

        // Settle
        let settlement = match request.payment_method {
            PaymentMethod::Miles => self.settle_with_miles(&request, total).await?,
            PaymentMethod::Card => self.settle_with_card(&request, &flight, total).await?,
        };

        // Persist
        let pnr = self
            .bounded(
                "booking reference allocation",
                allocate_pnr(self.tickets.as_ref(), self.config.pnr_max_attempts),
            )
            .await??;
        let ticket = Ticket::new(
            pnr,
            request.user_id,
            request.flight_id,
            request.passengers,
            total,
            request.payment_method,
            settlement.miles_used,
            settlement.miles_earned,
            request.membership_number.clone(),
            settlement.reference,
        )
        .map_err(|e| BookingError::Internal(e.to_string()))?;
        self.bounded("ticket persistence", self.tickets.create(&ticket))
            .await??;

        info!(
            ticket_id = %ticket.id,
            pnr = %ticket.pnr,
            flight_id = %ticket.flight_id,
            method = %ticket.payment_method,
            total,
            "ticket confirmed"
        );

        // SeatAdjust: the ticket is already durable, so a failure here is
        // logged and the purchase still succeeds.
        self.adjust_seats_best_effort(request.flight_id, -(passenger_count as i32))
            .await;

        // Enqueue(MilesCredit?)
        if ticket.miles_earned > 0 {
            if let Some(number) = &request.membership_number {
                let payload = MilesCreditJob {
                    user_id: ticket.user_id,
                    membership_number: number.clone(),
                    ticket_id: ticket.id,
                    miles: ticket.miles_earned,
                };
                self.enqueue_best_effort(TOPIC_MILES_CREDIT, &payload).await;
            }
        }

        // Enqueue(Notification)
        let payload = PurchaseNotificationJob {
            user_id: ticket.user_id,
            ticket_id: ticket.id,
            kind: NotificationKind::Purchase,
            flight_number: flight.flight_number.clone(),
            passenger_count,
        };
        self.enqueue_best_effort(TOPIC_PURCHASE_NOTIFICATION, &payload)
            .await;

        Ok(ticket)
    }

    /// MILES path: the one ledger mutation performed inline, since it gates
    /// whether the sale proceeds.
    async fn settle_with_miles(
        &self,
        request: &PurchaseRequest,
        total: i64,
    ) -> Result<Settlement, BookingError> {
        let membership_number = request
            .membership_number
            .as_deref()
            .ok_or(BookingError::MissingMemberNumber)?;

        // Fixed exchange rate: 1 mile = `mile_value` currency units,
        // rounded up so the fare is always covered.
        let required_miles = (total + self.config.mile_value - 1) / self.config.mile_value;

        let balance = self
            .bounded(
                "miles balance lookup",
                self.ledger.balance(request.user_id, membership_number),
            )
            .await?
            .map_err(BookingError::from)?;
        if balance < required_miles {
            return Err(BookingError::InsufficientMiles {
                required: required_miles,
                available: balance,
            });
        }

        self.bounded(
            "miles debit",
            self.ledger
                .debit(request.user_id, membership_number, required_miles),
        )
        .await?
        .map_err(BookingError::from)?;

        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();

        Ok(Settlement {
            reference: format!("MILES-{}-{}", Utc::now().timestamp_millis(), suffix),
            miles_used: required_miles,
            miles_earned: 0,
        })
    }

    /// CARD path: authorize with the payment provider; when a membership
    /// number was supplied, compute the accrual now but defer the credit to
    /// the async job.
    async fn settle_with_card(
        &self,
        request: &PurchaseRequest,
        flight: &FlightSnapshot,
        total: i64,
    ) -> Result<Settlement, BookingError> {
        let result = self
            .bounded("payment authorization", self.payment.authorize(total))
            .await??;

        let miles_earned = if request.membership_number.is_some() {
            let cabin = CabinClass::parse_or_economy(flight.cabin.as_deref());
            calculate_flight_miles(total, cabin, flight.distance_km)
        } else {
            0
        };

        Ok(Settlement {
            reference: result.reference,
            miles_used: 0,
            miles_earned,
        })
    }

    pub async fn cancel(&self, ticket_id: Uuid, user_id: Uuid) -> Result<Ticket, BookingError> {
        let ticket = self
            .bounded("ticket lookup", self.tickets.find_by_id(ticket_id))
            .await??
            .ok_or(BookingError::TicketNotFound)?;

        if ticket.user_id != user_id {
            return Err(BookingError::NotOwner);
        }
        if ticket.status == TicketStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled);
        }

        // CAS so a concurrent cancel for the same ticket loses cleanly.
        let transitioned = self
            .bounded(
                "ticket status update",
                self.tickets.transition_status(
                    ticket_id,
                    TicketStatus::Confirmed,
                    TicketStatus::Cancelled,
                ),
            )
            .await??;
        if !transitioned {
            return Err(BookingError::AlreadyCancelled);
        }

        info!(%ticket_id, pnr = %ticket.pnr, "ticket cancelled");

        self.adjust_seats_best_effort(ticket.flight_id, ticket.passenger_count() as i32)
            .await;

        if self.config.reversal_policy == MilesReversalPolicy::RefundOnCancel
            && ticket.payment_method == PaymentMethod::Miles
            && ticket.miles_used > 0
        {
            let key = miles_refund_key(ticket.id);
            let refund = self
                .bounded(
                    "miles refund",
                    self.ledger.credit(
                        ticket.user_id,
                        ticket.miles_used,
                        &format!("ticket {} cancellation refund", ticket.id),
                        Some(&key),
                    ),
                )
                .await;
            match refund {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(%ticket_id, error = %err, "miles refund failed"),
                Err(err) => warn!(%ticket_id, error = %err, "miles refund timed out"),
            }
        }

        self.bounded("ticket lookup", self.tickets.find_by_id(ticket_id))
            .await??
            .ok_or(BookingError::TicketNotFound)
    }

    async fn adjust_seats_best_effort(&self, flight_id: Uuid, delta: i32) {
        let adjust = tokio::time::timeout(
            self.config.call_timeout,
            self.inventory.adjust_seats(flight_id, delta),
        )
        .await;

        match adjust {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(%flight_id, delta, error = %err, "seat adjustment failed, ticket stands");
            }
            Err(_) => {
                warn!(%flight_id, delta, "seat adjustment timed out, ticket stands");
            }
        }
    }

    async fn enqueue_best_effort<T: serde::Serialize>(&self, topic: &str, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(topic, error = %err, "failed to serialize job payload");
                return;
            }
        };

        if let Err(err) = self.queue.enqueue(topic, payload).await {
            warn!(topic, error = %err, "failed to enqueue job, ticket stands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{MilesCreditHandler, NotificationLogSink};
    use crate::payment::StubPaymentAdapter;
    use async_trait::async_trait;
    use skyfare_core::repository::{RepositoryError, TicketPage};
    use skyfare_core::ticket::Pnr;
    use skyfare_queue::DispatcherConfig;
    use skyfare_shared::pii::Masked;
    use skyfare_store::memory::{
        InMemoryFlightInventory, InMemoryMemberRepository, InMemoryTicketRepository,
    };

    /// Ticket store whose writes hang longer than any sane call timeout.
    struct SlowTicketStore {
        inner: InMemoryTicketRepository,
        delay: Duration,
    }

    #[async_trait]
    impl TicketRepository for SlowTicketStore {
        async fn create(&self, ticket: &Ticket) -> Result<(), RepositoryError> {
            tokio::time::sleep(self.delay).await;
            self.inner.create(ticket).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Option<Ticket>, RepositoryError> {
            self.inner.find_by_pnr(pnr).await
        }

        async fn find_by_user(
            &self,
            user_id: Uuid,
            page: u32,
            page_size: u32,
        ) -> Result<TicketPage, RepositoryError> {
            self.inner.find_by_user(user_id, page, page_size).await
        }

        async fn transition_status(
            &self,
            id: Uuid,
            from: TicketStatus,
            to: TicketStatus,
        ) -> Result<bool, RepositoryError> {
            self.inner.transition_status(id, from, to).await
        }
    }

    struct Harness {
        orchestrator: BookingOrchestrator,
        inventory: InMemoryFlightInventory,
        tickets: InMemoryTicketRepository,
        ledger: Arc<LoyaltyLedger>,
        queue: Arc<JobDispatcher>,
    }

    fn harness_with(success_rate: f64, config: OrchestratorConfig) -> Harness {
        let inventory = InMemoryFlightInventory::new();
        let tickets = InMemoryTicketRepository::new();
        let members = Arc::new(InMemoryMemberRepository::new());
        let ledger = Arc::new(LoyaltyLedger::new(members));

        let queue = JobDispatcher::new(DispatcherConfig {
            workers: 2,
            capacity: 16,
            max_attempts: 3,
            base_backoff: Duration::from_millis(10),
        });
        queue.register_handler(
            TOPIC_MILES_CREDIT,
            Arc::new(MilesCreditHandler::new(ledger.clone())),
        );
        queue.register_handler(TOPIC_PURCHASE_NOTIFICATION, Arc::new(NotificationLogSink));
        queue.start();

        let orchestrator = BookingOrchestrator::new(
            Arc::new(inventory.clone()),
            Arc::new(StubPaymentAdapter::new(success_rate, Duration::ZERO)),
            ledger.clone(),
            Arc::new(tickets.clone()),
            queue.clone(),
            config,
        );

        Harness {
            orchestrator,
            inventory,
            tickets,
            ledger,
            queue,
        }
    }

    fn harness() -> Harness {
        harness_with(1.0, OrchestratorConfig::default())
    }

    fn flight(seats: i32, unit_price: i64) -> FlightSnapshot {
        FlightSnapshot {
            id: Uuid::new_v4(),
            flight_number: "SF101".to_string(),
            available_seats: seats,
            unit_price,
            cabin: Some("economy".to_string()),
            distance_km: None,
        }
    }

    fn passengers(count: usize) -> Vec<Passenger> {
        (0..count)
            .map(|i| Passenger {
                first_name: format!("P{}", i),
                last_name: "Tester".to_string(),
                passport_number: Masked(format!("U{:07}", i)),
                nationality: "TR".to_string(),
            })
            .collect()
    }

    async fn drain(queue: &Arc<JobDispatcher>) {
        let mut waited = Duration::ZERO;
        while queue.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
            assert!(waited < Duration::from_secs(5), "queue never drained");
        }
    }

    #[tokio::test]
    async fn test_flight_not_found() {
        let h = harness();
        let err = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id: Uuid::new_v4(),
                flight_id: Uuid::new_v4(),
                passengers: passengers(1),
                payment_method: PaymentMethod::Card,
                membership_number: None,
            })
            .await;
        assert!(matches!(err, Err(BookingError::FlightNotFound)));
        assert_eq!(h.tickets.ticket_count(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_capacity_has_no_side_effects() {
        let h = harness();
        let f = flight(1, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);

        let err = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id: Uuid::new_v4(),
                flight_id,
                passengers: passengers(2),
                payment_method: PaymentMethod::Card,
                membership_number: None,
            })
            .await;

        assert!(matches!(
            err,
            Err(BookingError::InsufficientCapacity { requested: 2, available: 1 })
        ));
        assert_eq!(h.tickets.ticket_count(), 0);
        assert!(h.inventory.adjustments().is_empty());
        assert_eq!(h.inventory.available_seats(flight_id), Some(1));
    }

    #[tokio::test]
    async fn test_card_purchase_earns_miles_via_queue() {
        let h = harness();
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);
        let user_id = Uuid::new_v4();

        let ticket = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id,
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Card,
                membership_number: Some("MS00000001".to_string()),
            })
            .await
            .unwrap();

        // floor(1000 * 0.10) for economy with no distance hint.
        assert_eq!(ticket.total_price, 1000);
        assert_eq!(ticket.miles_earned, 100);
        assert_eq!(ticket.miles_used, 0);
        assert_eq!(ticket.status, TicketStatus::Confirmed);
        assert!(ticket.payment_reference.starts_with("TXN-"));

        // Seat decrement happened.
        assert_eq!(h.inventory.available_seats(flight_id), Some(9));
        assert_eq!(h.inventory.adjustments(), vec![(flight_id, -1)]);

        // The deferred credit lands with exactly the earned amount.
        drain(&h.queue).await;
        let member = h.ledger.member_for_user(user_id).await.unwrap().unwrap();
        assert_eq!(member.total_miles, 100);
        assert_eq!(member.available_miles, 100);
    }

    #[tokio::test]
    async fn test_card_purchase_without_member_earns_nothing() {
        let h = harness();
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);
        let user_id = Uuid::new_v4();

        let ticket = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id,
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Card,
                membership_number: None,
            })
            .await
            .unwrap();

        assert_eq!(ticket.miles_earned, 0);
        drain(&h.queue).await;
        assert!(h.ledger.member_for_user(user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_distance_based_accrual_wins_over_price() {
        let h = harness();
        let mut f = flight(10, 1000);
        f.cabin = Some("business".to_string());
        f.distance_km = Some(2000.0);
        let flight_id = f.id;
        h.inventory.insert_flight(f);

        let ticket = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id: Uuid::new_v4(),
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Card,
                membership_number: Some("MS00000001".to_string()),
            })
            .await
            .unwrap();

        // floor(2000 * 1.5)
        assert_eq!(ticket.miles_earned, 3000);
    }

    #[tokio::test]
    async fn test_payment_declined_creates_no_ticket() {
        let h = harness_with(0.0, OrchestratorConfig::default());
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);

        let err = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id: Uuid::new_v4(),
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Card,
                membership_number: None,
            })
            .await;

        assert!(matches!(err, Err(BookingError::PaymentDeclined)));
        assert_eq!(h.tickets.ticket_count(), 0);
        assert_eq!(h.inventory.available_seats(flight_id), Some(10));
    }

    #[tokio::test]
    async fn test_miles_purchase_requires_member_number() {
        let h = harness();
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);

        let err = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id: Uuid::new_v4(),
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Miles,
                membership_number: None,
            })
            .await;

        assert!(matches!(err, Err(BookingError::MissingMemberNumber)));
    }

    #[tokio::test]
    async fn test_miles_purchase_debits_exact_amount() {
        let h = harness();
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);
        let user_id = Uuid::new_v4();

        let member = h.ledger.credit(user_id, 5000, "seed", None).await.unwrap();
        let number = member.membership_number.clone();

        let ticket = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id,
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Miles,
                membership_number: Some(number.clone()),
            })
            .await
            .unwrap();

        // ceil(1000 / 10)
        assert_eq!(ticket.miles_used, 100);
        assert_eq!(ticket.miles_earned, 0);
        assert!(ticket.payment_reference.starts_with("MILES-"));

        let member = h.ledger.member_for_user(user_id).await.unwrap().unwrap();
        assert_eq!(member.available_miles, 4900);
        assert_eq!(member.total_miles, 5000);
    }

    #[tokio::test]
    async fn test_miles_purchase_insufficient_balance() {
        let h = harness();
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);
        let user_id = Uuid::new_v4();

        let member = h.ledger.credit(user_id, 50, "seed", None).await.unwrap();
        let number = member.membership_number.clone();

        let err = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id,
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Miles,
                membership_number: Some(number.clone()),
            })
            .await;

        assert!(matches!(
            err,
            Err(BookingError::InsufficientMiles { required: 100, available: 50 })
        ));
        assert_eq!(h.tickets.ticket_count(), 0);
        // Ledger untouched.
        assert_eq!(h.ledger.balance(user_id, &number).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_seat_adjust_failure_does_not_fail_purchase() {
        let h = harness();
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);
        h.inventory.set_fail_on_adjust(true);

        let ticket = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id: Uuid::new_v4(),
                flight_id,
                passengers: passengers(2),
                payment_method: PaymentMethod::Card,
                membership_number: None,
            })
            .await
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::Confirmed);
        // The decrement never landed; documented inconsistency hazard.
        assert_eq!(h.inventory.available_seats(flight_id), Some(10));
        assert_eq!(h.tickets.ticket_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_flow() {
        let h = harness();
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);
        let user_id = Uuid::new_v4();

        let ticket = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id,
                flight_id,
                passengers: passengers(2),
                payment_method: PaymentMethod::Card,
                membership_number: None,
            })
            .await
            .unwrap();
        assert_eq!(h.inventory.available_seats(flight_id), Some(8));

        // Wrong owner.
        let err = h.orchestrator.cancel(ticket.id, Uuid::new_v4()).await;
        assert!(matches!(err, Err(BookingError::NotOwner)));

        // Owner cancels: status flips, seats restored.
        let cancelled = h.orchestrator.cancel(ticket.id, user_id).await.unwrap();
        assert_eq!(cancelled.status, TicketStatus::Cancelled);
        assert_eq!(h.inventory.available_seats(flight_id), Some(10));

        // Cancelling again is idempotent-rejecting: no further mutation.
        let err = h.orchestrator.cancel(ticket.id, user_id).await;
        assert!(matches!(err, Err(BookingError::AlreadyCancelled)));
        assert_eq!(h.inventory.available_seats(flight_id), Some(10));

        // Unknown ticket.
        let err = h.orchestrator.cancel(Uuid::new_v4(), user_id).await;
        assert!(matches!(err, Err(BookingError::TicketNotFound)));
    }

    #[tokio::test]
    async fn test_cancel_does_not_refund_miles_by_default() {
        let h = harness();
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);
        let user_id = Uuid::new_v4();

        let member = h.ledger.credit(user_id, 1000, "seed", None).await.unwrap();
        let number = member.membership_number.clone();

        let ticket = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id,
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Miles,
                membership_number: Some(number.clone()),
            })
            .await
            .unwrap();
        assert_eq!(h.ledger.balance(user_id, &number).await.unwrap(), 900);

        h.orchestrator.cancel(ticket.id, user_id).await.unwrap();
        drain(&h.queue).await;

        // Original behavior: spent miles stay spent.
        assert_eq!(h.ledger.balance(user_id, &number).await.unwrap(), 900);
    }

    #[tokio::test]
    async fn test_cancel_refunds_miles_under_refund_policy() {
        let h = harness_with(
            1.0,
            OrchestratorConfig {
                reversal_policy: MilesReversalPolicy::RefundOnCancel,
                ..OrchestratorConfig::default()
            },
        );
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);
        let user_id = Uuid::new_v4();

        let member = h.ledger.credit(user_id, 1000, "seed", None).await.unwrap();
        let number = member.membership_number.clone();

        let ticket = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id,
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Miles,
                membership_number: Some(number.clone()),
            })
            .await
            .unwrap();
        assert_eq!(h.ledger.balance(user_id, &number).await.unwrap(), 900);

        h.orchestrator.cancel(ticket.id, user_id).await.unwrap();
        drain(&h.queue).await;
        assert_eq!(h.ledger.balance(user_id, &number).await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_unpriced_flight_rejected_before_settlement() {
        // Payment always declines, so reaching the settle step would surface
        // PaymentDeclined instead of the inventory rejection.
        let h = harness_with(0.0, OrchestratorConfig::default());
        let f = flight(10, 0);
        let flight_id = f.id;
        h.inventory.insert_flight(f);

        let err = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id: Uuid::new_v4(),
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Card,
                membership_number: None,
            })
            .await;

        assert!(matches!(err, Err(BookingError::Inventory(_))));
        assert_eq!(h.tickets.ticket_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_ticket_store_times_out_purchase() {
        let inventory = InMemoryFlightInventory::new();
        let inner = InMemoryTicketRepository::new();
        let members = Arc::new(InMemoryMemberRepository::new());
        let ledger = Arc::new(LoyaltyLedger::new(members));

        let queue = JobDispatcher::new(DispatcherConfig {
            workers: 1,
            capacity: 4,
            max_attempts: 1,
            base_backoff: Duration::from_millis(10),
        });
        queue.register_handler(
            TOPIC_MILES_CREDIT,
            Arc::new(MilesCreditHandler::new(ledger.clone())),
        );
        queue.register_handler(TOPIC_PURCHASE_NOTIFICATION, Arc::new(NotificationLogSink));
        queue.start();

        let f = flight(10, 1000);
        let flight_id = f.id;
        inventory.insert_flight(f);

        let orchestrator = BookingOrchestrator::new(
            Arc::new(inventory.clone()),
            Arc::new(StubPaymentAdapter::new(1.0, Duration::ZERO)),
            ledger,
            Arc::new(SlowTicketStore {
                inner: inner.clone(),
                delay: Duration::from_millis(500),
            }),
            queue,
            OrchestratorConfig {
                call_timeout: Duration::from_millis(50),
                ..OrchestratorConfig::default()
            },
        );

        let err = orchestrator
            .purchase(PurchaseRequest {
                user_id: Uuid::new_v4(),
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Card,
                membership_number: None,
            })
            .await;

        assert!(matches!(err, Err(BookingError::Timeout("ticket persistence"))));
        // The bounded write was abandoned mid-flight; nothing persisted.
        assert_eq!(inner.ticket_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_enqueues_no_jobs() {
        let h = harness();
        let f = flight(10, 1000);
        let flight_id = f.id;
        h.inventory.insert_flight(f);
        let user_id = Uuid::new_v4();

        let ticket = h
            .orchestrator
            .purchase(PurchaseRequest {
                user_id,
                flight_id,
                passengers: passengers(1),
                payment_method: PaymentMethod::Card,
                membership_number: None,
            })
            .await
            .unwrap();
        drain(&h.queue).await;

        h.orchestrator.cancel(ticket.id, user_id).await.unwrap();
        // Cancellation is synchronous end to end: no deferred work.
        assert_eq!(h.queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_pnrs_are_unique_across_purchases() {
        let h = harness();
        let f = flight(100, 500);
        let flight_id = f.id;
        h.inventory.insert_flight(f);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..10 {
            let ticket = h
                .orchestrator
                .purchase(PurchaseRequest {
                    user_id: Uuid::new_v4(),
                    flight_id,
                    passengers: passengers(1),
                    payment_method: PaymentMethod::Card,
                    membership_number: None,
                })
                .await
                .unwrap();
            assert!(seen.insert(ticket.pnr.as_str().to_string()));
        }
    }
}
