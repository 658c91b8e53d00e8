//! In-memory trait doubles for tests and local development. State lives in
//! `Arc<RwLock<_>>` so clones share the store; locks are never held across
//! an await.

use async_trait::async_trait;
use chrono::NaiveDate;
use skyfare_core::inventory::{FlightInventory, FlightSnapshot, InventoryError};
use skyfare_core::member::LoyaltyMember;
use skyfare_core::repository::{
    MemberRepository, RepositoryError, TicketPage, TicketRepository,
};
use skyfare_core::ticket::{Pnr, Ticket};
use skyfare_shared::TicketStatus;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Default)]
struct TicketState {
    tickets: HashMap<Uuid, Ticket>,
}

#[derive(Clone, Default)]
pub struct InMemoryTicketRepository {
    state: Arc<RwLock<TicketState>>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket_count(&self) -> usize {
        self.state.read().unwrap().tickets.len()
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn create(&self, ticket: &Ticket) -> Result<(), RepositoryError> {
        let mut state = self.state.write().unwrap();
        if state.tickets.values().any(|t| t.pnr == ticket.pnr) {
            return Err(RepositoryError::Duplicate(format!("pnr {}", ticket.pnr)));
        }
        if state.tickets.contains_key(&ticket.id) {
            return Err(RepositoryError::Duplicate(format!("ticket {}", ticket.id)));
        }
        state.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, RepositoryError> {
        Ok(self.state.read().unwrap().tickets.get(&id).cloned())
    }

    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Option<Ticket>, RepositoryError> {
        Ok(self
            .state
            .read()
            .unwrap()
            .tickets
            .values()
            .find(|t| &t.pnr == pnr)
            .cloned())
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<TicketPage, RepositoryError> {
        let state = self.state.read().unwrap();
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = tickets.len() as u64;
        let offset = (page.max(1) as usize - 1) * page_size as usize;
        let tickets = tickets
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        Ok(TicketPage { tickets, total })
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().unwrap();
        match state.tickets.get_mut(&id) {
            Some(ticket) if ticket.status == from => {
                ticket.update_status(to);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }
}

#[derive(Default)]
struct MemberState {
    members: HashMap<Uuid, LoyaltyMember>,
    applied_keys: HashSet<(Uuid, String)>,
}

#[derive(Clone, Default)]
pub struct InMemoryMemberRepository {
    state: Arc<RwLock<MemberState>>,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<LoyaltyMember>, RepositoryError> {
        Ok(self.state.read().unwrap().members.get(&user_id).cloned())
    }

    async fn find_by_user_and_number(
        &self,
        user_id: Uuid,
        membership_number: &str,
    ) -> Result<Option<LoyaltyMember>, RepositoryError> {
        Ok(self
            .state
            .read()
            .unwrap()
            .members
            .get(&user_id)
            .filter(|m| m.membership_number == membership_number)
            .cloned())
    }

    async fn save(
        &self,
        member: &LoyaltyMember,
        applied_key: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().unwrap();
        state.members.insert(member.user_id, member.clone());
        if let Some(key) = applied_key {
            state.applied_keys.insert((member.user_id, key.to_string()));
        }
        Ok(())
    }

    async fn key_applied(&self, user_id: Uuid, key: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .state
            .read()
            .unwrap()
            .applied_keys
            .contains(&(user_id, key.to_string())))
    }
}

#[derive(Default)]
struct InventoryState {
    flights: HashMap<Uuid, FlightSnapshot>,
    adjustments: Vec<(Uuid, i32)>,
    fail_on_adjust: bool,
}

/// In-memory stand-in for the external inventory service. `adjust_seats`
/// can be made to fail to exercise the orchestrator's log-and-continue
/// path.
#[derive(Clone, Default)]
pub struct InMemoryFlightInventory {
    state: Arc<RwLock<InventoryState>>,
}

impl InMemoryFlightInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_flight(&self, flight: FlightSnapshot) {
        self.state.write().unwrap().flights.insert(flight.id, flight);
    }

    pub fn available_seats(&self, flight_id: Uuid) -> Option<i32> {
        self.state
            .read()
            .unwrap()
            .flights
            .get(&flight_id)
            .map(|f| f.available_seats)
    }

    pub fn adjustments(&self) -> Vec<(Uuid, i32)> {
        self.state.read().unwrap().adjustments.clone()
    }

    pub fn set_fail_on_adjust(&self, fail: bool) {
        self.state.write().unwrap().fail_on_adjust = fail;
    }
}

#[async_trait]
impl FlightInventory for InMemoryFlightInventory {
    async fn get_flight(&self, flight_id: Uuid) -> Result<Option<FlightSnapshot>, InventoryError> {
        Ok(self.state.read().unwrap().flights.get(&flight_id).cloned())
    }

    async fn adjust_seats(&self, flight_id: Uuid, delta: i32) -> Result<(), InventoryError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_adjust {
            return Err(InventoryError::Timeout);
        }
        let flight = state
            .flights
            .get_mut(&flight_id)
            .ok_or_else(|| InventoryError::Upstream("unknown flight".to_string()))?;
        flight.available_seats += delta;
        state.adjustments.push((flight_id, delta));
        Ok(())
    }

    async fn search_by_date(&self, _date: NaiveDate) -> Result<Vec<FlightSnapshot>, InventoryError> {
        Ok(self.state.read().unwrap().flights.values().cloned().collect())
    }
}
