//! In-process [`Store`] for unit tests, keeping everything behind a single
//! mutex.

use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::db::{
    event, ticket_type, transaction, Event, Review, TicketType, Transaction,
};

use super::{Decision, Store};

#[derive(Debug, Default)]
pub struct MemoryStore(Mutex<State>);

#[derive(Debug, Default)]
struct State {
    events: HashMap<event::Id, Event>,
    ticket_types: HashMap<ticket_type::Id, TicketType>,
    transactions: HashMap<transaction::Id, Transaction>,
    reviews: HashMap<transaction::Id, Review>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event with its ticket types, replacing previous versions.
    pub fn insert_event(&self, event: Event, ticket_types: Vec<TicketType>) {
        let mut state = self.lock();
        for ticket_type in ticket_types {
            state.ticket_types.insert(ticket_type.id, ticket_type);
        }
        state.events.insert(event.id, event);
    }

    /// Adds a transaction as is, without touching any quota.
    pub fn insert_transaction(&self, transaction: Transaction) {
        self.lock().transactions.insert(transaction.id, transaction);
    }

    pub fn ticket_type(&self, id: ticket_type::Id) -> Option<TicketType> {
        self.lock().ticket_types.get(&id).cloned()
    }

    pub fn transaction(&self, id: transaction::Id) -> Option<Transaction> {
        self.lock().transactions.get(&id).cloned()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().transactions.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Error = Infallible;

    async fn find_event(
        &self,
        id: event::Id,
    ) -> Result<Option<Event>, Self::Error> {
        Ok(self.lock().events.get(&id).cloned())
    }

    async fn find_ticket_type(
        &self,
        id: ticket_type::Id,
    ) -> Result<Option<TicketType>, Self::Error> {
        Ok(self.ticket_type(id))
    }

    async fn find_transaction(
        &self,
        id: transaction::Id,
    ) -> Result<Option<Transaction>, Self::Error> {
        Ok(self.transaction(id))
    }

    async fn reserve(
        &self,
        transaction: &Transaction,
    ) -> Result<bool, Self::Error> {
        let mut state = self.lock();
        let Some(ticket_type) = state
            .ticket_types
            .get_mut(&transaction.ticket_type)
            .filter(|t| t.event == transaction.event)
        else {
            return Ok(false);
        };
        if ticket_type.remaining < transaction.quantity {
            return Ok(false);
        }
        ticket_type.remaining -= transaction.quantity;
        state
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(true)
    }

    async fn attach_proof(
        &self,
        id: transaction::Id,
        proof: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Self::Error> {
        let mut state = self.lock();
        Ok(state
            .transactions
            .get_mut(&id)
            .filter(|t| t.status.is_awaiting_payment() && !t.is_overdue(now))
            .map(|t| {
                t.payment_proof = Some(proof.to_owned());
                t.clone()
            }))
    }

    async fn decide(
        &self,
        id: transaction::Id,
        decision: Decision,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Self::Error> {
        let mut state = self.lock();
        let State {
            ticket_types,
            transactions,
            ..
        } = &mut *state;

        let Some(transaction) = transactions.get_mut(&id).filter(|t| {
            t.status.is_awaiting_payment()
                && (decision != Decision::Expire
                    || (now > t.payment_due && t.payment_proof.is_none()))
        }) else {
            return Ok(None);
        };

        transaction.status = decision.target();
        transaction.canceled_reason =
            decision.canceled_reason().map(ToOwned::to_owned);
        if decision.releases_quota() {
            if let Some(ticket_type) =
                ticket_types.get_mut(&transaction.ticket_type)
            {
                ticket_type.remaining += transaction.quantity;
            }
        }
        Ok(Some(transaction.clone()))
    }

    async fn expired(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<Transaction>, Self::Error> {
        let mut expired = self
            .lock()
            .transactions
            .values()
            .filter(|t| {
                t.status.is_awaiting_payment()
                    && t.payment_proof.is_none()
                    && now > t.payment_due
            })
            .cloned()
            .collect::<Vec<_>>();
        expired.sort_by_key(|t| t.payment_due);
        Ok(expired)
    }

    async fn add_review(&self, review: &Review) -> Result<bool, Self::Error> {
        let mut state = self.lock();
        if state.reviews.contains_key(&review.transaction) {
            return Ok(false);
        }
        state.reviews.insert(review.transaction, review.clone());
        Ok(true)
    }
}
