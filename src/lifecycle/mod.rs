//! Purchase transaction lifecycle.
//!
//! A purchase reserves part of a ticket type's quota and starts awaiting
//! payment. From there it moves exactly once, to one of the terminal
//! statuses:
//!
//! ```text
//!                       ┌── approve ──> approved   (quota stays sold)
//! waiting_for_payment ──┼── reject ───> rejected   (quota released)
//!                       └── expire ───> canceled   (quota released)
//! ```
//!
//! `pending` is accepted as an equivalent of `waiting_for_payment`.
//!
//! [`Manager`] decides which operations are allowed; the [`Store`] makes each
//! accepted change durable as a single compare-and-swap on the current
//! status, so a decision racing with an expiry has exactly one winner.

#[cfg(test)]
mod memory;
mod store;

use std::time::Duration;

use derive_more::{Display, From};
use time::OffsetDateTime;

use crate::{
    db::{
        event, review, ticket_type,
        transaction::{self, Status},
        Event, Review, TicketType, Transaction,
    },
    session::Session,
};

pub use self::store::Store;

#[cfg(test)]
use self::memory::MemoryStore;

/// Reason recorded on transactions canceled by the expiry sweep.
pub const PAYMENT_TIMEOUT_REASON: &str = "Payment timeout";

/// Way a transaction leaves the awaiting-payment statuses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Organizer accepts the payment.
    Approve,

    /// Organizer refuses the payment.
    Reject,

    /// Payment due time passed without a payment proof.
    Expire,
}

impl Decision {
    pub fn target(self) -> Status {
        match self {
            Self::Approve => Status::Approved,
            Self::Reject => Status::Rejected,
            Self::Expire => Status::Canceled,
        }
    }

    /// Whether the reserved quantity goes back to the ticket type.
    pub fn releases_quota(self) -> bool {
        match self {
            Self::Approve => false,
            Self::Reject | Self::Expire => true,
        }
    }

    pub fn canceled_reason(self) -> Option<&'static str> {
        match self {
            Self::Expire => Some(PAYMENT_TIMEOUT_REASON),
            Self::Approve | Self::Reject => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Entity {
    #[display("event")]
    Event,
    #[display("ticket type")]
    TicketType,
    #[display("transaction")]
    Transaction,
}

#[derive(Debug, Display, From)]
pub enum Error<E> {
    #[display("requested {requested} tickets, but only {remaining} remain")]
    InsufficientQuota { requested: u32, remaining: u32 },

    #[display("transaction {id} is {status}")]
    InvalidState { id: transaction::Id, status: Status },

    #[display("{_0} not found")]
    NotFound(Entity),

    #[display("operation is not allowed for the current user")]
    AuthorizationDenied,

    #[display("quantity must be positive")]
    InvalidQuantity,

    #[display("rating must be from 1 to 5")]
    InvalidRating,

    #[display("payment proof is empty")]
    EmptyProof,

    #[display("tickets are not on sale")]
    SalesClosed,

    #[display("transaction {_0} is already reviewed")]
    AlreadyReviewed(transaction::Id),

    #[display("store failed: {_0}")]
    #[from]
    Store(E),
}

/// Purchase request of a buyer.
#[derive(Clone, Copy, Debug)]
pub struct Purchase {
    pub event: event::Id,
    pub ticket_type: ticket_type::Id,
    pub quantity: u32,
}

/// Outcome of an organizer decision.
#[derive(Clone, Debug)]
pub struct Decided {
    pub transaction: Transaction,

    /// Ticket type of the transaction after the decision.
    pub ticket_type: TicketType,
}

/// Whether the buyer of `transaction` may review `event` at `now`: the
/// transaction is approved and the event is over.
pub fn can_review(
    transaction: &Transaction,
    event: &Event,
    now: OffsetDateTime,
) -> bool {
    transaction.status == Status::Approved
        && transaction.event == event.id
        && event.has_ended(now)
}

#[derive(Clone, Debug)]
pub struct Manager<S> {
    store: S,
    payment_window: Duration,
}

impl<S: Store> Manager<S> {
    pub fn new(store: S, payment_window: Duration) -> Self {
        Self {
            store,
            payment_window,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reserves `purchase.quantity` tickets for the session's user and
    /// creates a transaction awaiting payment until `now` plus the payment
    /// window.
    pub async fn submit_purchase(
        &self,
        session: &Session,
        purchase: Purchase,
        now: OffsetDateTime,
    ) -> Result<Transaction, Error<S::Error>> {
        use Error as E;

        if purchase.quantity == 0 {
            return Err(E::InvalidQuantity);
        }

        let event = self
            .store
            .find_event(purchase.event)
            .await?
            .ok_or(E::NotFound(Entity::Event))?;
        let ticket_type = self
            .store
            .find_ticket_type(purchase.ticket_type)
            .await?
            .filter(|t| t.event == event.id)
            .ok_or(E::NotFound(Entity::TicketType))?;

        if event.has_ended(now) || !ticket_type.is_on_sale(now) {
            return Err(E::SalesClosed);
        }
        if purchase.quantity > ticket_type.remaining {
            return Err(E::InsufficientQuota {
                requested: purchase.quantity,
                remaining: ticket_type.remaining,
            });
        }

        let transaction = Transaction {
            id: transaction::Id::new(),
            code: transaction::generate_code(),
            buyer: session.user_id,
            event: event.id,
            ticket_type: ticket_type.id,
            quantity: purchase.quantity,
            unit_price: ticket_type.price,
            total_price: ticket_type.price * f64::from(purchase.quantity),
            status: Status::WaitingForPayment,
            payment_proof: None,
            created_at: now,
            payment_due: now + self.payment_window,
            canceled_reason: None,
        };

        if !self.store.reserve(&transaction).await? {
            // Another purchase took the remaining tickets in the meantime.
            let remaining = self
                .store
                .find_ticket_type(ticket_type.id)
                .await?
                .map_or(0, |t| t.remaining);
            return Err(E::InsufficientQuota {
                requested: purchase.quantity,
                remaining,
            });
        }

        tracing::info!(
            transaction = %transaction.id,
            code = %transaction.code,
            ticket_type = %transaction.ticket_type,
            quantity = transaction.quantity,
            "purchase submitted",
        );

        Ok(transaction)
    }

    /// Attaches a payment proof to the session user's transaction. The status
    /// doesn't change: approval stays an organizer decision.
    pub async fn upload_payment_proof(
        &self,
        session: &Session,
        id: transaction::Id,
        proof: &str,
        now: OffsetDateTime,
    ) -> Result<Transaction, Error<S::Error>> {
        use Error as E;

        let transaction = self
            .store
            .find_transaction(id)
            .await?
            .ok_or(E::NotFound(Entity::Transaction))?;
        if transaction.buyer != session.user_id {
            return Err(E::AuthorizationDenied);
        }
        if !transaction.status.is_awaiting_payment()
            || transaction.is_overdue(now)
        {
            return Err(E::InvalidState {
                id,
                status: transaction.status,
            });
        }
        if proof.trim().is_empty() {
            return Err(E::EmptyProof);
        }

        match self.store.attach_proof(id, proof, now).await? {
            Some(transaction) => {
                tracing::info!(transaction = %id, "payment proof uploaded");
                Ok(transaction)
            }
            None => Err(self.invalid_state(id).await),
        }
    }

    /// Approves the transaction. Its reserved quota stays consumed.
    pub async fn approve(
        &self,
        session: &Session,
        id: transaction::Id,
        now: OffsetDateTime,
    ) -> Result<Decided, Error<S::Error>> {
        self.decide(session, id, Decision::Approve, now).await
    }

    /// Rejects the transaction, releasing its reserved quota.
    pub async fn reject(
        &self,
        session: &Session,
        id: transaction::Id,
        now: OffsetDateTime,
    ) -> Result<Decided, Error<S::Error>> {
        self.decide(session, id, Decision::Reject, now).await
    }

    async fn decide(
        &self,
        session: &Session,
        id: transaction::Id,
        decision: Decision,
        now: OffsetDateTime,
    ) -> Result<Decided, Error<S::Error>> {
        use Error as E;

        if !session.is_organizer() {
            return Err(E::AuthorizationDenied);
        }

        let transaction = self
            .store
            .find_transaction(id)
            .await?
            .ok_or(E::NotFound(Entity::Transaction))?;
        let event = self
            .store
            .find_event(transaction.event)
            .await?
            .ok_or(E::NotFound(Entity::Event))?;
        if event.organizer != session.user_id {
            return Err(E::AuthorizationDenied);
        }
        if !transaction.status.can_become(decision.target()) {
            return Err(E::InvalidState {
                id,
                status: transaction.status,
            });
        }

        let Some(transaction) = self.store.decide(id, decision, now).await?
        else {
            return Err(self.invalid_state(id).await);
        };
        let ticket_type = self
            .store
            .find_ticket_type(transaction.ticket_type)
            .await?
            .ok_or(E::NotFound(Entity::TicketType))?;

        tracing::info!(
            transaction = %id,
            status = %transaction.status,
            remaining = ticket_type.remaining,
            "transaction decided",
        );

        Ok(Decided {
            transaction,
            ticket_type,
        })
    }

    /// Cancels every transaction awaiting payment without a payment proof
    /// whose payment due time has passed at `now`, releasing its quota.
    ///
    /// Transactions decided concurrently are skipped, and so is a single
    /// transaction the store fails to cancel, so running the sweep again is
    /// always safe. Returns the canceled transactions.
    pub async fn sweep_expired(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<transaction::Id>, Error<S::Error>> {
        let expired = self.store.expired(now).await?;

        let mut canceled = Vec::with_capacity(expired.len());
        for transaction in expired {
            match self.store.decide(transaction.id, Decision::Expire, now).await
            {
                Ok(Some(t)) => {
                    tracing::info!(
                        transaction = %t.id,
                        code = %t.code,
                        quantity = t.quantity,
                        "transaction canceled on payment timeout",
                    );
                    canceled.push(t.id);
                }
                Ok(None) => tracing::debug!(
                    transaction = %transaction.id,
                    "transaction is not expirable anymore, skipping",
                ),
                Err(e) => tracing::error!(
                    transaction = %transaction.id,
                    "failed to cancel expired transaction: {e}",
                ),
            }
        }
        Ok(canceled)
    }

    /// Reviews the event of the session user's transaction.
    pub async fn submit_review(
        &self,
        session: &Session,
        id: transaction::Id,
        rating: u8,
        comment: String,
        now: OffsetDateTime,
    ) -> Result<Review, Error<S::Error>> {
        use Error as E;

        let transaction = self
            .store
            .find_transaction(id)
            .await?
            .ok_or(E::NotFound(Entity::Transaction))?;
        if transaction.buyer != session.user_id {
            return Err(E::AuthorizationDenied);
        }
        if !(1..=5).contains(&rating) {
            return Err(E::InvalidRating);
        }
        let event = self
            .store
            .find_event(transaction.event)
            .await?
            .ok_or(E::NotFound(Entity::Event))?;
        if !can_review(&transaction, &event, now) {
            return Err(E::InvalidState {
                id,
                status: transaction.status,
            });
        }

        let review = Review {
            id: review::Id::new(),
            transaction: id,
            event: event.id,
            author: session.user_id,
            rating,
            comment,
            created_at: now,
        };
        if !self.store.add_review(&review).await? {
            return Err(E::AlreadyReviewed(id));
        }
        Ok(review)
    }

    /// Error for a change the store refused because the transaction moved
    /// after it was read.
    async fn invalid_state(&self, id: transaction::Id) -> Error<S::Error> {
        match self.store.find_transaction(id).await {
            Ok(Some(t)) => Error::InvalidState {
                id,
                status: t.status,
            },
            Ok(None) => Error::NotFound(Entity::Transaction),
            Err(e) => Error::Store(e),
        }
    }
}
