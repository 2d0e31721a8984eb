use std::{fmt, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::db::{
    self, event, ticket_type, transaction, Event, Review, TicketType,
    Transaction,
};

use super::Decision;

/// Durable state behind the [`Manager`](super::Manager).
///
/// Every mutating method is atomic: it either applies completely or not at
/// all, and its precondition is checked against the committed state, not
/// against what the caller read before.
#[async_trait]
pub trait Store: Send + Sync {
    type Error: fmt::Debug + fmt::Display + Send;

    async fn find_event(
        &self,
        id: event::Id,
    ) -> Result<Option<Event>, Self::Error>;

    async fn find_ticket_type(
        &self,
        id: ticket_type::Id,
    ) -> Result<Option<TicketType>, Self::Error>;

    async fn find_transaction(
        &self,
        id: transaction::Id,
    ) -> Result<Option<Transaction>, Self::Error>;

    /// Takes `transaction.quantity` from the remaining quota of its ticket
    /// type and stores the transaction.
    ///
    /// Returns `false`, changing nothing, if not enough tickets remain.
    async fn reserve(
        &self,
        transaction: &Transaction,
    ) -> Result<bool, Self::Error>;

    /// Sets the payment proof of a transaction awaiting payment whose
    /// payment due time has not passed at `now`.
    ///
    /// Returns `None` if there is no such transaction.
    async fn attach_proof(
        &self,
        id: transaction::Id,
        proof: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Self::Error>;

    /// Moves a transaction awaiting payment to `decision.target()`, releasing
    /// its quantity if `decision.releases_quota()`. [`Decision::Expire`] also
    /// requires the payment due time to have passed at `now` and no payment
    /// proof.
    ///
    /// Returns `None` if the transaction doesn't satisfy these conditions.
    async fn decide(
        &self,
        id: transaction::Id,
        decision: Decision,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Self::Error>;

    /// Transactions awaiting payment without a payment proof whose payment
    /// due time has passed at `now`.
    async fn expired(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<Transaction>, Self::Error>;

    /// Stores the review. Returns `false` if its transaction is already
    /// reviewed.
    async fn add_review(&self, review: &Review) -> Result<bool, Self::Error>;
}

#[async_trait]
impl Store for db::Client {
    type Error = db::Error;

    async fn find_event(
        &self,
        id: event::Id,
    ) -> Result<Option<Event>, Self::Error> {
        self.get_event_by_id(id).await
    }

    async fn find_ticket_type(
        &self,
        id: ticket_type::Id,
    ) -> Result<Option<TicketType>, Self::Error> {
        self.get_ticket_type_by_id(id).await
    }

    async fn find_transaction(
        &self,
        id: transaction::Id,
    ) -> Result<Option<Transaction>, Self::Error> {
        self.get_transaction_by_id(id).await
    }

    async fn reserve(
        &self,
        transaction: &Transaction,
    ) -> Result<bool, Self::Error> {
        self.reserve_and_write_transaction(transaction).await
    }

    async fn attach_proof(
        &self,
        id: transaction::Id,
        proof: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Self::Error> {
        self.attach_payment_proof(id, proof, now).await
    }

    async fn decide(
        &self,
        id: transaction::Id,
        decision: Decision,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Self::Error> {
        self.decide_transaction(id, decision, now).await
    }

    async fn expired(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<Transaction>, Self::Error> {
        self.get_expired_transactions(now).await
    }

    async fn add_review(&self, review: &Review) -> Result<bool, Self::Error> {
        self.write_review(review).await
    }
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    type Error = S::Error;

    async fn find_event(
        &self,
        id: event::Id,
    ) -> Result<Option<Event>, Self::Error> {
        (**self).find_event(id).await
    }

    async fn find_ticket_type(
        &self,
        id: ticket_type::Id,
    ) -> Result<Option<TicketType>, Self::Error> {
        (**self).find_ticket_type(id).await
    }

    async fn find_transaction(
        &self,
        id: transaction::Id,
    ) -> Result<Option<Transaction>, Self::Error> {
        (**self).find_transaction(id).await
    }

    async fn reserve(
        &self,
        transaction: &Transaction,
    ) -> Result<bool, Self::Error> {
        (**self).reserve(transaction).await
    }

    async fn attach_proof(
        &self,
        id: transaction::Id,
        proof: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Self::Error> {
        (**self).attach_proof(id, proof, now).await
    }

    async fn decide(
        &self,
        id: transaction::Id,
        decision: Decision,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Self::Error> {
        (**self).decide(id, decision, now).await
    }

    async fn expired(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<Transaction>, Self::Error> {
        (**self).expired(now).await
    }

    async fn add_review(&self, review: &Review) -> Result<bool, Self::Error> {
        (**self).add_review(review).await
    }
}
