use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, db};

pub use crate::db::transaction::{Id, Status};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Id,
    pub code: String,
    pub buyer: api::User,
    pub event: Subject<api::event::Id>,
    pub ticket_type: Subject<api::event::TicketTypeId>,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
    pub status: Status,
    pub payment_proof: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub payment_due: OffsetDateTime,
    pub canceled_reason: Option<String>,

    /// Whether the buyer can review the event now.
    pub can_review: bool,
}

/// Reference to a named entity.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Subject<Id> {
    pub id: Id,
    pub name: String,
}

impl Transaction {
    pub fn new(
        transaction: db::Transaction,
        buyer: api::User,
        event: &db::Event,
        ticket_type: &db::TicketType,
        can_review: bool,
    ) -> Self {
        Self {
            id: transaction.id,
            code: transaction.code,
            buyer,
            event: Subject {
                id: event.id,
                name: event.name.clone(),
            },
            ticket_type: Subject {
                id: ticket_type.id,
                name: ticket_type.name.clone(),
            },
            quantity: transaction.quantity,
            unit_price: transaction.unit_price,
            total_price: transaction.total_price,
            status: transaction.status,
            payment_proof: transaction.payment_proof,
            created_at: transaction.created_at,
            payment_due: transaction.payment_due,
            canceled_reason: transaction.canceled_reason,
            can_review,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub transactions: Vec<Transaction>,
    pub total_count: usize,
}

/// Organizer decision result: the decided transaction and the quota of its
/// ticket type afterwards.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decided {
    pub transaction: Transaction,
    pub ticket_type: api::event::TicketType,
}
