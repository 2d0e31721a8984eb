use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, db};

pub use crate::db::{event::Id, ticket_type::Id as TicketTypeId};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Id,
    pub organizer: api::User,
    pub name: String,
    pub description: String,
    pub category: String,
    pub location: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    /// Tickets still remaining over all ticket types.
    pub available_seats: u64,
    pub ticket_types: Vec<TicketType>,
}

impl Event {
    /// Assembles an event, picking its ticket types out of `ticket_types`.
    pub fn new(
        event: db::Event,
        organizer: api::User,
        ticket_types: &[db::TicketType],
    ) -> Self {
        let ticket_types = ticket_types
            .iter()
            .filter(|t| t.event == event.id)
            .map(TicketType::from)
            .collect::<Vec<_>>();
        Self {
            id: event.id,
            organizer,
            name: event.name,
            description: event.description,
            category: event.category,
            location: event.location,
            start_date: event.start_date,
            end_date: event.end_date,
            available_seats: ticket_types
                .iter()
                .map(|t| u64::from(t.remaining))
                .sum(),
            ticket_types,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    pub id: TicketTypeId,
    pub name: String,
    pub price: f64,
    pub quota: u32,
    pub remaining: u32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sales_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sales_end: Option<OffsetDateTime>,
}

impl From<&db::TicketType> for TicketType {
    fn from(ticket_type: &db::TicketType) -> Self {
        Self {
            id: ticket_type.id,
            name: ticket_type.name.clone(),
            price: ticket_type.price,
            quota: ticket_type.quota,
            remaining: ticket_type.remaining,
            sales_start: ticket_type.sales_start,
            sales_end: ticket_type.sales_end,
        }
    }
}

/// Event page: the event with what its visitors wrote about it.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    #[serde(flatten)]
    pub event: Event,
    pub reviews: Vec<api::Review>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub events: Vec<Event>,
    pub total_count: usize,
}

/// Buyer of an event as seen by its organizer.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub transaction: api::Transaction,
    pub review: Option<api::Review>,
}
