pub mod event;
pub mod organizer;
pub mod transaction;

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use derive_more::From;
use itertools::Itertools as _;
use serde::Deserialize;
use time::OffsetDateTime;

use event_order::{api, db, lifecycle};

const DEFAULT_PAGE_LIMIT: u32 = 20;

const MAX_PAGE_LIMIT: u32 = 100;

/// Page of a listing. Offsets beyond `u32` are rejected on extraction and
/// limits are clamped to [`MAX_PAGE_LIMIT`].
#[derive(Deserialize)]
pub struct PageInput {
    #[serde(default)]
    offset: u32,
    #[serde(default = "default_page_limit")]
    limit: u32,
}

impl PageInput {
    fn offset(&self) -> usize {
        self.offset as usize
    }

    fn limit(&self) -> usize {
        self.limit.min(MAX_PAGE_LIMIT) as usize
    }
}

fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

/// Failure to assemble API values from stored rows.
#[derive(Debug, From)]
pub enum LoadError {
    #[from]
    DbError(db::Error),
    EventNotFound(api::event::Id),
    TicketTypeNotFound(api::event::TicketTypeId),
    TransactionNotFound(api::transaction::Id),
    UserNotFound(api::user::Id),
}

impl IntoResponse for LoadError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => tracing::error!("database failure: {e}"),
            Self::EventNotFound(id) => {
                tracing::error!(event = %id, "dangling event reference");
            }
            Self::TicketTypeNotFound(id) => {
                tracing::error!(
                    ticket_type = %id,
                    "dangling ticket type reference",
                );
            }
            Self::TransactionNotFound(id) => {
                tracing::error!(transaction = %id, "transaction vanished");
            }
            Self::UserNotFound(id) => {
                tracing::error!(user = %id, "dangling user reference");
            }
        }
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// Loads organizers and ticket types of `events`.
pub async fn load_events(
    db_client: &db::Client,
    events: Vec<db::Event>,
) -> Result<Vec<api::Event>, LoadError> {
    use LoadError as E;

    let event_ids = events.iter().map(|e| e.id).collect::<Vec<_>>();
    let user_ids = events.iter().map(|e| e.organizer).unique().collect_vec();

    let (ticket_types, users) = tokio::try_join!(
        db_client.get_ticket_types_by_events(&event_ids),
        db_client.get_users_by_ids(&user_ids),
    )?;

    events
        .into_iter()
        .map(|event| {
            let organizer = users
                .get(&event.organizer)
                .ok_or(E::UserNotFound(event.organizer))?;
            Ok(api::Event::new(
                event,
                api::User::from(organizer),
                &ticket_types,
            ))
        })
        .collect()
}

/// Loads buyers, events and ticket types of `transactions`, and evaluates
/// whether each can be reviewed at `now`.
pub async fn load_transactions(
    db_client: &db::Client,
    transactions: Vec<db::Transaction>,
    now: OffsetDateTime,
) -> Result<Vec<api::Transaction>, LoadError> {
    use LoadError as E;

    let user_ids = transactions.iter().map(|t| t.buyer).unique().collect_vec();
    let event_ids = transactions.iter().map(|t| t.event).unique().collect_vec();

    let (users, events, ticket_types) = tokio::try_join!(
        db_client.get_users_by_ids(&user_ids),
        db_client.get_events_by_ids(&event_ids),
        db_client.get_ticket_types_by_events(&event_ids),
    )?;
    let events = events
        .into_iter()
        .map(|e| (e.id, e))
        .collect::<HashMap<_, _>>();
    let ticket_types = ticket_types
        .into_iter()
        .map(|t| (t.id, t))
        .collect::<HashMap<_, _>>();

    transactions
        .into_iter()
        .map(|transaction| {
            let buyer = users
                .get(&transaction.buyer)
                .ok_or(E::UserNotFound(transaction.buyer))?;
            let event = events
                .get(&transaction.event)
                .ok_or(E::EventNotFound(transaction.event))?;
            let ticket_type = ticket_types
                .get(&transaction.ticket_type)
                .ok_or(E::TicketTypeNotFound(transaction.ticket_type))?;
            let can_review = lifecycle::can_review(&transaction, event, now);
            Ok(api::Transaction::new(
                transaction,
                api::User::from(buyer),
                event,
                ticket_type,
                can_review,
            ))
        })
        .collect()
}
