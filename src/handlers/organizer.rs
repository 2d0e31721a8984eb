use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use serde::Deserialize;
use time::OffsetDateTime;

use event_order::{api, db};

use crate::{AuthClaims, SharedAppState};

use super::{load_events, load_transactions, LoadError, PageInput};

/// Failure of an organizer dashboard request.
#[derive(Debug, From)]
pub enum OrganizerError {
    #[from]
    DbError(db::Error),
    #[from]
    Load(LoadError),
    EventNotFound,
    NotOrganizer,
}

impl IntoResponse for OrganizerError {
    fn into_response(self) -> Response {
        match self {
            Self::EventNotFound => StatusCode::NOT_FOUND.into_response(),
            Self::NotOrganizer => StatusCode::FORBIDDEN.into_response(),
            Self::DbError(e) => LoadError::DbError(e).into_response(),
            Self::Load(e) => e.into_response(),
        }
    }
}

fn organizer_id(
    auth_claims: &AuthClaims,
) -> Result<api::user::Id, OrganizerError> {
    let session = auth_claims.session();
    if !session.is_organizer() {
        return Err(OrganizerError::NotOrganizer);
    }
    Ok(session.user_id)
}

pub async fn list_events(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::event::List>, OrganizerError> {
    let organizer = organizer_id(&auth_claims)?;
    let db_client = &state.db_client;

    let events = db_client.get_events_by_organizer(organizer).await?;
    let total_count = events.len();
    let events = load_events(db_client, events).await?;

    Ok(Json(api::event::List {
        events,
        total_count,
    }))
}

/// Buyers of one of the organizer's events with their reviews.
pub async fn list_attendees(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::event::Id>,
) -> Result<Json<Vec<api::event::Attendee>>, OrganizerError> {
    use OrganizerError as E;

    let organizer = organizer_id(&auth_claims)?;
    let db_client = &state.db_client;

    let event = db_client
        .get_event_by_id(id)
        .await?
        .ok_or(E::EventNotFound)?;
    if event.organizer != organizer {
        return Err(E::NotOrganizer);
    }

    let (transactions, reviews) = tokio::try_join!(
        db_client.get_transactions_by_event(id),
        db_client.get_reviews_by_event(id),
    )?;
    let mut reviews = reviews
        .into_iter()
        .map(|r| (r.transaction, r))
        .collect::<HashMap<_, _>>();

    let transactions =
        load_transactions(db_client, transactions, OffsetDateTime::now_utc())
            .await?;

    Ok(Json(
        transactions
            .into_iter()
            .map(|transaction| api::event::Attendee {
                review: reviews
                    .remove(&transaction.id)
                    .map(api::Review::from),
                transaction,
            })
            .collect(),
    ))
}

pub async fn list_transactions(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(page): Query<PageInput>,
) -> Result<Json<api::transaction::List>, OrganizerError> {
    let organizer = organizer_id(&auth_claims)?;
    let db_client = &state.db_client;

    let page_fut = db_client.get_transactions_page_by_organizer(
        organizer,
        page.offset(),
        page.limit(),
    );
    let total_count_fut = db_client.count_transactions_by_organizer(organizer);
    let (page, total_count) = tokio::try_join!(page_fut, total_count_fut)?;

    let transactions =
        load_transactions(db_client, page, OffsetDateTime::now_utc()).await?;

    Ok(Json(api::transaction::List {
        transactions,
        total_count,
    }))
}

pub async fn get_tickets_by_category(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::statistic::CategoryTickets>>, OrganizerError> {
    let organizer = organizer_id(&auth_claims)?;

    let stats = state.db_client.get_tickets_by_category(organizer).await?;

    Ok(Json(
        stats
            .into_iter()
            .map(api::statistic::CategoryTickets::from)
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct MonthlyRevenueInput {
    year: Option<i32>,
}

pub async fn get_monthly_revenue(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(MonthlyRevenueInput { year }): Query<MonthlyRevenueInput>,
) -> Result<Json<api::statistic::MonthlyRevenue>, OrganizerError> {
    let organizer = organizer_id(&auth_claims)?;
    let year = year.unwrap_or_else(|| OffsetDateTime::now_utc().year());

    let revenue = state
        .db_client
        .get_monthly_revenue(organizer, year)
        .await?;

    Ok(Json(api::statistic::MonthlyRevenue::new(year, revenue)))
}
