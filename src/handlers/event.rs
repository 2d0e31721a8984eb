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

use super::{load_events, LoadError, PageInput};

/// Quotas are stored as `INT4`.
const MAX_QUOTA: u32 = i32::MAX as u32;

#[derive(Deserialize)]
pub struct ListEventsInput {
    #[serde(default)]
    keyword: String,
}

pub async fn list_events(
    State(state): State<SharedAppState>,
    Query(ListEventsInput { keyword }): Query<ListEventsInput>,
    Query(page): Query<PageInput>,
) -> Result<Json<api::event::List>, ListEventsError> {
    let db_client = &state.db_client;

    let page_fut =
        db_client.search_events_page(&keyword, page.offset(), page.limit());
    let total_count_fut = db_client.count_events(&keyword);
    let (page, total_count) = tokio::try_join!(page_fut, total_count_fut)?;

    let events = load_events(db_client, page).await?;

    Ok(Json(api::event::List {
        events,
        total_count,
    }))
}

#[derive(Debug, From)]
pub enum ListEventsError {
    #[from]
    DbError(db::Error),
    #[from]
    Load(LoadError),
}

impl IntoResponse for ListEventsError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => LoadError::DbError(e).into_response(),
            Self::Load(e) => e.into_response(),
        }
    }
}

pub async fn get_event(
    State(state): State<SharedAppState>,
    Path(id): Path<api::event::Id>,
) -> Result<Json<api::event::Details>, GetEventError> {
    use GetEventError as E;

    let db_client = &state.db_client;

    let event = db_client
        .get_event_by_id(id)
        .await?
        .ok_or(E::EventNotFound)?;
    let reviews = db_client.get_reviews_by_event(id).await?;

    let event = load_events(db_client, vec![event])
        .await?
        .pop()
        .ok_or(E::EventNotFound)?;

    Ok(Json(api::event::Details {
        event,
        reviews: reviews.into_iter().map(api::Review::from).collect(),
    }))
}

#[derive(Debug, From)]
pub enum GetEventError {
    #[from]
    DbError(db::Error),
    #[from]
    Load(LoadError),
    EventNotFound,
}

impl IntoResponse for GetEventError {
    fn into_response(self) -> Response {
        match self {
            Self::EventNotFound => StatusCode::NOT_FOUND.into_response(),
            Self::DbError(e) => LoadError::DbError(e).into_response(),
            Self::Load(e) => e.into_response(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEventInput {
    name: String,
    description: String,
    category: String,
    location: String,
    #[serde(with = "time::serde::rfc3339")]
    start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    end_date: OffsetDateTime,
    ticket_types: Vec<AddTicketTypeInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTicketTypeInput {
    name: String,
    price: f64,
    quota: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    sales_start: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    sales_end: Option<OffsetDateTime>,
}

pub async fn add_event(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<AddEventInput>,
) -> Result<Json<api::Event>, AddEventError> {
    use AddEventError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;
    if my.role != db::user::Role::EventOrganizer {
        return Err(E::EventCannotBeCreated);
    }

    if input.name.trim().is_empty()
        || input.end_date < input.start_date
        || input.ticket_types.is_empty()
    {
        return Err(E::InvalidEvent);
    }
    for t in &input.ticket_types {
        let window_is_valid = match (t.sales_start, t.sales_end) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        };
        if t.name.trim().is_empty()
            || t.quota == 0
            || t.quota > MAX_QUOTA
            || t.price < 0.0
            || !t.price.is_finite()
            || !window_is_valid
        {
            return Err(E::InvalidTicketType);
        }
    }

    let event_id = db::event::Id::new();
    let ticket_types = input
        .ticket_types
        .into_iter()
        .map(|t| db::TicketType {
            id: db::ticket_type::Id::new(),
            event: event_id,
            name: t.name,
            price: t.price,
            quota: t.quota,
            remaining: t.quota,
            sales_start: t.sales_start,
            sales_end: t.sales_end,
        })
        .collect::<Vec<_>>();
    let event = db::Event {
        id: event_id,
        organizer: my.id,
        name: input.name,
        description: input.description,
        category: input.category,
        location: input.location,
        start_date: input.start_date,
        end_date: input.end_date,
        created_at: OffsetDateTime::now_utc(),
    };

    state.db_client.write_event(&event, &ticket_types).await?;

    tracing::info!(event = %event.id, organizer = %my.id, "event created");

    Ok(Json(api::Event::new(
        event,
        api::User::from(&my),
        &ticket_types,
    )))
}

#[derive(Debug, From)]
pub enum AddEventError {
    #[from]
    DbError(db::Error),
    EventCannotBeCreated,
    InvalidEvent,
    InvalidTicketType,
    UserNotFound,
}

impl IntoResponse for AddEventError {
    fn into_response(self) -> Response {
        match self {
            Self::EventCannotBeCreated => StatusCode::FORBIDDEN,
            Self::InvalidEvent | Self::InvalidTicketType => {
                StatusCode::BAD_REQUEST
            }
            Self::DbError(e) => {
                tracing::error!("failed to create event: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::UserNotFound => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditEventInput {
    name: String,
    description: String,
    category: String,
    location: String,
    #[serde(with = "time::serde::rfc3339")]
    start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    end_date: OffsetDateTime,
}

pub async fn edit_event(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::event::Id>,
    Json(input): Json<EditEventInput>,
) -> Result<Json<api::Event>, EditEventError> {
    use EditEventError as E;

    let db_client = &state.db_client;
    let now = OffsetDateTime::now_utc();

    let event = db_client
        .get_event_by_id(id)
        .await?
        .ok_or(E::EventNotFound)?;
    if event.organizer != auth_claims.user_id {
        return Err(E::EventCannotBeEdited);
    }
    if event.has_started(now) {
        return Err(E::EventStarted);
    }
    if input.name.trim().is_empty() || input.end_date < input.start_date {
        return Err(E::InvalidEvent);
    }

    let edited = db::Event {
        name: input.name,
        description: input.description,
        category: input.category,
        location: input.location,
        start_date: input.start_date,
        end_date: input.end_date,
        ..event
    };
    // The event may have started between the read and the write.
    let event = db_client
        .update_event(&edited, now)
        .await?
        .ok_or(E::EventStarted)?;

    tracing::info!(event = %event.id, "event edited");

    let event = load_events(db_client, vec![event])
        .await?
        .pop()
        .ok_or(E::EventNotFound)?;

    Ok(Json(event))
}

#[derive(Debug, From)]
pub enum EditEventError {
    #[from]
    DbError(db::Error),
    #[from]
    Load(LoadError),
    EventCannotBeEdited,
    EventNotFound,
    EventStarted,
    InvalidEvent,
}

impl IntoResponse for EditEventError {
    fn into_response(self) -> Response {
        match self {
            Self::EventCannotBeEdited => StatusCode::FORBIDDEN.into_response(),
            Self::EventNotFound => StatusCode::NOT_FOUND.into_response(),
            Self::EventStarted => StatusCode::CONFLICT.into_response(),
            Self::InvalidEvent => StatusCode::BAD_REQUEST.into_response(),
            Self::DbError(e) => LoadError::DbError(e).into_response(),
            Self::Load(e) => e.into_response(),
        }
    }
}
