use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use futures::{future::OptionFuture, FutureExt as _};
use serde::Deserialize;
use time::OffsetDateTime;

use event_order::{api, db, lifecycle};

use crate::{AuthClaims, SharedAppState};

use super::{load_transactions, LoadError, PageInput};

/// Response for a refused or failed lifecycle operation.
#[derive(Debug, From)]
pub enum LifecycleError {
    #[from]
    Lifecycle(lifecycle::Error<db::Error>),
    #[from]
    Load(LoadError),
}

impl IntoResponse for LifecycleError {
    fn into_response(self) -> Response {
        use lifecycle::Error as E;

        let e = match self {
            Self::Lifecycle(e) => e,
            Self::Load(e) => return e.into_response(),
        };
        let status = match &e {
            E::InsufficientQuota { .. }
            | E::InvalidState { .. }
            | E::AlreadyReviewed(_) => StatusCode::CONFLICT,
            E::NotFound(_) => StatusCode::NOT_FOUND,
            E::AuthorizationDenied => StatusCode::FORBIDDEN,
            E::InvalidQuantity
            | E::InvalidRating
            | E::EmptyProof
            | E::SalesClosed => StatusCode::BAD_REQUEST,
            E::Store(e) => {
                tracing::error!("transaction store failure: {e}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        (status, e.to_string()).into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPurchaseInput {
    event_id: api::event::Id,
    ticket_type_id: api::event::TicketTypeId,
    quantity: u32,
}

pub async fn submit_purchase(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(SubmitPurchaseInput {
        event_id,
        ticket_type_id,
        quantity,
    }): Json<SubmitPurchaseInput>,
) -> Result<Json<api::Transaction>, LifecycleError> {
    let now = OffsetDateTime::now_utc();

    let transaction = state
        .lifecycle
        .submit_purchase(
            &auth_claims.session(),
            lifecycle::Purchase {
                event: event_id,
                ticket_type: ticket_type_id,
                quantity,
            },
            now,
        )
        .await?;

    Ok(Json(render(&state, transaction, now).await?))
}

#[derive(Deserialize)]
pub struct UploadPaymentProofInput {
    proof: String,
}

pub async fn upload_payment_proof(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::transaction::Id>,
    Json(UploadPaymentProofInput { proof }): Json<UploadPaymentProofInput>,
) -> Result<Json<api::Transaction>, LifecycleError> {
    let now = OffsetDateTime::now_utc();

    let transaction = state
        .lifecycle
        .upload_payment_proof(&auth_claims.session(), id, &proof, now)
        .await?;

    Ok(Json(render(&state, transaction, now).await?))
}

pub async fn approve_transaction(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::transaction::Id>,
) -> Result<Json<api::transaction::Decided>, LifecycleError> {
    let now = OffsetDateTime::now_utc();

    let decided = state
        .lifecycle
        .approve(&auth_claims.session(), id, now)
        .await?;

    render_decided(&state, decided, now).await
}

pub async fn reject_transaction(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::transaction::Id>,
) -> Result<Json<api::transaction::Decided>, LifecycleError> {
    let now = OffsetDateTime::now_utc();

    let decided = state
        .lifecycle
        .reject(&auth_claims.session(), id, now)
        .await?;

    render_decided(&state, decided, now).await
}

#[derive(Deserialize)]
pub struct SubmitReviewInput {
    rating: u8,
    #[serde(default)]
    comment: String,
}

pub async fn submit_review(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::transaction::Id>,
    Json(SubmitReviewInput { rating, comment }): Json<SubmitReviewInput>,
) -> Result<Json<api::Review>, LifecycleError> {
    let review = state
        .lifecycle
        .submit_review(
            &auth_claims.session(),
            id,
            rating,
            comment,
            OffsetDateTime::now_utc(),
        )
        .await?;

    Ok(Json(api::Review::from(review)))
}

pub async fn list_transactions(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Query(page): Query<PageInput>,
) -> Result<Json<api::transaction::List>, ListTransactionsError> {
    let db_client = &state.db_client;
    let buyer = auth_claims.user_id;

    let page_fut = db_client.get_transactions_page_by_buyer(
        buyer,
        page.offset(),
        page.limit(),
    );
    let total_count_fut = db_client.count_transactions_by_buyer(buyer);
    let (page, total_count) = tokio::try_join!(page_fut, total_count_fut)?;

    let transactions =
        load_transactions(db_client, page, OffsetDateTime::now_utc()).await?;

    Ok(Json(api::transaction::List {
        transactions,
        total_count,
    }))
}

#[derive(Debug, From)]
pub enum ListTransactionsError {
    #[from]
    DbError(db::Error),
    #[from]
    Load(LoadError),
}

impl IntoResponse for ListTransactionsError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => LoadError::DbError(e).into_response(),
            Self::Load(e) => e.into_response(),
        }
    }
}

pub async fn get_transaction(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::transaction::Id>,
) -> Result<Json<api::Transaction>, GetTransactionError> {
    use GetTransactionError as E;

    let db_client = &state.db_client;

    let transaction = db_client
        .get_transaction_by_id(id)
        .await?
        .ok_or(E::TransactionNotFound)?;
    // Someone other than the buyer must be the organizer of the event.
    let event = OptionFuture::from(
        (transaction.buyer != auth_claims.user_id)
            .then(|| db_client.get_event_by_id(transaction.event)),
    )
    .map(Option::transpose)
    .await?;
    if let Some(event) = event {
        if event.map_or(true, |e| e.organizer != auth_claims.user_id) {
            return Err(E::TransactionNotFound);
        }
    }

    let now = OffsetDateTime::now_utc();
    let transaction = load_transactions(db_client, vec![transaction], now)
        .await?
        .pop()
        .ok_or(E::TransactionNotFound)?;

    Ok(Json(transaction))
}

#[derive(Debug, From)]
pub enum GetTransactionError {
    #[from]
    DbError(db::Error),
    #[from]
    Load(LoadError),
    TransactionNotFound,
}

impl IntoResponse for GetTransactionError {
    fn into_response(self) -> Response {
        match self {
            Self::TransactionNotFound => StatusCode::NOT_FOUND.into_response(),
            Self::DbError(e) => LoadError::DbError(e).into_response(),
            Self::Load(e) => e.into_response(),
        }
    }
}

async fn render(
    state: &SharedAppState,
    transaction: db::Transaction,
    now: OffsetDateTime,
) -> Result<api::Transaction, LoadError> {
    let id = transaction.id;
    load_transactions(&state.db_client, vec![transaction], now)
        .await?
        .pop()
        .ok_or(LoadError::TransactionNotFound(id))
}

async fn render_decided(
    state: &SharedAppState,
    lifecycle::Decided {
        transaction,
        ticket_type,
    }: lifecycle::Decided,
    now: OffsetDateTime,
) -> Result<Json<api::transaction::Decided>, LifecycleError> {
    Ok(Json(api::transaction::Decided {
        transaction: render(state, transaction, now).await?,
        ticket_type: api::event::TicketType::from(&ticket_type),
    }))
}
