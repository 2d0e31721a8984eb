mod handlers;

use std::{error::Error, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use derive_more::From;
use jsonwebtoken::{
    decode, encode, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{fs, net, task};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use event_order::{api, db, lifecycle, sweeper, Config, Session};

use self::handlers::{event, organizer, transaction};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let (db_client, db_connection) = db::connect(config.db).await?;

    task::spawn(async move {
        if let Err(e) = db_connection.await {
            panic!("database connection failed: {e}");
        }
    });

    let db_client = Arc::new(db_client);
    let state = Arc::new(AppState {
        lifecycle: lifecycle::Manager::new(
            db_client.clone(),
            config.transaction.payment_window,
        ),
        db_client,
        jwt_expiration_time: config.jwt.expiration_time,
        jwt_decoding_key: DecodingKey::from_secret(
            config.jwt.secret.as_bytes(),
        ),
        jwt_encoding_key: EncodingKey::from_secret(
            config.jwt.secret.as_bytes(),
        ),
    });

    task::spawn({
        let state = state.clone();
        let period = config.transaction.sweep_interval;
        async move { sweeper::run(&state.lifecycle, period).await }
    });

    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::PATCH,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &config.http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let app = Router::new()
        .route("/auth", post(auth))
        .route("/user", get(get_user).patch(edit_user))
        .route("/event", get(event::list_events).post(event::add_event))
        .route("/event/:id", get(event::get_event).put(event::edit_event))
        .route(
            "/transaction",
            get(transaction::list_transactions)
                .post(transaction::submit_purchase),
        )
        .route("/transaction/:id", get(transaction::get_transaction))
        .route(
            "/transaction/:id/proof",
            post(transaction::upload_payment_proof),
        )
        .route(
            "/transaction/:id/approve",
            post(transaction::approve_transaction),
        )
        .route(
            "/transaction/:id/reject",
            post(transaction::reject_transaction),
        )
        .route(
            "/transaction/:id/review",
            post(transaction::submit_review),
        )
        .route("/organizer/event", get(organizer::list_events))
        .route(
            "/organizer/event/:id/attendees",
            get(organizer::list_attendees),
        )
        .route("/organizer/transaction", get(organizer::list_transactions))
        .route(
            "/organizer/statistic/ticket-by-category",
            get(organizer::get_tickets_by_category),
        )
        .route(
            "/organizer/statistic/monthly-revenue",
            get(organizer::get_monthly_revenue),
        )
        .layer(cors)
        .with_state(state);

    tracing::info!(addr = %config.http.server.addr, "listening");

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct AuthInput {
    login: String,
    password: String,
}

async fn auth(
    State(state): State<SharedAppState>,
    Json(AuthInput { login, password }): Json<AuthInput>,
) -> Result<String, AuthError> {
    use AuthError as E;

    let password_hash = api::user::PasswordHash::new(&password);

    let user = state
        .db_client
        .get_user_by_login(&login)
        .await?
        .filter(|u| u.password_hash == password_hash)
        .ok_or(E::WrongLoginOrPassword)?;

    let expires_at = OffsetDateTime::now_utc() + state.jwt_expiration_time;
    encode(
        &Header::default(),
        &AuthClaims {
            user_id: user.id,
            role: user.role,
            exp: expires_at.unix_timestamp(),
        },
        &state.jwt_encoding_key,
    )
    .map_err(|_| E::InvalidToken)
}

#[derive(Debug, From)]
pub enum AuthError {
    #[from]
    DbError(db::Error),
    InvalidToken,
    WrongLoginOrPassword,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => {
                tracing::error!("failed to authenticate: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::WrongLoginOrPassword => StatusCode::FORBIDDEN,
        }
        .into_response()
    }
}

async fn get_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::User>, GetUserError> {
    use GetUserError as E;

    let my = state
        .db_client
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(api::User::from(&my)))
}

#[derive(Debug, From)]
pub enum GetUserError {
    #[from]
    DbError(db::Error),
    UserNotFound,
}

impl IntoResponse for GetUserError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => {
                tracing::error!("failed to get user: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::UserNotFound => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}

#[derive(Deserialize)]
struct EditUserInput {
    name: Option<String>,
    password: Option<String>,
}

async fn edit_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(EditUserInput { name, password }): Json<EditUserInput>,
) -> Result<Json<api::User>, EditUserError> {
    use EditUserError as E;

    let name = name.map(|n| n.trim().to_string());
    if name.as_deref().is_some_and(str::is_empty)
        || password.as_deref().is_some_and(str::is_empty)
    {
        return Err(E::InvalidUser);
    }
    let password_hash = password.as_deref().map(api::user::PasswordHash::new);

    let my = state
        .db_client
        .update_user(
            auth_claims.user_id,
            name.as_deref(),
            password_hash.as_ref(),
        )
        .await?
        .ok_or(E::UserNotFound)?;

    tracing::info!(user = %my.id, "profile edited");

    Ok(Json(api::User::from(&my)))
}

#[derive(Debug, From)]
pub enum EditUserError {
    #[from]
    DbError(db::Error),
    InvalidUser,
    UserNotFound,
}

impl IntoResponse for EditUserError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(e) => {
                tracing::error!("failed to edit user: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidUser => StatusCode::BAD_REQUEST,
            Self::UserNotFound => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}

type SharedAppState = Arc<AppState>;

struct AppState {
    db_client: Arc<db::Client>,

    lifecycle: lifecycle::Manager<Arc<db::Client>>,

    jwt_expiration_time: Duration,

    jwt_decoding_key: DecodingKey,

    jwt_encoding_key: EncodingKey,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AuthClaims {
    user_id: api::user::Id,
    role: api::user::Role,
    exp: i64,
}

impl AuthClaims {
    fn session(&self) -> Session {
        Session::new(self.user_id, self.role)
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::InvalidToken)?;
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }
}
