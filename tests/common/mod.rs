use constcat::concat;
use event_order::api;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:3000";

/// Event seeded in the past, with an approved transaction of alice.
pub const PAST_EVENT_ID: u128 = 0x64;
pub const PAST_TRANSACTION_ID: u128 = 0x12c;

pub struct Client {
    inner: reqwest::Client,
    pub auth_token: Option<String>,
}

impl Client {
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
            auth_token: None,
        }
    }

    pub async fn auth(mut self, login: &str, password: &str) -> Self {
        const URL: &str = concat!(BASE_URL, "/auth");

        self.auth_token = Some(
            self.inner
                .post(URL)
                .json(&json!({
                    "login": login,
                    "password": password,
                }))
                .send()
                .await
                .expect("failed to send a request")
                .error_for_status()
                .expect("wrong status code")
                .text()
                .await
                .expect("failed to get a response"),
        );

        self
    }

    pub async fn user(&self) -> Result<api::User, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/user");

        send(self.authorized(self.inner.get(URL))).await
    }

    pub async fn edit_user(
        &self,
        user: &Value,
    ) -> Result<api::User, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/user");

        send(self.authorized(self.inner.patch(URL).json(user))).await
    }

    pub async fn get_events(
        &self,
        keyword: &str,
        offset: usize,
        limit: usize,
    ) -> Result<api::event::List, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/event");

        let req = self.inner.get(URL).query(&[
            ("keyword", keyword.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ]);
        send(self.authorized(req)).await
    }

    pub async fn get_event(
        &self,
        id: api::event::Id,
    ) -> Result<api::event::Details, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/event");

        send(self.authorized(self.inner.get(format!("{URL}/{id}")))).await
    }

    pub async fn add_event(
        &self,
        event: &Value,
    ) -> Result<api::Event, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/event");

        send(self.authorized(self.inner.post(URL).json(event))).await
    }

    pub async fn edit_event(
        &self,
        id: api::event::Id,
        event: &Value,
    ) -> Result<api::Event, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/event");

        let req = self.inner.put(format!("{URL}/{id}")).json(event);
        send(self.authorized(req)).await
    }

    pub async fn purchase(
        &self,
        event_id: api::event::Id,
        ticket_type_id: api::event::TicketTypeId,
        quantity: u32,
    ) -> Result<api::Transaction, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/transaction");

        let req = self.inner.post(URL).json(&json!({
            "eventId": event_id,
            "ticketTypeId": ticket_type_id,
            "quantity": quantity,
        }));
        send(self.authorized(req)).await
    }

    pub async fn get_transactions(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<api::transaction::List, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/transaction");

        let req = self
            .inner
            .get(format!("{URL}?offset={offset}&limit={limit}"));
        send(self.authorized(req)).await
    }

    pub async fn get_transaction(
        &self,
        id: api::transaction::Id,
    ) -> Result<api::Transaction, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/transaction");

        send(self.authorized(self.inner.get(format!("{URL}/{id}")))).await
    }

    pub async fn upload_payment_proof(
        &self,
        id: api::transaction::Id,
        proof: &str,
    ) -> Result<api::Transaction, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/transaction");

        let req = self
            .inner
            .post(format!("{URL}/{id}/proof"))
            .json(&json!({ "proof": proof }));
        send(self.authorized(req)).await
    }

    pub async fn approve_transaction(
        &self,
        id: api::transaction::Id,
    ) -> Result<api::transaction::Decided, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/transaction");

        let req = self.inner.post(format!("{URL}/{id}/approve"));
        send(self.authorized(req)).await
    }

    pub async fn reject_transaction(
        &self,
        id: api::transaction::Id,
    ) -> Result<api::transaction::Decided, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/transaction");

        let req = self.inner.post(format!("{URL}/{id}/reject"));
        send(self.authorized(req)).await
    }

    pub async fn submit_review(
        &self,
        id: api::transaction::Id,
        rating: u8,
        comment: &str,
    ) -> Result<api::Review, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/transaction");

        let req = self
            .inner
            .post(format!("{URL}/{id}/review"))
            .json(&json!({
                "rating": rating,
                "comment": comment,
            }));
        send(self.authorized(req)).await
    }

    pub async fn get_organizer_events(
        &self,
    ) -> Result<api::event::List, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/organizer/event");

        send(self.authorized(self.inner.get(URL))).await
    }

    pub async fn get_attendees(
        &self,
        id: api::event::Id,
    ) -> Result<Vec<api::event::Attendee>, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/organizer/event");

        let req = self.inner.get(format!("{URL}/{id}/attendees"));
        send(self.authorized(req)).await
    }

    pub async fn get_organizer_transactions(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<api::transaction::List, StatusCode> {
        const URL: &str = concat!(BASE_URL, "/organizer/transaction");

        let req = self
            .inner
            .get(format!("{URL}?offset={offset}&limit={limit}"));
        send(self.authorized(req)).await
    }

    pub async fn get_tickets_by_category(
        &self,
    ) -> Result<Vec<api::statistic::CategoryTickets>, StatusCode> {
        const URL: &str =
            concat!(BASE_URL, "/organizer/statistic/ticket-by-category");

        send(self.authorized(self.inner.get(URL))).await
    }

    pub async fn get_monthly_revenue(
        &self,
        year: i32,
    ) -> Result<api::statistic::MonthlyRevenue, StatusCode> {
        const URL: &str =
            concat!(BASE_URL, "/organizer/statistic/monthly-revenue");

        send(self.authorized(self.inner.get(format!("{URL}?year={year}"))))
            .await
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => {
                req.header("Authorization", format!("Bearer {token}"))
            }
            None => req,
        }
    }
}

async fn send<T: DeserializeOwned>(
    req: RequestBuilder,
) -> Result<T, StatusCode> {
    Ok(req
        .send()
        .await
        .expect("failed to send a request")
        .error_for_status()
        .map_err(|e| e.status().expect("status error"))?
        .json::<T>()
        .await
        .expect("failed to get a response"))
}

/// Event on sale in the future with a single ticket type of `quota` tickets.
pub fn upcoming_event(name: &str, quota: u32) -> Value {
    json!({
        "name": name,
        "description": "Open air stage",
        "category": "Music",
        "location": "City Park",
        "startDate": "2030-07-01T18:00:00Z",
        "endDate": "2030-07-01T23:00:00Z",
        "ticketTypes": [{
            "name": "Regular",
            "price": 100000.0,
            "quota": quota,
        }],
    })
}

/// Creates an upcoming event as bob, returning it with its only ticket type.
pub async fn add_upcoming_event(
    name: &str,
    quota: u32,
) -> (api::Event, api::event::TicketType) {
    let event = Client::new()
        .auth("bob", "password")
        .await
        .add_event(&upcoming_event(name, quota))
        .await
        .unwrap();
    let ticket_type = event.ticket_types[0].clone();
    (event, ticket_type)
}
