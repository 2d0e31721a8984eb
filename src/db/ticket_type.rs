use time::OffsetDateTime;
use tokio_postgres::{Error, Row};

use super::{event, uuid_id, Client};

#[derive(Clone, Debug, PartialEq)]
pub struct TicketType {
    pub id: Id,
    pub event: event::Id,
    pub name: String,
    pub price: f64,

    /// Maximum number of tickets that can ever be sold.
    pub quota: u32,

    /// Part of the quota not reserved by awaiting-payment transactions nor
    /// sold by approved ones.
    pub remaining: u32,

    pub sales_start: Option<OffsetDateTime>,
    pub sales_end: Option<OffsetDateTime>,
}

uuid_id!(Id);

impl TicketType {
    /// Whether tickets of this type can be bought at `now`.
    pub fn is_on_sale(&self, now: OffsetDateTime) -> bool {
        self.sales_start.map_or(true, |start| now >= start)
            && self.sales_end.map_or(true, |end| now <= end)
    }
}

impl From<&Row> for TicketType {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            event: row.get("event_id"),
            name: row.get("name"),
            price: row.get("price"),
            quota: row.get::<_, i32>("quota") as u32,
            remaining: row.get::<_, i32>("remaining") as u32,
            sales_start: row.get("sales_start"),
            sales_end: row.get("sales_end"),
        }
    }
}

impl Client {
    pub async fn get_ticket_type_by_id(
        &self,
        id: Id,
    ) -> Result<Option<TicketType>, Error> {
        const SQL: &str = "\
            SELECT id, event_id, name, price, quota, remaining, \
                   sales_start, sales_end \
            FROM ticket_types \
            WHERE id = $1";
        Ok(self
            .0
            .query_opt(SQL, &[&id])
            .await?
            .as_ref()
            .map(TicketType::from))
    }

    pub async fn get_ticket_types_by_events(
        &self,
        events: &[event::Id],
    ) -> Result<Vec<TicketType>, Error> {
        const SQL: &str = "\
            SELECT id, event_id, name, price, quota, remaining, \
                   sales_start, sales_end \
            FROM ticket_types \
            WHERE event_id IN (SELECT unnest($1::UUID[])) \
            ORDER BY price ASC, \
                     name ASC";
        Ok(self
            .0
            .query(SQL, &[&events])
            .await?
            .iter()
            .map(TicketType::from)
            .collect())
    }
}
