use time::OffsetDateTime;
use tokio_postgres::{Error, Row};

use super::{user, uuid_id, Client, TicketType};

#[derive(Clone, Debug)]
pub struct Event {
    pub id: Id,
    pub organizer: user::Id,
    pub name: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub start_date: OffsetDateTime,
    pub end_date: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

uuid_id!(Id);

impl Event {
    /// Whether the event has begun at `now`. Started events can't be edited.
    pub fn has_started(&self, now: OffsetDateTime) -> bool {
        now >= self.start_date
    }

    /// Whether the event is over at `now`.
    pub fn has_ended(&self, now: OffsetDateTime) -> bool {
        now > self.end_date
    }
}

impl From<&Row> for Event {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            organizer: row.get("organizer_id"),
            name: row.get("name"),
            description: row.get("description"),
            category: row.get("category"),
            location: row.get("location"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            created_at: row.get("created_at"),
        }
    }
}

const COLUMNS: &str = "id, organizer_id, name, description, category, \
                       location, start_date, end_date, created_at";

impl Client {
    pub async fn get_event_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Event>, Error> {
        let sql = format!("SELECT {COLUMNS} FROM events WHERE id = $1");
        Ok(self.0.query_opt(&sql, &[&id]).await?.as_ref().map(Event::from))
    }

    pub async fn get_events_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<Vec<Event>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE id IN (SELECT unnest($1::UUID[]))",
        );
        Ok(self
            .0
            .query(&sql, &[&ids])
            .await?
            .iter()
            .map(Event::from)
            .collect())
    }

    /// Searches events whose name, description, category or location
    /// contains `keyword`, case-insensitively. An empty keyword matches every
    /// event.
    pub async fn search_events_page(
        &self,
        keyword: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Event>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE name ILIKE $1 \
                OR description ILIKE $1 \
                OR category ILIKE $1 \
                OR location ILIKE $1 \
             ORDER BY start_date DESC, \
                      id DESC \
             OFFSET $2 LIMIT $3",
        );
        let pattern = like_pattern(keyword);
        let offset = offset as i64;
        let limit = limit as i64;
        Ok(self
            .0
            .query(&sql, &[&pattern, &offset, &limit])
            .await?
            .iter()
            .map(Event::from)
            .collect())
    }

    pub async fn count_events(&self, keyword: &str) -> Result<usize, Error> {
        const SQL: &str = "\
            SELECT COUNT(*) FROM events \
            WHERE name ILIKE $1 \
               OR description ILIKE $1 \
               OR category ILIKE $1 \
               OR location ILIKE $1";
        let pattern = like_pattern(keyword);
        let count = self.0.query_one(SQL, &[&pattern]).await?.get::<_, i64>(0);
        Ok(count as usize)
    }

    pub async fn get_events_by_organizer(
        &self,
        organizer: user::Id,
    ) -> Result<Vec<Event>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE organizer_id = $1 \
             ORDER BY start_date DESC, \
                      id DESC",
        );
        Ok(self
            .0
            .query(&sql, &[&organizer])
            .await?
            .iter()
            .map(Event::from)
            .collect())
    }

    /// Replaces the descriptive fields of the organizer's event if it hasn't
    /// started at `now`.
    ///
    /// Returns `None` if there is no such event.
    pub async fn update_event(
        &self,
        event: &Event,
        now: OffsetDateTime,
    ) -> Result<Option<Event>, Error> {
        let sql = format!(
            "UPDATE events \
             SET name = $3, \
                 description = $4, \
                 category = $5, \
                 location = $6, \
                 start_date = $7, \
                 end_date = $8 \
             WHERE id = $1 \
               AND organizer_id = $2 \
               AND start_date > $9 \
             RETURNING {COLUMNS}",
        );
        Ok(self
            .0
            .query_opt(
                &sql,
                &[
                    &event.id,
                    &event.organizer,
                    &event.name,
                    &event.description,
                    &event.category,
                    &event.location,
                    &event.start_date,
                    &event.end_date,
                    &now,
                ],
            )
            .await?
            .as_ref()
            .map(Event::from))
    }

    /// Inserts the event together with its ticket types in one statement, so
    /// an event never exists without them.
    pub async fn write_event(
        &self,
        event: &Event,
        ticket_types: &[TicketType],
    ) -> Result<(), Error> {
        const SQL: &str = "\
            WITH event AS ( \
                INSERT INTO events (id, organizer_id, name, description, \
                                    category, location, start_date, \
                                    end_date, created_at) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                RETURNING id \
            ) \
            INSERT INTO ticket_types (id, event_id, name, price, quota, \
                                      remaining, sales_start, sales_end) \
            SELECT t.id, event.id, t.name, t.price, t.quota, t.remaining, \
                   t.sales_start, t.sales_end \
            FROM event, \
                 unnest($10::UUID[], $11::TEXT[], $12::FLOAT8[], \
                        $13::INT4[], $14::INT4[], $15::TIMESTAMPTZ[], \
                        $16::TIMESTAMPTZ[]) \
                 AS t(id, name, price, quota, remaining, sales_start, \
                      sales_end)";

        let ids = ticket_types.iter().map(|t| t.id).collect::<Vec<_>>();
        let names = ticket_types.iter().map(|t| &t.name).collect::<Vec<_>>();
        let prices = ticket_types.iter().map(|t| t.price).collect::<Vec<_>>();
        let quotas = ticket_types
            .iter()
            .map(|t| t.quota as i32)
            .collect::<Vec<_>>();
        let remaining = ticket_types
            .iter()
            .map(|t| t.remaining as i32)
            .collect::<Vec<_>>();
        let sales_starts = ticket_types
            .iter()
            .map(|t| t.sales_start)
            .collect::<Vec<_>>();
        let sales_ends = ticket_types
            .iter()
            .map(|t| t.sales_end)
            .collect::<Vec<_>>();

        self.0
            .execute(
                SQL,
                &[
                    &event.id,
                    &event.organizer,
                    &event.name,
                    &event.description,
                    &event.category,
                    &event.location,
                    &event.start_date,
                    &event.end_date,
                    &event.created_at,
                    &ids,
                    &names,
                    &prices,
                    &quotas,
                    &remaining,
                    &sales_starts,
                    &sales_ends,
                ],
            )
            .await
            .map(drop)
    }
}

fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
