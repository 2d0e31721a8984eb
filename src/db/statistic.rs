use tokio_postgres::Error;

use super::{transaction::Status, user, Client};

/// Tickets sold for events of one category.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryTickets {
    pub category: String,
    pub count: u64,
}

impl Client {
    /// Approved ticket quantities of the organizer's events, grouped by event
    /// category, biggest first.
    pub async fn get_tickets_by_category(
        &self,
        organizer: user::Id,
    ) -> Result<Vec<CategoryTickets>, Error> {
        const SQL: &str = "\
            SELECT e.category AS category, \
                   SUM(t.quantity)::INT8 AS count \
            FROM transactions t \
            JOIN events e ON e.id = t.event_id \
            WHERE e.organizer_id = $1 \
              AND t.status = $2 \
            GROUP BY e.category \
            ORDER BY count DESC, \
                     category ASC";
        Ok(self
            .0
            .query(SQL, &[&organizer, &Status::Approved])
            .await?
            .into_iter()
            .map(|row| CategoryTickets {
                category: row.get("category"),
                count: row.get::<_, i64>("count") as u64,
            })
            .collect())
    }

    /// Approved revenue of the organizer's events for each month of `year`,
    /// January first. Months without revenue are `0`.
    pub async fn get_monthly_revenue(
        &self,
        organizer: user::Id,
        year: i32,
    ) -> Result<[f64; 12], Error> {
        const SQL: &str = "\
            SELECT EXTRACT(MONTH FROM t.created_at)::INT4 AS month, \
                   SUM(t.total_price)::FLOAT8 AS revenue \
            FROM transactions t \
            JOIN events e ON e.id = t.event_id \
            WHERE e.organizer_id = $1 \
              AND t.status = $2 \
              AND EXTRACT(YEAR FROM t.created_at)::INT4 = $3 \
            GROUP BY month";

        let mut revenue = [0.0; 12];
        for row in self
            .0
            .query(SQL, &[&organizer, &Status::Approved, &year])
            .await?
        {
            let month = row.get::<_, i32>("month");
            if let Some(slot) = usize::try_from(month - 1)
                .ok()
                .and_then(|i| revenue.get_mut(i))
            {
                *slot = row.get("revenue");
            }
        }
        Ok(revenue)
    }
}
