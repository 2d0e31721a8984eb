use time::OffsetDateTime;
use tokio_postgres::{Error, Row};

use super::{event, transaction, user, uuid_id, Client};

#[derive(Clone, Debug, PartialEq)]
pub struct Review {
    pub id: Id,
    pub transaction: transaction::Id,
    pub event: event::Id,
    pub author: user::Id,

    /// From 1 to 5.
    pub rating: u8,

    pub comment: String,
    pub created_at: OffsetDateTime,
}

uuid_id!(Id);

impl From<&Row> for Review {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            transaction: row.get("transaction_id"),
            event: row.get("event_id"),
            author: row.get("author_id"),
            rating: row.get::<_, i16>("rating") as u8,
            comment: row.get("comment"),
            created_at: row.get("created_at"),
        }
    }
}

impl Client {
    /// Writes the review unless its transaction is already reviewed.
    ///
    /// Returns `false` if a review for the same transaction exists.
    pub async fn write_review(&self, review: &Review) -> Result<bool, Error> {
        const SQL: &str = "\
            INSERT INTO reviews (id, transaction_id, event_id, author_id, \
                                 rating, comment, created_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7) \
            ON CONFLICT (transaction_id) DO NOTHING";

        let inserted = self
            .0
            .execute(
                SQL,
                &[
                    &review.id,
                    &review.transaction,
                    &review.event,
                    &review.author,
                    &i16::from(review.rating),
                    &review.comment,
                    &review.created_at,
                ],
            )
            .await?;
        Ok(inserted == 1)
    }

    pub async fn get_reviews_by_event(
        &self,
        event: event::Id,
    ) -> Result<Vec<Review>, Error> {
        const SQL: &str = "\
            SELECT id, transaction_id, event_id, author_id, rating, \
                   comment, created_at \
            FROM reviews \
            WHERE event_id = $1 \
            ORDER BY created_at DESC, \
                     id DESC";
        Ok(self
            .0
            .query(SQL, &[&event])
            .await?
            .iter()
            .map(Review::from)
            .collect())
    }
}
