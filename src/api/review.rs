use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, db};

pub use crate::db::review::Id;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Id,
    pub transaction: api::transaction::Id,
    pub event: api::event::Id,
    pub author: api::user::Id,
    pub rating: u8,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<db::Review> for Review {
    fn from(review: db::Review) -> Self {
        Self {
            id: review.id,
            transaction: review.transaction,
            event: review.event,
            author: review.author,
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}
