use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{Error, Row};
use uuid::Uuid;

use crate::lifecycle::Decision;

use super::{event, int2_enum, ticket_type, user, uuid_id, Client};

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub id: Id,

    /// Human readable code shown to buyers and organizers.
    pub code: String,

    pub buyer: user::Id,
    pub event: event::Id,
    pub ticket_type: ticket_type::Id,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
    pub status: Status,
    pub payment_proof: Option<String>,
    pub created_at: OffsetDateTime,
    pub payment_due: OffsetDateTime,
    pub canceled_reason: Option<String>,
}

uuid_id!(Id);

/// Generates a new transaction code, e.g. `TRX-1A2B3C4D5E6F7081`.
///
/// Codes carry 64 random bits of a v4 UUID.
pub fn generate_code() -> String {
    format!("TRX-{:016X}", Uuid::new_v4().as_u128() as u64)
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    TryFromRepr,
    PartialEq,
    Serialize,
)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Purchase is submitted and awaits payment.
    ///
    /// Equivalent to [`Status::WaitingForPayment`].
    #[display("pending")]
    Pending = 1,

    /// Quota is reserved; the buyer is expected to upload a payment proof
    /// before the payment due time, and the organizer to decide on it.
    #[display("waiting_for_payment")]
    WaitingForPayment = 2,

    /// Organizer accepted the payment. Reserved quota is sold for good.
    #[display("approved")]
    Approved = 3,

    /// Organizer refused the payment. Reserved quota is released.
    #[display("rejected")]
    Rejected = 4,

    /// Payment was not provided in time. Reserved quota is released.
    #[display("canceled")]
    Canceled = 5,
}

int2_enum!(Status, "invalid status");

impl Status {
    /// Statuses from which an organizer decision or an expiry may happen.
    pub const AWAITING_PAYMENT: [Self; 2] =
        [Self::Pending, Self::WaitingForPayment];

    pub fn is_awaiting_payment(self) -> bool {
        Self::AWAITING_PAYMENT.contains(&self)
    }

    /// Whether a transaction in this status holds part of its ticket type's
    /// quota.
    pub fn consumes_quota(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::WaitingForPayment | Self::Approved,
        )
    }

    pub fn is_terminal(self) -> bool {
        !self.is_awaiting_payment()
    }

    /// Whether a transaction may move from `self` to `next`.
    pub fn can_become(self, next: Self) -> bool {
        use Status as S;

        matches!(
            (self, next),
            (S::Pending, S::WaitingForPayment)
                | (
                    S::Pending | S::WaitingForPayment,
                    S::Approved | S::Rejected | S::Canceled,
                ),
        )
    }
}

impl Transaction {
    /// Whether the payment due time has passed at `now`.
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        now > self.payment_due
    }
}

impl From<&Row> for Transaction {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            code: row.get("code"),
            buyer: row.get("buyer_id"),
            event: row.get("event_id"),
            ticket_type: row.get("ticket_type_id"),
            quantity: row.get::<_, i32>("quantity") as u32,
            unit_price: row.get("unit_price"),
            total_price: row.get("total_price"),
            status: row.get("status"),
            payment_proof: row.get("payment_proof"),
            created_at: row.get("created_at"),
            payment_due: row.get("payment_due"),
            canceled_reason: row.get("canceled_reason"),
        }
    }
}

const COLUMNS: &str = "id, code, buyer_id, event_id, ticket_type_id, \
                       quantity, unit_price, total_price, status, \
                       payment_proof, created_at, payment_due, \
                       canceled_reason";

impl Client {
    pub async fn get_transaction_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Transaction>, Error> {
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE id = $1");
        Ok(self
            .0
            .query_opt(&sql, &[&id])
            .await?
            .as_ref()
            .map(Transaction::from))
    }

    pub async fn get_transactions_page_by_buyer(
        &self,
        buyer: user::Id,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM transactions \
             WHERE buyer_id = $1 \
             ORDER BY created_at DESC, \
                      id DESC \
             OFFSET $2 LIMIT $3",
        );
        let offset = offset as i64;
        let limit = limit as i64;
        Ok(self
            .0
            .query(&sql, &[&buyer, &offset, &limit])
            .await?
            .iter()
            .map(Transaction::from)
            .collect())
    }

    pub async fn count_transactions_by_buyer(
        &self,
        buyer: user::Id,
    ) -> Result<usize, Error> {
        const SQL: &str =
            "SELECT COUNT(*) FROM transactions WHERE buyer_id = $1";
        let count = self.0.query_one(SQL, &[&buyer]).await?.get::<_, i64>(0);
        Ok(count as usize)
    }

    /// Every transaction of the event, oldest first.
    pub async fn get_transactions_by_event(
        &self,
        event: event::Id,
    ) -> Result<Vec<Transaction>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM transactions \
             WHERE event_id = $1 \
             ORDER BY created_at ASC, \
                      id ASC",
        );
        Ok(self
            .0
            .query(&sql, &[&event])
            .await?
            .iter()
            .map(Transaction::from)
            .collect())
    }

    pub async fn get_transactions_page_by_organizer(
        &self,
        organizer: user::Id,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM transactions \
             WHERE event_id IN (SELECT id FROM events \
                                WHERE organizer_id = $1) \
             ORDER BY created_at DESC, \
                      id DESC \
             OFFSET $2 LIMIT $3",
        );
        let offset = offset as i64;
        let limit = limit as i64;
        Ok(self
            .0
            .query(&sql, &[&organizer, &offset, &limit])
            .await?
            .iter()
            .map(Transaction::from)
            .collect())
    }

    pub async fn count_transactions_by_organizer(
        &self,
        organizer: user::Id,
    ) -> Result<usize, Error> {
        const SQL: &str = "\
            SELECT COUNT(*) FROM transactions \
            WHERE event_id IN (SELECT id FROM events \
                               WHERE organizer_id = $1)";
        let count =
            self.0.query_one(SQL, &[&organizer]).await?.get::<_, i64>(0);
        Ok(count as usize)
    }

    /// Decrements the remaining quota of the transaction's ticket type and
    /// writes the transaction, both or neither.
    ///
    /// Returns `false` if the ticket type (of the transaction's event) has
    /// less than `transaction.quantity` tickets remaining.
    pub async fn reserve_and_write_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<bool, Error> {
        let sql = format!(
            "WITH reserved AS ( \
                 UPDATE ticket_types \
                 SET remaining = remaining - $6 \
                 WHERE id = $5 \
                   AND event_id = $4 \
                   AND remaining >= $6 \
                 RETURNING id \
             ) \
             INSERT INTO transactions ({COLUMNS}) \
             SELECT $1, $2, $3, $4, reserved.id, $6, $7, $8, $9, $10, \
                    $11, $12, $13 \
             FROM reserved",
        );

        let inserted = self
            .0
            .execute(
                &sql,
                &[
                    &transaction.id,
                    &transaction.code,
                    &transaction.buyer,
                    &transaction.event,
                    &transaction.ticket_type,
                    &(transaction.quantity as i32),
                    &transaction.unit_price,
                    &transaction.total_price,
                    &transaction.status,
                    &transaction.payment_proof,
                    &transaction.created_at,
                    &transaction.payment_due,
                    &transaction.canceled_reason,
                ],
            )
            .await?;
        Ok(inserted == 1)
    }

    /// Sets the payment proof if the transaction still awaits payment and
    /// its payment due time has not passed at `now`.
    pub async fn attach_payment_proof(
        &self,
        id: Id,
        proof: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Error> {
        let sql = format!(
            "UPDATE transactions \
             SET payment_proof = $2 \
             WHERE id = $1 \
               AND status = ANY($3::INT2[]) \
               AND payment_due >= $4 \
             RETURNING {COLUMNS}",
        );
        let expected: &[Status] = &Status::AWAITING_PAYMENT;
        Ok(self
            .0
            .query_opt(&sql, &[&id, &proof, &expected, &now])
            .await?
            .as_ref()
            .map(Transaction::from))
    }

    /// Applies the `decision` to the transaction if it still awaits payment,
    /// releasing its quantity back to the ticket type when the decision says
    /// so. The status check, the status write and the quota update commit
    /// together, so concurrent decisions on one transaction have a single
    /// winner.
    ///
    /// An expiry additionally requires the payment due time to have passed at
    /// `now` and no payment proof to be attached.
    ///
    /// Returns `None` if the transaction doesn't exist or is not in a state
    /// allowing the decision anymore.
    pub async fn decide_transaction(
        &self,
        id: Id,
        decision: Decision,
        now: OffsetDateTime,
    ) -> Result<Option<Transaction>, Error> {
        let sql = format!(
            "WITH moved AS ( \
                 UPDATE transactions \
                 SET status = $2, \
                     canceled_reason = $3 \
                 WHERE id = $1 \
                   AND status = ANY($4::INT2[]) \
                   AND (NOT $6::BOOL \
                        OR (payment_due < $5 AND payment_proof IS NULL)) \
                 RETURNING {COLUMNS} \
             ), released AS ( \
                 UPDATE ticket_types \
                 SET remaining = ticket_types.remaining + moved.quantity \
                 FROM moved \
                 WHERE ticket_types.id = moved.ticket_type_id \
                   AND $7::BOOL \
             ) \
             SELECT {COLUMNS} FROM moved",
        );
        let expected: &[Status] = &Status::AWAITING_PAYMENT;
        let expiry = decision == Decision::Expire;
        Ok(self
            .0
            .query_opt(
                &sql,
                &[
                    &id,
                    &decision.target(),
                    &decision.canceled_reason(),
                    &expected,
                    &now,
                    &expiry,
                    &decision.releases_quota(),
                ],
            )
            .await?
            .as_ref()
            .map(Transaction::from))
    }

    /// Transactions awaiting payment without a payment proof whose payment
    /// due time has passed at `now`, oldest due first.
    pub async fn get_expired_transactions(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<Transaction>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM transactions \
             WHERE status = ANY($1::INT2[]) \
               AND payment_proof IS NULL \
               AND payment_due < $2 \
             ORDER BY payment_due ASC",
        );
        let expected: &[Status] = &Status::AWAITING_PAYMENT;
        Ok(self
            .0
            .query(&sql, &[&expected, &now])
            .await?
            .iter()
            .map(Transaction::from)
            .collect())
    }
}
