use std::{collections::HashMap, error::Error as StdError};

use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};

use super::{int2_enum, uuid_id, Client};

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub role: Role,
    pub login: String,
    pub password_hash: PasswordHash,
}

uuid_id!(Id);

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, TryFromRepr, PartialEq, Serialize,
)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Browses events and buys tickets.
    Customer = 1,

    /// Owns events and decides on their transactions.
    EventOrganizer = 2,
}

int2_enum!(Role, "invalid role");

#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(secret: &str) -> Self {
        // TODO: Use real hash function.
        Self(secret.to_string())
    }
}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

impl From<&Row> for User {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            login: row.get("login"),
            password_hash: row.get("password_hash"),
            role: row.get("role"),
        }
    }
}

impl Client {
    pub async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash, role \
                           FROM users \
                           WHERE login = $1 \
                           LIMIT 1";
        Ok(self.0.query_opt(SQL, &[&login]).await?.as_ref().map(User::from))
    }

    pub async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash, role \
                           FROM users \
                           WHERE id = $1 \
                           LIMIT 1";
        Ok(self.0.query_opt(SQL, &[&id]).await?.as_ref().map(User::from))
    }

    pub async fn get_users_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<HashMap<Id, User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash, role \
                           FROM users \
                           WHERE id IN (SELECT unnest($1::UUID[])) \
                           LIMIT $2";

        let limit = ids.len() as i64;

        Ok(self
            .0
            .query(SQL, &[&ids, &limit])
            .await?
            .iter()
            .map(|row| {
                let user = User::from(row);
                (user.id, user)
            })
            .collect())
    }

    /// Changes the user's name and/or password, leaving `None` fields as
    /// they are.
    pub async fn update_user(
        &self,
        id: Id,
        name: Option<&str>,
        password_hash: Option<&PasswordHash>,
    ) -> Result<Option<User>, Error> {
        const SQL: &str = "UPDATE users \
                           SET name = COALESCE($2, name), \
                               password_hash = COALESCE($3, password_hash) \
                           WHERE id = $1 \
                           RETURNING id, name, login, password_hash, role";
        Ok(self
            .0
            .query_opt(SQL, &[&id, &name, &password_hash])
            .await?
            .as_ref()
            .map(User::from))
    }
}
