use crate::db::user::{self, Role};

/// Identity of the user performing an operation.
///
/// Decoded once per request from the bearer token and passed explicitly to
/// every operation that needs to know who acts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Session {
    pub user_id: user::Id,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: user::Id, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_organizer(&self) -> bool {
        self.role == Role::EventOrganizer
    }
}
