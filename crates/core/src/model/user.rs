use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;

/// An authenticated user. Anonymous callers pass `None` wherever a user is
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
}

impl User {
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self { id }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }
}

impl From<UserId> for User {
    fn from(id: UserId) -> Self {
        Self::new(id)
    }
}
