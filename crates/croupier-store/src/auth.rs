//! Identity lookup, used only to tag audit entries

use serde::{Deserialize, Serialize};

/// The signed-in principal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            role: role.into(),
        }
    }
}

/// Who is acting right now, if anyone
pub trait IdentityProvider: Send + Sync {
    fn current_actor(&self) -> Option<Actor>;
}
