pub mod answer;
pub mod question;
pub mod section;

use serde::{Deserialize, Serialize};

/// A member's role within a group.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupRole {
    #[default]
    Member,
    Moderator,
    Admin,
}
