use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// An authenticated caller, as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Id,
    pub email: String,
    pub role: Role,
}

/// Platform-wide roles assigned by the identity provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
    Dev,
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::User => "user",
                Self::Admin => "admin",
                Self::Dev => "dev",
            }
        )
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Principal {
        pub fn example() -> Self {
            Self {
                id: "64b7c1f0a1b2c3d4e5f60001".parse().unwrap(),
                email: "ada@example.com".to_string(),
                role: Role::User,
            }
        }

        pub fn example2() -> Self {
            Self {
                id: "64b7c1f0a1b2c3d4e5f60002".parse().unwrap(),
                email: "grace@example.com".to_string(),
                role: Role::User,
            }
        }

        pub fn example3() -> Self {
            Self {
                id: "64b7c1f0a1b2c3d4e5f60003".parse().unwrap(),
                email: "edsger@example.com".to_string(),
                role: Role::Admin,
            }
        }
    }
}
