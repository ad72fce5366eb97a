//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::UserId;
use crate::error::DomainError;

pub const PASSWORD_MIN_LENGTH: usize = 5;
pub const PASSWORD_MAX_LENGTH: usize = 50;

/// Role granted to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Authority {
    #[serde(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl AsRef<str> for Authority {
    fn as_ref(&self) -> &str {
        match self {
            Self::User => "ROLE_USER",
            Self::Admin => "ROLE_ADMIN",
        }
    }
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for Authority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROLE_USER" => Ok(Self::User),
            "ROLE_ADMIN" => Ok(Self::Admin),
            other => Err(DomainError::ValidationError(format!(
                "Unknown authority: {}",
                other
            ))),
        }
    }
}

/// A registered parking customer.
///
/// `login` is the user's email address. `payment_token` is the customer id
/// at the payment provider, absent when payments were disabled at signup.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile_number: String,
    pub license_plate: Option<String>,
    pub payment_token: Option<String>,
    pub region: Option<String>,
    pub authorities: Vec<Authority>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_authority(&self, authority: Authority) -> bool {
        self.authorities.contains(&authority)
    }

    pub fn role_names(&self) -> Vec<String> {
        self.authorities.iter().map(|a| a.to_string()).collect()
    }
}

/// Checks the password length bounds (inclusive, counted in characters).
pub fn validate_password(password: &str) -> Result<(), DomainError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LENGTH..=PASSWORD_MAX_LENGTH).contains(&len) {
        return Err(DomainError::ValidationError(format!(
            "Password must be between {} and {} characters",
            PASSWORD_MIN_LENGTH, PASSWORD_MAX_LENGTH
        )));
    }
    Ok(())
}

/// Minimal shape check: one `@` with a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let invalid = || DomainError::ValidationError(format!("Invalid email address: {}", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}
