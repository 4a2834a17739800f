use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ApplicationError, DomainError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(DomainError::Validation(format!("unknown role `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub contact: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub role: Role,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation("name is required".to_owned()));
        }
        validate_email(&self.email)
    }
}

/// Profile fields a user may change on their own record. Role changes go
/// through the admin-only role update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
}

impl UserPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(DomainError::Validation("name cannot be blank".to_owned()));
        }
        match &self.email {
            Some(email) => validate_email(email),
            None => Ok(()),
        }
    }

    pub fn apply_to(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name.trim().to_owned();
        }
        if let Some(email) = self.email {
            user.email = normalize_email(&email);
        }
        if let Some(contact) = self.contact {
            user.contact = contact;
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(DomainError::Validation(format!("`{email}` is not a valid e-mail address")));
    }
    Ok(())
}

/// The authenticated caller of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApplicationError> {
        if self.is_admin() {
            return Ok(());
        }
        Err(ApplicationError::Forbidden(format!("user {} is not an administrator", self.user_id)))
    }

    /// Admins read everything; everyone else only their own records.
    pub fn can_access(&self, owner_id: UserId) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self { user_id: user.id, role: user.role }
    }
}
