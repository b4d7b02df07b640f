//! User - Identity anchor for every ledger row
//!
//! Created on first login, refreshed on later logins, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,

    /// Unique id from the login provider
    pub external_id: String,

    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    pub role: Role,

    /// Identity-provider nullifier, once verified
    pub verification_nullifier: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_signed_in: DateTime<Utc>,
}

/// Login payload; `None` fields leave the stored value untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub external_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
}

impl User {
    pub fn register(id: UserId, profile: UserProfile, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id,
            external_id: profile.external_id,
            name: profile.name,
            email: profile.email,
            login_method: profile.login_method,
            role,
            verification_nullifier: None,
            created_at: now,
            updated_at: now,
            last_signed_in: now,
        }
    }

    /// Apply a later login
    pub fn refresh(&mut self, profile: UserProfile, now: DateTime<Utc>) {
        if profile.name.is_some() {
            self.name = profile.name;
        }
        if profile.email.is_some() {
            self.email = profile.email;
        }
        if profile.login_method.is_some() {
            self.login_method = profile.login_method;
        }
        self.last_signed_in = now;
        self.updated_at = now;
    }

    #[inline]
    pub fn is_verified(&self) -> bool {
        self.verification_nullifier.is_some()
    }
}
