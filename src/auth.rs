// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Principal resolution and sign-up validation.
//!
//! The credential exchange itself belongs to the external auth provider. This
//! module only models what the ledger consumes from it: the current principal
//! ([`StoreId`]) and the store profile captured at sign-up.

use crate::base::StoreId;
use crate::error::ValidationError;
use crate::phone::PhoneRule;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Source of the authenticated principal.
///
/// `principal` must answer synchronously once a session is established.
pub trait AuthProvider: Send + Sync {
    fn principal(&self) -> Option<StoreId>;

    fn profile(&self) -> Option<StoreProfile> {
        None
    }
}

impl<T: AuthProvider + ?Sized> AuthProvider for Arc<T> {
    fn principal(&self) -> Option<StoreId> {
        (**self).principal()
    }

    fn profile(&self) -> Option<StoreProfile> {
        (**self).profile()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProfile {
    pub name: String,
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Sign-up input as entered by the shop owner.
#[derive(Clone, Default)]
pub struct SignUpForm {
    pub store_name: String,
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    pub const MIN_PASSWORD_LEN: usize = 6;

    /// Checks the form and returns the profile to store for the new account.
    pub fn validate(self, rule: PhoneRule) -> Result<StoreProfile, ValidationError> {
        let store_name = required(&self.store_name, "store_name")?;
        let owner_name = required(&self.owner_name, "owner_name")?;
        let email = required(&self.email, "email")?;
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < Self::MIN_PASSWORD_LEN {
            return Err(ValidationError::WeakPassword {
                min: Self::MIN_PASSWORD_LEN,
            });
        }
        let phone = rule.validate(&self.phone)?;

        Ok(StoreProfile {
            name: store_name,
            owner_name,
            email,
            phone,
            address: self
                .address
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
        })
    }
}

impl fmt::Debug for SignUpForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpForm")
            .field("store_name", &self.store_name)
            .field("owner_name", &self.owner_name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("address", &self.address)
            .field("password", &"[redacted]")
            .field("confirm_password", &"[redacted]")
            .finish()
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

#[derive(Debug, Clone)]
struct SignedIn {
    store_id: StoreId,
    profile: Option<StoreProfile>,
}

/// In-process session holding the signed-in principal.
#[derive(Debug, Default)]
pub struct Session {
    current: RwLock<Option<SignedIn>>,
}

impl Session {
    /// A session with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(store_id: StoreId) -> Self {
        let session = Self::new();
        session.sign_in(store_id, None);
        session
    }

    pub fn sign_in(&self, store_id: StoreId, profile: Option<StoreProfile>) {
        tracing::info!(%store_id, "session established");
        *self.current.write() = Some(SignedIn { store_id, profile });
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.current.write().take() {
            tracing::info!(store_id = %previous.store_id, "session ended");
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.read().is_some()
    }
}

impl AuthProvider for Session {
    fn principal(&self) -> Option<StoreId> {
        self.current.read().as_ref().map(|s| s.store_id)
    }

    fn profile(&self) -> Option<StoreProfile> {
        self.current.read().as_ref().and_then(|s| s.profile.clone())
    }
}
