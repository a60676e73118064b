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

//! Error types for ledger operations and the document store.

use crate::base::{CustomerId, TransactionId};
use crate::phone::PhoneRule;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Input rejected at the boundary, before any mutation is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is empty or blank
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Phone does not match the configured rule
    #[error("invalid phone number '{phone}' ({rule} rule)")]
    InvalidPhone { phone: String, rule: PhoneRule },

    /// Another customer of the same store already uses this phone
    #[error("phone number '{0}' is already registered to another customer")]
    DuplicatePhone(String),

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Password confirmation differs from the password
    #[error("password and confirmation do not match")]
    PasswordMismatch,

    /// Password is shorter than the minimum length
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
}

/// Document collections known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Customers,
    Transactions,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customers => f.write_str("customers"),
            Self::Transactions => f.write_str("transactions"),
        }
    }
}

/// Failures reported by a [`DocumentStore`](crate::store::DocumentStore).
///
/// A commit that returns any of these has applied none of its operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend cannot be reached
    #[error("document store unavailable")]
    Unavailable,

    /// An update or increment targeted a document that does not exist
    #[error("{collection} document {id} does not exist")]
    MissingDocument { collection: Collection, id: Uuid },

    /// An insert reused an existing document id
    #[error("{collection} document {id} already exists")]
    DuplicateDocument { collection: Collection, id: Uuid },

    /// Stored transaction differs from the entry the caller expected to remove
    #[error("transaction {id} does not match the expected ledger entry")]
    Conflict { id: TransactionId },

    /// Applying a delta would take the balance outside the `Decimal` range
    #[error("balance of customer {id} would overflow")]
    Overflow { id: CustomerId },
}

impl StoreError {
    pub fn missing_customer(id: CustomerId) -> Self {
        Self::MissingDocument {
            collection: Collection::Customers,
            id: id.0,
        }
    }

    pub fn missing_transaction(id: TransactionId) -> Self {
        Self::MissingDocument {
            collection: Collection::Transactions,
            id: id.0,
        }
    }
}

/// Errors surfaced by [`Ledger`](crate::Ledger) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No principal is signed in
    #[error("authentication required")]
    AuthRequired,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Customer does not exist or belongs to another store
    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),

    /// Transaction does not exist or belongs to another store
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    /// Atomic commit rejected; nothing was applied
    #[error("commit failed: {0}")]
    Commit(StoreError),

    /// A read against the store failed
    #[error("store read failed: {0}")]
    Store(StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            ValidationError::MissingField("name").to_string(),
            "missing required field: name"
        );
        assert_eq!(
            ValidationError::InvalidAmount.to_string(),
            "invalid amount (must be positive)"
        );
        assert_eq!(
            ValidationError::InvalidPhone {
                phone: "123".into(),
                rule: PhoneRule::SaudiMobile,
            }
            .to_string(),
            "invalid phone number '123' (saudi_mobile rule)"
        );
        assert_eq!(
            ValidationError::WeakPassword { min: 6 }.to_string(),
            "password must be at least 6 characters"
        );
        assert_eq!(LedgerError::AuthRequired.to_string(), "authentication required");
        assert_eq!(
            LedgerError::Commit(StoreError::Unavailable).to_string(),
            "commit failed: document store unavailable"
        );
    }

    #[test]
    fn validation_errors_convert_into_ledger_errors() {
        let error: LedgerError = ValidationError::InvalidAmount.into();
        assert_eq!(error, LedgerError::Validation(ValidationError::InvalidAmount));
        assert_eq!(error.to_string(), "invalid amount (must be positive)");
    }

    #[test]
    fn missing_document_names_the_collection() {
        let id = CustomerId::new();
        let error = StoreError::missing_customer(id);
        assert_eq!(
            error.to_string(),
            format!("customers document {id} does not exist")
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = LedgerError::Commit(StoreError::Unavailable);
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
