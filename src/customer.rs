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

//! Customer records.
//!
//! A customer's `total_debt` is never written directly: it starts at zero and
//! only moves through the ledger's balance increments. Field edits go through
//! [`CustomerFields`], which cannot express a balance.

use crate::base::{CustomerId, StoreId};
use crate::error::ValidationError;
use crate::phone::PhoneRule;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub store_id: StoreId,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub total_debt: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub(crate) fn new(store_id: StoreId, fields: CustomerFields, now: DateTime<Utc>) -> Self {
        Self {
            id: CustomerId::new(),
            store_id,
            name: fields.name,
            phone: fields.phone,
            address: fields.address,
            notes: fields.notes,
            total_debt: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the editable fields. `total_debt` is left alone.
    pub(crate) fn apply_fields(&mut self, fields: CustomerFields, now: DateTime<Utc>) {
        self.name = fields.name;
        self.phone = fields.phone;
        self.address = fields.address;
        self.notes = fields.notes;
        self.updated_at = now;
    }

    pub fn has_debt(&self) -> bool {
        self.total_debt > Decimal::ZERO
    }

    pub fn debt_status(&self, thresholds: &DebtThresholds) -> DebtStatus {
        thresholds.classify(self.total_debt)
    }

    /// Case-insensitive match on the name, substring match on the phone.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term.to_lowercase()) || self.phone.contains(term)
    }
}

/// Editable customer fields, also used to create a customer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomerFields {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub type NewCustomer = CustomerFields;

impl CustomerFields {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            address: None,
            notes: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks required fields and the phone shape, returning the fields in
    /// stored form: trimmed text, normalized phone, blank optionals dropped.
    pub fn validate(self, rule: PhoneRule) -> Result<Self, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        let phone = rule.validate(&self.phone)?;
        Ok(Self {
            name,
            phone,
            address: non_blank(self.address),
            notes: non_blank(self.notes),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Coarse classification of an outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    Paid,
    Low,
    Medium,
    High,
}

/// Upper bounds (inclusive) of the `low` and `medium` debt bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebtThresholds {
    pub low: Decimal,
    pub medium: Decimal,
}

impl DebtThresholds {
    pub fn classify(&self, total_debt: Decimal) -> DebtStatus {
        if total_debt <= Decimal::ZERO {
            DebtStatus::Paid
        } else if total_debt <= self.low {
            DebtStatus::Low
        } else if total_debt <= self.medium {
            DebtStatus::Medium
        } else {
            DebtStatus::High
        }
    }
}

impl Default for DebtThresholds {
    fn default() -> Self {
        Self {
            low: dec!(50000),
            medium: dec!(200000),
        }
    }
}
