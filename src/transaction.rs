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

//! Debt and payment transactions.
//!
//! A transaction is written once and is afterwards either read-only or
//! deleted. Its balance effect on the owning customer is captured by
//! [`LedgerEntry`]:
//! - [`Debt`](TransactionKind::Debt) adds `amount` to the customer's debt
//! - [`Payment`](TransactionKind::Payment) subtracts `amount`

use crate::base::{CustomerId, StoreId, TransactionId};
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Debt,
    Payment,
}

impl TransactionKind {
    /// Signed balance effect of `amount` under this kind.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Debt => amount,
            Self::Payment => -amount,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debt => f.write_str("debt"),
            Self::Payment => f.write_str("payment"),
        }
    }
}

/// A recorded ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// `+amount` for debts, `-amount` for payments.
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }

    pub fn entry(&self) -> LedgerEntry {
        LedgerEntry {
            customer_id: self.customer_id,
            kind: self.kind,
            amount: self.amount,
        }
    }
}

/// The balance effect a transaction had on its customer when it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub customer_id: CustomerId,
    pub kind: TransactionKind,
    pub amount: Decimal,
}

impl LedgerEntry {
    pub fn delta(&self) -> Decimal {
        self.kind.signed(self.amount)
    }

    /// Delta that exactly undoes [`delta`](Self::delta).
    pub fn reversal(&self) -> Decimal {
        -self.delta()
    }
}

/// Input for recording a transaction.
///
/// `store_id` defaults to the signed-in principal when left unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub store_id: Option<StoreId>,
    pub customer_id: CustomerId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn new(customer_id: CustomerId, kind: TransactionKind, amount: Decimal) -> Self {
        Self {
            store_id: None,
            customer_id,
            kind,
            amount,
            description: None,
        }
    }

    pub fn debt(customer_id: CustomerId, amount: Decimal) -> Self {
        Self::new(customer_id, TransactionKind::Debt, amount)
    }

    pub fn payment(customer_id: CustomerId, amount: Decimal) -> Self {
        Self::new(customer_id, TransactionKind::Payment, amount)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_store(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount);
        }
        Ok(())
    }

    pub(crate) fn into_transaction(
        self,
        id: TransactionId,
        store_id: StoreId,
        created_at: DateTime<Utc>,
    ) -> Transaction {
        Transaction {
            id,
            store_id,
            customer_id: self.customer_id,
            kind: self.kind,
            amount: self.amount,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn debt_adds_and_payment_subtracts() {
        assert_eq!(TransactionKind::Debt.signed(dec!(50000)), dec!(50000));
        assert_eq!(TransactionKind::Payment.signed(dec!(20000)), dec!(-20000));
    }

    #[test]
    fn reversal_undoes_delta() {
        let entry = LedgerEntry {
            customer_id: CustomerId::new(),
            kind: TransactionKind::Payment,
            amount: dec!(125.50),
        };
        assert_eq!(entry.delta() + entry.reversal(), Decimal::ZERO);
        assert_eq!(entry.reversal(), dec!(125.50));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let customer = CustomerId::new();
        assert_eq!(
            NewTransaction::debt(customer, Decimal::ZERO).validate(),
            Err(ValidationError::InvalidAmount)
        );
        assert_eq!(
            NewTransaction::payment(customer, dec!(-1)).validate(),
            Err(ValidationError::InvalidAmount)
        );
        assert!(NewTransaction::debt(customer, dec!(0.01)).validate().is_ok());
    }

    #[test]
    fn blank_description_is_dropped() {
        let tx = NewTransaction::debt(CustomerId::new(), dec!(10))
            .with_description("   ")
            .into_transaction(TransactionId::new(), StoreId::new(), Utc::now());
        assert_eq!(tx.description, None);

        let tx = NewTransaction::debt(CustomerId::new(), dec!(10))
            .with_description(" notebooks ")
            .into_transaction(TransactionId::new(), StoreId::new(), Utc::now());
        assert_eq!(tx.description.as_deref(), Some("notebooks"));
    }

    #[test]
    fn serializes_kind_as_type_and_amount_as_string() {
        let tx = NewTransaction::payment(CustomerId::new(), dec!(20000))
            .into_transaction(TransactionId::new(), StoreId::new(), Utc::now());
        let json: serde_json::Value = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "payment");
        assert_eq!(json["amount"], "20000");
        assert!(json.get("description").is_none());
    }
}
