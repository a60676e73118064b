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

//! Document store contract.
//!
//! The ledger never mutates records one call at a time. Every change is a
//! [`Batch`] of [`WriteOp`]s handed to [`DocumentStore::commit`], which must
//! apply all of them or none. Balance changes are expressed as
//! [`WriteOp::IncrementDebt`] deltas that the store applies to the value it
//! holds, never as a total computed by the caller, so concurrent increments
//! against one customer commute.

use crate::base::{CustomerId, StoreId, TransactionId};
use crate::customer::{Customer, CustomerFields};
use crate::error::StoreError;
use crate::realtime::Subscription;
use crate::transaction::{LedgerEntry, Transaction};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// All customers of one store, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerQuery {
    pub store_id: StoreId,
}

impl CustomerQuery {
    pub fn for_store(store_id: StoreId) -> Self {
        Self { store_id }
    }

    pub fn matches(&self, customer: &Customer) -> bool {
        customer.store_id == self.store_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionScope {
    Store(StoreId),
    Customer(CustomerId),
}

/// Transactions of a store or of a customer, newest first, optionally limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionQuery {
    pub scope: TransactionScope,
    pub limit: Option<usize>,
}

impl TransactionQuery {
    pub fn for_store(store_id: StoreId) -> Self {
        Self {
            scope: TransactionScope::Store(store_id),
            limit: None,
        }
    }

    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            scope: TransactionScope::Customer(customer_id),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        match self.scope {
            TransactionScope::Store(store_id) => transaction.store_id == store_id,
            TransactionScope::Customer(customer_id) => transaction.customer_id == customer_id,
        }
    }
}

/// A single write inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Fails with `DuplicateDocument` if the id is taken.
    InsertCustomer(Customer),
    /// Merges the editable fields. Fails with `MissingDocument`.
    UpdateCustomer {
        id: CustomerId,
        fields: CustomerFields,
        updated_at: DateTime<Utc>,
    },
    /// Removing an absent customer is a no-op.
    DeleteCustomer(CustomerId),
    /// Removes every transaction referencing the customer, resolved at commit
    /// time.
    DeleteTransactionsOf(CustomerId),
    /// Fails with `DuplicateDocument` if the id is taken.
    InsertTransaction(Transaction),
    /// Adds `delta` to the stored `total_debt`. Fails with `MissingDocument`
    /// when the customer is absent or belongs to a store other than
    /// `store_id`, and with `Overflow` when the sum is not representable.
    IncrementDebt {
        store_id: StoreId,
        customer_id: CustomerId,
        delta: Decimal,
        updated_at: DateTime<Utc>,
    },
    /// Removes a transaction and applies the reversal of its stored entry to
    /// its customer, if that customer still exists. When `expected` is set and
    /// differs from the stored entry the commit fails with `Conflict`; a
    /// reversal that overflows the balance fails with `Overflow`.
    RemoveTransaction {
        id: TransactionId,
        expected: Option<LedgerEntry>,
        updated_at: DateTime<Utc>,
    },
}

/// An ordered list of writes committed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<WriteOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn with(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Persistence backend for customers and transactions.
///
/// Implementations must make [`commit`](Self::commit) all-or-nothing and
/// visible to readers only in its entirety, and must deliver the refreshed
/// result set to every affected subscription after a successful commit.
pub trait DocumentStore: Send + Sync {
    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    fn customers(&self, query: &CustomerQuery) -> Result<Vec<Customer>, StoreError>;

    fn transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>, StoreError>;

    fn commit(&self, batch: Batch) -> Result<(), StoreError>;

    /// Delivers the current result set immediately, then again after every
    /// change to it.
    fn watch_customers(&self, query: CustomerQuery) -> Result<Subscription<Customer>, StoreError>;

    fn watch_transactions(
        &self,
        query: TransactionQuery,
    ) -> Result<Subscription<Transaction>, StoreError>;

    fn insert_customer(&self, customer: Customer) -> Result<(), StoreError> {
        self.commit(Batch::new().with(WriteOp::InsertCustomer(customer)))
    }

    fn update_customer(
        &self,
        id: CustomerId,
        fields: CustomerFields,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.commit(Batch::new().with(WriteOp::UpdateCustomer {
            id,
            fields,
            updated_at,
        }))
    }

    /// Raw single-document delete: removes the customer record only and leaves
    /// its transactions in place, so their balance effect is lost with it.
    ///
    /// Ledger code must not use this. Removing a customer together with its
    /// transactions is a `DeleteTransactionsOf` + `DeleteCustomer` batch, as
    /// [`Ledger::delete_customer`](crate::Ledger::delete_customer) commits.
    fn delete_customer(&self, id: CustomerId) -> Result<(), StoreError> {
        self.commit(Batch::new().with(WriteOp::DeleteCustomer(id)))
    }
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        (**self).customer(id)
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        (**self).transaction(id)
    }

    fn customers(&self, query: &CustomerQuery) -> Result<Vec<Customer>, StoreError> {
        (**self).customers(query)
    }

    fn transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>, StoreError> {
        (**self).transactions(query)
    }

    fn commit(&self, batch: Batch) -> Result<(), StoreError> {
        (**self).commit(batch)
    }

    fn watch_customers(&self, query: CustomerQuery) -> Result<Subscription<Customer>, StoreError> {
        (**self).watch_customers(query)
    }

    fn watch_transactions(
        &self,
        query: TransactionQuery,
    ) -> Result<Subscription<Transaction>, StoreError> {
        (**self).watch_transactions(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::NewTransaction;
    use rust_decimal_macros::dec;

    #[test]
    fn transaction_query_scopes() {
        let store_id = StoreId::new();
        let customer_id = CustomerId::new();
        let tx = NewTransaction::debt(customer_id, dec!(10)).into_transaction(
            TransactionId::new(),
            store_id,
            Utc::now(),
        );

        assert!(TransactionQuery::for_store(store_id).matches(&tx));
        assert!(TransactionQuery::for_customer(customer_id).matches(&tx));
        assert!(!TransactionQuery::for_store(StoreId::new()).matches(&tx));
        assert!(!TransactionQuery::for_customer(CustomerId::new()).matches(&tx));
    }

    #[test]
    fn batch_keeps_operation_order() {
        let customer_id = CustomerId::new();
        let mut batch = Batch::new();
        batch
            .push(WriteOp::DeleteTransactionsOf(customer_id))
            .push(WriteOp::DeleteCustomer(customer_id));

        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.into_ops(),
            vec![
                WriteOp::DeleteTransactionsOf(customer_id),
                WriteOp::DeleteCustomer(customer_id),
            ]
        );
        assert!(Batch::new().is_empty());
    }
}
