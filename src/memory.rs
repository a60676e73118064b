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

//! In-process document store.
//!
//! Both collections live behind one [`RwLock`], so a commit is atomic with
//! respect to every reader. Operations are applied in batch order while an
//! undo log records the prior state of each touched document; the first
//! failing operation rolls the whole batch back before the write lock is
//! released.
//!
//! After a successful commit the write guard is downgraded to a read guard and
//! subscribers are notified while it is held, so notifications follow commit
//! order.

use crate::base::{CustomerId, TransactionId};
use crate::customer::Customer;
use crate::error::{Collection, StoreError};
use crate::realtime::{SnapshotSource, Subscription, SubscriptionHub};
use crate::store::{Batch, CustomerQuery, DocumentStore, TransactionQuery, WriteOp};
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A document plus its commit sequence, used to order equal timestamps.
#[derive(Debug, Clone)]
struct Stored<T> {
    seq: u64,
    doc: T,
}

trait Timestamped {
    fn created_at(&self) -> DateTime<Utc>;
}

impl Timestamped for Customer {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for Transaction {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Prior state of a document touched by the batch in progress.
enum Undo {
    Customer(CustomerId, Option<Stored<Customer>>),
    Transaction(TransactionId, Option<Stored<Transaction>>),
}

#[derive(Debug, Default)]
struct Collections {
    customers: HashMap<CustomerId, Stored<Customer>>,
    transactions: HashMap<TransactionId, Stored<Transaction>>,
    next_seq: u64,
}

impl Collections {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn apply(&mut self, op: WriteOp, undo: &mut Vec<Undo>) -> Result<(), StoreError> {
        match op {
            WriteOp::InsertCustomer(customer) => {
                let id = customer.id;
                if self.customers.contains_key(&id) {
                    return Err(StoreError::DuplicateDocument {
                        collection: Collection::Customers,
                        id: id.0,
                    });
                }
                let seq = self.next_seq();
                undo.push(Undo::Customer(id, None));
                self.customers.insert(id, Stored { seq, doc: customer });
            }
            WriteOp::UpdateCustomer {
                id,
                fields,
                updated_at,
            } => {
                let stored = self
                    .customers
                    .get_mut(&id)
                    .ok_or(StoreError::missing_customer(id))?;
                undo.push(Undo::Customer(id, Some(stored.clone())));
                stored.doc.apply_fields(fields, updated_at);
            }
            WriteOp::DeleteCustomer(id) => {
                if let Some(previous) = self.customers.remove(&id) {
                    undo.push(Undo::Customer(id, Some(previous)));
                }
            }
            WriteOp::DeleteTransactionsOf(customer_id) => {
                let ids: Vec<TransactionId> = self
                    .transactions
                    .values()
                    .filter(|t| t.doc.customer_id == customer_id)
                    .map(|t| t.doc.id)
                    .collect();
                for id in ids {
                    let previous = self.transactions.remove(&id);
                    undo.push(Undo::Transaction(id, previous));
                }
            }
            WriteOp::InsertTransaction(transaction) => {
                let id = transaction.id;
                if self.transactions.contains_key(&id) {
                    return Err(StoreError::DuplicateDocument {
                        collection: Collection::Transactions,
                        id: id.0,
                    });
                }
                let seq = self.next_seq();
                undo.push(Undo::Transaction(id, None));
                self.transactions.insert(
                    id,
                    Stored {
                        seq,
                        doc: transaction,
                    },
                );
            }
            WriteOp::IncrementDebt {
                store_id,
                customer_id,
                delta,
                updated_at,
            } => {
                // Another store's customer is reported exactly like a missing one.
                let stored = self
                    .customers
                    .get_mut(&customer_id)
                    .filter(|stored| stored.doc.store_id == store_id)
                    .ok_or(StoreError::missing_customer(customer_id))?;
                let total_debt = stored
                    .doc
                    .total_debt
                    .checked_add(delta)
                    .ok_or(StoreError::Overflow { id: customer_id })?;
                undo.push(Undo::Customer(customer_id, Some(stored.clone())));
                stored.doc.total_debt = total_debt;
                stored.doc.updated_at = updated_at;
            }
            WriteOp::RemoveTransaction {
                id,
                expected,
                updated_at,
            } => {
                let entry = self
                    .transactions
                    .get(&id)
                    .ok_or(StoreError::missing_transaction(id))?
                    .doc
                    .entry();
                if expected.is_some_and(|expected| expected != entry) {
                    return Err(StoreError::Conflict { id });
                }
                let previous = self.transactions.remove(&id);
                undo.push(Undo::Transaction(id, previous));

                match self.customers.get_mut(&entry.customer_id) {
                    Some(stored) => {
                        let total_debt = stored
                            .doc
                            .total_debt
                            .checked_add(entry.reversal())
                            .ok_or(StoreError::Overflow {
                                id: entry.customer_id,
                            })?;
                        undo.push(Undo::Customer(entry.customer_id, Some(stored.clone())));
                        stored.doc.total_debt = total_debt;
                        stored.doc.updated_at = updated_at;
                    }
                    None => {
                        tracing::debug!(
                            transaction_id = %id,
                            customer_id = %entry.customer_id,
                            "removed transaction of a deleted customer"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            match step {
                Undo::Customer(id, Some(previous)) => {
                    self.customers.insert(id, previous);
                }
                Undo::Customer(id, None) => {
                    self.customers.remove(&id);
                }
                Undo::Transaction(id, Some(previous)) => {
                    self.transactions.insert(id, previous);
                }
                Undo::Transaction(id, None) => {
                    self.transactions.remove(&id);
                }
            }
        }
    }
}

/// Sorts newest first (ties broken by commit order) and applies `limit`.
fn newest_first<'a, T, I>(rows: I, limit: Option<usize>) -> Vec<T>
where
    T: Timestamped + Clone + 'a,
    I: Iterator<Item = &'a Stored<T>>,
{
    let mut rows: Vec<&Stored<T>> = rows.collect();
    rows.sort_by(|a, b| {
        b.doc
            .created_at()
            .cmp(&a.doc.created_at())
            .then(b.seq.cmp(&a.seq))
    });
    rows.into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|stored| stored.doc.clone())
        .collect()
}

impl SnapshotSource for Collections {
    fn customer_snapshot(&self, query: &CustomerQuery) -> Vec<Customer> {
        newest_first(
            self.customers.values().filter(|c| query.matches(&c.doc)),
            None,
        )
    }

    fn transaction_snapshot(&self, query: &TransactionQuery) -> Vec<Transaction> {
        newest_first(
            self.transactions.values().filter(|t| query.matches(&t.doc)),
            query.limit,
        )
    }
}

/// Thread-safe in-memory [`DocumentStore`].
///
/// [`set_available`](Self::set_available) takes the store offline: every read,
/// commit and subscription attempt then fails with
/// [`StoreError::Unavailable`] without touching the data.
pub struct MemoryStore {
    state: RwLock<Collections>,
    hub: Arc<SubscriptionHub>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Collections::default()),
            hub: SubscriptionHub::new(),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.len()
    }

    pub fn customer_count(&self) -> usize {
        self.state.read().customers.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.state.read().transactions.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().customers.get(&id).map(|c| c.doc.clone()))
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .state
            .read()
            .transactions
            .get(&id)
            .map(|t| t.doc.clone()))
    }

    fn customers(&self, query: &CustomerQuery) -> Result<Vec<Customer>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().customer_snapshot(query))
    }

    fn transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>, StoreError> {
        self.ensure_available()?;
        Ok(self.state.read().transaction_snapshot(query))
    }

    fn commit(&self, batch: Batch) -> Result<(), StoreError> {
        self.ensure_available()?;
        if batch.is_empty() {
            return Ok(());
        }

        let ops = batch.len();
        let mut state = self.state.write();
        let mut undo = Vec::new();
        for op in batch.into_ops() {
            if let Err(error) = state.apply(op, &mut undo) {
                state.rollback(undo);
                tracing::debug!(%error, ops, "batch rolled back");
                return Err(error);
            }
        }

        let state = RwLockWriteGuard::downgrade(state);
        tracing::trace!(ops, "batch committed");
        self.hub.publish(&*state);
        Ok(())
    }

    fn watch_customers(&self, query: CustomerQuery) -> Result<Subscription<Customer>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read();
        let initial = state.customer_snapshot(&query);
        Ok(self.hub.watch_customers(query, initial))
    }

    fn watch_transactions(
        &self,
        query: TransactionQuery,
    ) -> Result<Subscription<Transaction>, StoreError> {
        self.ensure_available()?;
        let state = self.state.read();
        let initial = state.transaction_snapshot(&query);
        Ok(self.hub.watch_transactions(query, initial))
    }
}
