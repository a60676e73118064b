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

//! Realtime query subscriptions.
//!
//! A [`Subscription`] receives the full result set of its query, once when it
//! is created and again after every commit that changes that result set.
//! Snapshots travel over an unbounded [`crossbeam`] channel; subscribers are
//! registered in a [`DashMap`] so publishing never blocks subscription
//! management for unrelated entries.

use crate::customer::Customer;
use crate::store::{CustomerQuery, TransactionQuery};
use crate::transaction::Transaction;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Read access to the committed state, used to evaluate subscribed queries.
pub trait SnapshotSource {
    fn customer_snapshot(&self, query: &CustomerQuery) -> Vec<Customer>;
    fn transaction_snapshot(&self, query: &TransactionQuery) -> Vec<Transaction>;
}

enum Watcher {
    Customers {
        query: CustomerQuery,
        sender: Sender<Vec<Customer>>,
        last: Vec<Customer>,
    },
    Transactions {
        query: TransactionQuery,
        sender: Sender<Vec<Transaction>>,
        last: Vec<Transaction>,
    },
}

/// Registry of live subscriptions for one store backend.
#[derive(Default)]
pub struct SubscriptionHub {
    watchers: DashMap<SubscriptionId, Watcher>,
    next_id: AtomicU64,
}

impl SubscriptionHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a customer query. `initial` is delivered right away.
    ///
    /// Callers must hold the store's read view while computing `initial` and
    /// registering, so no commit slips in between.
    pub fn watch_customers(
        self: &Arc<Self>,
        query: CustomerQuery,
        initial: Vec<Customer>,
    ) -> Subscription<Customer> {
        let (sender, receiver) = channel::unbounded();
        let id = self.next_id();
        // The receiver is alive, so the first send cannot fail.
        let _ = sender.send(initial.clone());
        self.watchers.insert(
            id,
            Watcher::Customers {
                query,
                sender,
                last: initial,
            },
        );
        Subscription::new(id, receiver, self)
    }

    pub fn watch_transactions(
        self: &Arc<Self>,
        query: TransactionQuery,
        initial: Vec<Transaction>,
    ) -> Subscription<Transaction> {
        let (sender, receiver) = channel::unbounded();
        let id = self.next_id();
        let _ = sender.send(initial.clone());
        self.watchers.insert(
            id,
            Watcher::Transactions {
                query,
                sender,
                last: initial,
            },
        );
        Subscription::new(id, receiver, self)
    }

    /// Re-evaluates every subscription against `source` and sends the result
    /// set to those whose result changed. Subscriptions whose receiver is gone
    /// are dropped.
    pub fn publish(&self, source: &impl SnapshotSource) {
        let mut closed = Vec::new();
        for mut entry in self.watchers.iter_mut() {
            let id = *entry.key();
            let delivered = match entry.value_mut() {
                Watcher::Customers {
                    query,
                    sender,
                    last,
                } => {
                    let current = source.customer_snapshot(query);
                    if current == *last {
                        continue;
                    }
                    *last = current.clone();
                    sender.send(current).is_ok()
                }
                Watcher::Transactions {
                    query,
                    sender,
                    last,
                } => {
                    let current = source.transaction_snapshot(query);
                    if current == *last {
                        continue;
                    }
                    *last = current.clone();
                    sender.send(current).is_ok()
                }
            };
            if !delivered {
                closed.push(id);
            }
        }
        for id in closed {
            tracing::debug!(subscription = id.0, "dropping closed subscription");
            self.watchers.remove(&id);
        }
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        self.watchers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

/// Handle to a live query. Dropping it unsubscribes.
pub struct Subscription<T> {
    id: SubscriptionId,
    receiver: Receiver<Vec<T>>,
    hub: Weak<SubscriptionHub>,
}

impl<T> Subscription<T> {
    fn new(id: SubscriptionId, receiver: Receiver<Vec<T>>, hub: &Arc<SubscriptionHub>) -> Self {
        Self {
            id,
            receiver,
            hub: Arc::downgrade(hub),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Blocks until the next result set. `None` once the store has gone away.
    pub fn recv(&self) -> Option<Vec<T>> {
        self.receiver.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Vec<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(snapshot) => Some(snapshot),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<Vec<T>> {
        self.receiver.try_recv().ok()
    }

    /// Drains every queued result set and returns the newest one.
    pub fn latest(&self) -> Option<Vec<T>> {
        self.receiver.try_iter().last()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{StoreId, TransactionId};
    use crate::transaction::NewTransaction;
    use crate::CustomerId;
    use chrono::Utc;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct FakeSource {
        transactions: Mutex<Vec<Transaction>>,
    }

    impl SnapshotSource for FakeSource {
        fn customer_snapshot(&self, _query: &CustomerQuery) -> Vec<Customer> {
            Vec::new()
        }

        fn transaction_snapshot(&self, query: &TransactionQuery) -> Vec<Transaction> {
            self.transactions
                .lock()
                .iter()
                .filter(|t| query.matches(t))
                .cloned()
                .collect()
        }
    }

    fn transaction(store_id: StoreId) -> Transaction {
        NewTransaction::debt(CustomerId::new(), dec!(5)).into_transaction(
            TransactionId::new(),
            store_id,
            Utc::now(),
        )
    }

    #[test]
    fn initial_snapshot_is_delivered() {
        let hub = SubscriptionHub::new();
        let sub = hub.watch_customers(CustomerQuery::for_store(StoreId::new()), Vec::new());
        assert_eq!(sub.try_recv(), Some(Vec::new()));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn publish_only_sends_changed_results() {
        let hub = SubscriptionHub::new();
        let store_id = StoreId::new();
        let source = FakeSource::default();
        let sub = hub.watch_transactions(TransactionQuery::for_store(store_id), Vec::new());
        sub.try_recv();

        hub.publish(&source);
        assert_eq!(sub.try_recv(), None);

        source.transactions.lock().push(transaction(StoreId::new()));
        hub.publish(&source);
        assert_eq!(sub.try_recv(), None, "other store's change is not delivered");

        let mine = transaction(store_id);
        source.transactions.lock().push(mine.clone());
        hub.publish(&source);
        assert_eq!(sub.try_recv(), Some(vec![mine]));
    }

    #[test]
    fn dropping_subscription_unregisters_it() {
        let hub = SubscriptionHub::new();
        let sub = hub.watch_customers(CustomerQuery::for_store(StoreId::new()), Vec::new());
        assert_eq!(hub.len(), 1);
        sub.unsubscribe();
        assert!(hub.is_empty());
    }

    #[test]
    fn recv_returns_none_after_hub_is_gone() {
        let hub = SubscriptionHub::new();
        let sub = hub.watch_customers(CustomerQuery::for_store(StoreId::new()), Vec::new());
        drop(hub);
        assert_eq!(sub.recv(), Some(Vec::new()));
        assert_eq!(sub.recv(), None);
    }
}
