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

//! Dashboard view-model.
//!
//! Owns everything a dashboard page shows: the customer list, the recent
//! transactions feed, statistics, the search term, the page cursor and the
//! optimistic changes not yet reflected in a snapshot. It is opened on page
//! entry and dropped on navigation away, which ends its subscriptions.
//!
//! Optimistic changes follow a small state machine:
//!
//! ```text
//! stage ──► Pending ──acknowledge──► Acknowledged ──next customer snapshot──► (gone)
//!              │    │
//!              │    └──acknowledge, snapshot installed since staging──► (gone)
//!              └──rollback──► (gone, returned to the caller)
//! ```
//!
//! Pending and acknowledged changes are both applied on top of the last
//! customer snapshot when computing visible balances. A live store may push
//! the snapshot holding a change before the write call returns; such a change
//! is already counted by that snapshot and is dropped when acknowledged.

use crate::auth::AuthProvider;
use crate::base::{CustomerId, TransactionId};
use crate::config::LedgerConfig;
use crate::customer::{Customer, DebtStatus, DebtThresholds};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::realtime::Subscription;
use crate::stats::StoreStats;
use crate::store::DocumentStore;
use crate::transaction::{LedgerEntry, NewTransaction, Transaction};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingToken(u64);

/// A change shown before the store has confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingChange {
    Record(LedgerEntry),
    Remove {
        transaction_id: TransactionId,
        entry: LedgerEntry,
    },
}

impl PendingChange {
    fn customer_id(&self) -> CustomerId {
        match self {
            Self::Record(entry) | Self::Remove { entry, .. } => entry.customer_id,
        }
    }

    fn delta(&self) -> Decimal {
        match self {
            Self::Record(entry) => entry.delta(),
            Self::Remove { entry, .. } => entry.reversal(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingState {
    Pending,
    Acknowledged,
}

#[derive(Debug)]
struct PendingEntry {
    token: PendingToken,
    change: PendingChange,
    state: PendingState,
    /// Customer snapshots installed before this change was staged.
    staged_at: u64,
}

/// A customer as displayed, with optimistic changes applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRow {
    pub customer: Customer,
    pub balance: Decimal,
    pub status: DebtStatus,
    /// True while an unconfirmed change affects this customer.
    pub pending: bool,
}

pub struct Dashboard {
    customers: Vec<Customer>,
    transactions: Vec<Transaction>,
    stats: StoreStats,
    search: String,
    page: usize,
    per_page: usize,
    top_debtors: usize,
    thresholds: DebtThresholds,
    pending: Vec<PendingEntry>,
    next_token: u64,
    snapshots: u64,
    customer_feed: Option<Subscription<Customer>>,
    transaction_feed: Option<Subscription<Transaction>>,
}

impl Dashboard {
    /// A detached dashboard with no data and no subscriptions.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            customers: Vec::new(),
            transactions: Vec::new(),
            stats: StoreStats::default(),
            search: String::new(),
            page: 0,
            per_page: config.items_per_page.max(1),
            top_debtors: config.top_debtors,
            thresholds: config.debt_thresholds,
            pending: Vec::new(),
            next_token: 0,
            snapshots: 0,
            customer_feed: None,
            transaction_feed: None,
        }
    }

    /// Subscribes to the store's customers and recent transactions and loads
    /// the first snapshots and statistics.
    pub fn open<S: DocumentStore, A: AuthProvider>(
        ledger: &Ledger<S, A>,
    ) -> Result<Self, LedgerError> {
        let config = ledger.config();
        let mut dashboard = Self::new(config);
        dashboard.customer_feed = Some(ledger.watch_customers()?);
        dashboard.transaction_feed =
            Some(ledger.watch_transactions(config.recent_transactions_limit)?);
        dashboard.sync();
        dashboard.refresh_stats(ledger)?;
        Ok(dashboard)
    }

    /// Installs the newest snapshot from each subscription. Returns whether
    /// anything changed.
    pub fn sync(&mut self) -> bool {
        let customers = self.customer_feed.as_ref().and_then(|feed| feed.latest());
        let transactions = self.transaction_feed.as_ref().and_then(|feed| feed.latest());

        let changed = customers.is_some() || transactions.is_some();
        if let Some(customers) = customers {
            self.replace_customers(customers);
        }
        if let Some(transactions) = transactions {
            self.replace_transactions(transactions);
        }
        changed
    }

    pub fn refresh_stats<S: DocumentStore, A: AuthProvider>(
        &mut self,
        ledger: &Ledger<S, A>,
    ) -> Result<(), LedgerError> {
        self.stats = ledger.store_stats()?;
        Ok(())
    }

    /// Replaces the customer snapshot. Acknowledged changes are now part of
    /// the snapshot and are dropped; pending ones stay.
    pub fn replace_customers(&mut self, customers: Vec<Customer>) {
        self.customers = customers;
        self.snapshots += 1;
        self.pending
            .retain(|entry| entry.state == PendingState::Pending);
        self.clamp_page();
    }

    pub fn replace_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    // === Optimistic changes ===

    pub fn stage(&mut self, change: PendingChange) -> PendingToken {
        self.next_token += 1;
        let token = PendingToken(self.next_token);
        self.pending.push(PendingEntry {
            token,
            change,
            state: PendingState::Pending,
            staged_at: self.snapshots,
        });
        token
    }

    /// Marks a change as committed. Returns false for an unknown token.
    ///
    /// If a customer snapshot was installed after the change was staged, the
    /// change is taken to be part of it and is dropped right away.
    pub fn acknowledge(&mut self, token: PendingToken) -> bool {
        let Some(index) = self.pending.iter().position(|entry| entry.token == token) else {
            return false;
        };
        if self.pending[index].staged_at < self.snapshots {
            self.pending.remove(index);
        } else {
            self.pending[index].state = PendingState::Acknowledged;
        }
        true
    }

    /// Withdraws a change the store rejected and returns it.
    pub fn rollback(&mut self, token: PendingToken) -> Option<PendingChange> {
        let index = self.pending.iter().position(|entry| entry.token == token)?;
        Some(self.pending.remove(index).change)
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .iter()
            .any(|entry| entry.state == PendingState::Pending)
    }

    /// Records a transaction through `ledger`, showing it optimistically
    /// until the commit resolves.
    pub fn record_transaction<S: DocumentStore, A: AuthProvider>(
        &mut self,
        ledger: &Ledger<S, A>,
        new: NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        let token = self.stage(PendingChange::Record(LedgerEntry {
            customer_id: new.customer_id,
            kind: new.kind,
            amount: new.amount,
        }));
        match ledger.create_transaction(new) {
            Ok(transaction) => {
                self.acknowledge(token);
                Ok(transaction)
            }
            Err(error) => {
                self.rollback(token);
                Err(error)
            }
        }
    }

    /// Deletes a transaction through `ledger`, hiding it optimistically until
    /// the commit resolves.
    pub fn delete_transaction<S: DocumentStore, A: AuthProvider>(
        &mut self,
        ledger: &Ledger<S, A>,
        transaction: &Transaction,
    ) -> Result<(), LedgerError> {
        let entry = transaction.entry();
        let token = self.stage(PendingChange::Remove {
            transaction_id: transaction.id,
            entry,
        });
        match ledger.delete_transaction(transaction.id, entry.customer_id, entry.amount, entry.kind)
        {
            Ok(()) => {
                self.acknowledge(token);
                Ok(())
            }
            Err(error) => {
                self.rollback(token);
                Err(error)
            }
        }
    }

    // === Views ===

    /// Balance shown for a customer: snapshot value plus unconfirmed deltas.
    pub fn balance_of(&self, id: CustomerId) -> Option<Decimal> {
        self.customers
            .iter()
            .find(|c| c.id == id)
            .map(|c| self.effective_balance(c).0)
    }

    fn effective_balance(&self, customer: &Customer) -> (Decimal, bool) {
        self.pending
            .iter()
            .filter(|entry| entry.change.customer_id() == customer.id)
            .fold((customer.total_debt, false), |(balance, _), entry| {
                (balance.saturating_add(entry.change.delta()), true)
            })
    }

    fn row(&self, customer: &Customer) -> CustomerRow {
        let (balance, pending) = self.effective_balance(customer);
        CustomerRow {
            customer: customer.clone(),
            balance,
            status: self.thresholds.classify(balance),
            pending,
        }
    }

    /// Every customer matching the search term, newest first.
    pub fn customer_rows(&self) -> Vec<CustomerRow> {
        self.customers
            .iter()
            .filter(|c| c.matches(&self.search))
            .map(|c| self.row(c))
            .collect()
    }

    pub fn customer_page(&self) -> Vec<CustomerRow> {
        self.customer_rows()
            .into_iter()
            .skip(self.page * self.per_page)
            .take(self.per_page)
            .collect()
    }

    pub fn top_debtors(&self) -> Vec<CustomerRow> {
        let mut rows: Vec<CustomerRow> = self
            .customers
            .iter()
            .map(|c| self.row(c))
            .filter(|row| row.balance > Decimal::ZERO)
            .collect();
        rows.sort_by(|a, b| b.balance.cmp(&a.balance));
        rows.truncate(self.top_debtors);
        rows
    }

    /// Recent transactions, without those being deleted.
    pub fn recent_transactions(&self) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| {
                !self.pending.iter().any(|entry| {
                    matches!(entry.change, PendingChange::Remove { transaction_id, .. } if transaction_id == t.id)
                })
            })
            .collect()
    }

    // === Search and paging ===

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.page = 0;
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// At least one, even with no customers.
    pub fn page_count(&self) -> usize {
        let rows = self
            .customers
            .iter()
            .filter(|c| c.matches(&self.search))
            .count();
        rows.div_ceil(self.per_page).max(1)
    }

    pub fn next_page(&mut self) -> bool {
        if self.page + 1 < self.page_count() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    fn clamp_page(&mut self) {
        self.page = self.page.min(self.page_count() - 1);
    }
}
