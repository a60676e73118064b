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

//! Live query integration tests.

use debt_ledger::{
    Customer, CustomerId, Dashboard, Ledger, LedgerConfig, LedgerEntry, LedgerError, MemoryStore,
    NewCustomer, NewTransaction, PendingChange, Session, StoreError, StoreId, TransactionKind,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_millis(200);

fn ledger() -> Ledger<Arc<MemoryStore>, Session> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Ledger::new(
        Arc::new(MemoryStore::new()),
        Session::signed_in(StoreId::new()),
        LedgerConfig::default(),
    )
}

fn balances(snapshot: &[Customer]) -> Vec<Decimal> {
    snapshot.iter().map(|c| c.total_debt).collect()
}

#[test]
fn subscriber_sees_initial_and_committed_state() {
    let ledger = ledger();
    let ahmed = ledger
        .create_customer(NewCustomer::new("Ahmed", "0512345678"))
        .unwrap();

    let customers = ledger.watch_customers().unwrap();
    let initial = customers.recv_timeout(WAIT).unwrap();
    assert_eq!(balances(&initial), vec![Decimal::ZERO]);

    ledger
        .create_transaction(NewTransaction::debt(ahmed.id, dec!(100)))
        .unwrap();
    let updated = customers.recv_timeout(WAIT).unwrap();
    assert_eq!(balances(&updated), vec![dec!(100)]);
}

#[test]
fn failed_commit_is_not_published() {
    let ledger = ledger();
    let ahmed = ledger
        .create_customer(NewCustomer::new("Ahmed", "0512345678"))
        .unwrap();
    let customers = ledger.watch_customers().unwrap();
    let transactions = ledger.watch_transactions(10).unwrap();
    customers.recv_timeout(WAIT).unwrap();
    transactions.recv_timeout(WAIT).unwrap();

    let ghost = CustomerId::new();
    let result = ledger.create_transaction(NewTransaction::debt(ghost, dec!(5)));
    assert_eq!(result, Err(LedgerError::CustomerNotFound(ghost)));

    assert!(customers.try_recv().is_none());
    assert!(transactions.try_recv().is_none());
    assert_eq!(ledger.customer(ahmed.id).unwrap().total_debt, Decimal::ZERO);

    ledger
        .create_transaction(NewTransaction::debt(ahmed.id, Decimal::MAX))
        .unwrap();
    assert!(customers.recv_timeout(WAIT).is_some());
    assert!(transactions.recv_timeout(WAIT).is_some());

    let result = ledger.create_transaction(NewTransaction::debt(ahmed.id, Decimal::ONE));
    assert_eq!(
        result,
        Err(LedgerError::Commit(StoreError::Overflow { id: ahmed.id }))
    );
    assert!(customers.try_recv().is_none());
    assert!(transactions.try_recv().is_none());
}

#[test]
fn subscriptions_are_scoped_to_store() {
    let store = Arc::new(MemoryStore::new());
    let first = Ledger::new(
        store.clone(),
        Session::signed_in(StoreId::new()),
        LedgerConfig::default(),
    );
    let second = Ledger::new(
        store.clone(),
        Session::signed_in(StoreId::new()),
        LedgerConfig::default(),
    );

    let feed = second.watch_customers().unwrap();
    assert_eq!(feed.recv_timeout(WAIT), Some(Vec::new()));

    first
        .create_customer(NewCustomer::new("Ahmed", "0512345678"))
        .unwrap();
    assert!(feed.try_recv().is_none());
}

#[test]
fn unsubscribe_stops_delivery() {
    let ledger = ledger();
    let customers = ledger.watch_customers().unwrap();
    assert_eq!(ledger.store().subscriber_count(), 1);

    customers.unsubscribe();
    assert_eq!(ledger.store().subscriber_count(), 0);

    ledger
        .create_customer(NewCustomer::new("Ahmed", "0512345678"))
        .unwrap();
    assert_eq!(ledger.store().customer_count(), 1);
}

#[test]
fn transaction_feed_respects_limit() {
    let ledger = ledger();
    let ahmed = ledger
        .create_customer(NewCustomer::new("Ahmed", "0512345678"))
        .unwrap();
    let feed = ledger.watch_transactions(2).unwrap();
    assert_eq!(feed.recv_timeout(WAIT), Some(Vec::new()));

    for amount in [dec!(1), dec!(2), dec!(3)] {
        ledger
            .create_transaction(NewTransaction::debt(ahmed.id, amount))
            .unwrap();
    }

    let latest = feed.latest().unwrap();
    let amounts: Vec<Decimal> = latest.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![dec!(3), dec!(2)]);
}

#[test]
fn dashboard_follows_store() {
    let ledger = ledger();
    let ahmed = ledger
        .create_customer(NewCustomer::new("Ahmed", "0512345678"))
        .unwrap();

    let mut dashboard = Dashboard::open(&ledger).unwrap();
    assert_eq!(dashboard.customer_rows().len(), 1);
    assert_eq!(ledger.store().subscriber_count(), 2);

    let tx = dashboard
        .record_transaction(&ledger, NewTransaction::debt(ahmed.id, dec!(100)))
        .unwrap();
    assert_eq!(dashboard.balance_of(ahmed.id), Some(dec!(100)));

    assert!(dashboard.sync());
    assert!(!dashboard.has_pending());
    assert_eq!(dashboard.balance_of(ahmed.id), Some(dec!(100)));
    assert_eq!(dashboard.recent_transactions().len(), 1);

    dashboard.delete_transaction(&ledger, &tx).unwrap();
    dashboard.sync();
    assert_eq!(dashboard.balance_of(ahmed.id), Some(Decimal::ZERO));
    assert!(dashboard.recent_transactions().is_empty());

    dashboard.refresh_stats(&ledger).unwrap();
    assert_eq!(dashboard.stats().total_customers, 1);

    drop(dashboard);
    assert_eq!(ledger.store().subscriber_count(), 0);
}

#[test]
fn dashboard_counts_change_once_when_snapshot_arrives_first() {
    let ledger = ledger();
    let ahmed = ledger
        .create_customer(NewCustomer::new("Ahmed", "0512345678"))
        .unwrap();
    let mut dashboard = Dashboard::open(&ledger).unwrap();

    let token = dashboard.stage(PendingChange::Record(LedgerEntry {
        customer_id: ahmed.id,
        kind: TransactionKind::Debt,
        amount: dec!(10),
    }));
    ledger
        .create_transaction(NewTransaction::debt(ahmed.id, dec!(10)))
        .unwrap();
    assert!(dashboard.sync());
    assert!(dashboard.acknowledge(token));
    dashboard.sync();

    assert_eq!(ledger.customer(ahmed.id).unwrap().total_debt, dec!(10));
    assert_eq!(dashboard.balance_of(ahmed.id), Some(dec!(10)));
    assert!(!dashboard.has_pending());
}

#[test]
fn dashboard_rolls_back_rejected_change() {
    let ledger = ledger();
    let ahmed = ledger
        .create_customer(NewCustomer::new("Ahmed", "0512345678"))
        .unwrap();
    let mut dashboard = Dashboard::open(&ledger).unwrap();

    ledger.store().set_available(false);
    let result = dashboard.record_transaction(&ledger, NewTransaction::debt(ahmed.id, dec!(50)));
    ledger.store().set_available(true);

    assert_eq!(result, Err(LedgerError::Commit(StoreError::Unavailable)));
    assert!(!dashboard.has_pending());
    assert_eq!(dashboard.balance_of(ahmed.id), Some(Decimal::ZERO));
    assert!(!dashboard.sync());
}
