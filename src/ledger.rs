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

//! Ledger balance maintenance.
//!
//! The [`Ledger`] keeps every customer's `total_debt` equal to the signed sum
//! of that customer's transactions:
//!
//! ```text
//! total_debt == Σ amount(debt) − Σ amount(payment)
//! ```
//!
//! # Operations
//!
//! - **Create transaction**: insert the record and increment the balance by
//!   `+amount` (debt) or `-amount` (payment) in one atomic batch.
//! - **Delete transaction**: remove the record and apply the reversal of its
//!   stored entry in one atomic batch.
//! - **Delete customer**: remove all of the customer's transactions and the
//!   customer in one atomic batch.
//! - **Edit customer fields**: name, phone, address and notes only; the
//!   balance cannot be written through this path.
//!
//! Every operation requires a signed-in principal and only sees that store's
//! records. Failures are returned unchanged; nothing is retried.

use crate::auth::AuthProvider;
use crate::base::{CustomerId, StoreId, TransactionId};
use crate::config::LedgerConfig;
use crate::customer::{Customer, CustomerFields, NewCustomer};
use crate::error::{Collection, LedgerError, StoreError, ValidationError};
use crate::realtime::Subscription;
use crate::receipt::Receipt;
use crate::stats::{self, StoreStats};
use crate::store::{Batch, CustomerQuery, DocumentStore, TransactionQuery, WriteOp};
use crate::transaction::{LedgerEntry, NewTransaction, Transaction, TransactionKind};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Customer ledger for the signed-in store.
///
/// # Invariants
///
/// - A customer is created with a zero balance.
/// - The balance only changes through store-side increments committed in the
///   same batch as the transaction insert or removal that causes them.
/// - A failed operation leaves customers and transactions untouched.
pub struct Ledger<S, A> {
    store: S,
    auth: A,
    config: LedgerConfig,
}

impl<S: DocumentStore, A: AuthProvider> Ledger<S, A> {
    pub fn new(store: S, auth: A, config: LedgerConfig) -> Self {
        Self {
            store,
            auth,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn principal(&self) -> Result<StoreId, LedgerError> {
        self.auth.principal().ok_or(LedgerError::AuthRequired)
    }

    fn owned_customer(&self, store_id: StoreId, id: CustomerId) -> Result<Customer, LedgerError> {
        match self.store.customer(id).map_err(LedgerError::Store)? {
            Some(customer) if customer.store_id == store_id => Ok(customer),
            _ => Err(LedgerError::CustomerNotFound(id)),
        }
    }

    fn owned_transaction(
        &self,
        store_id: StoreId,
        id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        match self.store.transaction(id).map_err(LedgerError::Store)? {
            Some(transaction) if transaction.store_id == store_id => Ok(transaction),
            _ => Err(LedgerError::TransactionNotFound(id)),
        }
    }

    fn ensure_unique_phone(
        &self,
        store_id: StoreId,
        phone: &str,
        except: Option<CustomerId>,
    ) -> Result<(), LedgerError> {
        let taken = self
            .store
            .customers(&CustomerQuery::for_store(store_id))
            .map_err(LedgerError::Store)?
            .iter()
            .any(|c| c.phone == phone && Some(c.id) != except);
        if taken {
            return Err(ValidationError::DuplicatePhone(phone.to_string()).into());
        }
        Ok(())
    }

    // === Customers ===

    /// Creates a customer with a zero balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AuthRequired`] - No principal.
    /// - [`LedgerError::Validation`] - Missing name, bad or duplicate phone.
    /// - [`LedgerError::Commit`] - The insert was rejected.
    pub fn create_customer(&self, fields: NewCustomer) -> Result<Customer, LedgerError> {
        let store_id = self.principal()?;
        let fields = fields.validate(self.config.phone_rule)?;
        self.ensure_unique_phone(store_id, &fields.phone, None)?;

        let customer = Customer::new(store_id, fields, Utc::now());
        self.store
            .insert_customer(customer.clone())
            .map_err(LedgerError::Commit)?;

        info!(customer_id = %customer.id, %store_id, "customer created");
        Ok(customer)
    }

    /// Replaces name, phone, address and notes. The balance is not touched.
    ///
    /// Returns the customer as stored after the update.
    pub fn edit_customer_fields(
        &self,
        id: CustomerId,
        fields: CustomerFields,
    ) -> Result<Customer, LedgerError> {
        let store_id = self.principal()?;
        let fields = fields.validate(self.config.phone_rule)?;
        self.owned_customer(store_id, id)?;
        self.ensure_unique_phone(store_id, &fields.phone, Some(id))?;

        self.store
            .update_customer(id, fields, Utc::now())
            .map_err(|error| match error {
                StoreError::MissingDocument {
                    collection: Collection::Customers,
                    ..
                } => LedgerError::CustomerNotFound(id),
                other => LedgerError::Commit(other),
            })?;

        info!(customer_id = %id, "customer fields updated");
        self.owned_customer(store_id, id)
    }

    /// Deletes the customer and every transaction referencing it, atomically.
    ///
    /// The transactions are resolved inside the commit, so one recorded
    /// concurrently is removed too rather than left dangling.
    pub fn delete_customer(&self, id: CustomerId) -> Result<(), LedgerError> {
        let store_id = self.principal()?;
        self.owned_customer(store_id, id)?;

        let batch = Batch::new()
            .with(WriteOp::DeleteTransactionsOf(id))
            .with(WriteOp::DeleteCustomer(id));
        self.store.commit(batch).map_err(LedgerError::Commit)?;

        info!(customer_id = %id, "customer deleted with its transactions");
        Ok(())
    }

    pub fn customer(&self, id: CustomerId) -> Result<Customer, LedgerError> {
        let store_id = self.principal()?;
        self.owned_customer(store_id, id)
    }

    /// All customers of the store, newest first.
    pub fn customers(&self) -> Result<Vec<Customer>, LedgerError> {
        let store_id = self.principal()?;
        self.store
            .customers(&CustomerQuery::for_store(store_id))
            .map_err(LedgerError::Store)
    }

    /// Customers whose name contains `term` (ignoring case) or whose phone
    /// contains it.
    pub fn search_customers(&self, term: &str) -> Result<Vec<Customer>, LedgerError> {
        let mut customers = self.customers()?;
        customers.retain(|c| c.matches(term));
        Ok(customers)
    }

    // === Transactions ===

    /// Records a transaction and adjusts the customer's balance atomically.
    ///
    /// The customer is not looked up first. The balance increment carries the
    /// principal's store and fails inside the commit when the customer is
    /// missing or belongs to another store, which rejects the whole batch.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AuthRequired`] - No principal, or `store_id` names a
    ///   store other than the principal's.
    /// - [`LedgerError::Validation`] - Amount is not positive.
    /// - [`LedgerError::CustomerNotFound`] - No such customer in this store.
    /// - [`LedgerError::Commit`] - Nothing was recorded, e.g. the balance
    ///   would overflow.
    pub fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, LedgerError> {
        let principal = self.principal()?;
        new.validate()?;
        let store_id = match new.store_id {
            Some(store_id) if store_id != principal => return Err(LedgerError::AuthRequired),
            _ => principal,
        };

        let now = Utc::now();
        let transaction = new.into_transaction(TransactionId::new(), store_id, now);
        let batch = Batch::new()
            .with(WriteOp::InsertTransaction(transaction.clone()))
            .with(WriteOp::IncrementDebt {
                store_id,
                customer_id: transaction.customer_id,
                delta: transaction.signed_amount(),
                updated_at: now,
            });
        self.store.commit(batch).map_err(|error| match error {
            StoreError::MissingDocument {
                collection: Collection::Customers,
                ..
            } => LedgerError::CustomerNotFound(transaction.customer_id),
            other => LedgerError::Commit(other),
        })?;

        info!(
            transaction_id = %transaction.id,
            customer_id = %transaction.customer_id,
            kind = %transaction.kind,
            amount = %transaction.amount,
            "transaction recorded"
        );
        Ok(transaction)
    }

    /// Deletes a transaction and reverses its effect on the balance.
    ///
    /// The reversal is taken from the stored record inside the commit. The
    /// caller's `customer_id`, `amount` and `kind` must match that record;
    /// otherwise the commit fails with [`StoreError::Conflict`] and nothing
    /// changes.
    pub fn delete_transaction(
        &self,
        id: TransactionId,
        customer_id: CustomerId,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Result<(), LedgerError> {
        self.remove_transaction(
            id,
            Some(LedgerEntry {
                customer_id,
                kind,
                amount,
            }),
        )
    }

    /// Deletes a transaction, reversing whatever the stored record says.
    pub fn delete_transaction_by_id(&self, id: TransactionId) -> Result<(), LedgerError> {
        self.remove_transaction(id, None)
    }

    fn remove_transaction(
        &self,
        id: TransactionId,
        expected: Option<LedgerEntry>,
    ) -> Result<(), LedgerError> {
        let store_id = self.principal()?;
        self.owned_transaction(store_id, id)?;

        let batch = Batch::new().with(WriteOp::RemoveTransaction {
            id,
            expected,
            updated_at: Utc::now(),
        });
        self.store.commit(batch).map_err(|error| match error {
            StoreError::MissingDocument {
                collection: Collection::Transactions,
                ..
            } => LedgerError::TransactionNotFound(id),
            other => LedgerError::Commit(other),
        })?;

        info!(transaction_id = %id, "transaction deleted and reversed");
        Ok(())
    }

    pub fn transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let store_id = self.principal()?;
        self.owned_transaction(store_id, id)
    }

    /// The customer's transactions, newest first.
    pub fn customer_transactions(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let store_id = self.principal()?;
        let mut transactions = self
            .store
            .transactions(&TransactionQuery::for_customer(customer_id))
            .map_err(LedgerError::Store)?;
        transactions.retain(|t| t.store_id == store_id);
        Ok(transactions)
    }

    /// The store's newest `limit` transactions.
    pub fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>, LedgerError> {
        let store_id = self.principal()?;
        self.store
            .transactions(&TransactionQuery::for_store(store_id).with_limit(Some(limit)))
            .map_err(LedgerError::Store)
    }

    // === Statistics ===

    /// Store statistics, or all zeros when the store cannot be read or a
    /// total is not representable.
    ///
    /// Only a missing principal is reported as an error.
    pub fn store_stats(&self) -> Result<StoreStats, LedgerError> {
        let store_id = self.principal()?;
        let read = || -> Result<Option<StoreStats>, StoreError> {
            let customers = self.store.customers(&CustomerQuery::for_store(store_id))?;
            let transactions = self.store.transactions(
                &TransactionQuery::for_store(store_id)
                    .with_limit(self.config.stats_transaction_window),
            )?;
            Ok(StoreStats::compute(&customers, &transactions))
        };

        match read() {
            Ok(Some(stats)) => {
                debug!(%store_id, ?stats, "store statistics computed");
                Ok(stats)
            }
            Ok(None) => {
                warn!(%store_id, "store statistics overflow, using zeros");
                Ok(StoreStats::default())
            }
            Err(error) => {
                warn!(%store_id, %error, "store statistics unavailable, using zeros");
                Ok(StoreStats::default())
            }
        }
    }

    /// Customers with the largest positive balances, largest first.
    pub fn top_debtors(&self) -> Result<Vec<Customer>, LedgerError> {
        let customers = self.customers()?;
        Ok(stats::top_debtors(&customers, self.config.top_debtors))
    }

    // === Realtime ===

    pub fn watch_customers(&self) -> Result<Subscription<Customer>, LedgerError> {
        let store_id = self.principal()?;
        self.store
            .watch_customers(CustomerQuery::for_store(store_id))
            .map_err(LedgerError::Store)
    }

    pub fn watch_transactions(
        &self,
        limit: usize,
    ) -> Result<Subscription<Transaction>, LedgerError> {
        let store_id = self.principal()?;
        self.store
            .watch_transactions(TransactionQuery::for_store(store_id).with_limit(Some(limit)))
            .map_err(LedgerError::Store)
    }

    // === Receipts ===

    /// Issues a receipt for a transaction. A deleted customer is rendered as
    /// such rather than failing.
    pub fn receipt(&self, transaction_id: TransactionId) -> Result<Receipt, LedgerError> {
        let store_id = self.principal()?;
        let transaction = self.owned_transaction(store_id, transaction_id)?;
        let customer = match self.owned_customer(store_id, transaction.customer_id) {
            Ok(customer) => Some(customer),
            Err(LedgerError::CustomerNotFound(_)) => None,
            Err(other) => return Err(other),
        };
        let store_name = self.auth.profile().map(|p| p.name);

        let receipt = Receipt::new(
            &transaction,
            customer.as_ref(),
            store_name,
            &self.config,
            Utc::now(),
        );
        debug!(%transaction_id, number = %receipt.number, "receipt issued");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use crate::memory::MemoryStore;
    use rust_decimal_macros::dec;

    fn ledger() -> Ledger<MemoryStore, Session> {
        Ledger::new(
            MemoryStore::new(),
            Session::signed_in(StoreId::new()),
            LedgerConfig::default(),
        )
    }

    #[test]
    fn mismatched_store_id_is_rejected() {
        let ledger = ledger();
        let customer = ledger
            .create_customer(CustomerFields::new("Ali", "0512345678"))
            .unwrap();

        let result = ledger.create_transaction(
            NewTransaction::debt(customer.id, dec!(10)).with_store(StoreId::new()),
        );
        assert_eq!(result, Err(LedgerError::AuthRequired));
        assert_eq!(ledger.store().transaction_count(), 0);
    }

    #[test]
    fn explicit_matching_store_id_is_accepted() {
        let ledger = ledger();
        let store_id = ledger.auth().principal().unwrap();
        let customer = ledger
            .create_customer(CustomerFields::new("Ali", "0512345678"))
            .unwrap();

        let tx = ledger
            .create_transaction(NewTransaction::debt(customer.id, dec!(10)).with_store(store_id))
            .unwrap();
        assert_eq!(tx.store_id, store_id);
    }

    #[test]
    fn other_stores_records_are_not_found() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let first = Ledger::new(
            store.clone(),
            Session::signed_in(StoreId::new()),
            LedgerConfig::default(),
        );
        let second = Ledger::new(
            store,
            Session::signed_in(StoreId::new()),
            LedgerConfig::default(),
        );

        let customer = first
            .create_customer(CustomerFields::new("Ali", "0512345678"))
            .unwrap();
        let tx = first
            .create_transaction(NewTransaction::debt(customer.id, dec!(5)))
            .unwrap();

        assert_eq!(
            second.customer(customer.id),
            Err(LedgerError::CustomerNotFound(customer.id))
        );
        assert_eq!(
            second.delete_transaction_by_id(tx.id),
            Err(LedgerError::TransactionNotFound(tx.id))
        );
        assert!(second.customers().unwrap().is_empty());
        assert!(second.customer_transactions(customer.id).unwrap().is_empty());
    }
}
