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

//! # Debt Ledger
//!
//! This library keeps the customer debt book of a small shop: customers, the
//! debts and payments recorded against them, and a running `total_debt` per
//! customer that always equals debts minus payments.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Store-scoped operations on customers and transactions
//! - [`DocumentStore`]: Storage seam with atomic multi-document batches and live queries
//! - [`MemoryStore`]: In-process store used for tests and embedding
//! - [`Session`]: Signed-in store principal
//! - [`Dashboard`]: View-model with search, paging and optimistic changes
//! - [`Receipt`]: Printable confirmation of one transaction
//!
//! ## Example
//!
//! ```
//! use debt_ledger::{Ledger, LedgerConfig, MemoryStore, NewCustomer, NewTransaction, Session, StoreId};
//! use rust_decimal_macros::dec;
//!
//! let ledger = Ledger::new(
//!     MemoryStore::new(),
//!     Session::signed_in(StoreId::new()),
//!     LedgerConfig::default(),
//! );
//!
//! let customer = ledger
//!     .create_customer(NewCustomer::new("Ahmed", "0512345678"))
//!     .unwrap();
//! ledger
//!     .create_transaction(NewTransaction::debt(customer.id, dec!(100)))
//!     .unwrap();
//! ledger
//!     .create_transaction(NewTransaction::payment(customer.id, dec!(40)))
//!     .unwrap();
//!
//! assert_eq!(ledger.customer(customer.id).unwrap().total_debt, dec!(60));
//! ```
//!
//! ## Consistency
//!
//! Every balance change is written in the same batch as the transaction that
//! causes it, and applied as a server-side increment. Concurrent writers for
//! the same customer never lose each other's updates, and a failed batch
//! leaves no trace.

pub mod auth;
mod base;
pub mod config;
pub mod customer;
pub mod dashboard;
pub mod error;
mod ledger;
pub mod memory;
pub mod phone;
pub mod realtime;
pub mod receipt;
pub mod stats;
pub mod store;
mod transaction;

pub use auth::{AuthProvider, Session, SignUpForm, StoreProfile};
pub use base::{CustomerId, StoreId, TransactionId};
pub use config::{ConfigError, LedgerConfig};
pub use customer::{Customer, CustomerFields, DebtStatus, DebtThresholds, NewCustomer};
pub use dashboard::{CustomerRow, Dashboard, PendingChange, PendingToken};
pub use error::{Collection, LedgerError, StoreError, ValidationError};
pub use ledger::Ledger;
pub use memory::MemoryStore;
pub use phone::PhoneRule;
pub use realtime::{Subscription, SubscriptionId};
pub use receipt::{Receipt, ReceiptNumber};
pub use stats::StoreStats;
pub use store::{Batch, CustomerQuery, DocumentStore, TransactionQuery, TransactionScope, WriteOp};
pub use transaction::{LedgerEntry, NewTransaction, Transaction, TransactionKind};
