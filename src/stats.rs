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

//! Store-wide statistics.

use crate::customer::Customer;
use crate::transaction::{Transaction, TransactionKind};
use rust_decimal::Decimal;
use serde::Serialize;

/// Dashboard figures for one store. The default value is all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StoreStats {
    pub total_customers: usize,
    /// Customers whose balance is strictly positive.
    pub customers_with_debt: usize,
    /// Sum of every customer's `total_debt`.
    pub total_debt: Decimal,
    /// Sum of debt transaction amounts.
    pub total_debts: Decimal,
    /// Sum of payment transaction amounts.
    pub total_payments: Decimal,
    pub total_transactions: usize,
}

impl StoreStats {
    /// Aggregates the given records. `None` when a sum leaves the `Decimal`
    /// range.
    pub fn compute(customers: &[Customer], transactions: &[Transaction]) -> Option<Self> {
        let (total_debts, total_payments) = transactions.iter().try_fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(debts, payments), t| match t.kind {
                TransactionKind::Debt => Some((debts.checked_add(t.amount)?, payments)),
                TransactionKind::Payment => Some((debts, payments.checked_add(t.amount)?)),
            },
        )?;
        let total_debt = customers
            .iter()
            .try_fold(Decimal::ZERO, |sum, c| sum.checked_add(c.total_debt))?;

        Some(Self {
            total_customers: customers.len(),
            customers_with_debt: customers.iter().filter(|c| c.has_debt()).count(),
            total_debt,
            total_debts,
            total_payments,
            total_transactions: transactions.len(),
        })
    }
}

/// The `n` customers with the largest positive balance, largest first.
pub fn top_debtors(customers: &[Customer], n: usize) -> Vec<Customer> {
    let mut debtors: Vec<&Customer> = customers.iter().filter(|c| c.has_debt()).collect();
    debtors.sort_by(|a, b| b.total_debt.cmp(&a.total_debt));
    debtors.into_iter().take(n).cloned().collect()
}
