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

//! Transaction receipts.

use crate::config::LedgerConfig;
use crate::customer::Customer;
use crate::transaction::{Transaction, TransactionKind};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

/// `YYMMDD` of the issue date followed by a 4-digit serial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReceiptNumber(String);

impl ReceiptNumber {
    pub fn generate(issued_at: DateTime<Utc>) -> Self {
        Self::with_serial(issued_at, rand::rng().random_range(0..9999))
    }

    pub fn with_serial(issued_at: DateTime<Utc>, serial: u16) -> Self {
        Self(format!("{}{:04}", issued_at.format("%y%m%d"), serial % 10_000))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whole currency units with thousands separators, then the currency symbol.
pub fn format_amount(amount: Decimal, currency_symbol: &str) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    format!("{sign}{grouped} {currency_symbol}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub number: ReceiptNumber,
    pub issued_at: DateTime<Utc>,
    pub store_name: Option<String>,
    /// `None` when the customer has since been deleted.
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// The customer's balance when the receipt was issued.
    pub balance: Option<Decimal>,
    #[serde(skip)]
    currency_symbol: String,
}

impl Receipt {
    pub fn new(
        transaction: &Transaction,
        customer: Option<&Customer>,
        store_name: Option<String>,
        config: &LedgerConfig,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            number: ReceiptNumber::generate(issued_at),
            issued_at,
            store_name,
            customer_name: customer.map(|c| c.name.clone()),
            customer_phone: customer.map(|c| config.phone_rule.format(&c.phone)),
            kind: transaction.kind,
            amount: transaction.amount,
            description: transaction.description.clone(),
            recorded_at: transaction.created_at,
            balance: customer.map(|c| c.total_debt),
            currency_symbol: config.currency_symbol.clone(),
        }
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Receipt #{}", self.number)?;
        if let Some(store) = &self.store_name {
            writeln!(f, "Store: {store}")?;
        }
        writeln!(f, "Date: {}", self.recorded_at.format("%d/%m/%Y %H:%M"))?;
        match (&self.customer_name, &self.customer_phone) {
            (Some(name), Some(phone)) => writeln!(f, "Customer: {name} ({phone})")?,
            (Some(name), None) => writeln!(f, "Customer: {name}")?,
            _ => writeln!(f, "Customer: deleted customer")?,
        }
        writeln!(f, "Type: {}", self.kind)?;
        writeln!(
            f,
            "Amount: {}",
            format_amount(self.amount, &self.currency_symbol)
        )?;
        if let Some(description) = &self.description {
            writeln!(f, "Description: {description}")?;
        }
        if let Some(balance) = self.balance {
            write!(
                f,
                "Balance: {}",
                format_amount(balance, &self.currency_symbol)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{StoreId, TransactionId};
    use crate::customer::CustomerFields;
    use crate::transaction::NewTransaction;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn receipt_number_has_date_prefix_and_padded_serial() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap();
        assert_eq!(ReceiptNumber::with_serial(at, 42).as_str(), "2603070042");

        let generated = ReceiptNumber::generate(at);
        assert_eq!(generated.as_str().len(), 10);
        assert!(generated.as_str().starts_with("260307"));
        assert!(generated.as_str().bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn amounts_are_grouped_and_rounded() {
        assert_eq!(format_amount(dec!(0), "IQD"), "0 IQD");
        assert_eq!(format_amount(dec!(950), "IQD"), "950 IQD");
        assert_eq!(format_amount(dec!(50000), "IQD"), "50,000 IQD");
        assert_eq!(format_amount(dec!(1234567.5), "IQD"), "1,234,568 IQD");
        assert_eq!(format_amount(dec!(-20000), "IQD"), "-20,000 IQD");
        assert_eq!(format_amount(dec!(-0.4), "IQD"), "0 IQD");
    }

    #[test]
    fn renders_deleted_customer() {
        let config = LedgerConfig {
            currency_symbol: "IQD".into(),
            ..LedgerConfig::default()
        };
        let tx = NewTransaction::payment(crate::CustomerId::new(), dec!(20000))
            .into_transaction(TransactionId::new(), StoreId::new(), Utc::now());
        let receipt = Receipt::new(&tx, None, None, &config, Utc::now());
        let text = receipt.to_string();
        assert!(text.contains("Customer: deleted customer"));
        assert!(text.contains("Type: payment"));
        assert!(text.contains("Amount: 20,000 IQD"));
        assert!(!text.contains("Balance"));
    }

    #[test]
    fn renders_customer_and_balance() {
        let config = LedgerConfig {
            currency_symbol: "IQD".into(),
            ..LedgerConfig::default()
        };
        let mut customer = Customer::new(
            StoreId::new(),
            CustomerFields::new("Ali", "0512345678"),
            Utc::now(),
        );
        customer.total_debt = dec!(30000);
        let tx = NewTransaction::debt(customer.id, dec!(50000))
            .with_description("school books")
            .into_transaction(TransactionId::new(), customer.store_id, Utc::now());

        let receipt = Receipt::new(
            &tx,
            Some(&customer),
            Some("Al-Noor Books".into()),
            &config,
            Utc::now(),
        );
        let text = receipt.to_string();
        assert!(text.contains("Store: Al-Noor Books"));
        assert!(text.contains("Customer: Ali (0512345678)"));
        assert!(text.contains("Description: school books"));
        assert!(text.ends_with("Balance: 30,000 IQD"));
    }
}
