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

//! Ledger configuration.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```yaml
//! phone_rule: iraqi
//! items_per_page: 25
//! recent_transactions_limit: 50
//! stats_transaction_window: ~
//! top_debtors: 5
//! currency_symbol: "د.ع"
//! debt_thresholds:
//!   low: "50000"
//!   medium: "200000"
//! ```

use crate::customer::DebtThresholds;
use crate::phone::PhoneRule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// The one phone rule applied to customers and sign-up.
    pub phone_rule: PhoneRule,
    /// Customer rows per dashboard page.
    pub items_per_page: usize,
    /// Size of the recent-transactions feed.
    pub recent_transactions_limit: usize,
    /// Newest transactions included in statistics. `None` covers the whole ledger.
    pub stats_transaction_window: Option<usize>,
    pub top_debtors: usize,
    pub currency_symbol: String,
    pub debt_thresholds: DebtThresholds,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            phone_rule: PhoneRule::default(),
            items_per_page: 25,
            recent_transactions_limit: 50,
            stats_transaction_window: None,
            top_debtors: 5,
            currency_symbol: "د.ع".to_string(),
            debt_thresholds: DebtThresholds::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

impl LedgerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&yaml)?;
        tracing::debug!(path = %path.display(), phone_rule = %config.phone_rule, "ledger config loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.items_per_page == 0 {
            return Err(ConfigError::Invalid("items_per_page must be at least 1"));
        }
        if self.recent_transactions_limit == 0 {
            return Err(ConfigError::Invalid(
                "recent_transactions_limit must be at least 1",
            ));
        }
        if self.debt_thresholds.low > self.debt_thresholds.medium {
            return Err(ConfigError::Invalid(
                "debt_thresholds.low must not exceed debt_thresholds.medium",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_document_yields_defaults() {
        let config = LedgerConfig::from_yaml("").unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.items_per_page, 25);
        assert_eq!(config.recent_transactions_limit, 50);
        assert_eq!(config.phone_rule, PhoneRule::SaudiMobile);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let yaml = r#"
phone_rule: iraqi
items_per_page: 10
stats_transaction_window: 50
debt_thresholds:
  low: "75000"
"#;
        let config = LedgerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.phone_rule, PhoneRule::Iraqi);
        assert_eq!(config.items_per_page, 10);
        assert_eq!(config.stats_transaction_window, Some(50));
        assert_eq!(config.debt_thresholds.low, dec!(75000));
        assert_eq!(config.debt_thresholds.medium, dec!(200000));
        assert_eq!(config.top_debtors, 5);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = LedgerConfig::from_yaml("dark_mode: true\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn zero_page_size_is_invalid() {
        let result = LedgerConfig::from_yaml("items_per_page: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let error = LedgerConfig::load("/nonexistent/ledger.yaml").unwrap_err();
        assert!(error.to_string().contains("/nonexistent/ledger.yaml"));
    }
}
