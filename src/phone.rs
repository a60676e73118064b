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

//! Phone number rules.
//!
//! A deployment picks exactly one [`PhoneRule`]; it is applied to customer
//! creation, customer edits, sign-up and display alike.
//!
//! ```
//! use debt_ledger::PhoneRule;
//!
//! assert!(PhoneRule::SaudiMobile.is_valid("0512345678"));
//! assert!(PhoneRule::Iraqi.is_valid("0770 123 456"));
//! assert_eq!(PhoneRule::Iraqi.format("0770123456"), "0770 123 456");
//! ```

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneRule {
    /// `05` followed by 8 digits, exactly as typed.
    #[default]
    SaudiMobile,
    /// Digits only after stripping separators: `07` + 8 digits, `964` + 8
    /// digits, or an 8-digit landline.
    Iraqi,
}

impl PhoneRule {
    /// Canonical stored form of `phone` under this rule.
    pub fn normalize(self, phone: &str) -> String {
        match self {
            Self::SaudiMobile => phone.trim().to_string(),
            Self::Iraqi => phone.chars().filter(char::is_ascii_digit).collect(),
        }
    }

    pub fn is_valid(self, phone: &str) -> bool {
        let normalized = self.normalize(phone);
        match self {
            Self::SaudiMobile => {
                normalized.len() == 10
                    && normalized.starts_with("05")
                    && normalized.bytes().all(|b| b.is_ascii_digit())
            }
            Self::Iraqi => match normalized.len() {
                10 => normalized.starts_with("07"),
                11 => normalized.starts_with("964"),
                8 => true,
                _ => false,
            },
        }
    }

    /// Validates `phone` and returns its normalized form.
    pub fn validate(self, phone: &str) -> Result<String, ValidationError> {
        if phone.trim().is_empty() {
            return Err(ValidationError::MissingField("phone"));
        }
        if !self.is_valid(phone) {
            return Err(ValidationError::InvalidPhone {
                phone: phone.to_string(),
                rule: self,
            });
        }
        Ok(self.normalize(phone))
    }

    /// Human-readable grouping. Numbers that do not match the rule are
    /// returned unchanged.
    pub fn format(self, phone: &str) -> String {
        match self {
            Self::SaudiMobile => phone.to_string(),
            Self::Iraqi => {
                let digits = self.normalize(phone);
                match digits.len() {
                    11 if digits.starts_with("964") => format!(
                        "+{} {} {} {}",
                        &digits[..3],
                        &digits[3..6],
                        &digits[6..9],
                        &digits[9..]
                    ),
                    10 if digits.starts_with("07") => {
                        format!("{} {} {}", &digits[..4], &digits[4..7], &digits[7..])
                    }
                    8 => format!("{} {}", &digits[..4], &digits[4..]),
                    _ => phone.to_string(),
                }
            }
        }
    }
}

impl fmt::Display for PhoneRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SaudiMobile => f.write_str("saudi_mobile"),
            Self::Iraqi => f.write_str("iraqi"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saudi_rule_requires_05_and_ten_digits() {
        let rule = PhoneRule::SaudiMobile;
        assert!(rule.is_valid("0512345678"));
        assert!(rule.is_valid(" 0598765432 "));
        assert!(!rule.is_valid("0712345678"));
        assert!(!rule.is_valid("051234567"));
        assert!(!rule.is_valid("05123456789"));
        assert!(!rule.is_valid("05 1234 5678"));
        assert!(!rule.is_valid("05abcdefgh"));
    }

    #[test]
    fn iraqi_rule_accepts_mobile_international_and_landline() {
        let rule = PhoneRule::Iraqi;
        assert!(rule.is_valid("0770123456"));
        assert!(rule.is_valid("0770-123-456"));
        assert!(rule.is_valid("+964 770 123 45"));
        assert!(rule.is_valid("1234 5678"));
        assert!(!rule.is_valid("0512345678"));
        assert!(!rule.is_valid("12345"));
    }

    #[test]
    fn validate_reports_missing_and_invalid() {
        assert_eq!(
            PhoneRule::SaudiMobile.validate("   "),
            Err(ValidationError::MissingField("phone"))
        );
        assert_eq!(
            PhoneRule::SaudiMobile.validate("0712345678"),
            Err(ValidationError::InvalidPhone {
                phone: "0712345678".into(),
                rule: PhoneRule::SaudiMobile,
            })
        );
        assert_eq!(
            PhoneRule::Iraqi.validate("0770 123 456").unwrap(),
            "0770123456"
        );
    }

    #[test]
    fn iraqi_format_groups_digits() {
        let rule = PhoneRule::Iraqi;
        assert_eq!(rule.format("0770123456"), "0770 123 456");
        assert_eq!(rule.format("96477012345"), "+964 770 123 45");
        assert_eq!(rule.format("12345678"), "1234 5678");
        assert_eq!(rule.format("12-34"), "12-34");
    }

    #[test]
    fn rule_deserializes_from_snake_case() {
        let rule: PhoneRule = serde_json::from_str("\"iraqi\"").unwrap();
        assert_eq!(rule, PhoneRule::Iraqi);
        assert_eq!(PhoneRule::default(), PhoneRule::SaudiMobile);
    }
}
