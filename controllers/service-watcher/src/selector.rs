//! Label selector deciding which objects are registerable.
//!
//! Supports the equality and existence subset of Kubernetes label selectors,
//! as a comma-separated list of terms that must all match:
//!
//! - `key=value` / `key==value`
//! - `key!=value`
//! - `key` (label present)
//! - `!key` (label absent)
//!
//! Terms are parsed into [`kube::core::Expression`]s and evaluated by kube's
//! own selector matching.

use crate::error::ControllerError;
use kube::core::{Expression, SelectorExt};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Conjunction of label terms. An empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector(kube::core::Selector);

impl Selector {
    /// Returns true when every term matches `labels`.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.matches(labels)
    }
}

fn label_key(raw: &str, selector: &str) -> Result<String, ControllerError> {
    let key = raw.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(ControllerError::InvalidConfig(format!(
            "invalid label key '{raw}' in selector '{selector}'"
        )));
    }
    Ok(key.to_string())
}

fn parse_term(raw: &str, selector: &str) -> Result<Expression, ControllerError> {
    let term = if let Some((k, v)) = raw.split_once("!=") {
        Expression::NotEqual(label_key(k, selector)?, v.trim().to_string())
    } else if let Some((k, v)) = raw.split_once("==") {
        Expression::Equal(label_key(k, selector)?, v.trim().to_string())
    } else if let Some((k, v)) = raw.split_once('=') {
        Expression::Equal(label_key(k, selector)?, v.trim().to_string())
    } else if let Some(k) = raw.strip_prefix('!') {
        Expression::DoesNotExist(label_key(k, selector)?)
    } else {
        Expression::Exists(label_key(raw, selector)?)
    };
    Ok(term)
}

impl FromStr for Selector {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| parse_term(t, s))
            .collect::<Result<kube::core::Selector, _>>()
            .map(Self)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
