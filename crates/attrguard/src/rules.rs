//! Restriction rules.
//!
//! A [`RestrictionRule`] names one attribute and, per action, the ordered list
//! of access levels allowed to perform that action on it. The reserved level
//! `"self"` ([`AccessToken::Owner`]) admits the user the record belongs to.
//!
//! Order inside a list matters: levels listed before `"self"` keep access to
//! records they do not own, levels listed after it only reach their own.
//!
//! ```
//! use attrguard::rules::{AccessToken, RestrictionRule};
//!
//! let rule = RestrictionRule::new("email")
//!     .restrict("view", ["admin", "self"])
//!     .restrict("update", ["self"]);
//!
//! assert_eq!(
//!     rule.restrictions_for("update"),
//!     Some(&[AccessToken::Owner][..]),
//! );
//! assert!(rule.restrictions_for("delete").is_none());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::record::numbers_equal;

/// The reserved level that admits the record's owner.
pub const OWNER_TOKEN: &str = "self";

/// Errors raised by rule validation.
///
/// Filtering itself never fails; these only surface from
/// [`RestrictionRule::validate`], [`validate_rules`] and deserialization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    /// The rule does not name an attribute.
    #[error("Restriction rule has an empty attribute name")]
    EmptyName,

    /// An action key is the empty string.
    #[error("Restriction rule '{rule}' has an empty action name")]
    EmptyAction { rule: String },

    /// The same level appears twice in one list, making its position ambiguous.
    #[error("Restriction rule '{rule}' lists '{token}' more than once for action '{action}'")]
    DuplicateToken {
        rule: String,
        action: String,
        token: String,
    },

    /// A level is neither a string nor a number.
    #[error("Invalid access token: {0}")]
    InvalidToken(String),
}

/// Result type for rule validation.
pub type Result<T> = std::result::Result<T, RuleError>;

/// One entry in a rule's list of allowed access levels.
///
/// Serialized as the bare JSON string or number, so `["admin", 3, "self"]`
/// is a valid list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum AccessToken {
    /// `"self"`: the user owns the record.
    Owner,
    /// A named access level such as `"admin"`.
    Name(String),
    /// A numeric access level.
    Number(Number),
}

impl AccessToken {
    /// Returns `true` for the reserved `"self"` level.
    pub fn is_owner(&self) -> bool {
        matches!(self, AccessToken::Owner)
    }

    /// Returns whether a user's access level equals this token.
    ///
    /// Strings compare exactly and numbers compare by value. A string never
    /// equals a number: `"1"` does not match `1`.
    pub fn matches(&self, level: &Value) -> bool {
        match (self, level) {
            (AccessToken::Owner, Value::String(s)) => s == OWNER_TOKEN,
            (AccessToken::Name(name), Value::String(s)) => name == s,
            (AccessToken::Number(n), Value::Number(m)) => numbers_equal(n, m),
            _ => false,
        }
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessToken::Owner => f.write_str(OWNER_TOKEN),
            AccessToken::Name(name) => f.write_str(name),
            AccessToken::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        if s == OWNER_TOKEN {
            AccessToken::Owner
        } else {
            AccessToken::Name(s.to_string())
        }
    }
}

impl From<String> for AccessToken {
    fn from(s: String) -> Self {
        if s == OWNER_TOKEN {
            AccessToken::Owner
        } else {
            AccessToken::Name(s)
        }
    }
}

impl From<i64> for AccessToken {
    fn from(n: i64) -> Self {
        AccessToken::Number(Number::from(n))
    }
}

impl From<u64> for AccessToken {
    fn from(n: u64) -> Self {
        AccessToken::Number(Number::from(n))
    }
}

impl TryFrom<Value> for AccessToken {
    type Error = RuleError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(AccessToken::from(s)),
            Value::Number(n) => Ok(AccessToken::Number(n)),
            other => Err(RuleError::InvalidToken(format!(
                "expected a string or number, found {other}"
            ))),
        }
    }
}

impl From<AccessToken> for Value {
    fn from(token: AccessToken) -> Self {
        match token {
            AccessToken::Owner => Value::String(OWNER_TOKEN.to_string()),
            AccessToken::Name(name) => Value::String(name),
            AccessToken::Number(n) => Value::Number(n),
        }
    }
}

/// Access restrictions for a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionRule {
    /// Attribute the rule governs.
    pub name: String,

    /// Allowed access levels per action, in priority order.
    ///
    /// An action with no entry is unrestricted for this attribute.
    #[serde(default)]
    pub restrictions: BTreeMap<String, Vec<AccessToken>>,
}

impl RestrictionRule {
    /// Creates a rule with no restrictions for the given attribute.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            restrictions: BTreeMap::new(),
        }
    }

    /// Sets the allowed levels for an action, replacing any previous list.
    pub fn restrict<I, T>(mut self, action: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<AccessToken>,
    {
        self.restrictions
            .insert(action.into(), levels.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the allowed levels for an action, if the action is restricted.
    pub fn restrictions_for(&self, action: &str) -> Option<&[AccessToken]> {
        self.restrictions.get(action).map(Vec::as_slice)
    }

    /// Checks the rule's shape.
    ///
    /// An empty level list is valid: it restricts the action for everyone.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RuleError::EmptyName);
        }

        for (action, levels) in &self.restrictions {
            if action.is_empty() {
                return Err(RuleError::EmptyAction {
                    rule: self.name.clone(),
                });
            }

            for (i, token) in levels.iter().enumerate() {
                if levels[..i].contains(token) {
                    return Err(RuleError::DuplicateToken {
                        rule: self.name.clone(),
                        action: action.clone(),
                        token: token.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Validates every rule, stopping at the first malformed one.
pub fn validate_rules(rules: &[RestrictionRule]) -> Result<()> {
    rules.iter().try_for_each(RestrictionRule::validate)
}
