//! # attrguard: field-level attribute restriction
//!
//! Strips attributes from a record that the acting user may not view or
//! update. Rules name one attribute each and list, per action, the access
//! levels allowed to perform it:
//!
//! - **Level lists**: only users whose access level is listed keep the
//!   attribute.
//! - **Ownership** (`"self"`): the user the record belongs to keeps it.
//! - **Overrides**: levels listed before `"self"` keep it on any record.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Record + Rules + User + Action              │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  AttributeFilter                             │
//! │  ├─ Skip rules for absent attributes         │
//! │  ├─ Check the user's level is listed         │
//! │  └─ Resolve "self" against ownership         │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Same record, restricted attributes removed  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//!
//! ```
//! use attrguard::{Record, RestrictionRule, actions, filter};
//! use serde_json::json;
//!
//! let rules = vec![
//!     RestrictionRule::new("salary").restrict(actions::VIEW, ["admin"]),
//!     RestrictionRule::new("email").restrict(actions::UPDATE, ["admin", "self"]),
//! ];
//!
//! let mut object: Record =
//!     serde_json::from_value(json!({"id": 5, "salary": 100, "email": "a@x.com"})).unwrap();
//! let user: Record = serde_json::from_value(json!({"id": 5, "access": "user"})).unwrap();
//!
//! filter(&mut object, &rules, &user, actions::VIEW);
//! assert!(!object.contains_key("salary"));
//! assert!(object.contains_key("email"));
//! ```
//!
//! ### Custom field names
//!
//! ```
//! use attrguard::{AttributeFilter, FilterConfig, Record, RestrictionRule};
//! use serde_json::json;
//!
//! let config = FilterConfig::default()
//!     .with_object_id_attribute("owner_id")
//!     .with_access_attribute("role");
//! let filter = AttributeFilter::new(config);
//!
//! let rules = vec![RestrictionRule::new("phone").restrict("view", ["self"])];
//! let mut object: Record =
//!     serde_json::from_value(json!({"id": 10, "owner_id": 7, "phone": "555"})).unwrap();
//! let user: Record = serde_json::from_value(json!({"id": 7, "role": "user"})).unwrap();
//!
//! let report = filter.apply(&mut object, &rules, &user, "view");
//! assert!(report.is_unchanged());
//! ```

pub mod config;
pub mod filter;
pub mod record;
pub mod rules;


// Re-export commonly used types
// `self::` keeps the module distinct from the `config` crate.
pub use self::config::{ConfigError, ConfigLoader, FilterConfig};
pub use filter::{AllowReason, AttributeFilter, Decision, DenyReason, FilterReport, filter};
pub use record::Record;
pub use rules::{AccessToken, RestrictionRule, RuleError, validate_rules};

/// Common action names.
pub mod actions {
    /// Reading an attribute.
    pub const VIEW: &str = "view";
    /// Changing an attribute.
    pub const UPDATE: &str = "update";
}
