//! Attribute filtering.
//!
//! Evaluates restriction rules against one record for one user and action,
//! and removes the attributes the user may not touch.
//!
//! ## Evaluation
//!
//! For each rule, in order:
//!
//! 1. Skip it unless the record has the attribute and the rule restricts the
//!    action.
//! 2. Allow a user whose access level is listed and no `"self"` is listed.
//! 3. Allow the record's owner whenever `"self"` is listed.
//! 4. Allow a non-owner whose level is listed strictly before `"self"`.
//! 5. Restrict everyone else, including users whose level is not listed or
//!    missing.
//!
//! Membership is always checked before positions are compared, so an unlisted
//! level can never win the `"self"` position comparison.

use serde_json::Value;
use tracing::{trace, warn};

use crate::config::FilterConfig;
use crate::record::{Record, identities_match};
use crate::rules::{AccessToken, RestrictionRule};

/// Why a rule left an attribute in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// The user's level is listed and the list has no `"self"` entry.
    Listed,
    /// The list has a `"self"` entry and the user owns the record.
    Owner,
    /// The user's level is listed before `"self"`, so ownership is not required.
    Override,
}

/// Why a rule removed an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The user's level is missing or not in the list, and ownership does not
    /// apply.
    NotListed,
    /// The user's level is listed at or after `"self"` and the user does not
    /// own the record.
    NotOwner,
}

/// Outcome of evaluating one rule against one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The record lacks the attribute or the rule does not restrict the action.
    NotApplicable,
    /// The attribute stays.
    Allow(AllowReason),
    /// The attribute is removed.
    Deny(DenyReason),
}

impl Decision {
    /// Returns `true` if the attribute must be removed.
    pub fn is_restricted(&self) -> bool {
        matches!(self, Decision::Deny(_))
    }
}

/// Per-rule decisions from one filtering pass, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    decisions: Vec<(String, Decision)>,
}

impl FilterReport {
    /// Returns every `(attribute, decision)` pair.
    pub fn decisions(&self) -> &[(String, Decision)] {
        &self.decisions
    }

    /// Returns the attributes that were removed.
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.decisions
            .iter()
            .filter(|(_, d)| d.is_restricted())
            .map(|(name, _)| name.as_str())
    }

    /// Returns the restricted attributes the user kept access to.
    pub fn retained(&self) -> impl Iterator<Item = &str> {
        self.decisions
            .iter()
            .filter(|(_, d)| matches!(d, Decision::Allow(_)))
            .map(|(name, _)| name.as_str())
    }

    /// Returns `true` if nothing was removed.
    pub fn is_unchanged(&self) -> bool {
        self.removed().next().is_none()
    }
}

/// Applies restriction rules to records.
///
/// Holds the field-name bindings and whether to emit audit events. It carries
/// no per-call state and can be shared freely.
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    config: FilterConfig,

    /// Whether to log restricted attributes.
    audit_enabled: bool,
}

impl Default for AttributeFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl AttributeFilter {
    /// Creates a filter using the given field-name bindings.
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            audit_enabled: true,
        }
    }

    /// Disables audit logging.
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    /// Returns the field-name bindings.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Removes every attribute of `object` the user may not access for
    /// `action`, and hands back the same record.
    ///
    /// Never fails: malformed or missing data resolves to "skip" or
    /// "restrict".
    ///
    /// # Examples
    ///
    /// ```
    /// use attrguard::{AttributeFilter, FilterConfig, Record, RestrictionRule};
    /// use serde_json::json;
    ///
    /// let filter = AttributeFilter::new(FilterConfig::default()).without_audit();
    /// let rules = vec![RestrictionRule::new("salary").restrict("view", ["admin"])];
    ///
    /// let mut object: Record = serde_json::from_value(json!({"id": 1, "salary": 100})).unwrap();
    /// let user: Record = serde_json::from_value(json!({"id": 1, "access": "user"})).unwrap();
    ///
    /// filter.filter(&mut object, &rules, &user, "view");
    /// assert!(!object.contains_key("salary"));
    /// ```
    pub fn filter<'a>(
        &self,
        object: &'a mut Record,
        rules: &[RestrictionRule],
        user: &Record,
        action: &str,
    ) -> &'a mut Record {
        self.apply(object, rules, user, action);
        object
    }

    /// Like [`filter`](Self::filter), returning what each rule decided.
    pub fn apply(
        &self,
        object: &mut Record,
        rules: &[RestrictionRule],
        user: &Record,
        action: &str,
    ) -> FilterReport {
        let mut report = FilterReport::default();

        for rule in rules {
            let decision = self.evaluate(object, rule, user, action);

            if self.audit_enabled {
                trace!(
                    attribute = %rule.name,
                    action = %action,
                    decision = ?decision,
                    "Restriction rule evaluated"
                );
            }

            if decision.is_restricted() {
                object.remove(&rule.name);
            }

            report.decisions.push((rule.name.clone(), decision));
        }

        if self.audit_enabled && !report.is_unchanged() {
            let removed: Vec<&str> = report.removed().collect();
            warn!(
                action = %action,
                user = ?user.get(&self.config.user_id_attribute),
                removed_attributes = ?removed,
                "Attributes restricted by rule"
            );
        }

        report
    }

    /// Decides a single rule without modifying the record.
    pub fn evaluate(
        &self,
        object: &Record,
        rule: &RestrictionRule,
        user: &Record,
        action: &str,
    ) -> Decision {
        if !object.contains_key(&rule.name) {
            return Decision::NotApplicable;
        }

        let Some(allowed) = rule.restrictions_for(action) else {
            return Decision::NotApplicable;
        };

        let level_position = user
            .get(&self.config.access_attribute)
            .and_then(|level| position_of_level(allowed, level));
        let owner_position = allowed.iter().position(AccessToken::is_owner);

        let is_owner = || {
            let user_id = user
                .get(&self.config.user_id_attribute)
                .filter(|id| !id.is_null());
            let object_id = object
                .get(&self.config.object_id_attribute)
                .filter(|id| !id.is_null());

            if self.config.require_identity && (user_id.is_none() || object_id.is_none()) {
                return false;
            }
            identities_match(user_id, object_id)
        };

        match (level_position, owner_position) {
            (Some(_), None) => Decision::Allow(AllowReason::Listed),
            (None, None) => Decision::Deny(DenyReason::NotListed),
            (None, Some(_)) => {
                if is_owner() {
                    Decision::Allow(AllowReason::Owner)
                } else {
                    Decision::Deny(DenyReason::NotListed)
                }
            }
            (Some(level), Some(owner)) => {
                if is_owner() {
                    Decision::Allow(AllowReason::Owner)
                } else if level < owner {
                    Decision::Allow(AllowReason::Override)
                } else {
                    Decision::Deny(DenyReason::NotOwner)
                }
            }
        }
    }
}

/// Returns the first position of the user's level in the list.
fn position_of_level(allowed: &[AccessToken], level: &Value) -> Option<usize> {
    allowed.iter().position(|token| token.matches(level))
}

/// Filters `object` with the default field-name bindings (`id`, `id`,
/// `access`).
pub fn filter<'a>(
    object: &'a mut Record,
    rules: &[RestrictionRule],
    user: &Record,
    action: &str,
) -> &'a mut Record {
    AttributeFilter::default().filter(object, rules, user, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn quiet() -> AttributeFilter {
        AttributeFilter::default().without_audit()
    }

    #[test]
    fn test_evaluate_attribute_absent() {
        let rule = RestrictionRule::new("salary").restrict("view", ["admin"]);
        let object = record(json!({"id": 1}));
        let user = record(json!({"id": 1, "access": "user"}));

        assert_eq!(
            quiet().evaluate(&object, &rule, &user, "view"),
            Decision::NotApplicable
        );
    }

    #[test]
    fn test_evaluate_action_unrestricted() {
        let rule = RestrictionRule::new("salary").restrict("update", ["admin"]);
        let object = record(json!({"id": 1, "salary": 100}));
        let user = record(json!({"id": 1, "access": "user"}));

        assert_eq!(
            quiet().evaluate(&object, &rule, &user, "view"),
            Decision::NotApplicable
        );
    }

    #[test]
    fn test_evaluate_reasons() {
        let rule = RestrictionRule::new("email").restrict("view", ["admin", "self", "user"]);
        let object = record(json!({"id": 5, "email": "a@x.com"}));
        let filter = quiet();

        let admin = record(json!({"id": 6, "access": "admin"}));
        let owner = record(json!({"id": 5, "access": "user"}));
        let other = record(json!({"id": 6, "access": "user"}));
        let guest = record(json!({"id": 6, "access": "guest"}));

        assert_eq!(
            filter.evaluate(&object, &rule, &admin, "view"),
            Decision::Allow(AllowReason::Override)
        );
        assert_eq!(
            filter.evaluate(&object, &rule, &owner, "view"),
            Decision::Allow(AllowReason::Owner)
        );
        assert_eq!(
            filter.evaluate(&object, &rule, &other, "view"),
            Decision::Deny(DenyReason::NotOwner)
        );
        assert_eq!(
            filter.evaluate(&object, &rule, &guest, "view"),
            Decision::Deny(DenyReason::NotListed)
        );
    }

    #[test]
    fn test_evaluate_does_not_mutate() {
        let rule = RestrictionRule::new("salary").restrict("view", ["admin"]);
        let object = record(json!({"id": 1, "salary": 100}));
        let user = record(json!({"id": 1, "access": "user"}));

        let decision = quiet().evaluate(&object, &rule, &user, "view");
        assert!(decision.is_restricted());
        assert_eq!(object.get("salary"), Some(&json!(100)));
    }

    #[test]
    fn test_level_listed_after_self_is_owner_only() {
        // "user" sits after "self", so it reaches only the user's own record.
        let rule = RestrictionRule::new("phone").restrict("update", ["self", "user"]);
        let object = record(json!({"id": 5, "phone": "555"}));
        let filter = quiet();

        let owner = record(json!({"id": 5, "access": "user"}));
        let other = record(json!({"id": 9, "access": "user"}));

        assert_eq!(
            filter.evaluate(&object, &rule, &owner, "update"),
            Decision::Allow(AllowReason::Owner)
        );
        assert_eq!(
            filter.evaluate(&object, &rule, &other, "update"),
            Decision::Deny(DenyReason::NotOwner)
        );
    }

    #[test]
    fn test_empty_list_restricts_everyone() {
        let rule = RestrictionRule::new("secret").restrict("view", Vec::<AccessToken>::new());
        let object = record(json!({"id": 1, "secret": "s"}));
        let user = record(json!({"id": 1, "access": "admin"}));

        assert_eq!(
            quiet().evaluate(&object, &rule, &user, "view"),
            Decision::Deny(DenyReason::NotListed)
        );
    }

    #[test]
    fn test_apply_reports_in_rule_order() {
        let rules = vec![
            RestrictionRule::new("salary").restrict("view", ["admin"]),
            RestrictionRule::new("name").restrict("view", ["user"]),
            RestrictionRule::new("missing").restrict("view", ["admin"]),
        ];
        let mut object = record(json!({"id": 1, "salary": 100, "name": "Ann"}));
        let user = record(json!({"id": 1, "access": "user"}));

        let report = quiet().apply(&mut object, &rules, &user, "view");

        assert_eq!(
            report.decisions(),
            &[
                ("salary".to_string(), Decision::Deny(DenyReason::NotListed)),
                ("name".to_string(), Decision::Allow(AllowReason::Listed)),
                ("missing".to_string(), Decision::NotApplicable),
            ]
        );
        assert_eq!(report.removed().collect::<Vec<_>>(), vec!["salary"]);
        assert_eq!(report.retained().collect::<Vec<_>>(), vec!["name"]);
        assert!(!report.is_unchanged());
        assert_eq!(object, record(json!({"id": 1, "name": "Ann"})));
    }

    #[test]
    fn test_filter_returns_same_record() {
        let rules = vec![RestrictionRule::new("salary").restrict("view", ["admin"])];
        let mut object = record(json!({"id": 1, "salary": 100}));
        let user = record(json!({"id": 1, "access": "user"}));

        let ptr: *const Record = &object;
        let returned = quiet().filter(&mut object, &rules, &user, "view");
        assert!(std::ptr::eq(ptr, returned));
    }

    #[test]
    fn test_audit_enabled_by_default() {
        let rules = vec![RestrictionRule::new("salary").restrict("view", ["admin"])];
        let mut object = record(json!({"id": 1, "salary": 100}));
        let user = record(json!({"id": 2, "access": "user"}));

        // Logging must not alter the outcome.
        let report = AttributeFilter::default().apply(&mut object, &rules, &user, "view");
        assert_eq!(report.removed().collect::<Vec<_>>(), vec!["salary"]);
    }
}
