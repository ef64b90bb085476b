//! Attribute-based policy decisions.
//!
//! The rule set is loaded once and never mutated, so the engine is shared
//! across requests without locking.

use std::sync::Arc;

use super::error::ServiceError;
use super::store::PolicyRuleStore;
use crate::models::policy_rule::WILDCARD;
use crate::models::PolicyRule;

const NOT_ANONYMOUS: &str = "!anonymous";
const ANONYMOUS: &str = "anonymous";
const SELF_SERVICE_PATH: &str = "/api/update-user";

/// The request attributes a decision is made on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest<'a> {
    pub sub_owner: &'a str,
    pub sub_name: &'a str,
    pub method: &'a str,
    pub url_path: &'a str,
    pub obj_owner: &'a str,
    pub obj_name: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AllowedByRule,
    AllowedSelfService,
    Denied,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        !matches!(self, Decision::Denied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::AllowedByRule => "allowed",
            Decision::AllowedSelfService => "allowed_self_service",
            Decision::Denied => "denied",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    rules: Arc<Vec<PolicyRule>>,
}

fn field_matches(value: &str, pattern: &str) -> bool {
    value == pattern || pattern == WILDCARD
}

impl PolicyEngine {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    /// Loads the startup rule set.
    pub async fn load(store: &dyn PolicyRuleStore) -> Result<Self, ServiceError> {
        let rules = store.load_rules().await?;
        tracing::info!(rules = rules.len(), "Policy rules loaded");
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    fn rule_matches(rule: &PolicyRule, req: &AccessRequest<'_>) -> bool {
        field_matches(req.sub_owner, &rule.sub_owner)
            && (field_matches(req.sub_name, &rule.sub_name)
                || (req.sub_name != ANONYMOUS && rule.sub_name == NOT_ANONYMOUS))
            && field_matches(req.method, &rule.method)
            && field_matches(req.url_path, &rule.url_path)
            && field_matches(req.obj_owner, &rule.obj_owner)
            && field_matches(req.obj_name, &rule.obj_name)
    }

    /// Allowed when any rule matches, or when a subject updates its own
    /// user record.
    pub fn decide(&self, req: &AccessRequest<'_>) -> Decision {
        if self.rules.iter().any(|rule| Self::rule_matches(rule, req)) {
            return Decision::AllowedByRule;
        }

        if req.url_path == SELF_SERVICE_PATH
            && req.sub_owner == req.obj_owner
            && req.sub_name == req.obj_name
        {
            return Decision::AllowedSelfService;
        }

        Decision::Denied
    }

    pub fn is_allowed(
        &self,
        sub_owner: &str,
        sub_name: &str,
        method: &str,
        url_path: &str,
        obj_owner: &str,
        obj_name: &str,
    ) -> bool {
        self.decide(&AccessRequest {
            sub_owner,
            sub_name,
            method,
            url_path,
            obj_owner,
            obj_name,
        })
        .is_allowed()
    }
}
