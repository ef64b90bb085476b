//! Policy rules in the line format `p, subOwner, subName, method, urlPath, objOwner, objName`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use thiserror::Error;

/// Rules only ever grant; a request with no matching rule is denied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    pub sub_owner: String,
    pub sub_name: String,
    pub method: String,
    pub url_path: String,
    pub obj_owner: String,
    pub obj_name: String,
    #[sqlx(skip)]
    #[serde(default)]
    pub effect: Effect,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("line {line}: expected policy type \"p\", found {found:?}")]
    UnknownPolicyType { line: usize, found: String },

    #[error("line {line}: expected 6 fields after the policy type, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: unsupported effect {found:?}")]
    UnsupportedEffect { line: usize, found: String },
}

pub const WILDCARD: &str = "*";

/// Rules written to the rule store at boot.
pub const SEED_RULES: &str = "\
p, built-in, *, *, *, *, *
p, app, *, *, *, *, *
p, *, *, POST, /api/signup, *, *
p, *, *, POST, /api/get-email-and-phone, *, *
p, *, *, POST, /api/login, *, *
p, *, *, GET, /api/get-app-login, *, *
p, *, *, POST, /api/logout, *, *
p, *, *, GET, /api/get-account, *, *
p, *, *, POST, /api/login/oauth/access_token, *, *
p, *, *, POST, /api/login/oauth/refresh_token, *, *
p, *, *, GET, /api/get-application, *, *
p, *, *, GET, /api/get-users, *, *
p, *, *, GET, /api/get-user, *, *
p, *, *, GET, /api/get-organizations, *, *
p, *, *, GET, /api/get-user-application, *, *
p, *, *, GET, /api/get-default-providers, *, *
p, *, *, GET, /api/get-resources, *, *
p, *, *, POST, /api/upload-avatar, *, *
p, *, *, POST, /api/unlink, *, *
p, *, *, POST, /api/set-password, *, *
p, *, *, POST, /api/send-verification-code, *, *
p, *, *, GET, /api/get-human-check, *, *
p, *, *, POST, /api/reset-email-or-phone, *, *
p, *, *, POST, /api/upload-resource, *, *
p, *, *, GET, /.well-known/openid-configuration, *, *
p, *, *, *, /api/certs, *, *
p, *, *, GET, /api/get-saml-login, *, *
p, *, *, POST, /api/acs, *, *
";

impl PolicyRule {
    pub fn new(
        sub_owner: &str,
        sub_name: &str,
        method: &str,
        url_path: &str,
        obj_owner: &str,
        obj_name: &str,
    ) -> Self {
        Self {
            sub_owner: sub_owner.to_string(),
            sub_name: sub_name.to_string(),
            method: method.to_string(),
            url_path: url_path.to_string(),
            obj_owner: obj_owner.to_string(),
            obj_name: obj_name.to_string(),
            effect: Effect::Allow,
        }
    }

    /// Parses one rule line. An optional eighth field must read `allow`.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self, RuleParseError> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        if fields[0] != "p" {
            return Err(RuleParseError::UnknownPolicyType {
                line: line_no,
                found: fields[0].to_string(),
            });
        }

        let values = &fields[1..];
        match values.len() {
            6 => {}
            7 if values[6].eq_ignore_ascii_case("allow") => {}
            7 => {
                return Err(RuleParseError::UnsupportedEffect {
                    line: line_no,
                    found: values[6].to_string(),
                })
            }
            n => {
                return Err(RuleParseError::FieldCount {
                    line: line_no,
                    found: n,
                })
            }
        }

        Ok(Self::new(
            values[0], values[1], values[2], values[3], values[4], values[5],
        ))
    }

    /// Parses a rule document, skipping blank lines and `#` comments.
    pub fn parse_rules(text: &str) -> Result<Vec<Self>, RuleParseError> {
        text.lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(line_no, line)| Self::parse_line(line, line_no))
            .collect()
    }

    pub fn seed() -> Result<Vec<Self>, RuleParseError> {
        Self::parse_rules(SEED_RULES)
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p, {}, {}, {}, {}, {}, {}",
            self.sub_owner, self.sub_name, self.method, self.url_path, self.obj_owner, self.obj_name
        )
    }
}
