// Copyright 2025 Metagraph (https://github.com/metagraph)
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

//! Permission scopes.
//!
//! Tokens carry a `permissions` claim listing scopes of the form
//! `<org>:<level>`, with `*` accepted on either side. Levels are ordered
//! `read < write < audit`; a held level satisfies any requirement at or
//! below it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Access level required by a route, ordered `Read < Write < Audit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Read,
    Write,
    Audit,
}

impl PermissionLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "audit" => Some(Self::Audit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Audit => "audit",
        }
    }
}

/// One parsed `<org>:<level>` scope. The org side is kept verbatim (`*`
/// included); a `None` level is the `*` level wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    org: String,
    level: Option<PermissionLevel>,
}

impl Scope {
    /// Parse a single scope string. Returns `None` for anything that is not
    /// `<org>:<level>` with a recognized level or `*` on either side.
    pub fn parse(raw: &str) -> Option<Self> {
        let (org, level) = raw.trim().split_once(':')?;
        if org.is_empty() {
            return None;
        }
        let level = match level {
            "*" => None,
            other => Some(PermissionLevel::parse(other)?),
        };
        Some(Self {
            org: org.to_string(),
            level,
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Whether this scope grants `level` on `org`.
    pub fn satisfies(&self, org: &str, level: PermissionLevel) -> bool {
        if self.org != "*" && self.org != org {
            return false;
        }
        match self.level {
            None => true,
            Some(held) => held >= level,
        }
    }
}

/// The full set of scopes held by a principal.
///
/// Unparseable entries are dropped rather than rejected: a token with one
/// malformed scope still authorizes what its valid scopes grant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    scopes: Vec<Scope>,
}

impl PermissionSet {
    pub fn from_scopes<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scopes = raw
            .into_iter()
            .filter_map(|s| Scope::parse(s.as_ref()))
            .collect();
        Self { scopes }
    }

    /// Build from the raw `permissions` claim: a JSON array of strings or a
    /// single comma-joined string.
    pub fn from_claim(claim: &Value) -> Self {
        match claim {
            Value::Array(items) => {
                Self::from_scopes(items.iter().filter_map(|v| v.as_str()))
            }
            Value::String(joined) => Self::from_scopes(joined.split(',')),
            _ => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Whether any held scope grants `level` on `org`.
    pub fn allows(&self, org: &str, level: PermissionLevel) -> bool {
        self.scopes.iter().any(|s| s.satisfies(org, level))
    }

    /// Distinct org identifiers across held scopes, in order of appearance.
    pub fn orgs(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for scope in &self.scopes {
            if !seen.iter().any(|o| o == scope.org()) {
                seen.push(scope.org().to_string());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_ordering() {
        assert!(PermissionLevel::Read < PermissionLevel::Write);
        assert!(PermissionLevel::Write < PermissionLevel::Audit);
    }

    #[test]
    fn test_scope_parse_rejects_malformed() {
        assert!(Scope::parse("acme").is_none());
        assert!(Scope::parse(":read").is_none());
        assert!(Scope::parse("acme:owner").is_none());
        assert!(Scope::parse("").is_none());
    }

    #[test]
    fn test_exact_scope_satisfaction() {
        let scope = Scope::parse("acme:write").unwrap();
        assert!(scope.satisfies("acme", PermissionLevel::Read));
        assert!(scope.satisfies("acme", PermissionLevel::Write));
        assert!(!scope.satisfies("acme", PermissionLevel::Audit));
        assert!(!scope.satisfies("other", PermissionLevel::Read));
    }

    #[test]
    fn test_org_wildcard() {
        let scope = Scope::parse("*:write").unwrap();
        assert!(scope.satisfies("acme", PermissionLevel::Write));
        assert!(scope.satisfies("load-test", PermissionLevel::Read));
        assert!(!scope.satisfies("acme", PermissionLevel::Audit));
    }

    #[test]
    fn test_level_wildcard() {
        let scope = Scope::parse("acme:*").unwrap();
        assert!(scope.satisfies("acme", PermissionLevel::Audit));
        assert!(!scope.satisfies("other", PermissionLevel::Read));
    }

    #[test]
    fn test_full_wildcard() {
        let scope = Scope::parse("*:*").unwrap();
        assert!(scope.satisfies("anything", PermissionLevel::Audit));
    }

    #[test]
    fn test_set_from_array_claim() {
        let set = PermissionSet::from_claim(&json!(["acme:read", "load-test:write"]));
        assert!(set.allows("acme", PermissionLevel::Read));
        assert!(!set.allows("acme", PermissionLevel::Write));
        assert!(set.allows("load-test", PermissionLevel::Write));
    }

    #[test]
    fn test_set_from_comma_joined_claim() {
        let set = PermissionSet::from_claim(&json!("acme:read, load-test:audit"));
        assert!(set.allows("acme", PermissionLevel::Read));
        assert!(set.allows("load-test", PermissionLevel::Audit));
    }

    #[test]
    fn test_set_drops_malformed_entries() {
        let set = PermissionSet::from_claim(&json!(["nonsense", "acme:read"]));
        assert!(set.allows("acme", PermissionLevel::Read));
        assert!(!set.allows("nonsense", PermissionLevel::Read));
    }

    #[test]
    fn test_set_from_non_string_claim_is_empty() {
        let set = PermissionSet::from_claim(&json!(42));
        assert!(set.is_empty());
        assert!(!set.allows("acme", PermissionLevel::Read));
    }

    #[test]
    fn test_orgs_are_distinct_in_order() {
        let set =
            PermissionSet::from_claim(&json!(["acme:read", "acme:write", "beta:read", "*:read"]));
        assert_eq!(set.orgs(), vec!["acme", "beta", "*"]);
    }
}
