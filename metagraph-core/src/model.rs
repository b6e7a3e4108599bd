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

//! Graph entities.
//!
//! A [`Node`] is a typed vertex inside an organization; an [`Edge`] is a
//! directed, typed relationship between two nodes of the same org. Identity
//! is the composite `(id, org_id)`: the same id may coexist across orgs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Node `type` applied when a create request carries none.
pub const DEFAULT_NODE_TYPE: &str = "default";

/// Edge `relationship_type` applied when a create request carries none.
pub const DEFAULT_RELATIONSHIP_TYPE: &str = "related";

/// Reserved property key whose value lists the property keys to embed.
pub const VECTORIZE_KEY: &str = "vectorize";

/// Audit trail shared by nodes and edges.
///
/// `created_at`/`created_by` are set once at insertion and never altered;
/// `updated_at`/`updated_by` reflect the last mutation. Timestamps are
/// RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: String,
    pub updated_at: String,
    pub created_by: String,
    pub updated_by: String,
    pub user_agent: String,
    pub client_ip: String,
}

impl Audit {
    /// Fresh audit block for a newly created record.
    pub fn new(principal: &str, user_agent: &str, client_ip: &str) -> Self {
        let now = now_rfc3339();
        Self {
            created_at: now.clone(),
            updated_at: now,
            created_by: principal.to_string(),
            updated_by: principal.to_string(),
            user_agent: user_agent.to_string(),
            client_ip: client_ip.to_string(),
        }
    }

    /// Advance the mutable half of the audit trail for an update.
    pub fn touch(&mut self, principal: &str, user_agent: &str, client_ip: &str) {
        self.updated_at = now_rfc3339();
        self.updated_by = principal.to_string();
        self.user_agent = user_agent.to_string();
        self.client_ip = client_ip.to_string();
    }
}

/// A typed vertex scoped to an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub org_id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub properties: Value,
    #[serde(flatten)]
    pub audit: Audit,
}

/// A directed, typed relationship between two nodes of the same org.
///
/// `from_node`/`to_node` are plain references; self-loops are allowed and
/// dangling edges are cleaned up by node deletion, not enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub org_id: String,
    pub from_node: String,
    pub to_node: String,
    pub relationship_type: String,
    pub properties: Value,
    #[serde(flatten)]
    pub audit: Audit,
}

/// Generate an opaque record id for callers that did not supply one.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current instant as an RFC 3339 string (second precision is enough for
/// audit ordering; sub-second survives round-trips unharmed).
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Shallow-merge `patch` over `existing` at the top level; patch wins on
/// overlapping keys. Non-object inputs degrade to whichever side is an
/// object, or the patch verbatim.
pub fn merge_properties(existing: &Value, patch: &Value) -> Value {
    match (existing, patch) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (Value::Object(_), Value::Null) => existing.clone(),
        _ => patch.clone(),
    }
}
