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

//! Org snapshot envelope used by metadata export and archived to the
//! snapshot object store. Records carry their full audit trail so a
//! round-trip through export/import preserves provenance.

use serde::{Deserialize, Serialize};

use crate::model::{now_rfc3339, Edge, Node};

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub version: String,
    pub org_id: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Snapshot {
    pub fn new(org_id: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            timestamp: now_rfc3339(),
            version: SNAPSHOT_VERSION.to_string(),
            org_id: org_id.to_string(),
            nodes,
            edges,
        }
    }
}
