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

//! Metagraph Core
//!
//! Fundamental data structures for the property-graph metadata service:
//! typed nodes, directed typed edges, permission scopes, and the snapshot
//! envelope used by import/export.

pub mod model;
pub mod permission;
pub mod snapshot;

pub use model::{
    generate_id, merge_properties, now_rfc3339, Audit, Edge, Node, DEFAULT_NODE_TYPE,
    DEFAULT_RELATIONSHIP_TYPE, VECTORIZE_KEY,
};
pub use permission::{PermissionLevel, PermissionSet, Scope};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
