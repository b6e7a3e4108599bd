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

//! Read-through node cache.
//!
//! Keys are org-prefixed (`node:<org>:<id>`) so identical ids in different
//! tenants can never collide. The durable store stays authoritative: writes
//! land there first and then refresh the cache; deletes evict. A stale
//! entry between those points is tolerated, a leaked one is not.

use moka::sync::Cache;
use std::time::Duration;

use metagraph_core::Node;

use crate::config::CacheConfig;

/// Response header reporting whether a node read was served from cache.
pub const X_NODE_CACHE: &str = "x-node-cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

#[derive(Clone)]
pub struct NodeCache {
    cache: Cache<String, Node>,
}

impl NodeCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        Self { cache }
    }

    fn key(org: &str, id: &str) -> String {
        format!("node:{org}:{id}")
    }

    pub fn get(&self, org: &str, id: &str) -> Option<Node> {
        self.cache.get(&Self::key(org, id))
    }

    pub fn insert(&self, node: &Node) {
        self.cache
            .insert(Self::key(&node.org_id, &node.id), node.clone());
    }

    pub fn remove(&self, org: &str, id: &str) {
        self.cache.invalidate(&Self::key(org, id));
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
