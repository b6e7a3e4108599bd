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

//! Append-only blob store for org export snapshots. Blobs are written
//! under the configured root with a metadata sidecar; keys are never
//! overwritten in practice because they embed the export timestamp.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub exported_at: String,
    pub org_id: String,
    pub node_count: usize,
    pub edge_count: usize,
}

#[derive(Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Write the snapshot blob and its metadata sidecar. Returns the blob
    /// path.
    pub async fn put(
        &self,
        key: &str,
        blob: &[u8],
        metadata: &SnapshotMetadata,
    ) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;

        let blob_path = self.root.join(key);
        tokio::fs::write(&blob_path, blob).await?;

        let sidecar = serde_json::to_vec_pretty(metadata).map_err(std::io::Error::other)?;
        let sidecar_path = self.root.join(format!("{key}.meta.json"));
        tokio::fs::write(&sidecar_path, sidecar).await?;

        tracing::debug!(key, bytes = blob.len(), "snapshot archived");
        Ok(blob_path)
    }
}
