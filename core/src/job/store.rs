use crate::frames::GeneratedFrame;

use forge_psd::{Document, LayerTree};

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::JobId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("artifact store backend failed: {0}")]
	Backend(String),
}

/// What a completed job leaves behind.
#[derive(Debug, Clone)]
pub struct JobArtifacts {
	pub document: Document,
	pub layers: LayerTree,
	pub frames: Vec<GeneratedFrame>,
}

/// Key value storage for job artifacts, keyed by job id.
#[async_trait]
pub trait ArtifactStore: fmt::Debug + Send + Sync + 'static {
	async fn put(&self, job_id: JobId, artifacts: Arc<JobArtifacts>) -> Result<(), StoreError>;

	async fn get(&self, job_id: JobId) -> Option<Arc<JobArtifacts>>;

	/// Returns whether something was stored under `job_id`.
	async fn delete(&self, job_id: JobId) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
	artifacts: RwLock<HashMap<JobId, Arc<JobArtifacts>>>,
}

impl MemoryArtifactStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.artifacts.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.artifacts.read().await.is_empty()
	}
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
	async fn put(&self, job_id: JobId, artifacts: Arc<JobArtifacts>) -> Result<(), StoreError> {
		self.artifacts.write().await.insert(job_id, artifacts);
		Ok(())
	}

	async fn get(&self, job_id: JobId) -> Option<Arc<JobArtifacts>> {
		self.artifacts.read().await.get(&job_id).cloned()
	}

	async fn delete(&self, job_id: JobId) -> bool {
		self.artifacts.write().await.remove(&job_id).is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use forge_psd::ColorMode;

	fn artifacts() -> Arc<JobArtifacts> {
		Arc::new(JobArtifacts {
			document: Document {
				width: 10,
				height: 10,
				color_mode: ColorMode::Rgb,
				bits_per_channel: 8,
				channel_count: 3,
			},
			layers: LayerTree::default(),
			frames: vec![],
		})
	}

	#[tokio::test]
	async fn deleting_leaves_other_jobs_alone() {
		let store = MemoryArtifactStore::new();
		let (a, b) = (JobId::new(), JobId::new());

		store.put(a, artifacts()).await.unwrap();
		store.put(b, artifacts()).await.unwrap();

		assert!(store.delete(a).await);
		assert!(!store.delete(a).await);
		assert!(store.get(a).await.is_none());
		assert!(store.get(b).await.is_some());
		assert_eq!(store.len().await, 1);
	}
}
