use super::similarity;
use crate::{
    error::{ApiError, Result},
    models::{EmbeddedRecord, RecommendationFilters, ScoredStrain},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Finds the catalog entries closest to a query vector.
///
/// The flat-file scan below is the only implementation; a real vector store can
/// replace it without the recommendation pipeline noticing.
#[async_trait]
pub trait CandidateSearch: Send + Sync {
    async fn top_matches(
        &self,
        query: &[f32],
        filters: Option<&RecommendationFilters>,
        k: usize,
    ) -> Result<Vec<ScoredStrain>>;
}

/// The on-disk embedding index: one JSON array of [`EmbeddedRecord`]s.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A sibling file unique to this write, so concurrent savers never share one.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "index".into());
        name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }

    pub async fn load(&self) -> Result<Vec<EmbeddedRecord>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            ApiError::IndexError(format!(
                "cannot read {} ({}); rebuild it via /strains/embed-strains",
                self.path.display(),
                e
            ))
        })?;

        let records: Vec<EmbeddedRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::IndexError(format!("{} is not a valid index: {}", self.path.display(), e))
        })?;

        debug!("Loaded {} embedded strains from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// Replace the snapshot. The new content is written next to the target and
    /// renamed over it, so a concurrent `load` sees either the old or the new file
    /// and overlapping saves (server and CLI) each rename a complete file.
    pub async fn save(&self, records: &[EmbeddedRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = self.staging_path();
        let json = serde_json::to_vec_pretty(records)?;
        let written = match tokio::fs::write(&staging, json).await {
            Ok(()) => tokio::fs::rename(&staging, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                warn!("Could not remove {}: {}", staging.display(), cleanup);
            }
            return Err(e.into());
        }

        info!("Saved {} embedded strains to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// Linear scan over the snapshot, re-read on every query.
#[derive(Debug, Clone)]
pub struct FlatFileIndex {
    store: IndexStore,
}

impl FlatFileIndex {
    pub fn new(store: IndexStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CandidateSearch for FlatFileIndex {
    async fn top_matches(
        &self,
        query: &[f32],
        filters: Option<&RecommendationFilters>,
        k: usize,
    ) -> Result<Vec<ScoredStrain>> {
        let records = self.store.load().await?;
        similarity::rank(query, &records, filters, k)
    }
}
