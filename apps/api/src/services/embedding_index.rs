use super::{catalog::CatalogRepository, vector_index::IndexStore};
use crate::{
    error::{ApiError, Result},
    ml::Embedder,
    models::{CatalogRecord, EmbeddedRecord},
};
use indicatif::ProgressBar;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::sleep};
use tracing::{error, info, warn};

/// Outcome of one index rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexBuildReport {
    /// Strains returned by the catalog.
    pub total: usize,
    /// Strains written to the snapshot.
    pub embedded: usize,
    /// Strains left out because the catalog row was incomplete.
    pub skipped: usize,
    /// Strains left out because the embedding call failed.
    pub failed: usize,
}

/// Text sent to the embedding model for one strain. Field order and formatting are
/// fixed so that rebuilding an unchanged catalog reproduces the same inputs.
pub fn embedding_text(record: &CatalogRecord) -> String {
    let strain_type = record
        .strain_type
        .as_ref()
        .map(|t| t.as_str())
        .unwrap_or("unknown");
    let thc = record
        .thc
        .map(|thc| thc.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let terpenes = if record.terpenes.is_empty() {
        "none".to_string()
    } else {
        record.terpene_names().collect::<Vec<_>>().join(", ")
    };

    format!(
        "{}, {}, {}% THC, weights: {}, prices: {}, brand: {}, terpenes: {}",
        record.name,
        strain_type,
        thc,
        record.weights.join(", "),
        record.prices.join(", "),
        record.brand_name().unwrap_or("unknown"),
        terpenes
    )
}

/// Rebuilds the on-disk embedding index from the catalog.
///
/// Requests are issued strictly one after another with `delay` between them to
/// stay under the provider's rate limit.
pub struct EmbeddingIndexBuilder {
    catalog: Arc<dyn CatalogRepository>,
    embedder: Arc<dyn Embedder>,
    store: IndexStore,
    delay: Duration,
    // serialises rebuilds triggered concurrently within this process
    build_lock: Mutex<()>,
}

impl EmbeddingIndexBuilder {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        embedder: Arc<dyn Embedder>,
        store: IndexStore,
        delay: Duration,
    ) -> Self {
        Self {
            catalog,
            embedder,
            store,
            delay,
            build_lock: Mutex::new(()),
        }
    }

    /// Fetch the catalog, embed every valid strain and replace the snapshot.
    ///
    /// Incomplete rows and per-strain embedding failures are logged and skipped;
    /// only a failure to read the catalog or to write the snapshot aborts the run.
    pub async fn build(&self, progress: &ProgressBar) -> Result<IndexBuildReport> {
        let _guard = self.build_lock.lock().await;

        let listings = self
            .catalog
            .fetch_catalog()
            .await
            .map_err(|e| ApiError::EmbeddingFailed(format!("could not load catalog: {}", e)))?;

        let mut report = IndexBuildReport {
            total: listings.len(),
            ..IndexBuildReport::default()
        };
        info!(
            "Total strains fetched: {} (model: {})",
            report.total,
            self.embedder.model_name()
        );
        progress.set_length(report.total as u64);

        let mut embedded = Vec::with_capacity(listings.len());
        let mut requests_sent = 0usize;

        for (index, listing) in listings.into_iter().enumerate() {
            progress.inc(1);

            let record = match CatalogRecord::try_from(listing) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping strain at index {}: {}", index, e);
                    report.skipped += 1;
                    continue;
                }
            };

            if requests_sent > 0 && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            requests_sent += 1;

            progress.set_message(record.name.clone());
            info!(
                "Embedding strain {}/{}: {}",
                index + 1,
                report.total,
                record.name
            );

            match self.embedder.embed(&embedding_text(&record)).await {
                Ok(embedding) => embedded.push(EmbeddedRecord { record, embedding }),
                Err(e) => {
                    error!("Error embedding strain {} ({}): {}", record.name, record.id, e);
                    report.failed += 1;
                }
            }
        }

        report.embedded = embedded.len();
        self.store
            .save(&embedded)
            .await
            .map_err(|e| ApiError::EmbeddingFailed(format!("could not save index: {}", e)))?;

        progress.finish_with_message("done");
        info!(
            "Embedding complete: {} embedded, {} skipped, {} failed. Saved to {}",
            report.embedded,
            report.skipped,
            report.failed,
            self.store.path().display()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BrandRef, NewStrain, Store, StrainListing, TerpeneLevel, UserStrainPreference,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticCatalog(Vec<StrainListing>);

    #[async_trait]
    impl CatalogRepository for StaticCatalog {
        async fn fetch_catalog(&self) -> Result<Vec<StrainListing>> {
            Ok(self.0.clone())
        }

        async fn create_strains(&self, _: &str, _: &[NewStrain]) -> Result<Vec<StrainListing>> {
            unimplemented!()
        }

        async fn create_store(&self, _: &str) -> Result<Store> {
            unimplemented!()
        }

        async fn upsert_preference(
            &self,
            _: &UserStrainPreference,
        ) -> Result<UserStrainPreference> {
            unimplemented!()
        }

        async fn preferences_for_user(&self, _: &str) -> Result<Vec<UserStrainPreference>> {
            unimplemented!()
        }
    }

    /// Embeds text as `[len, vowel count]`, failing for any text containing "FAIL".
    #[derive(Default)]
    struct LengthEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("FAIL") {
                return Err(ApiError::ExternalServiceError("provider down".into()));
            }
            let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
            Ok(vec![text.len() as f32, vowels as f32])
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    fn listing(value: serde_json::Value) -> StrainListing {
        serde_json::from_value(value).unwrap()
    }

    fn catalog() -> Vec<StrainListing> {
        vec![
            listing(json!({
                "id": "1", "name": "Blue Dream", "strainType": "Hybrid", "thc": 19.5,
                "weight": ["3.5g"], "price": ["$35"],
                "brand": { "name": "Cookies" },
                "terpenes": [{ "name": "Myrcene", "percentage": 0.8 }]
            })),
            listing(json!({ "id": "2", "name": null, "strainType": "Indica" })),
            listing(json!({ "id": "3", "name": "FAIL Kush", "strainType": "Indica" })),
            listing(json!({ "id": "4", "name": "Jack Herer", "strainType": "Sativa", "thc": 18 })),
        ]
    }

    fn builder(dir: &tempfile::TempDir, listings: Vec<StrainListing>) -> EmbeddingIndexBuilder {
        EmbeddingIndexBuilder::new(
            Arc::new(StaticCatalog(listings)),
            Arc::new(LengthEmbedder::default()),
            IndexStore::new(dir.path().join("index.json")),
            Duration::ZERO,
        )
    }

    #[test]
    fn test_embedding_text_format() {
        let record = CatalogRecord {
            id: "1".into(),
            name: "Blue Dream".into(),
            url: None,
            strain_type: Some("Hybrid".into()),
            thc: Some(19.5),
            weights: vec!["3.5g".into(), "7g".into()],
            prices: vec!["$35".into(), "$60".into()],
            brand: Some(BrandRef {
                id: None,
                name: "Cookies".into(),
            }),
            terpenes: vec![
                TerpeneLevel {
                    id: None,
                    name: "Myrcene".into(),
                    description: None,
                    percentage: Some(0.8),
                },
                TerpeneLevel {
                    id: None,
                    name: "Pinene".into(),
                    description: None,
                    percentage: None,
                },
            ],
            stores: Vec::new(),
        };

        assert_eq!(
            embedding_text(&record),
            "Blue Dream, hybrid, 19.5% THC, weights: 3.5g, 7g, prices: $35, $60, \
             brand: Cookies, terpenes: Myrcene, Pinene"
        );
    }

    #[test]
    fn test_embedding_text_placeholders() {
        let record = CatalogRecord {
            id: "1".into(),
            name: "Mystery".into(),
            url: None,
            strain_type: None,
            thc: None,
            weights: Vec::new(),
            prices: Vec::new(),
            brand: None,
            terpenes: Vec::new(),
            stores: Vec::new(),
        };

        assert_eq!(
            embedding_text(&record),
            "Mystery, unknown, unknown% THC, weights: , prices: , brand: unknown, terpenes: none"
        );
    }

    #[tokio::test]
    async fn test_build_skips_incomplete_and_failed_records() {
        let dir = tempfile::tempdir().unwrap();
        let builder = builder(&dir, catalog());

        let report = builder.build(&ProgressBar::hidden()).await.unwrap();
        assert_eq!(
            report,
            IndexBuildReport {
                total: 4,
                embedded: 2,
                skipped: 1,
                failed: 1,
            }
        );

        let snapshot = builder.store.load().await.unwrap();
        let ids: Vec<_> = snapshot.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);
        assert!(snapshot.iter().all(|r| r.embedding.len() == 2));
    }

    #[tokio::test]
    async fn test_rebuilding_identical_catalog_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let builder = builder(&dir, catalog());

        builder.build(&ProgressBar::hidden()).await.unwrap();
        let first = std::fs::read(builder.store.path()).unwrap();
        builder.build(&ProgressBar::hidden()).await.unwrap();
        let second = std::fs::read(builder.store.path()).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_catalog_writes_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let builder = builder(&dir, Vec::new());

        let report = builder.build(&ProgressBar::hidden()).await.unwrap();
        assert_eq!(report.embedded, 0);
        assert!(builder.store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skipped_records_do_not_reach_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(LengthEmbedder::default());
        let builder = EmbeddingIndexBuilder::new(
            Arc::new(StaticCatalog(catalog())),
            embedder.clone(),
            IndexStore::new(dir.path().join("index.json")),
            Duration::from_millis(1),
        );

        builder.build(&ProgressBar::hidden()).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }
}
