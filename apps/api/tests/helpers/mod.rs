#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use strain_catalog_api::{
    ml::{Embedder, LanguageModel},
    models::{NewStrain, Store, StrainListing, UserStrainPreference},
    services::{CatalogRepository, IndexStore},
    ApiError, AppState, Result,
};
use tempfile::TempDir;

pub const MODEL_REPLY: &str = r#"[{"name": "Granddaddy Purple", "reason": "Relaxing indica"}]"#;

/// In-memory catalog with a fixed menu and a mutable preference table.
pub struct InMemoryCatalog {
    strains: Vec<StrainListing>,
    preferences: Mutex<Vec<UserStrainPreference>>,
}

impl InMemoryCatalog {
    pub fn new(strains: Vec<StrainListing>) -> Self {
        Self {
            strains,
            preferences: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn fetch_catalog(&self) -> Result<Vec<StrainListing>> {
        Ok(self.strains.clone())
    }

    async fn create_strains(
        &self,
        store_name: &str,
        strains: &[NewStrain],
    ) -> Result<Vec<StrainListing>> {
        strains
            .iter()
            .map(|strain| {
                strain.brand_name()?;
                Ok(serde_json::from_value(json!({
                    "id": format!("{}-{}", store_name, strain.name),
                    "name": strain.name,
                    "weight": strain.weight_list(),
                    "price": strain.price_list(),
                }))?)
            })
            .collect()
    }

    async fn create_store(&self, name: &str) -> Result<Store> {
        Ok(Store {
            id: format!("store-{}", name),
            name: name.to_string(),
        })
    }

    async fn upsert_preference(
        &self,
        preference: &UserStrainPreference,
    ) -> Result<UserStrainPreference> {
        if !self
            .strains
            .iter()
            .any(|s| s.id.as_deref() == Some(preference.strain_id.as_str()))
        {
            return Err(ApiError::NotFound("Unknown user or strain".to_string()));
        }

        let mut preferences = self.preferences.lock().unwrap();
        preferences.retain(|p| {
            !(p.user_id == preference.user_id && p.strain_id == preference.strain_id)
        });
        preferences.push(preference.clone());
        Ok(preference.clone())
    }

    async fn preferences_for_user(&self, user_id: &str) -> Result<Vec<UserStrainPreference>> {
        Ok(self
            .preferences
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Maps text onto a few keyword axes plus a constant, so no vector is ever zero.
pub struct KeywordEmbedder;

const AXES: [&str; 4] = ["indica", "sativa", "hybrid", "purple"];

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = AXES
            .iter()
            .map(|axis| lower.matches(axis).count() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "keywords"
    }
}

/// Records every prompt and answers with [`MODEL_REPLY`].
#[derive(Default)]
pub struct RecordingModel {
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(MODEL_REPLY.to_string())
    }
}

pub fn sample_catalog() -> Vec<StrainListing> {
    let strains = json!([
        {
            "id": "gdp", "name": "Granddaddy Purple", "strainType": "Indica", "thc": 22.0,
            "weight": ["3.5g"], "price": ["$45"], "brand": { "name": "Ken's" },
            "terpenes": [{ "name": "Myrcene", "percentage": 1.1 }]
        },
        {
            "id": "nl", "name": "Northern Lights", "strainType": "Indica", "thc": 16.0,
            "weight": ["3.5g"], "price": ["$30"], "brand": { "name": "Dutch" }
        },
        {
            "id": "jh", "name": "Jack Herer", "strainType": "Sativa", "thc": 21.0,
            "weight": ["3.5g"], "price": ["$40"], "brand": { "name": "Sensi" }
        },
        {
            "id": "bd", "name": "Blue Dream", "strainType": "Hybrid", "thc": 19.0,
            "weight": ["7g"], "price": ["$60"], "brand": { "name": "Cookies" }
        },
        { "id": "broken", "name": null }
    ]);
    serde_json::from_value(strains).unwrap()
}

/// Application state wired to in-memory doubles and a temporary index file.
pub struct TestApp {
    pub state: AppState,
    pub model: Arc<RecordingModel>,
    pub index_dir: TempDir,
}

pub fn test_app() -> TestApp {
    let index_dir = tempfile::tempdir().unwrap();
    let model = Arc::new(RecordingModel::default());

    let state = AppState::new(
        Arc::new(InMemoryCatalog::new(sample_catalog())),
        Arc::new(KeywordEmbedder),
        model.clone(),
        IndexStore::new(index_dir.path().join("embedded_strains.json")),
        Duration::ZERO,
        3,
    );

    TestApp {
        state,
        model,
        index_dir,
    }
}
