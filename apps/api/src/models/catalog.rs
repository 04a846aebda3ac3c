use super::strain::{deserialize_optional_f64, parse_terpene_percentage};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// One strain in a bulk ingestion payload, as scraped from a store menu.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStrain {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub thc: Option<f64>,
    #[serde(default)]
    pub weights: Option<Vec<String>>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub prices: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default, alias = "strainType")]
    pub strain_type: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub offer: Option<String>,
    /// Terpene name to amount, e.g. `{"Myrcene": "0.8%", "Limonene": "4 mg/g"}`.
    #[serde(default)]
    pub terpenes: serde_json::Map<String, serde_json::Value>,
}

fn value_to_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl NewStrain {
    /// Trimmed brand name; every ingested strain must carry one.
    pub fn brand_name(&self) -> Result<&str, ApiError> {
        self.brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                ApiError::InvalidInput(format!("Missing or invalid brand for strain: {}", self.name))
            })
    }

    /// `weights` wins over the single `weight` field.
    pub fn weight_list(&self) -> Vec<String> {
        match (&self.weights, &self.weight) {
            (Some(weights), _) => weights.clone(),
            (None, Some(weight)) if !weight.trim().is_empty() => vec![weight.clone()],
            _ => Vec::new(),
        }
    }

    pub fn price_list(&self) -> Vec<String> {
        match (&self.prices, &self.price) {
            (Some(prices), _) => prices.iter().filter_map(value_to_text).collect(),
            (None, Some(price)) => value_to_text(price).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Terpene amounts normalised to percentages. Unreadable amounts are dropped.
    pub fn terpene_percentages(&self) -> Vec<(String, f64)> {
        self.terpenes
            .iter()
            .filter_map(|(name, raw)| {
                let percentage = match raw {
                    serde_json::Value::Number(n) => n.as_f64(),
                    serde_json::Value::String(s) => parse_terpene_percentage(s),
                    _ => None,
                }?;
                Some((name.trim().to_string(), percentage))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStrainsRequest {
    pub store_name: String,
    pub strains: Vec<NewStrain>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
}

/// Incoming preference upsert. Required fields are optional here so that a missing
/// field becomes a 400 with a clear message instead of a deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceRequest {
    pub user_id: Option<String>,
    pub strain_id: Option<String>,
    pub liked: Option<bool>,
    pub reason: Option<String>,
    pub effects_felt: Option<String>,
    pub symptom_relief: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStrainPreference {
    pub user_id: String,
    pub strain_id: String,
    pub liked: bool,
    pub reason: Option<String>,
    pub effects_felt: Option<String>,
    pub symptom_relief: Option<String>,
}

impl TryFrom<PreferenceRequest> for UserStrainPreference {
    type Error = ApiError;

    fn try_from(request: PreferenceRequest) -> Result<Self, Self::Error> {
        let missing = || ApiError::InvalidInput("Missing required fields.".to_string());

        Ok(Self {
            user_id: request.user_id.filter(|id| !id.is_empty()).ok_or_else(missing)?,
            strain_id: request
                .strain_id
                .filter(|id| !id.is_empty())
                .ok_or_else(missing)?,
            liked: request.liked.ok_or_else(missing)?,
            reason: request.reason,
            effects_felt: request.effects_felt,
            symptom_relief: request.symptom_relief,
        })
    }
}
