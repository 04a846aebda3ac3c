use serde::{Deserialize, Serialize};

pub use catalog::{
    CreateStoreRequest, CreateStrainsRequest, NewStrain, PreferenceRequest, Store,
    UserStrainPreference,
};
pub use filters::{RecommendationFilters, RecommendationSelections, Tier};
pub use strain::{
    parse_price, parse_terpene_percentage, parse_thc, BrandRef, CatalogRecord, EmbeddedRecord,
    ScoredStrain, StoreListing, StrainListing, StrainType, TerpeneLevel,
};

mod catalog;
mod filters;
mod strain;

/// Free-text recommendation request with optional explicit filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRecommendationRequest {
    /// What the user is looking for, e.g. "something fruity to help me sleep"
    pub query: String,
    #[serde(default)]
    pub filters: Option<RecommendationFilters>,
}

/// Language model answer, passed through as-is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub success: bool,
    pub recommendations: String,
}

/// Health check response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
}
