use super::strain::{CatalogRecord, StrainType};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Constraints applied to candidates before ranking. Empty fields do not constrain anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommendationFilters {
    pub strain_types: Vec<StrainType>,
    pub min_thc: Option<f64>,
    pub max_thc: Option<f64>,
    pub max_price: Option<f64>,
    pub weights: Vec<String>,
    pub preferred_terpenes: Vec<String>,
    pub brands: Vec<String>,
    pub liked_strain_ids: Vec<String>,
    pub disliked_strain_ids: Vec<String>,
}

impl RecommendationFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when the record satisfies every active constraint.
    pub fn matches(&self, record: &CatalogRecord) -> bool {
        self.matches_strain_type(record)
            && self.matches_thc(record)
            && self.matches_price(record)
            && self.matches_weight(record)
            && self.matches_brand(record)
            && self.matches_terpenes(record)
            && !self.disliked_strain_ids.contains(&record.id)
    }

    fn matches_strain_type(&self, record: &CatalogRecord) -> bool {
        if self.strain_types.is_empty() {
            return true;
        }
        record
            .strain_type
            .as_ref()
            .is_some_and(|t| self.strain_types.contains(t))
    }

    fn matches_thc(&self, record: &CatalogRecord) -> bool {
        if self.min_thc.is_none() && self.max_thc.is_none() {
            return true;
        }
        let Some(thc) = record.thc else {
            return false;
        };
        self.min_thc.map_or(true, |min| thc >= min) && self.max_thc.map_or(true, |max| thc <= max)
    }

    fn matches_price(&self, record: &CatalogRecord) -> bool {
        match self.max_price {
            None => true,
            Some(max) => record.min_price().is_some_and(|price| price <= max),
        }
    }

    fn matches_weight(&self, record: &CatalogRecord) -> bool {
        if self.weights.is_empty() {
            return true;
        }
        record.weights.iter().any(|offered| {
            let offered = offered.to_lowercase();
            self.weights
                .iter()
                .any(|wanted| offered.contains(&wanted.trim().to_lowercase()))
        })
    }

    fn matches_brand(&self, record: &CatalogRecord) -> bool {
        if self.brands.is_empty() {
            return true;
        }
        record
            .brand_name()
            .is_some_and(|brand| contains_ignore_case(&self.brands, brand))
    }

    fn matches_terpenes(&self, record: &CatalogRecord) -> bool {
        if self.preferred_terpenes.is_empty() {
            return true;
        }
        record
            .terpene_names()
            .any(|name| contains_ignore_case(&self.preferred_terpenes, name))
    }
}

fn contains_ignore_case(values: &[String], needle: &str) -> bool {
    values
        .iter()
        .any(|value| value.trim().eq_ignore_ascii_case(needle.trim()))
}

/// Coarse low/mid/high bucket offered to users instead of raw numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    #[serde(alias = "medium")]
    Mid,
    High,
}

impl Tier {
    /// Case-insensitive; `"medium"` is accepted for [`Tier::Mid`].
    pub fn parse(raw: &str) -> Option<Tier> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Tier::Low),
            "mid" | "medium" => Some(Tier::Mid),
            "high" => Some(Tier::High),
            _ => None,
        }
    }

    pub fn thc_phrase(self) -> &'static str {
        match self {
            Tier::Low => "low THC",
            Tier::Mid => "moderate THC",
            Tier::High => "high THC",
        }
    }

    pub fn price_phrase(self) -> &'static str {
        match self {
            Tier::Low => "under $30",
            Tier::Mid => "around $30-$60",
            Tier::High => "premium pricing",
        }
    }

    /// Inclusive `(min, max)` THC bounds for this tier.
    pub fn thc_range(self) -> (Option<f64>, Option<f64>) {
        match self {
            Tier::Low => (None, Some(10.0)),
            Tier::Mid => (Some(10.0), Some(20.0)),
            Tier::High => (Some(20.0), None),
        }
    }

    pub fn max_price(self) -> Option<f64> {
        match self {
            Tier::Low => Some(30.0),
            Tier::Mid => Some(60.0),
            Tier::High => None,
        }
    }
}

/// Form tiers are optional: `null`, `""` and unrecognised values all mean "no selection".
fn deserialize_optional_tier<'de, D>(deserializer: D) -> Result<Option<Tier>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(None);
    };

    let tier = Tier::parse(&raw);
    if tier.is_none() {
        warn!("Ignoring unknown tier: {}", raw);
    }
    Ok(tier)
}

/// The selections a user makes in the recommendation form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommendationSelections {
    pub strain_type: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_tier")]
    pub thc_tier: Option<Tier>,
    #[serde(deserialize_with = "deserialize_optional_tier")]
    pub price_tier: Option<Tier>,
    pub weight: Option<String>,
    pub mood: Option<String>,
    pub text: Option<String>,
    /// When present, the user's liked/disliked strains are folded into the filters.
    pub user_id: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl RecommendationSelections {
    /// Render the selections as a sentence suitable for embedding.
    pub fn to_query_text(&self) -> String {
        let mut parts = Vec::new();

        if let Some(strain_type) = non_empty(&self.strain_type) {
            parts.push(format!("a {}", strain_type));
        }
        if let Some(tier) = self.thc_tier {
            parts.push(tier.thc_phrase().to_string());
        }
        if let Some(tier) = self.price_tier {
            parts.push(tier.price_phrase().to_string());
        }
        if let Some(weight) = non_empty(&self.weight) {
            parts.push(format!("weighing around {}", weight));
        }
        if let Some(mood) = non_empty(&self.mood) {
            parts.push(format!("for a {} mood", mood));
        }
        if let Some(text) = non_empty(&self.text) {
            parts.push(text.to_string());
        }

        format!("I'm looking for {}", parts.join(", "))
    }

    pub fn to_filters(&self) -> RecommendationFilters {
        let (min_thc, max_thc) = self.thc_tier.map(Tier::thc_range).unwrap_or((None, None));

        RecommendationFilters {
            strain_types: non_empty(&self.strain_type)
                .map(|t| vec![StrainType::from(t)])
                .unwrap_or_default(),
            min_thc,
            max_thc,
            max_price: self.price_tier.and_then(Tier::max_price),
            weights: non_empty(&self.weight)
                .map(|w| vec![w.to_string()])
                .unwrap_or_default(),
            ..RecommendationFilters::default()
        }
    }
}
