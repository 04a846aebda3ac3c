use crate::error::ApiError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, sync::LazyLock};

static PRICE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?\s*(\d+(?:\.\d+)?)\s*$").unwrap());

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());

/// Accepts `null`, a single string/number, or an array of strings/numbers.
fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        String(String),
        Number(serde_json::Number),
    }

    impl From<Scalar> for String {
        fn from(value: Scalar) -> Self {
            match value {
                Scalar::String(s) => s,
                Scalar::Number(n) => n.to_string(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ScalarOrVec {
        Vec(Vec<Scalar>),
        Scalar(Scalar),
        Null,
    }

    Ok(match ScalarOrVec::deserialize(deserializer)? {
        ScalarOrVec::Vec(values) => values.into_iter().map(String::from).collect(),
        ScalarOrVec::Scalar(value) => vec![String::from(value)],
        ScalarOrVec::Null => Vec::new(),
    })
}

/// Accepts a THC value given either as a number or as text such as `"22.5% THC"`.
pub(crate) fn deserialize_optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        Float(f64),
        String(String),
        Null,
    }

    match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::Float(f) => Ok(Some(f)),
        StringOrFloat::String(s) => Ok(parse_thc(&s)),
        StringOrFloat::Null => Ok(None),
    }
}

/// First number in a scraped THC label: `"22.5% THC"` is 22.5, `"n/a"` is `None`.
pub fn parse_thc(raw: &str) -> Option<f64> {
    LEADING_NUMBER
        .find(raw)
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse a single price entry such as `"$25"`, `"25.00"` or `"$1,200"`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "");
    PRICE_PATTERN
        .captures(cleaned.trim())
        .and_then(|cap| cap[1].parse().ok())
}

/// Normalise a terpene amount to a percentage. `mg/g` values are divided by ten.
pub fn parse_terpene_percentage(raw: &str) -> Option<f64> {
    let lowered = raw.to_lowercase();
    let is_mg = lowered.contains("mg/g");
    let value: f64 = lowered
        .replace('%', "")
        .replace("mg/g", "")
        .trim()
        .parse()
        .ok()?;

    Some(if is_mg { value / 10.0 } else { value })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrainType {
    Indica,
    Sativa,
    Hybrid,
    Other(String),
}

impl StrainType {
    pub fn as_str(&self) -> &str {
        match self {
            StrainType::Indica => "indica",
            StrainType::Sativa => "sativa",
            StrainType::Hybrid => "hybrid",
            StrainType::Other(other) => other,
        }
    }
}

impl From<&str> for StrainType {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "indica" => StrainType::Indica,
            "sativa" => StrainType::Sativa,
            "hybrid" => StrainType::Hybrid,
            other => StrainType::Other(other.to_string()),
        }
    }
}

impl From<String> for StrainType {
    fn from(value: String) -> Self {
        StrainType::from(value.as_str())
    }
}

impl From<StrainType> for String {
    fn from(value: StrainType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StrainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerpeneLevel {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreListing {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub offer: Option<String>,
}

/// A strain exactly as the catalog read model returns it. Nothing is guaranteed present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrainListing {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub thc: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub weight: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub price: Vec<String>,
    #[serde(default)]
    pub strain_type: Option<String>,
    #[serde(default)]
    pub brand: Option<BrandRef>,
    #[serde(default)]
    pub terpenes: Vec<TerpeneLevel>,
    #[serde(default)]
    pub stores: Vec<StoreListing>,
}

/// A validated catalog entry: it always has an id and a non-empty name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub strain_type: Option<StrainType>,
    #[serde(default)]
    pub thc: Option<f64>,
    #[serde(rename = "weight", default)]
    pub weights: Vec<String>,
    #[serde(rename = "price", default)]
    pub prices: Vec<String>,
    #[serde(default)]
    pub brand: Option<BrandRef>,
    #[serde(default)]
    pub terpenes: Vec<TerpeneLevel>,
    #[serde(default)]
    pub stores: Vec<StoreListing>,
}

impl CatalogRecord {
    pub fn brand_name(&self) -> Option<&str> {
        self.brand.as_ref().map(|b| b.name.as_str())
    }

    /// Lowest parseable price. Entries that are not currency amounts are ignored.
    pub fn min_price(&self) -> Option<f64> {
        self.prices
            .iter()
            .filter_map(|p| parse_price(p))
            .fold(None, |min, price| match min {
                Some(current) if current <= price => Some(current),
                _ => Some(price),
            })
    }

    pub fn terpene_names(&self) -> impl Iterator<Item = &str> {
        self.terpenes.iter().map(|t| t.name.as_str())
    }
}

impl TryFrom<StrainListing> for CatalogRecord {
    type Error = ApiError;

    fn try_from(listing: StrainListing) -> Result<Self, Self::Error> {
        let id = listing
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::InvalidInput("strain is missing an id".to_string()))?;

        let name = listing
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::InvalidInput(format!("strain {} is missing a name", id)))?;

        Ok(Self {
            id,
            name,
            url: listing.url,
            strain_type: listing
                .strain_type
                .filter(|t| !t.trim().is_empty())
                .map(StrainType::from),
            thc: listing.thc,
            weights: listing.weight,
            prices: listing.price,
            brand: listing.brand,
            terpenes: listing.terpenes,
            stores: listing.stores,
        })
    }
}

/// A catalog record together with its embedding vector, as persisted in the index snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    #[serde(flatten)]
    pub record: CatalogRecord,
    pub embedding: Vec<f32>,
}

/// A catalog record with the similarity score it achieved against a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredStrain {
    #[serde(flatten)]
    pub record: CatalogRecord,
    pub similarity: f32,
}
