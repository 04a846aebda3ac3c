use super::{catalog::CatalogRepository, similarity::DEFAULT_TOP_K, vector_index::CandidateSearch};
use crate::{
    error::{ApiError, Result},
    ml::{Embedder, LanguageModel},
    models::{RecommendationFilters, RecommendationSelections, ScoredStrain},
};
use std::sync::Arc;
use tracing::{debug, error, info};

const PICK_COUNT: usize = 3;

fn list_or(values: &[String], fallback: &str) -> String {
    if values.is_empty() {
        fallback.to_string()
    } else {
        values.join(", ")
    }
}

fn describe_thc(filters: &RecommendationFilters) -> String {
    match (filters.min_thc, filters.max_thc) {
        (Some(min), Some(max)) => format!("{}-{}%", min, max),
        (Some(min), None) => format!("at least {}%", min),
        (None, Some(max)) => format!("at most {}%", max),
        (None, None) => "any".to_string(),
    }
}

/// One candidate line, e.g. `2. Blue Dream - hybrid, 19.5% THC, 3.5g, $35`.
fn describe_candidate(position: usize, candidate: &ScoredStrain) -> String {
    let record = &candidate.record;
    format!(
        "{}. {} - {}, {}% THC, {}, {}",
        position,
        record.name,
        record
            .strain_type
            .as_ref()
            .map(|t| t.as_str())
            .unwrap_or("unknown"),
        record
            .thc
            .map(|thc| thc.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        list_or(&record.weights, "unknown weight"),
        list_or(&record.prices, "unknown price"),
    )
}

/// Render the prompt handed to the language model.
pub fn build_prompt(
    query: &str,
    filters: Option<&RecommendationFilters>,
    candidates: &[ScoredStrain],
) -> String {
    let default_filters = RecommendationFilters::default();
    let filters = filters.unwrap_or(&default_filters);
    let strain_types: Vec<String> = filters
        .strain_types
        .iter()
        .map(|t| t.as_str().to_string())
        .collect();

    let max_price = filters
        .max_price
        .map(|p| format!("${}", p))
        .unwrap_or_else(|| "any".to_string());

    let mut lines = vec![
        format!("A user wants cannabis for: \"{}\".", query),
        String::new(),
        "Their preferences:".to_string(),
        format!("- Strain types: {}", list_or(&strain_types, "any")),
        format!("- THC: {}", describe_thc(filters)),
        format!("- Max price: {}", max_price),
        format!("- Weights: {}", list_or(&filters.weights, "any")),
        format!(
            "- Preferred terpenes: {}",
            list_or(&filters.preferred_terpenes, "any")
        ),
        format!("- Brands: {}", list_or(&filters.brands, "any")),
        format!(
            "- Liked strains: {}",
            list_or(&filters.liked_strain_ids, "none")
        ),
        format!(
            "- Disliked strains: {}",
            list_or(&filters.disliked_strain_ids, "none")
        ),
        String::new(),
    ];

    if candidates.is_empty() {
        lines.push("No strains in the catalog matched these preferences.".to_string());
    } else {
        lines.push("Here are some strains that might match:".to_string());
        lines.push(String::new());
        lines.extend(
            candidates
                .iter()
                .enumerate()
                .map(|(i, candidate)| describe_candidate(i + 1, candidate)),
        );
    }

    lines.push(String::new());
    lines.push(format!(
        "Choose the best {} and explain why. Respond with only a JSON array in this format:",
        PICK_COUNT
    ));
    lines.extend(
        [
            "[",
            "  { \"name\": \"Strain\", \"reason\": \"...\" },",
            "  ...",
            "]",
        ]
        .map(String::from),
    );

    lines.join("\n")
}

/// Retrieval-augmented recommendations: embed the request, pull the closest
/// strains from the index and let the language model choose among them.
pub struct RecommendationService {
    embedder: Arc<dyn Embedder>,
    language_model: Arc<dyn LanguageModel>,
    search: Arc<dyn CandidateSearch>,
    catalog: Arc<dyn CatalogRepository>,
    top_k: usize,
}

impl RecommendationService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        language_model: Arc<dyn LanguageModel>,
        search: Arc<dyn CandidateSearch>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            embedder,
            language_model,
            search,
            catalog,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Recommend from free text, optionally constrained by `filters`.
    ///
    /// The language model's reply is returned verbatim; it is asked for a JSON
    /// array of `{name, reason}` objects but the reply is not validated.
    pub async fn recommend(
        &self,
        query: &str,
        filters: Option<&RecommendationFilters>,
    ) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::InvalidInput("Query cannot be empty".to_string()));
        }

        info!("Starting recommendation for query: \"{}\"", query);

        let query_embedding = self.embedder.embed(query).await.map_err(|e| {
            error!("Query embedding failed: {}", e);
            ApiError::RecommendationFailed(format!("could not embed query: {}", e))
        })?;
        debug!("Query embedding generated ({} dimensions)", query_embedding.len());

        let active_filters = filters.filter(|f| !f.is_empty());
        let candidates = self
            .search
            .top_matches(&query_embedding, active_filters, self.top_k)
            .await?;

        info!("Top matching strains: {}", candidates.len());
        for (i, candidate) in candidates.iter().enumerate() {
            debug!(
                "{} (similarity {:.4})",
                describe_candidate(i + 1, candidate),
                candidate.similarity
            );
        }

        let prompt = build_prompt(query, filters, &candidates);
        debug!("Sending prompt to language model:\n{}", prompt);

        let answer = self.language_model.complete(&prompt).await.map_err(|e| {
            error!("Language model call failed: {}", e);
            ApiError::RecommendationFailed(format!("language model call failed: {}", e))
        })?;

        info!("Recommendation received ({} chars)", answer.len());
        Ok(answer)
    }

    /// Structured selections turned into a sentence; no hard filtering.
    pub async fn recommend_for_selections(
        &self,
        selections: &RecommendationSelections,
    ) -> Result<String> {
        let query = selections.to_query_text();
        self.recommend(&query, None).await
    }

    /// Structured selections turned into a sentence *and* into filters, with the
    /// user's liked and disliked strains folded in when a user id is given.
    pub async fn recommend_filtered(&self, selections: &RecommendationSelections) -> Result<String> {
        let query = selections.to_query_text();
        let mut filters = selections.to_filters();

        if let Some(user_id) = selections.user_id.as_deref().filter(|id| !id.is_empty()) {
            self.apply_user_preferences(&mut filters, user_id).await?;
        }

        self.recommend(&query, Some(&filters)).await
    }

    async fn apply_user_preferences(
        &self,
        filters: &mut RecommendationFilters,
        user_id: &str,
    ) -> Result<()> {
        let preferences = self.catalog.preferences_for_user(user_id).await?;
        debug!("Loaded {} preferences for user {}", preferences.len(), user_id);

        for preference in preferences {
            let target = if preference.liked {
                &mut filters.liked_strain_ids
            } else {
                &mut filters.disliked_strain_ids
            };
            if !target.contains(&preference.strain_id) {
                target.push(preference.strain_id);
            }
        }

        Ok(())
    }
}
