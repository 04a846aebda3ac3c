use crate::{
    error::ApiError,
    models::{RecommendationResponse, RecommendationSelections, TextRecommendationRequest},
    services::RecommendationService,
};
use actix_web::{
    web::{self, Json},
    HttpResponse,
};
use log::info;

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/recommend").route(web::post().to(recommend)))
        .service(web::resource("/recommend/filtered").route(web::post().to(recommend_filtered)))
        .service(web::resource("/recommend/text").route(web::post().to(recommend_text)));
}

fn respond(recommendations: String) -> HttpResponse {
    HttpResponse::Ok().json(RecommendationResponse {
        success: true,
        recommendations,
    })
}

/// Recommend from form selections, ranked purely by similarity
pub async fn recommend(
    request: Json<RecommendationSelections>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    info!("Recommending strains for selections: {:?}", request);
    let recommendations = recommendation_service
        .recommend_for_selections(&request)
        .await?;
    Ok(respond(recommendations))
}

/// Recommend from form selections, keeping only strains that satisfy them
pub async fn recommend_filtered(
    request: Json<RecommendationSelections>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    info!("Recommending filtered strains for selections: {:?}", request);
    let recommendations = recommendation_service.recommend_filtered(&request).await?;
    Ok(respond(recommendations))
}

/// Recommend from free text with optional explicit filters
pub async fn recommend_text(
    request: Json<TextRecommendationRequest>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::InvalidInput("Query cannot be empty".to_string()));
    }

    let recommendations = recommendation_service
        .recommend(&request.query, request.filters.as_ref())
        .await?;
    Ok(respond(recommendations))
}
