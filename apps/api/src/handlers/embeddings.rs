use crate::{error::ApiError, services::EmbeddingIndexBuilder};
use actix_web::{web, HttpResponse};
use indicatif::ProgressBar;
use log::info;
use serde_json::json;

pub fn embeddings_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/embed-strains").route(web::get().to(embed_strains)));
}

/// Rebuild the embedding index from the current catalog.
///
/// Runs synchronously: the response is sent once every strain has been embedded
/// and the new snapshot is in place.
pub async fn embed_strains(
    builder: web::Data<EmbeddingIndexBuilder>,
) -> Result<HttpResponse, ApiError> {
    info!("Embedding strains from catalog...");
    let report = builder.build(&ProgressBar::hidden()).await?;
    info!("Embedding completed.");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Strains embedded and saved.",
        "report": report,
    })))
}
