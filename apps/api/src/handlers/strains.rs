use crate::{
    error::ApiError,
    models::{CreateStoreRequest, CreateStrainsRequest, PreferenceRequest, UserStrainPreference},
    services::CatalogRepository,
};
use actix_web::{
    web::{self, Json},
    HttpResponse,
};
use log::info;
use serde_json::json;

pub fn strains_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/get-strains").route(web::get().to(get_strains)))
        .service(web::resource("/create-strains").route(web::post().to(create_strains)))
        .service(
            web::resource("/create-user-strain-preference")
                .route(web::post().to(create_user_strain_preference)),
        );
}

pub fn stores_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/stores").route(web::post().to(create_store)));
}

/// Full catalog read model: strains with brand, terpene levels and store listings
pub async fn get_strains(
    catalog: web::Data<dyn CatalogRepository>,
) -> Result<HttpResponse, ApiError> {
    let strains = catalog.fetch_catalog().await?;
    Ok(HttpResponse::Ok().json(strains))
}

/// Bulk-ingest a store's menu
pub async fn create_strains(
    request: Json<CreateStrainsRequest>,
    catalog: web::Data<dyn CatalogRepository>,
) -> Result<HttpResponse, ApiError> {
    if request.store_name.trim().is_empty() {
        return Err(ApiError::InvalidInput("storeName cannot be empty".to_string()));
    }

    info!(
        "Creating {} strains for store: {}",
        request.strains.len(),
        request.store_name
    );
    let strains = catalog
        .create_strains(&request.store_name, &request.strains)
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "strains": strains,
    })))
}

pub async fn create_user_strain_preference(
    request: Json<PreferenceRequest>,
    catalog: web::Data<dyn CatalogRepository>,
) -> Result<HttpResponse, ApiError> {
    let preference = UserStrainPreference::try_from(request.into_inner())?;
    info!(
        "Creating or updating strain preference for user {} and strain {}",
        preference.user_id, preference.strain_id
    );

    let preference = catalog.upsert_preference(&preference).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "preference": preference,
    })))
}

pub async fn create_store(
    request: Json<CreateStoreRequest>,
    catalog: web::Data<dyn CatalogRepository>,
) -> Result<HttpResponse, ApiError> {
    let store = catalog.create_store(&request.name).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "store": store,
    })))
}
