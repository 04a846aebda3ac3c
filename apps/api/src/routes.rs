use actix_web::{error::JsonPayloadError, web, HttpRequest, Scope};

use crate::error::ApiError;
use crate::handlers::{
    embeddings_config, health_check, recommendations_config, stores_config, strains_config,
};

/// Malformed JSON bodies get the same `{success, error}` shape as every other failure
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::InvalidInput(err.to_string()).into()
}

/// Routes under `/strains`
pub fn strain_routes() -> Scope {
    web::scope("/strains")
        .configure(strains_config)
        .configure(embeddings_config)
        .configure(recommendations_config)
}

/// Configure all routes for the API
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(health_check)
        .service(strain_routes())
        .configure(stores_config);
}
