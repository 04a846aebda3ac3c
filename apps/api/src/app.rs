use crate::{
    config::Config,
    error::Result,
    ml::{Embedder, LanguageModel, OpenAiClient},
    routes,
    services::{
        CatalogRepository, EmbeddingIndexBuilder, FlatFileIndex, IndexStore, PgCatalog,
        RecommendationService,
    },
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use log::info;
use std::{net::TcpListener, sync::Arc, time::Duration};

/// Services shared by every worker. Built once at startup and injected into handlers.
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<dyn CatalogRepository>,
    recommendations: web::Data<RecommendationService>,
    index_builder: web::Data<EmbeddingIndexBuilder>,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        embedder: Arc<dyn Embedder>,
        language_model: Arc<dyn LanguageModel>,
        index_store: IndexStore,
        embed_delay: Duration,
        top_k: usize,
    ) -> Self {
        let search = Arc::new(FlatFileIndex::new(index_store.clone()));
        let recommendations =
            RecommendationService::new(embedder.clone(), language_model, search, catalog.clone())
                .with_top_k(top_k);
        let index_builder =
            EmbeddingIndexBuilder::new(catalog.clone(), embedder, index_store, embed_delay);

        Self {
            catalog,
            recommendations: web::Data::new(recommendations),
            index_builder: web::Data::new(index_builder),
        }
    }

    /// Register the shared services and every route on an app or test service.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::from(self.catalog.clone()))
            .app_data(self.recommendations.clone())
            .app_data(self.index_builder.clone())
            .configure(routes::configure);
    }
}

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        let bind_address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}", bind_address);

        self.run_with_listener(listener).await
    }

    /// Build the production services: Postgres catalog and OpenAI provider
    pub async fn build_state(config: &Config) -> Result<AppState> {
        let catalog = PgCatalog::connect(&config.database_url, config.database_max_connections)
            .await
            .context("Failed to connect to the catalog database")?;
        let openai = Arc::new(
            OpenAiClient::from_config(config).context("Failed to initialize OpenAI client")?,
        );

        info!(
            "Using embedding model {} and completion model {}",
            config.embedding_model, config.completion_model
        );

        Ok(AppState::new(
            Arc::new(catalog),
            openai.clone(),
            openai,
            IndexStore::new(&config.index_path),
            config.embed_delay(),
            config.recommendation_count,
        ))
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let state = Self::build_state(&self.config).await?;
        info!("Embedding index at {}", self.config.index_path.display());

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .configure(|cfg| state.configure(cfg))
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}
