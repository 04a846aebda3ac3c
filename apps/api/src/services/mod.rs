pub mod catalog;
pub mod embedding_index;
pub mod recommendation;
pub mod similarity;
pub mod vector_index;

// Re-export public types
pub use catalog::{CatalogRepository, PgCatalog};
pub use embedding_index::{EmbeddingIndexBuilder, IndexBuildReport};
pub use recommendation::RecommendationService;
pub use vector_index::{CandidateSearch, FlatFileIndex, IndexStore};
