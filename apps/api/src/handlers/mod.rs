pub mod embeddings;
pub mod health;
pub mod recommendations;
pub mod strains;

pub use embeddings::embeddings_config;
pub use health::health_check;
pub use recommendations::recommendations_config;
pub use strains::{stores_config, strains_config};
