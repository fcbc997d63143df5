pub mod health;
pub mod ingest;
pub mod media;
pub mod upload;
