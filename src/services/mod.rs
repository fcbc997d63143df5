pub mod cloud_providers;
pub mod ingest;
pub mod storage;
