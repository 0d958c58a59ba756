pub mod broadcast;
pub mod config;
pub mod http;
pub mod ingest;
pub mod mqtt;
pub mod persistence;
pub mod telemetry;
