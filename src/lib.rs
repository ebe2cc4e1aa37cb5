pub mod arguments;
pub mod browser;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod extractor;
pub mod fetcher;
pub mod input;
pub mod logger;
pub mod orchestrator;
pub mod persistence;
pub mod record;
pub mod session;
