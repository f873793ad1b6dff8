//! Order ingestion service: consumes order messages from Kafka, validates
//! them, stores them in PostgreSQL and serves them over HTTP through an LRU
//! cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod generator;
pub mod logging;
pub mod messaging;
pub mod metrics;
pub mod pipeline;
pub mod storage;
pub mod utils;
