//! playlist-sync library
//!
//! Scheduled synchronisation of M3U channel catalogs backed by a persistent
//! job queue.

pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod ingestor;
pub mod job_scheduling;
pub mod models;
pub mod repositories;
pub mod sources;
pub mod utils;
