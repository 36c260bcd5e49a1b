//! Catalog ingestion: reconciliation engine and the sync job handler

pub mod catalog_sync;
pub mod reconcile;

pub use catalog_sync::CatalogSyncHandler;
pub use reconcile::{ReconcileError, ReconcilePlan, ReconcileReport, ReconciliationEngine};
