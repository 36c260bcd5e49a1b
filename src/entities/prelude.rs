pub use super::catalog_entries::Entity as CatalogEntries;
pub use super::jobs::Entity as Jobs;
pub use super::sync_scopes::Entity as SyncScopes;
