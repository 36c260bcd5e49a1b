//! SeaORM-based scope and catalog repository
//!
//! Catalog deltas are applied inside a single transaction: inserts, in-place
//! updates and retirements either all land or none do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait, Unchanged,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::entities::{
    catalog_entries, prelude::{CatalogEntries, SyncScopes}, sync_scopes,
};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{
    CatalogDelta, CatalogEntry, NewCatalogEntry, NewScope, Scope, ScopeCatalog, ScopeKind,
};
use crate::repositories::{CatalogStore, ScopeStore};

/// Rows per multi-row insert; 10 columns each keeps well inside SQLite's variable limit
const CATALOG_INSERT_BATCH_SIZE: usize = 500;

/// SeaORM-based repository for sync scopes and their catalog entries
#[derive(Clone)]
pub struct SeaOrmCatalogStore {
    connection: Arc<DatabaseConnection>,
}

impl SeaOrmCatalogStore {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn scope_to_domain(&self, model: sync_scopes::Model) -> RepositoryResult<Scope> {
        let kind = ScopeKind::from_str(&model.kind)
            .map_err(|_| RepositoryError::invalid_value("sync_scopes.kind", model.kind.clone()))?;
        Ok(Scope {
            id: model.id,
            kind,
            name: model.name,
            url: model.url,
            is_enabled: model.is_enabled,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    fn entry_to_domain(&self, model: catalog_entries::Model) -> CatalogEntry {
        CatalogEntry {
            id: model.id,
            scope_id: model.scope_id,
            title: model.title,
            group: model.group_title,
            tvg_id: model.tvg_id,
            media_url: model.media_url,
            logo_url: model.logo_url,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    fn new_entry_to_active(&self, entry: NewCatalogEntry) -> catalog_entries::ActiveModel {
        catalog_entries::ActiveModel {
            scope_id: Set(entry.scope_id),
            title: Set(entry.title),
            group_title: Set(entry.group),
            tvg_id: Set(entry.tvg_id),
            media_url: Set(entry.media_url),
            logo_url: Set(entry.logo_url),
            is_active: Set(true),
            created_at: Set(entry.created_at),
            updated_at: Set(entry.created_at),
            ..Default::default()
        }
    }

    /// Write every mutable column of an existing entry, scoped to its owner
    async fn write_entry(
        &self,
        txn: &DatabaseTransaction,
        scope_id: i64,
        entry: CatalogEntry,
    ) -> RepositoryResult<()> {
        let entry_id = entry.id;
        let active_model = catalog_entries::ActiveModel {
            id: Unchanged(entry.id),
            scope_id: Unchanged(scope_id),
            title: Set(entry.title),
            group_title: Set(entry.group),
            tvg_id: Set(entry.tvg_id),
            media_url: Set(entry.media_url),
            logo_url: Set(entry.logo_url),
            is_active: Set(entry.is_active),
            created_at: Unchanged(entry.created_at),
            updated_at: Set(entry.updated_at),
        };

        CatalogEntries::update(active_model)
            .filter(catalog_entries::Column::ScopeId.eq(scope_id))
            .exec(txn)
            .await
            .map_err(|e| match e {
                sea_orm::DbErr::RecordNotUpdated => {
                    RepositoryError::record_not_found("catalog_entries", "id", entry_id)
                }
                other => RepositoryError::Database(other),
            })?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for SeaOrmCatalogStore {
    async fn load_scope_catalog(&self, scope_id: i64) -> RepositoryResult<Option<ScopeCatalog>> {
        let Some(scope_model) = SyncScopes::find_by_id(scope_id)
            .one(&*self.connection)
            .await?
        else {
            return Ok(None);
        };

        let scope = self.scope_to_domain(scope_model)?;
        let entries = self.load_entries_for_scope(scope_id).await?;
        Ok(Some(ScopeCatalog { scope, entries }))
    }

    async fn load_entries_for_scope(&self, scope_id: i64) -> RepositoryResult<Vec<CatalogEntry>> {
        let models = CatalogEntries::find()
            .filter(catalog_entries::Column::ScopeId.eq(scope_id))
            .order_by_asc(catalog_entries::Column::Id)
            .all(&*self.connection)
            .await?;

        Ok(models
            .into_iter()
            .map(|m| self.entry_to_domain(m))
            .collect())
    }

    async fn apply_catalog_delta(
        &self,
        scope_id: i64,
        delta: CatalogDelta,
        destructive: bool,
    ) -> RepositoryResult<()> {
        let txn = self.connection.begin().await?;

        if SyncScopes::find_by_id(scope_id).one(&txn).await?.is_none() {
            return Err(RepositoryError::record_not_found("sync_scopes", "id", scope_id));
        }

        let added = delta.to_add.len();
        let mut pending = delta.to_add.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<catalog_entries::ActiveModel> = pending
                .by_ref()
                .take(CATALOG_INSERT_BATCH_SIZE)
                .map(|entry| self.new_entry_to_active(entry))
                .collect();
            CatalogEntries::insert_many(batch).exec(&txn).await?;
        }

        let updated = delta.to_update.len();
        for entry in delta.to_update {
            self.write_entry(&txn, scope_id, entry).await?;
        }

        let retired = delta.to_retire.len();
        if destructive {
            if !delta.to_retire.is_empty() {
                let ids: Vec<i64> = delta.to_retire.iter().map(|e| e.id).collect();
                let result = CatalogEntries::delete_many()
                    .filter(catalog_entries::Column::ScopeId.eq(scope_id))
                    .filter(catalog_entries::Column::Id.is_in(ids.clone()))
                    .exec(&txn)
                    .await?;
                if result.rows_affected != ids.len() as u64 {
                    return Err(RepositoryError::QueryFailed {
                        query: "delete retired catalog entries".to_string(),
                        message: format!(
                            "expected to delete {} rows, deleted {}",
                            ids.len(),
                            result.rows_affected
                        ),
                    });
                }
            }
        } else {
            for entry in delta.to_retire {
                self.write_entry(&txn, scope_id, entry).await?;
            }
        }

        txn.commit().await?;
        debug!(
            "Applied catalog delta for scope {}: {} added, {} updated, {} retired (destructive: {})",
            scope_id, added, updated, retired, destructive
        );
        Ok(())
    }
}

#[async_trait]
impl ScopeStore for SeaOrmCatalogStore {
    async fn create_scope(&self, scope: NewScope, now: DateTime<Utc>) -> RepositoryResult<Scope> {
        let active_model = sync_scopes::ActiveModel {
            kind: Set(scope.kind.to_string()),
            name: Set(scope.name),
            url: Set(scope.url),
            is_enabled: Set(scope.is_enabled),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active_model.insert(&*self.connection).await?;
        self.scope_to_domain(model)
    }

    async fn find_scope(&self, id: i64) -> RepositoryResult<Option<Scope>> {
        let model = SyncScopes::find_by_id(id).one(&*self.connection).await?;
        model.map(|m| self.scope_to_domain(m)).transpose()
    }

    async fn set_scope_enabled(
        &self,
        id: i64,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result = SyncScopes::update_many()
            .col_expr(sync_scopes::Column::IsEnabled, Expr::value(enabled))
            .col_expr(sync_scopes::Column::UpdatedAt, Expr::value(now))
            .filter(sync_scopes::Column::Id.eq(id))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn list_scopes(&self) -> RepositoryResult<Vec<Scope>> {
        let models = SyncScopes::find()
            .order_by_asc(sync_scopes::Column::Id)
            .all(&*self.connection)
            .await?;

        models
            .into_iter()
            .map(|m| self.scope_to_domain(m))
            .collect()
    }
}
