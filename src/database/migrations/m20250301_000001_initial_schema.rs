use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_jobs_table(manager).await?;
        self.create_sync_scopes_table(manager).await?;
        self.create_catalog_entries_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CatalogEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncScopes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    fn create_id_column(&self, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        col.big_integer().not_null().auto_increment().primary_key();
        col
    }

    fn create_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_nullable_timestamp_column(
        &self,
        manager: &SchemaManager,
        column: impl IntoIden,
    ) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone(),
            _ => col.string(),
        };
        col
    }

    async fn create_jobs_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(self.create_id_column(Jobs::Id))
                    .col(ColumnDef::new(Jobs::JobId).uuid().not_null().unique_key())
                    .col(ColumnDef::new(Jobs::JobType).string().not_null())
                    .col(
                        ColumnDef::new(Jobs::State)
                            .string()
                            .not_null()
                            .default("queued"),
                    )
                    .col(
                        ColumnDef::new(Jobs::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Jobs::MaxAttempts).integer())
                    .col(ColumnDef::new(Jobs::StatusDescription).text())
                    .col(self.create_nullable_timestamp_column(manager, Jobs::LastAttemptStartedAt))
                    .col(ColumnDef::new(Jobs::Payload).text().not_null())
                    .col(self.create_timestamp_column(manager, Jobs::CreatedAt))
                    .col(self.create_timestamp_column(manager, Jobs::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_sync_scopes_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncScopes::Table)
                    .if_not_exists()
                    .col(self.create_id_column(SyncScopes::Id))
                    .col(ColumnDef::new(SyncScopes::Kind).string().not_null())
                    .col(ColumnDef::new(SyncScopes::Name).string().not_null())
                    .col(ColumnDef::new(SyncScopes::Url).text().not_null())
                    .col(
                        ColumnDef::new(SyncScopes::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.create_timestamp_column(manager, SyncScopes::CreatedAt))
                    .col(self.create_timestamp_column(manager, SyncScopes::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_catalog_entries_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CatalogEntries::Table)
                    .if_not_exists()
                    .col(self.create_id_column(CatalogEntries::Id))
                    .col(ColumnDef::new(CatalogEntries::ScopeId).big_integer().not_null())
                    .col(ColumnDef::new(CatalogEntries::Title).string().not_null())
                    .col(ColumnDef::new(CatalogEntries::GroupTitle).string())
                    .col(ColumnDef::new(CatalogEntries::TvgId).string())
                    .col(ColumnDef::new(CatalogEntries::MediaUrl).text().not_null())
                    .col(ColumnDef::new(CatalogEntries::LogoUrl).text())
                    .col(
                        ColumnDef::new(CatalogEntries::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.create_timestamp_column(manager, CatalogEntries::CreatedAt))
                    .col(self.create_timestamp_column(manager, CatalogEntries::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_catalog_entries_scope_id")
                            .from(CatalogEntries::Table, CatalogEntries::ScopeId)
                            .to(SyncScopes::Table, SyncScopes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        // Queue polling: oldest queued job of a given type
        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_state_type_created")
                    .table(Jobs::Table)
                    .col(Jobs::State)
                    .col(Jobs::JobType)
                    .col(Jobs::CreatedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_catalog_entries_scope_title")
                    .table(CatalogEntries::Table)
                    .col(CatalogEntries::ScopeId)
                    .col(CatalogEntries::Title)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
    JobId,
    JobType,
    State,
    AttemptCount,
    MaxAttempts,
    StatusDescription,
    LastAttemptStartedAt,
    Payload,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SyncScopes {
    Table,
    Id,
    Kind,
    Name,
    Url,
    IsEnabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CatalogEntries {
    Table,
    Id,
    ScopeId,
    Title,
    GroupTitle,
    TvgId,
    MediaUrl,
    LogoUrl,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
