//! SeaORM entity for the `sync_scopes` table

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_scopes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// snake_case `ScopeKind`
    pub kind: String,
    pub name: String,
    pub url: String,
    pub is_enabled: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::catalog_entries::Entity")]
    CatalogEntries,
}

impl Related<super::catalog_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
