//! SeaORM entity for the `catalog_entries` table

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "catalog_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub scope_id: i64,
    pub title: String,
    pub group_title: Option<String>,
    pub tvg_id: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub media_url: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sync_scopes::Entity",
        from = "Column::ScopeId",
        to = "super::sync_scopes::Column::Id",
        on_delete = "Cascade"
    )]
    SyncScope,
}

impl Related<super::sync_scopes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncScope.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
