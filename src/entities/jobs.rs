//! SeaORM entity for the `jobs` table

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Correlation id handed out to callers
    #[sea_orm(unique)]
    pub job_id: Uuid,
    /// snake_case `JobType`, derived from the payload
    pub job_type: String,
    /// snake_case `JobState`
    pub state: String,
    pub attempt_count: i32,
    pub max_attempts: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub status_description: Option<String>,
    pub last_attempt_started_at: Option<DateTimeUtc>,
    /// JSON encoded `JobPayload`
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
