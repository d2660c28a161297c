//! The qBittorrent-facing mirror of a `Job`. See the domain glossary, "ClientTask".
//!
//! Holds only `job_id`, never a pointer to the job row, so ownership stays
//! acyclic (design notes, "Cyclic references").

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "client_tasks")]
pub struct Model {
    /// Synthetic 40-hex infohash; same value as the owning `Job.id`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub info_hash: String,
    pub job_id: String,
    pub display_name: String,
    pub site: String,
    pub slug: String,
    pub season: i32,
    pub episode: i32,
    pub language: String,
    pub provider: Option<String>,
    pub mode: String,
    pub absolute_number: Option<i32>,
    pub save_path: String,
    pub category: String,
    pub paused: bool,
    pub added_at: ChronoDateTimeUtc,
    pub completed_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job::Entity",
        from = "Column::JobId",
        to = "super::job::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Job,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
