//! A download or STRM work item, "Job" in the domain glossary.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    /// Opaque hex id, the same 40-hex value used as the magnet infohash.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub status: String,
    pub mode: String,
    pub site: String,
    pub slug: String,
    pub season: i32,
    pub episode: i32,
    pub language: String,
    pub provider: Option<String>,
    pub progress_percent: f32,
    pub downloaded_bytes: i64,
    pub total_bytes: i64,
    pub speed_bytes_per_sec: i64,
    pub eta_seconds: Option<i64>,
    pub message: Option<String>,
    pub result_path: Option<String>,
    pub title_hint: Option<String>,
    pub absolute_number: Option<i32>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
