//! Per-series absolute-numbering mapping, "EpisodeNumberMapping" in the
//! domain glossary. Two uniqueness constraints (enforced by the
//! migration's indexes) ensure a 1:1 relationship between the absolute
//! index and `(season, episode)` within a series.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "episode_number_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub series_slug: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub absolute_number: i32,
    pub season: i32,
    pub episode: i32,
    pub title: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
