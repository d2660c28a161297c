//! Cache of probe results, "EpisodeAvailability" in the domain glossary.
//!
//! Composite primary key `(site, slug, season, episode, language)`; fresh
//! iff `now - checked_at < AvailabilityTtl` (checked by the prober, not
//! encoded here).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "episode_availability")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub site: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub slug: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub season: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub episode: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub language: String,
    pub available: bool,
    pub height: Option<i32>,
    pub vcodec: Option<String>,
    pub provider: Option<String>,
    pub checked_at: ChronoDateTimeUtc,
    pub extra: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
