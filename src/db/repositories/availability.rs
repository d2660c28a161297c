use anyhow::Result;
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict};

use crate::domain::EpisodeIdentity;
use crate::entities::episode_availability::{ActiveModel, Column, Entity as Availability, Model};

pub struct AvailabilityRepository {
    conn: DatabaseConnection,
}

pub struct ProbeResult {
    pub available: bool,
    pub height: Option<i32>,
    pub vcodec: Option<String>,
    pub provider: Option<String>,
    pub extra: Option<String>,
}

impl AvailabilityRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, identity: &EpisodeIdentity) -> Result<Option<Model>> {
        Ok(Availability::find()
            .filter(Column::Site.eq(identity.site.as_str()))
            .filter(Column::Slug.eq(identity.slug.clone()))
            .filter(Column::Season.eq(identity.season))
            .filter(Column::Episode.eq(identity.episode))
            .filter(Column::Language.eq(identity.language.clone()))
            .one(&self.conn)
            .await?)
    }

    /// `checked_at <= now` always holds by construction; freshness against
    /// `AvailabilityTtl` is evaluated by the caller (the prober), which owns
    /// the configured TTL.
    pub async fn upsert(&self, identity: &EpisodeIdentity, result: &ProbeResult) -> Result<()> {
        let active = ActiveModel {
            site: Set(identity.site.as_str().to_string()),
            slug: Set(identity.slug.clone()),
            season: Set(identity.season),
            episode: Set(identity.episode),
            language: Set(identity.language.clone()),
            available: Set(result.available),
            height: Set(result.height),
            vcodec: Set(result.vcodec.clone()),
            provider: Set(result.provider.clone()),
            checked_at: Set(Utc::now()),
            extra: Set(result.extra.clone()),
        };

        Availability::insert(active)
            .on_conflict(
                OnConflict::columns([
                    Column::Site,
                    Column::Slug,
                    Column::Season,
                    Column::Episode,
                    Column::Language,
                ])
                .update_columns([
                    Column::Available,
                    Column::Height,
                    Column::Vcodec,
                    Column::Provider,
                    Column::CheckedAt,
                    Column::Extra,
                ])
                .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn list_for_series(&self, site: &str, slug: &str, season: i32) -> Result<Vec<Model>> {
        Ok(Availability::find()
            .filter(Column::Site.eq(site))
            .filter(Column::Slug.eq(slug))
            .filter(Column::Season.eq(season))
            .all(&self.conn)
            .await?)
    }
}
