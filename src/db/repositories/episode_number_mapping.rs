use anyhow::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict};

use crate::entities::episode_number_mapping::{ActiveModel, Column, Entity as Mapping, Model};

pub struct EpisodeNumberMappingRepository {
    conn: DatabaseConnection,
}

impl EpisodeNumberMappingRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_absolute(&self, series_slug: &str, absolute: i32) -> Result<Option<Model>> {
        Ok(Mapping::find()
            .filter(Column::SeriesSlug.eq(series_slug))
            .filter(Column::AbsoluteNumber.eq(absolute))
            .one(&self.conn)
            .await?)
    }

    pub async fn get_by_season_episode(
        &self,
        series_slug: &str,
        season: i32,
        episode: i32,
    ) -> Result<Option<Model>> {
        Ok(Mapping::find()
            .filter(Column::SeriesSlug.eq(series_slug))
            .filter(Column::Season.eq(season))
            .filter(Column::Episode.eq(episode))
            .one(&self.conn)
            .await?)
    }

    pub async fn list_for_series(&self, series_slug: &str) -> Result<Vec<Model>> {
        Ok(Mapping::find()
            .filter(Column::SeriesSlug.eq(series_slug))
            .all(&self.conn)
            .await?)
    }

    pub async fn upsert(
        &self,
        series_slug: &str,
        absolute: i32,
        season: i32,
        episode: i32,
        title: Option<String>,
    ) -> Result<()> {
        let active = ActiveModel {
            series_slug: Set(series_slug.to_string()),
            absolute_number: Set(absolute),
            season: Set(season),
            episode: Set(episode),
            title: Set(title),
        };

        Mapping::insert(active)
            .on_conflict(
                OnConflict::columns([Column::SeriesSlug, Column::AbsoluteNumber])
                    .update_columns([Column::Season, Column::Episode, Column::Title])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}
