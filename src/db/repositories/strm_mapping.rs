use anyhow::Result;
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict};

use crate::entities::strm_url_mapping::{ActiveModel, Column, Entity as StrmUrlMapping, Model};

pub struct StrmMappingRepository {
    conn: DatabaseConnection,
}

#[derive(Clone, Copy)]
pub struct MappingKey<'a> {
    pub site: &'a str,
    pub slug: &'a str,
    pub season: i32,
    pub episode: i32,
    pub language: &'a str,
    pub provider: &'a str,
}

impl StrmMappingRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, key: &MappingKey<'_>) -> Result<Option<Model>> {
        Ok(StrmUrlMapping::find()
            .filter(Column::Site.eq(key.site))
            .filter(Column::Slug.eq(key.slug))
            .filter(Column::Season.eq(key.season))
            .filter(Column::Episode.eq(key.episode))
            .filter(Column::Language.eq(key.language))
            .filter(Column::Provider.eq(key.provider))
            .one(&self.conn)
            .await?)
    }

    pub async fn upsert(&self, key: &MappingKey<'_>, resolved_url: &str) -> Result<()> {
        let now = Utc::now();
        let active = ActiveModel {
            site: Set(key.site.to_string()),
            slug: Set(key.slug.to_string()),
            season: Set(key.season),
            episode: Set(key.episode),
            language: Set(key.language.to_string()),
            provider: Set(key.provider.to_string()),
            resolved_url: Set(resolved_url.to_string()),
            resolved_at: Set(now),
            updated_at: Set(now),
        };

        StrmUrlMapping::insert(active)
            .on_conflict(
                OnConflict::columns([
                    Column::Site,
                    Column::Slug,
                    Column::Season,
                    Column::Episode,
                    Column::Language,
                    Column::Provider,
                ])
                .update_columns([Column::ResolvedUrl, Column::ResolvedAt, Column::UpdatedAt])
                .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Invalidate on refresh-eligible upstream failure (§4.7 "refresh-on-failure").
    pub async fn invalidate(&self, key: &MappingKey<'_>) -> Result<()> {
        StrmUrlMapping::delete_many()
            .filter(Column::Site.eq(key.site))
            .filter(Column::Slug.eq(key.slug))
            .filter(Column::Season.eq(key.season))
            .filter(Column::Episode.eq(key.episode))
            .filter(Column::Language.eq(key.language))
            .filter(Column::Provider.eq(key.provider))
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}
