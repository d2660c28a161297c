use anyhow::Result;
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::client_task::{ActiveModel, Column, Entity as ClientTask, Model};

pub struct ClientTaskRepository {
    conn: DatabaseConnection,
}

pub struct NewClientTask {
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
}

impl ClientTaskRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Dedup by infohash: re-adding the same magnet returns the existing row
    /// (round-trip property "creating a ClientTask for the same magnet twice
    /// results in one ClientTask row").
    pub async fn get_or_insert(&self, new: &NewClientTask) -> Result<Model> {
        if let Some(existing) = self.get(&new.info_hash).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let active = ActiveModel {
            info_hash: Set(new.info_hash.clone()),
            job_id: Set(new.job_id.clone()),
            display_name: Set(new.display_name.clone()),
            site: Set(new.site.clone()),
            slug: Set(new.slug.clone()),
            season: Set(new.season),
            episode: Set(new.episode),
            language: Set(new.language.clone()),
            provider: Set(new.provider.clone()),
            mode: Set(new.mode.clone()),
            absolute_number: Set(new.absolute_number),
            save_path: Set(new.save_path.clone()),
            category: Set(new.category.clone()),
            paused: Set(false),
            added_at: Set(now),
            completed_at: Set(None),
        };
        Ok(ClientTask::insert(active)
            .exec_with_returning(&self.conn)
            .await?)
    }

    pub async fn get(&self, info_hash: &str) -> Result<Option<Model>> {
        Ok(ClientTask::find_by_id(info_hash).one(&self.conn).await?)
    }

    pub async fn list(&self) -> Result<Vec<Model>> {
        Ok(ClientTask::find().all(&self.conn).await?)
    }

    pub async fn list_by_hashes(&self, hashes: &[String]) -> Result<Vec<Model>> {
        if hashes.is_empty() {
            return self.list().await;
        }
        Ok(ClientTask::find()
            .filter(Column::InfoHash.is_in(hashes.to_vec()))
            .all(&self.conn)
            .await?)
    }

    pub async fn set_paused(&self, info_hash: &str, paused: bool) -> Result<()> {
        if let Some(existing) = self.get(info_hash).await? {
            let mut active: ActiveModel = existing.into();
            active.paused = Set(paused);
            ClientTask::update(active).exec(&self.conn).await?;
        }
        Ok(())
    }

    pub async fn mark_completed(&self, info_hash: &str) -> Result<()> {
        if let Some(existing) = self.get(info_hash).await? {
            let mut active: ActiveModel = existing.into();
            active.completed_at = Set(Some(Utc::now()));
            ClientTask::update(active).exec(&self.conn).await?;
        }
        Ok(())
    }

    /// Idempotent: deleting an already-deleted task is a no-op, not an error.
    pub async fn delete(&self, info_hash: &str) -> Result<()> {
        ClientTask::delete_by_id(info_hash).exec(&self.conn).await?;
        Ok(())
    }
}
