//! Chair Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Chair, ChairCreate};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "chair";

#[derive(Clone)]
pub struct ChairRepository {
    base: BaseRepository,
}

impl ChairRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// All active chairs of a room, by name
    pub async fn find_by_room(&self, room: &RecordId) -> RepoResult<Vec<Chair>> {
        let chairs: Vec<Chair> = self
            .base
            .db()
            .query("SELECT * FROM chair WHERE room = $room AND is_active = true ORDER BY name")
            .bind(("room", room.clone()))
            .await?
            .take(0)?;
        Ok(chairs)
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Chair>> {
        let thing: RecordId = id
            .parse()
            .map_err(|_| RepoError::Validation(format!("Invalid chair ID: {}", id)))?;
        let chair: Option<Chair> = self.base.db().select(thing).await?;
        Ok(chair)
    }

    /// Resolve a batch of chair ids in one query. Missing or inactive
    /// chairs are simply absent from the result; the caller decides
    /// whether that is an error.
    pub async fn find_by_ids(&self, ids: &[String]) -> RepoResult<Vec<Chair>> {
        let mut things: Vec<RecordId> = Vec::with_capacity(ids.len());
        for id in ids {
            let thing: RecordId = id
                .parse()
                .map_err(|_| RepoError::Validation(format!("Invalid chair ID: {}", id)))?;
            things.push(thing);
        }
        let chairs: Vec<Chair> = self
            .base
            .db()
            .query("SELECT * FROM chair WHERE id INSIDE $ids AND is_active = true")
            .bind(("ids", things))
            .await?
            .take(0)?;
        Ok(chairs)
    }

    /// Create with a caller-chosen key (seed uses deterministic keys)
    pub async fn create_with_key(&self, key: &str, data: ChairCreate) -> RepoResult<Chair> {
        let chair = Chair {
            id: None,
            name: data.name,
            room: data.room,
            class: data.class,
            price: data.price,
            is_active: true,
        };
        let created: Option<Chair> = self.base.db().create((TABLE, key)).content(chair).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create chair".to_string()))
    }
}
