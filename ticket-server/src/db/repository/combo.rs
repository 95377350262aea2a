//! Combo Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Combo, ComboCreate};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "combo";

#[derive(Clone)]
pub struct ComboRepository {
    base: BaseRepository,
}

impl ComboRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// All active combos, by name
    pub async fn find_all(&self) -> RepoResult<Vec<Combo>> {
        let combos: Vec<Combo> = self
            .base
            .db()
            .query("SELECT * FROM combo WHERE is_active = true ORDER BY name")
            .await?
            .take(0)?;
        Ok(combos)
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Combo>> {
        let thing: RecordId = id
            .parse()
            .map_err(|_| RepoError::Validation(format!("Invalid combo ID: {}", id)))?;
        let combo: Option<Combo> = self.base.db().select(thing).await?;
        Ok(combo)
    }

    /// Create with a caller-chosen key (seed uses deterministic keys)
    pub async fn create_with_key(&self, key: &str, data: ComboCreate) -> RepoResult<Combo> {
        let combo = Combo {
            id: None,
            name: data.name,
            description: data.description,
            price: data.price,
            is_active: true,
        };
        let created: Option<Combo> = self.base.db().create((TABLE, key)).content(combo).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create combo".to_string()))
    }
}
