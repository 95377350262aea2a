//! Showtime Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Showtime, ShowtimeCreate};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "showtime";

#[derive(Clone)]
pub struct ShowtimeRepository {
    base: BaseRepository,
}

impl ShowtimeRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// All showtimes, soonest first
    pub async fn find_all(&self) -> RepoResult<Vec<Showtime>> {
        let showtimes: Vec<Showtime> = self
            .base
            .db()
            .query("SELECT * FROM showtime ORDER BY starts_at")
            .await?
            .take(0)?;
        Ok(showtimes)
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Showtime>> {
        let thing: RecordId = id
            .parse()
            .map_err(|_| RepoError::Validation(format!("Invalid showtime ID: {}", id)))?;
        let showtime: Option<Showtime> = self.base.db().select(thing).await?;
        Ok(showtime)
    }

    /// Create with a caller-chosen key (seed uses deterministic keys)
    pub async fn create_with_key(&self, key: &str, data: ShowtimeCreate) -> RepoResult<Showtime> {
        let showtime = Showtime {
            id: None,
            movie_title: data.movie_title,
            room: data.room,
            starts_at: data.starts_at,
            ends_at: data.ends_at,
        };
        let created: Option<Showtime> =
            self.base.db().create((TABLE, key)).content(showtime).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create showtime".to_string()))
    }
}
