use crate::models::{Album, Image, NewImage};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// StoreError
///
/// Failures surfaced by the persistence layer. Handlers never inspect the cause; any
/// `StoreError` becomes an unprocessable response.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("constraint violated: {0}")]
    Constraint(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository Trait
///
/// Abstract contract for album and image persistence. Every method is its own
/// auto-committed unit of work; there are no multi-statement transactions.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum's
/// asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Albums ---
    // All albums ordered by ascending id.
    async fn list_albums(&self) -> StoreResult<Vec<Album>>;
    async fn get_album(&self, id: i32) -> StoreResult<Option<Album>>;
    async fn create_album(&self, name: &str) -> StoreResult<Album>;
    // Returns `None` when no album has this id.
    async fn rename_album(&self, id: i32, name: &str) -> StoreResult<Option<Album>>;
    // Returns false when no album has this id. Fails while images still reference it.
    async fn delete_album(&self, id: i32) -> StoreResult<bool>;

    // --- Images ---
    // Images of one album ordered by ascending id.
    async fn list_images(&self, album_id: i32) -> StoreResult<Vec<Image>>;
    async fn get_image(&self, id: i32) -> StoreResult<Option<Image>>;
    // Fails when `album_id` references no album.
    async fn create_image(&self, image: NewImage) -> StoreResult<Image>;
    async fn delete_image(&self, id: i32) -> StoreResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Schema lives in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies any pending migrations from `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

// Foreign-key violations are reported as constraint errors so they read clearly in logs.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return StoreError::Constraint(db_err.message().to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_albums(&self) -> StoreResult<Vec<Album>> {
        sqlx::query_as::<_, Album>("SELECT id, name FROM albums ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn get_album(&self, id: i32) -> StoreResult<Option<Album>> {
        sqlx::query_as::<_, Album>("SELECT id, name FROM albums WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn create_album(&self, name: &str) -> StoreResult<Album> {
        sqlx::query_as::<_, Album>("INSERT INTO albums (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn rename_album(&self, id: i32, name: &str) -> StoreResult<Option<Album>> {
        sqlx::query_as::<_, Album>("UPDATE albums SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    /// delete_album
    ///
    /// `images.album_id` has no cascade, so deleting an album that still owns images
    /// fails with a constraint error and the album is kept.
    async fn delete_album(&self, id: i32) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM albums WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_images(&self, album_id: i32) -> StoreResult<Vec<Image>> {
        sqlx::query_as::<_, Image>(
            r#"
            SELECT id, w, h, url, external_id, album_id
            FROM images
            WHERE album_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(album_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)
    }

    async fn get_image(&self, id: i32) -> StoreResult<Option<Image>> {
        sqlx::query_as::<_, Image>(
            "SELECT id, w, h, url, external_id, album_id FROM images WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn create_image(&self, image: NewImage) -> StoreResult<Image> {
        sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (w, h, url, external_id, album_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, w, h, url, external_id, album_id
            "#,
        )
        .bind(image.w)
        .bind(image.h)
        .bind(image.url)
        .bind(image.external_id)
        .bind(image.album_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn delete_image(&self, id: i32) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }
}

// --- In-memory implementation ---

#[derive(Default)]
struct Tables {
    albums: BTreeMap<i32, Album>,
    images: BTreeMap<i32, Image>,
    last_album_id: i32,
    last_image_id: i32,
}

/// MemoryRepository
///
/// Non-durable `Repository` backing the router and handler tests. The server itself
/// always runs against Postgres.
/// A single lock covers both tables so the album/image reference rule holds the
/// same way it does under the database's foreign key. Ids are never reused.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_albums(&self) -> StoreResult<Vec<Album>> {
        Ok(self.tables.read().await.albums.values().cloned().collect())
    }

    async fn get_album(&self, id: i32) -> StoreResult<Option<Album>> {
        Ok(self.tables.read().await.albums.get(&id).cloned())
    }

    async fn create_album(&self, name: &str) -> StoreResult<Album> {
        let mut tables = self.tables.write().await;
        tables.last_album_id += 1;
        let album = Album {
            id: tables.last_album_id,
            name: name.to_string(),
        };
        tables.albums.insert(album.id, album.clone());
        Ok(album)
    }

    async fn rename_album(&self, id: i32, name: &str) -> StoreResult<Option<Album>> {
        let mut tables = self.tables.write().await;
        Ok(tables.albums.get_mut(&id).map(|album| {
            album.name = name.to_string();
            album.clone()
        }))
    }

    async fn delete_album(&self, id: i32) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.albums.contains_key(&id) {
            return Ok(false);
        }
        if tables.images.values().any(|image| image.album_id == id) {
            return Err(StoreError::Constraint(format!(
                "album {id} is still referenced by images"
            )));
        }
        tables.albums.remove(&id);
        Ok(true)
    }

    async fn list_images(&self, album_id: i32) -> StoreResult<Vec<Image>> {
        Ok(self
            .tables
            .read()
            .await
            .images
            .values()
            .filter(|image| image.album_id == album_id)
            .cloned()
            .collect())
    }

    async fn get_image(&self, id: i32) -> StoreResult<Option<Image>> {
        Ok(self.tables.read().await.images.get(&id).cloned())
    }

    async fn create_image(&self, image: NewImage) -> StoreResult<Image> {
        let mut tables = self.tables.write().await;
        if !tables.albums.contains_key(&image.album_id) {
            return Err(StoreError::Constraint(format!(
                "album {} does not exist",
                image.album_id
            )));
        }
        tables.last_image_id += 1;
        let image = Image {
            id: tables.last_image_id,
            w: image.w,
            h: image.h,
            url: image.url,
            external_id: image.external_id,
            album_id: image.album_id,
        };
        tables.images.insert(image.id, image.clone());
        Ok(image)
    }

    async fn delete_image(&self, id: i32) -> StoreResult<bool> {
        Ok(self.tables.write().await.images.remove(&id).is_some())
    }
}
