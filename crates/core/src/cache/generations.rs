//! Generation bookkeeping for the SQLite store.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

impl CacheDb {
    /// Create a generation if it doesn't exist yet.
    ///
    /// Returns true if a new generation was created.
    pub async fn create_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn generation_exists(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation; its entries go with it through the cascade.
    ///
    /// Returns true if the generation existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All generation names in creation order.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.create_generation("docscan-v1").await.unwrap());
        assert!(!db.create_generation("docscan-v1").await.unwrap());
        assert_eq!(db.generation_names().await.unwrap(), vec!["docscan-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_names_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.create_generation("docscan-v2").await.unwrap();
        db.create_generation("docscan-v1").await.unwrap();

        let names = db.generation_names().await.unwrap();
        assert_eq!(names, vec!["docscan-v2".to_string(), "docscan-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.create_generation("docscan-v1").await.unwrap();

        assert!(db.generation_exists("docscan-v1").await.unwrap());
        assert!(db.delete_generation("docscan-v1").await.unwrap());
        assert!(!db.generation_exists("docscan-v1").await.unwrap());
        assert!(!db.delete_generation("docscan-v1").await.unwrap());
    }
}
