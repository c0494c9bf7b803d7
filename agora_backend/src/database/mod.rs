pub mod models;
pub mod repositories;

use crate::config::AgoraPaths;
use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE COLLATE NOCASE,
        display_name TEXT,
        bio TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS media (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        path TEXT NOT NULL,
        media_type TEXT NOT NULL,
        mime TEXT,
        title TEXT,
        uploader_id TEXT,
        size_bytes INTEGER,
        checksum TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (uploader_id) REFERENCES users(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        author_id TEXT NOT NULL,
        body TEXT NOT NULL,
        media_id TEXT,
        media_type TEXT,
        media_title TEXT,
        attached_media TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (media_id) REFERENCES media(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        author_id TEXT NOT NULL,
        parent_id TEXT,
        body TEXT NOT NULL,
        media_id TEXT,
        media_type TEXT,
        media_title TEXT,
        attached_media TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
        FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE,
        FOREIGN KEY (media_id) REFERENCES media(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS post_likes (
        post_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (post_id, user_id),
        FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS comment_likes (
        comment_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (comment_id, user_id),
        FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS follows (
        follower_id TEXT NOT NULL,
        followee_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (follower_id, followee_id),
        CHECK (follower_id <> followee_id),
        FOREIGN KEY (follower_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (followee_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
    CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);
    CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee_id);
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    newly_created: bool,
}

impl Database {
    pub fn connect(paths: &AgoraPaths) -> Result<Self> {
        let newly_created = !paths.db_path.exists();
        let conn = Connection::open(&paths.db_path)?;
        Ok(Self::from_connection(conn, newly_created))
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            newly_created,
        }
    }

    /// Applies the base schema plus the column additions that arrived after
    /// the first release. Returns whether the database file was new.
    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)?;
            ensure_column(conn, "media", "thumbnail", "TEXT")?;
            ensure_column(conn, "posts", "thumbnail", "TEXT")?;
            ensure_column(conn, "comments", "thumbnail", "TEXT")?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    pub fn with_repositories<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }
}

fn ensure_column(conn: &Connection, table: &str, column: &str, ddl: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row?.eq_ignore_ascii_case(column) {
            return Ok(());
        }
    }
    tracing::info!(table, column, "adding missing column");
    conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {ddl}"), [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        assert!(db.ensure_migrations().expect("first run"));
        db.ensure_migrations().expect("second run");

        let has_thumbnail = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare("PRAGMA table_info(posts)")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(1))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names.iter().filter(|name| *name == "thumbnail").count())
            })
            .expect("table info");
        assert_eq!(has_thumbnail, 1);
    }

    #[test]
    fn oversized_page_bounds_saturate() {
        use models::{PostRecord, UserRecord};
        use repositories::{PostRepository, UserRepository};

        let db = Database::from_connection(Connection::open_in_memory().expect("db"), true);
        db.ensure_migrations().expect("migrations");
        db.with_repositories(|repos| {
            repos.users().create(&UserRecord {
                id: "u1".into(),
                username: "alice".into(),
                display_name: None,
                bio: None,
                created_at: "2026-01-01T00:00:00Z".into(),
            })?;
            repos.posts().create(&PostRecord {
                id: "p1".into(),
                author_id: "u1".into(),
                body: "hello".into(),
                media_id: None,
                media_type: None,
                media_title: None,
                thumbnail: None,
                attached_media: "[]".into(),
                created_at: "2026-01-01T00:00:00Z".into(),
            })?;

            assert_eq!(repos.posts().list_recent(usize::MAX, 0)?.len(), 1);
            assert!(repos.posts().list_recent(10, usize::MAX)?.is_empty());
            assert!(repos.users().list(usize::MAX, usize::MAX)?.is_empty());
            Ok(())
        })
        .expect("paged queries");
    }
}
