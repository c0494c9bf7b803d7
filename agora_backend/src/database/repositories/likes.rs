use crate::database::models::{LikeRecord, LikeTarget};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteLikeRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

/// Table and key column backing each kind of like.
fn table_for(target: LikeTarget) -> (&'static str, &'static str) {
    match target {
        LikeTarget::Post => ("post_likes", "post_id"),
        LikeTarget::Comment => ("comment_likes", "comment_id"),
    }
}

impl<'conn> super::LikeRepository for SqliteLikeRepository<'conn> {
    fn add(&self, record: &LikeRecord) -> Result<bool> {
        let (table, key) = table_for(record.target);
        let inserted = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {table} ({key}, user_id, created_at) VALUES (?1, ?2, ?3)"
            ),
            params![record.target_id, record.user_id, record.created_at],
        )?;
        Ok(inserted > 0)
    }

    fn remove(&self, target: LikeTarget, target_id: &str, user_id: &str) -> Result<bool> {
        let (table, key) = table_for(target);
        let removed = self.conn.execute(
            &format!("DELETE FROM {table} WHERE {key} = ?1 AND user_id = ?2"),
            params![target_id, user_id],
        )?;
        Ok(removed > 0)
    }

    fn count(&self, target: LikeTarget, target_id: &str) -> Result<usize> {
        let (table, key) = table_for(target);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE {key} = ?1"),
            params![target_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn has_liked(&self, target: LikeTarget, target_id: &str, user_id: &str) -> Result<bool> {
        let (table, key) = table_for(target);
        let found = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM {table} WHERE {key} = ?1 AND user_id = ?2"),
                params![target_id, user_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
