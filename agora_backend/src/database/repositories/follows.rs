use super::sql_bound;
use super::users::{map_user, USER_COLUMNS};
use crate::database::models::{FollowRecord, UserRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteFollowRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> SqliteFollowRepository<'conn> {
    fn list_users(&self, sql: &str, user_id: &str, limit: usize, offset: usize) -> Result<Vec<UserRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(
            params![user_id, sql_bound(limit), sql_bound(offset)],
            map_user,
        )?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

impl<'conn> super::FollowRepository for SqliteFollowRepository<'conn> {
    fn follow(&self, record: &FollowRecord) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![record.follower_id, record.followee_id, record.created_at],
        )?;
        Ok(inserted > 0)
    }

    fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower_id, followee_id],
        )?;
        Ok(removed > 0)
    }

    fn followers(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<UserRecord>> {
        self.list_users(
            &format!(
                r#"
                SELECT {USER_COLUMNS}
                FROM follows f
                INNER JOIN users u ON u.id = f.follower_id
                WHERE f.followee_id = ?1
                ORDER BY f.created_at DESC, f.rowid DESC
                LIMIT ?2 OFFSET ?3
                "#
            ),
            user_id,
            limit,
            offset,
        )
    }

    fn following(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<UserRecord>> {
        self.list_users(
            &format!(
                r#"
                SELECT {USER_COLUMNS}
                FROM follows f
                INNER JOIN users u ON u.id = f.followee_id
                WHERE f.follower_id = ?1
                ORDER BY f.created_at DESC, f.rowid DESC
                LIMIT ?2 OFFSET ?3
                "#
            ),
            user_id,
            limit,
            offset,
        )
    }

    fn is_following(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                params![follower_id, followee_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
