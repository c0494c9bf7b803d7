use super::sql_bound;
use crate::database::models::UserRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

pub(super) const USER_COLUMNS: &str = "u.id, u.username, u.display_name, u.bio, u.created_at";

pub(super) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, record: &UserRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO users (id, username, display_name, bio, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.username,
                record.display_name,
                record.bio,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
                params![id],
                map_user,
            )
            .optional()?)
    }

    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1"),
                params![username],
                map_user,
            )
            .optional()?)
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Vec<UserRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            ORDER BY u.created_at ASC, u.rowid ASC
            LIMIT ?1 OFFSET ?2
            "#
        ))?;
        let rows = stmt.query_map(params![sql_bound(limit), sql_bound(offset)], map_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}
