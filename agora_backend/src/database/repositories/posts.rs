use super::sql_bound;
use crate::database::models::PostRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const POST_COLUMNS: &str = "p.id, p.author_id, p.body, p.media_id, p.media_type, p.media_title, \
     p.thumbnail, p.attached_media, p.created_at";

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        author_id: row.get(1)?,
        body: row.get(2)?,
        media_id: row.get(3)?,
        media_type: row.get(4)?,
        media_title: row.get(5)?,
        thumbnail: row.get(6)?,
        attached_media: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl<'conn> SqlitePostRepository<'conn> {
    fn query_list(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, map_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO posts (id, author_id, body, media_id, media_type, media_title, thumbnail, attached_media, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.id,
                record.author_id,
                record.body,
                record.media_id,
                record.media_type,
                record.media_title,
                record.thumbnail,
                record.attached_media,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PostRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
                params![id],
                map_post,
            )
            .optional()?)
    }

    fn list_recent(&self, limit: usize, offset: usize) -> Result<Vec<PostRecord>> {
        self.query_list(
            &format!(
                r#"
                SELECT {POST_COLUMNS}
                FROM posts p
                ORDER BY p.created_at DESC, p.rowid DESC
                LIMIT ?1 OFFSET ?2
                "#
            ),
            params![sql_bound(limit), sql_bound(offset)],
        )
    }

    fn list_by_author(
        &self,
        author_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostRecord>> {
        self.query_list(
            &format!(
                r#"
                SELECT {POST_COLUMNS}
                FROM posts p
                WHERE p.author_id = ?1
                ORDER BY p.created_at DESC, p.rowid DESC
                LIMIT ?2 OFFSET ?3
                "#
            ),
            params![author_id, sql_bound(limit), sql_bound(offset)],
        )
    }

    fn list_feed(&self, follower_id: &str, limit: usize, offset: usize) -> Result<Vec<PostRecord>> {
        self.query_list(
            &format!(
                r#"
                SELECT {POST_COLUMNS}
                FROM posts p
                INNER JOIN follows f ON f.followee_id = p.author_id
                WHERE f.follower_id = ?1
                ORDER BY p.created_at DESC, p.rowid DESC
                LIMIT ?2 OFFSET ?3
                "#
            ),
            params![follower_id, sql_bound(limit), sql_bound(offset)],
        )
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn comment_count(&self, id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
