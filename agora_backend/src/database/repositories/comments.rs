use super::sql_bound;
use crate::database::models::CommentRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COMMENT_COLUMNS: &str = "c.id, c.post_id, c.author_id, c.parent_id, c.body, c.media_id, \
     c.media_type, c.media_title, c.thumbnail, c.attached_media, c.created_at";

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        parent_id: row.get(3)?,
        body: row.get(4)?,
        media_id: row.get(5)?,
        media_type: row.get(6)?,
        media_title: row.get(7)?,
        thumbnail: row.get(8)?,
        attached_media: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments (id, post_id, author_id, parent_id, body, media_id, media_type, media_title, thumbnail, attached_media, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.id,
                record.post_id,
                record.author_id,
                record.parent_id,
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

    fn get(&self, id: &str) -> Result<Option<CommentRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = ?1"),
                params![id],
                map_comment,
            )
            .optional()?)
    }

    fn list_for_post(
        &self,
        post_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments c
            WHERE c.post_id = ?1
            ORDER BY c.created_at ASC, c.rowid ASC
            LIMIT ?2 OFFSET ?3
            "#
        ))?;
        let rows = stmt.query_map(
            params![post_id, sql_bound(limit), sql_bound(offset)],
            map_comment,
        )?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn list_all_for_post(&self, post_id: &str) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments c
            WHERE c.post_id = ?1
            ORDER BY c.created_at ASC, c.rowid ASC
            "#
        ))?;
        let rows = stmt.query_map(params![post_id], map_comment)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}
