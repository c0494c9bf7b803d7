use crate::database::models::MediaRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteMediaRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const MEDIA_COLUMNS: &str = "id, filename, url, path, media_type, mime, title, thumbnail, \
     uploader_id, size_bytes, checksum, created_at";

fn map_media(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    Ok(MediaRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        url: row.get(2)?,
        path: row.get(3)?,
        media_type: row.get(4)?,
        mime: row.get(5)?,
        title: row.get(6)?,
        thumbnail: row.get(7)?,
        uploader_id: row.get(8)?,
        size_bytes: row.get(9)?,
        checksum: row.get(10)?,
        created_at: row.get(11)?,
    })
}

impl<'conn> super::MediaRepository for SqliteMediaRepository<'conn> {
    fn create(&self, record: &MediaRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO media ({MEDIA_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                record.id,
                record.filename,
                record.url,
                record.path,
                record.media_type,
                record.mime,
                record.title,
                record.thumbnail,
                record.uploader_id,
                record.size_bytes,
                record.checksum,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<MediaRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = ?1"),
                params![id],
                map_media,
            )
            .optional()?)
    }

    fn get_by_url(&self, url: &str) -> Result<Option<MediaRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {MEDIA_COLUMNS} FROM media WHERE url = ?1"),
                params![url],
                map_media,
            )
            .optional()?)
    }

    fn set_title(&self, id: &str, title: Option<&str>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE media SET title = ?2 WHERE id = ?1",
            params![id, title],
        )?;
        Ok(changed > 0)
    }
}
