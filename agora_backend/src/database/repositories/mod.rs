mod comments;
mod follows;
mod likes;
mod media;
mod posts;
mod users;

use super::models::{
    CommentRecord, FollowRecord, LikeRecord, LikeTarget, MediaRecord, PostRecord, UserRecord,
};
use anyhow::Result;
use rusqlite::Connection;

/// SQLite binds integers as `i64`; page bounds past that range saturate.
fn sql_bound(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub trait UserRepository {
    fn create(&self, record: &UserRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>>;
    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    fn list(&self, limit: usize, offset: usize) -> Result<Vec<UserRecord>>;
}

pub trait MediaRepository {
    fn create(&self, record: &MediaRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<MediaRecord>>;
    fn get_by_url(&self, url: &str) -> Result<Option<MediaRecord>>;
    /// Title is the only mutable field of an asset.
    fn set_title(&self, id: &str, title: Option<&str>) -> Result<bool>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    fn list_recent(&self, limit: usize, offset: usize) -> Result<Vec<PostRecord>>;
    fn list_by_author(&self, author_id: &str, limit: usize, offset: usize)
        -> Result<Vec<PostRecord>>;
    /// Posts written by users that `follower_id` follows, newest first.
    fn list_feed(&self, follower_id: &str, limit: usize, offset: usize) -> Result<Vec<PostRecord>>;
    fn delete(&self, id: &str) -> Result<bool>;
    fn comment_count(&self, id: &str) -> Result<usize>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<CommentRecord>>;
    fn list_for_post(&self, post_id: &str, limit: usize, offset: usize)
        -> Result<Vec<CommentRecord>>;
    fn list_all_for_post(&self, post_id: &str) -> Result<Vec<CommentRecord>>;
    fn delete(&self, id: &str) -> Result<bool>;
}

pub trait LikeRepository {
    /// Returns `false` when the like already existed.
    fn add(&self, record: &LikeRecord) -> Result<bool>;
    fn remove(&self, target: LikeTarget, target_id: &str, user_id: &str) -> Result<bool>;
    fn count(&self, target: LikeTarget, target_id: &str) -> Result<usize>;
    fn has_liked(&self, target: LikeTarget, target_id: &str, user_id: &str) -> Result<bool>;
}

pub trait FollowRepository {
    /// Returns `false` when the follow already existed.
    fn follow(&self, record: &FollowRecord) -> Result<bool>;
    fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<bool>;
    fn followers(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<UserRecord>>;
    fn following(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<UserRecord>>;
    fn is_following(&self, follower_id: &str, followee_id: &str) -> Result<bool>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn media(&self) -> impl MediaRepository + '_ {
        media::SqliteMediaRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn likes(&self) -> impl LikeRepository + '_ {
        likes::SqliteLikeRepository { conn: self.conn }
    }

    pub fn follows(&self) -> impl FollowRepository + '_ {
        follows::SqliteFollowRepository { conn: self.conn }
    }
}
