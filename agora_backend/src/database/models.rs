use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub filename: String,
    pub url: String,
    /// Path relative to the base directory.
    pub path: String,
    pub media_type: String,
    pub mime: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub uploader_id: Option<String>,
    pub size_bytes: Option<i64>,
    pub checksum: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub author_id: String,
    pub body: String,
    pub media_id: Option<String>,
    pub media_type: Option<String>,
    pub media_title: Option<String>,
    pub thumbnail: Option<String>,
    pub attached_media: String, // JSON array of media ids
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub media_id: Option<String>,
    pub media_type: Option<String>,
    pub media_title: Option<String>,
    pub thumbnail: Option<String>,
    pub attached_media: String, // JSON array of media ids
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeTarget {
    Post,
    Comment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeRecord {
    pub target: LikeTarget,
    pub target_id: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowRecord {
    pub follower_id: String,
    pub followee_id: String,
    pub created_at: String,
}
