use agora_content::{MediaDescriptor, MediaKind, SelectedMedia};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateUserInput {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Registry entry returned by `POST /media` and `GET /media/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaUpload {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl MediaUpload {
    pub fn to_selected(&self) -> SelectedMedia {
        SelectedMedia {
            id: Some(self.id.clone()),
            src: self.url.clone(),
            kind: self.kind,
            title: self.title.clone(),
            thumbnail: self.thumbnail.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: String,
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub media_type: Option<MediaKind>,
    #[serde(default)]
    pub media_title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub attached_media_ids: Vec<String>,
    #[serde(default)]
    pub media_preview: Vec<MediaDescriptor>,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub like_count: usize,
    #[serde(default)]
    pub comment_count: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub media_type: Option<MediaKind>,
    #[serde(default)]
    pub media_title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub attached_media_ids: Vec<String>,
    #[serde(default)]
    pub media_preview: Vec<MediaDescriptor>,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub like_count: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,
    #[serde(default)]
    pub replies: Vec<CommentNode>,
}

/// Body of `POST /posts` and `POST /posts/:id/comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CreateContentRequest {
    pub user_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeSummary {
    pub target: String,
    pub target_id: String,
    pub like_count: usize,
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowSummary {
    pub follower_id: String,
    pub followee_id: String,
    pub following: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
