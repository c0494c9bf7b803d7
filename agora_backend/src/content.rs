use crate::database::models::{CommentRecord, LikeTarget, MediaRecord, PostRecord};
use crate::database::repositories::{
    CommentRepository, LikeRepository, MediaRepository, PostRepository, SqliteRepositories,
    UserRepository,
};
use crate::database::Database;
use crate::error::AgoraError;
use crate::utils::{new_id, non_blank, now_utc_iso};
use agora_content::preview::excerpt;
use agora_content::{
    is_persisted_url, markup, media_src_key, ContentBody, MediaDescriptor, MediaKind,
    SelectedMedia,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const EXCERPT_CHARS: usize = 200;

#[derive(Clone)]
pub struct ContentService {
    database: Database,
}

impl ContentService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create_post(&self, input: CreatePostInput) -> Result<PostView> {
        self.database.with_repositories(|repos| {
            ensure_user(&repos, &input.author_id)?;
            let prepared = prepare_content(
                &repos,
                &input.content,
                input.media_id,
                input.media_title,
                input.thumbnail,
            )?;
            let record = PostRecord {
                id: new_id(),
                author_id: input.author_id.clone(),
                body: input.content,
                media_id: prepared.media_id,
                media_type: prepared.media_type,
                media_title: prepared.media_title,
                thumbnail: prepared.thumbnail,
                attached_media: serde_json::to_string(&prepared.attached)?,
                created_at: now_utc_iso(),
            };
            repos.posts().create(&record)?;
            tracing::info!(post_id = %record.id, author_id = %record.author_id, "created post");
            post_view(&repos, record)
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostView>> {
        self.database.with_repositories(|repos| {
            match repos.posts().get(id)? {
                Some(record) => Ok(Some(post_view(&repos, record)?)),
                None => Ok(None),
            }
        })
    }

    /// Newest first, optionally restricted to one author.
    pub fn list_posts(
        &self,
        author_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PostView>> {
        self.database.with_repositories(|repos| {
            let records = match author_id {
                Some(author) => repos.posts().list_by_author(author, limit, offset)?,
                None => repos.posts().list_recent(limit, offset)?,
            };
            records
                .into_iter()
                .map(|record| post_view(&repos, record))
                .collect()
        })
    }

    /// Posts by the users `user_id` follows, newest first.
    pub fn feed(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<PostView>> {
        self.database.with_repositories(|repos| {
            ensure_user(&repos, user_id)?;
            let records = repos.posts().list_feed(user_id, limit, offset)?;
            records
                .into_iter()
                .map(|record| post_view(&repos, record))
                .collect()
        })
    }

    pub fn delete_post(&self, id: &str) -> Result<()> {
        let removed = self.database.with_repositories(|repos| repos.posts().delete(id))?;
        if !removed {
            return Err(AgoraError::not_found(format!("post {id}")));
        }
        tracing::info!(post_id = %id, "deleted post");
        Ok(())
    }

    pub fn create_comment(&self, input: CreateCommentInput) -> Result<CommentView> {
        self.database.with_repositories(|repos| {
            if repos.posts().get(&input.post_id)?.is_none() {
                return Err(AgoraError::not_found(format!("post {}", input.post_id)));
            }
            ensure_user(&repos, &input.author_id)?;
            let parent_id = non_blank(input.parent_id);
            if let Some(parent_id) = parent_id.as_deref() {
                let parent = repos
                    .comments()
                    .get(parent_id)?
                    .ok_or_else(|| AgoraError::not_found(format!("comment {parent_id}")))?;
                if parent.post_id != input.post_id {
                    return Err(AgoraError::invalid(
                        "parent comment belongs to a different post",
                    ));
                }
            }
            let prepared = prepare_content(
                &repos,
                &input.content,
                input.media_id,
                input.media_title,
                input.thumbnail,
            )?;
            let record = CommentRecord {
                id: new_id(),
                post_id: input.post_id.clone(),
                author_id: input.author_id.clone(),
                parent_id,
                body: input.content,
                media_id: prepared.media_id,
                media_type: prepared.media_type,
                media_title: prepared.media_title,
                thumbnail: prepared.thumbnail,
                attached_media: serde_json::to_string(&prepared.attached)?,
                created_at: now_utc_iso(),
            };
            repos.comments().create(&record)?;
            tracing::info!(
                comment_id = %record.id,
                post_id = %record.post_id,
                parent_id = ?record.parent_id,
                "created comment"
            );
            comment_view(&repos, record)
        })
    }

    /// Flat page of comments, oldest first.
    pub fn list_comments(
        &self,
        post_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommentView>> {
        self.database.with_repositories(|repos| {
            ensure_post(&repos, post_id)?;
            let records = repos.comments().list_for_post(post_id, limit, offset)?;
            records
                .into_iter()
                .map(|record| comment_view(&repos, record))
                .collect()
        })
    }

    pub fn comment_tree(&self, post_id: &str) -> Result<Vec<CommentNode>> {
        let views = self.database.with_repositories(|repos| {
            ensure_post(&repos, post_id)?;
            let records = repos.comments().list_all_for_post(post_id)?;
            records
                .into_iter()
                .map(|record| comment_view(&repos, record))
                .collect::<Result<Vec<_>>>()
        })?;
        Ok(build_tree(views))
    }

    pub fn delete_comment(&self, id: &str) -> Result<()> {
        let removed = self
            .database
            .with_repositories(|repos| repos.comments().delete(id))?;
        if !removed {
            return Err(AgoraError::not_found(format!("comment {id}")));
        }
        tracing::info!(comment_id = %id, "deleted comment");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub media_title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub post_id: String,
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub media_title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub media_id: Option<String>,
    pub media_type: Option<MediaKind>,
    pub media_title: Option<String>,
    pub thumbnail: Option<String>,
    pub attached_media_ids: Vec<String>,
    pub media_preview: Vec<MediaDescriptor>,
    pub excerpt: String,
    pub like_count: usize,
    pub comment_count: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub media_id: Option<String>,
    pub media_type: Option<MediaKind>,
    pub media_title: Option<String>,
    pub thumbnail: Option<String>,
    pub attached_media_ids: Vec<String>,
    pub media_preview: Vec<MediaDescriptor>,
    pub excerpt: String,
    pub like_count: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentNode>,
}

/// Server-side view of a submitted body and its primary media.
struct PreparedContent {
    media_id: Option<String>,
    media_type: Option<String>,
    media_title: Option<String>,
    thumbnail: Option<String>,
    attached: Vec<String>,
}

fn prepare_content(
    repos: &SqliteRepositories<'_>,
    content: &str,
    media_id: Option<String>,
    media_title: Option<String>,
    thumbnail: Option<String>,
) -> Result<PreparedContent> {
    let body = markup::parse(content)
        .map_err(|err| AgoraError::invalid(format!("malformed content: {err}")))?;
    let media_id = non_blank(media_id);
    if body.is_blank() && media_id.is_none() {
        return Err(AgoraError::invalid("content must contain text or media"));
    }

    let media = repos.media();
    let asset = match media_id.as_deref() {
        Some(id) => Some(
            media
                .get(id)?
                .ok_or_else(|| AgoraError::not_found(format!("media {id}")))?,
        ),
        None => None,
    };

    let mut attached: Vec<String> = Vec::new();
    for node in body.media_nodes() {
        if let Some(record) = media.get_by_url(media_src_key(&node.src))? {
            if !attached.contains(&record.id) {
                attached.push(record.id);
            }
        }
    }

    let media_title = non_blank(media_title).or_else(|| {
        asset
            .as_ref()
            .and_then(|asset| body_title_for(&body, asset).or_else(|| asset.title.clone()))
    });
    let thumbnail = non_blank(thumbnail)
        .filter(|url| is_persisted_url(url))
        .or_else(|| asset.as_ref().and_then(|asset| asset.thumbnail.clone()));

    Ok(PreparedContent {
        media_type: asset.as_ref().map(|asset| asset.media_type.clone()),
        media_id,
        media_title,
        thumbnail,
        attached,
    })
}

/// Title attribute of the body node that embeds `asset`, if any.
fn body_title_for(body: &ContentBody, asset: &MediaRecord) -> Option<String> {
    body.media_nodes()
        .find(|node| media_src_key(&node.src) == asset.url)
        .and_then(|node| node.title.clone())
        .filter(|title| !title.trim().is_empty())
}

fn ensure_user(repos: &SqliteRepositories<'_>, user_id: &str) -> Result<()> {
    if repos.users().get(user_id)?.is_none() {
        return Err(AgoraError::not_found(format!("user {user_id}")));
    }
    Ok(())
}

fn ensure_post(repos: &SqliteRepositories<'_>, post_id: &str) -> Result<()> {
    if repos.posts().get(post_id)?.is_none() {
        return Err(AgoraError::not_found(format!("post {post_id}")));
    }
    Ok(())
}

/// Preview descriptors plus excerpt for a stored body. The primary asset
/// supplies the thumbnail fallback; its title acts as the override.
fn render_body(
    repos: &SqliteRepositories<'_>,
    body: &str,
    media_id: Option<&str>,
    media_title: Option<&str>,
) -> Result<(Vec<MediaDescriptor>, String)> {
    let selected = match media_id {
        Some(id) => repos.media().get(id)?.map(|asset| SelectedMedia {
            kind: asset.media_type.parse().unwrap_or(MediaKind::Document),
            id: Some(asset.id),
            src: asset.url,
            title: asset.title,
            thumbnail: asset.thumbnail,
        }),
        None => None,
    };
    let preview = agora_content::render_media_only(body, media_title, selected.as_ref());
    Ok((preview.descriptors().to_vec(), excerpt(body, EXCERPT_CHARS)))
}

fn parse_attached(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).context("attached_media column is not a JSON array")
}

fn post_view(repos: &SqliteRepositories<'_>, record: PostRecord) -> Result<PostView> {
    let (media_preview, excerpt) = render_body(
        repos,
        &record.body,
        record.media_id.as_deref(),
        record.media_title.as_deref(),
    )?;
    Ok(PostView {
        like_count: repos.likes().count(LikeTarget::Post, &record.id)?,
        comment_count: repos.posts().comment_count(&record.id)?,
        attached_media_ids: parse_attached(&record.attached_media)?,
        media_type: record.media_type.as_deref().and_then(|raw| raw.parse().ok()),
        media_preview,
        excerpt,
        id: record.id,
        author_id: record.author_id,
        content: record.body,
        media_id: record.media_id,
        media_title: record.media_title,
        thumbnail: record.thumbnail,
        created_at: record.created_at,
    })
}

fn comment_view(repos: &SqliteRepositories<'_>, record: CommentRecord) -> Result<CommentView> {
    let (media_preview, excerpt) = render_body(
        repos,
        &record.body,
        record.media_id.as_deref(),
        record.media_title.as_deref(),
    )?;
    Ok(CommentView {
        like_count: repos.likes().count(LikeTarget::Comment, &record.id)?,
        attached_media_ids: parse_attached(&record.attached_media)?,
        media_type: record.media_type.as_deref().and_then(|raw| raw.parse().ok()),
        media_preview,
        excerpt,
        id: record.id,
        post_id: record.post_id,
        author_id: record.author_id,
        parent_id: record.parent_id,
        content: record.body,
        media_id: record.media_id,
        media_title: record.media_title,
        thumbnail: record.thumbnail,
        created_at: record.created_at,
    })
}

/// Nests an oldest-first flat list. Comments whose parent is not in the
/// list are treated as roots.
fn build_tree(comments: Vec<CommentView>) -> Vec<CommentNode> {
    let known: std::collections::HashSet<String> =
        comments.iter().map(|comment| comment.id.clone()).collect();
    let mut children: HashMap<String, Vec<CommentView>> = HashMap::new();
    let mut roots = Vec::new();
    for comment in comments {
        match comment.parent_id.clone() {
            Some(parent) if known.contains(&parent) => {
                children.entry(parent).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }
    roots
        .into_iter()
        .map(|root| attach_replies(root, &mut children))
        .collect()
}

fn attach_replies(
    comment: CommentView,
    children: &mut HashMap<String, Vec<CommentView>>,
) -> CommentNode {
    let replies = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| attach_replies(reply, children))
        .collect();
    CommentNode { comment, replies }
}
