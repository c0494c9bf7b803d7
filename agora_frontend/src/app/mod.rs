//! Client controller: owns the drafts, the local feed and the playback
//! coordinator, and runs network work on background threads that report
//! back through a channel drained by [`ForumClient::tick`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::api::ApiClient;
use crate::composer::{ComposeError, Composer, FeedState};
use crate::models::{CommentNode, CommentView, CreateContentRequest};
use crate::playback::PlaybackCoordinator;

mod messages;
mod tasks;

pub use messages::AppMessage;

pub const DEFAULT_PAGE_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedSource {
    #[default]
    Recent,
    Following,
}

/// A comment shown before the server has answered for it.
#[derive(Debug, Clone)]
pub struct PendingComment {
    pub local_id: String,
    pub request: CreateContentRequest,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct CommentsState {
    pub composer: Composer,
    pub tree: Vec<CommentNode>,
    pub pending: Vec<PendingComment>,
    pub loading: bool,
    pub error: Option<String>,
}

impl CommentsState {
    pub fn comment_count(&self) -> usize {
        fn count(nodes: &[CommentNode]) -> usize {
            nodes.iter().map(|node| 1 + count(&node.replies)).sum()
        }
        count(&self.tree)
    }

    pub fn add_pending(&mut self, request: CreateContentRequest) -> String {
        let local_id = uuid::Uuid::new_v4().to_string();
        self.pending.push(PendingComment {
            local_id: local_id.clone(),
            request,
            created_at: Utc::now(),
        });
        local_id
    }

    pub fn remove_pending(&mut self, local_id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| pending.local_id != local_id);
        self.pending.len() != before
    }

    /// Places a confirmed comment under its parent, or at the end of the
    /// top level when the parent is not loaded. The next reload replaces it.
    pub fn insert_confirmed(&mut self, comment: CommentView) {
        if contains_comment(&self.tree, &comment.id) {
            return;
        }
        let parent_id = comment.parent_id.clone();
        let mut node = CommentNode {
            comment,
            replies: Vec::new(),
        };
        if let Some(parent_id) = parent_id {
            match attach_reply(&mut self.tree, &parent_id, node) {
                Ok(()) => return,
                Err(orphan) => node = orphan,
            }
        }
        self.tree.push(node);
    }
}

fn contains_comment(nodes: &[CommentNode], id: &str) -> bool {
    nodes
        .iter()
        .any(|node| node.comment.id == id || contains_comment(&node.replies, id))
}

fn attach_reply(
    nodes: &mut [CommentNode],
    parent_id: &str,
    mut reply: CommentNode,
) -> Result<(), CommentNode> {
    for node in nodes.iter_mut() {
        if node.comment.id == parent_id {
            node.replies.push(reply);
            return Ok(());
        }
        reply = match attach_reply(&mut node.replies, parent_id, reply) {
            Ok(()) => return Ok(()),
            Err(reply) => reply,
        };
    }
    Err(reply)
}

pub struct ForumClient {
    api: ApiClient,
    tx: Sender<AppMessage>,
    rx: Receiver<AppMessage>,
    user_id: String,
    page_limit: usize,
    pub source: FeedSource,
    pub composer: Composer,
    pub feed: FeedState,
    pub playback: PlaybackCoordinator,
    pub comments: HashMap<String, CommentsState>,
}

impl ForumClient {
    pub fn new(api: ApiClient, user_id: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            api,
            tx,
            rx,
            user_id: user_id.into(),
            page_limit: DEFAULT_PAGE_LIMIT,
            source: FeedSource::default(),
            composer: Composer::new(),
            feed: FeedState::default(),
            playback: PlaybackCoordinator::new(),
            comments: HashMap::new(),
        }
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn refresh_feed(&mut self) {
        self.request_feed_page(0);
    }

    /// Fetches the page after the rows already shown, unless the last page
    /// came back short.
    pub fn load_more(&mut self) -> bool {
        if self.feed.exhausted || self.feed.loading {
            return false;
        }
        let offset = self.feed.posted_count();
        self.request_feed_page(offset);
        true
    }

    fn request_feed_page(&mut self, offset: usize) {
        self.feed.loading = true;
        tasks::load_feed(
            self.api.clone(),
            self.tx.clone(),
            self.source,
            self.user_id.clone(),
            self.page_limit,
            offset,
        );
    }

    /// Uploads a file into the post draft, or into the comment draft of
    /// `comment_on` when given. Returns `false` when that comment view is
    /// not open.
    pub fn upload(
        &mut self,
        path: PathBuf,
        title: Option<String>,
        comment_on: Option<&str>,
    ) -> bool {
        let composer = match comment_on {
            Some(post_id) => match self.comments.get_mut(post_id) {
                Some(state) => &mut state.composer,
                None => return false,
            },
            None => &mut self.composer,
        };
        composer.begin_upload();
        tasks::upload_media(
            self.api.clone(),
            self.tx.clone(),
            path,
            title,
            comment_on.map(str::to_string),
        );
        true
    }

    /// Sends the post draft. Returns `Ok(false)` when the draft is empty and
    /// nothing was sent.
    pub fn submit_post(&mut self, now: Instant) -> Result<bool, ComposeError> {
        let Some(request) = self.composer.prepare(&self.user_id, now)? else {
            return Ok(false);
        };
        let local_id = self.feed.prepend_pending(request.clone());
        info!("submitting post {local_id}");
        tasks::create_post(self.api.clone(), self.tx.clone(), local_id, request);
        Ok(true)
    }

    pub fn open_comments(&mut self, post_id: &str) {
        self.comments.entry(post_id.to_string()).or_default();
        self.load_comments(post_id);
    }

    /// Drops the view state; results still in flight for it are discarded.
    pub fn close_comments(&mut self, post_id: &str) {
        self.comments.remove(post_id);
    }

    pub fn load_comments(&mut self, post_id: &str) {
        if let Some(state) = self.comments.get_mut(post_id) {
            state.loading = true;
        }
        tasks::load_comments(self.api.clone(), self.tx.clone(), post_id.to_string());
    }

    /// Sends the comment draft of an open view and shows it as pending
    /// until the server answers.
    pub fn submit_comment(&mut self, post_id: &str, now: Instant) -> Result<bool, ComposeError> {
        let Some(state) = self.comments.get_mut(post_id) else {
            warn!("comment view for {post_id} is not open");
            return Ok(false);
        };
        let Some(request) = state.composer.prepare(&self.user_id, now)? else {
            return Ok(false);
        };
        let local_id = state.add_pending(request.clone());
        info!("submitting comment {local_id} on {post_id}");
        tasks::create_comment(
            self.api.clone(),
            self.tx.clone(),
            post_id.to_string(),
            local_id,
            request,
        );
        Ok(true)
    }

    /// One frame of client work: applies finished background results, then
    /// lets every draft pick up its settled editor state. Returns the number
    /// of messages handled.
    pub fn tick(&mut self, now: Instant) -> usize {
        let handled = self.process_messages(now);
        self.composer.poll_editor(now);
        for state in self.comments.values_mut() {
            state.composer.poll_editor(now);
        }
        handled
    }

    pub fn process_messages(&mut self, now: Instant) -> usize {
        messages::process_messages(self, now)
    }

    pub fn handle_message(&mut self, message: AppMessage, now: Instant) {
        messages::handle_message(self, message, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommentView, MediaUpload, PostView};
    use crate::editor::CHANGE_DEBOUNCE;
    use agora_content::MediaKind;
    use anyhow::anyhow;
    use std::time::Duration;

    fn client() -> ForumClient {
        // Nothing listens on the discard port; background fetches just fail.
        let api = ApiClient::new("http://127.0.0.1:9").expect("api client");
        ForumClient::new(api, "u1").with_page_limit(2)
    }

    fn post(id: &str, title: Option<&str>) -> PostView {
        PostView {
            id: id.into(),
            author_id: "u1".into(),
            content: "hello".into(),
            media_id: None,
            media_type: None,
            media_title: title.map(str::to_string),
            thumbnail: None,
            attached_media_ids: Vec::new(),
            media_preview: Vec::new(),
            excerpt: "hello".into(),
            like_count: 0,
            comment_count: 0,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn comment(id: &str, post_id: &str) -> CommentView {
        reply(id, post_id, None)
    }

    fn reply(id: &str, post_id: &str, parent_id: Option<&str>) -> CommentView {
        CommentView {
            id: id.into(),
            post_id: post_id.into(),
            author_id: "u1".into(),
            parent_id: parent_id.map(str::to_string),
            content: "hi".into(),
            media_id: None,
            media_type: None,
            media_title: None,
            thumbnail: None,
            attached_media_ids: Vec::new(),
            media_preview: Vec::new(),
            excerpt: "hi".into(),
            like_count: 0,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn upload(id: &str) -> MediaUpload {
        MediaUpload {
            id: id.into(),
            url: format!("/media/{id}/raw"),
            kind: MediaKind::Audio,
            title: None,
            thumbnail: None,
        }
    }

    #[test]
    fn empty_draft_never_reaches_the_network() {
        let mut app = client();
        assert_eq!(app.submit_post(Instant::now()), Ok(false));
        assert_eq!(app.feed.items().len(), 0);
        assert!(!app.composer.submitting);
    }

    #[test]
    fn successful_post_replaces_placeholder_and_reconciles() {
        let now = Instant::now();
        let mut app = client();
        app.composer.editor_mut().push_text("hello", Vec::new(), now);
        assert_eq!(app.submit_post(now), Ok(true));
        let local_id = match &app.feed.items()[0] {
            crate::composer::FeedItem::Pending { local_id, .. } => local_id.clone(),
            other => panic!("expected pending item, got {other:?}"),
        };

        app.handle_message(
            AppMessage::PostCreated {
                local_id,
                result: Ok(post("p1", None)),
            },
            now,
        );
        assert!(app.composer.editor().is_blank());
        assert_eq!(app.feed.pending_count(), 0);
        assert!(app.feed.loading);

        app.handle_message(
            AppMessage::FeedLoaded {
                offset: 0,
                result: Ok(vec![post("p1", Some("Server title"))]),
            },
            now,
        );
        assert!(!app.feed.loading);
        assert!(app.feed.exhausted);
        assert_eq!(app.feed.items()[0].media_title(), Some("Server title"));
    }

    #[test]
    fn rejected_post_keeps_draft_and_surfaces_error() {
        let now = Instant::now();
        let mut app = client();
        app.composer.editor_mut().push_text("try again", Vec::new(), now);
        app.submit_post(now).expect("submit");
        let local_id = match &app.feed.items()[0] {
            crate::composer::FeedItem::Pending { local_id, .. } => local_id.clone(),
            other => panic!("expected pending item, got {other:?}"),
        };

        app.handle_message(
            AppMessage::PostCreated {
                local_id,
                result: Err(anyhow!("request failed (400 Bad Request): content is empty")),
            },
            now,
        );
        assert!(app.feed.items().is_empty());
        assert!(app.composer.error.as_deref().unwrap_or("").contains("content is empty"));
        assert!(app.composer.editor().get_serialized().contains("try again"));
        assert!(app.composer.can_submit());
    }

    #[test]
    fn upload_result_lands_in_the_draft() {
        let now = Instant::now();
        let mut app = client();
        app.composer.begin_upload();
        assert_eq!(app.submit_post(now), Err(ComposeError::UploadInProgress));

        app.handle_message(
            AppMessage::MediaUploaded {
                target: None,
                result: Ok(upload("m1")),
            },
            now,
        );
        assert!(!app.composer.is_uploading());
        assert_eq!(
            app.composer.selected_media().and_then(|m| m.id.as_deref()),
            Some("m1")
        );
        assert!(app.composer.can_submit());
    }

    #[test]
    fn results_for_closed_comment_views_are_discarded() {
        let now = Instant::now();
        let mut app = client();
        app.comments.insert("p1".into(), CommentsState::default());
        app.handle_message(
            AppMessage::CommentsLoaded {
                post_id: "p1".into(),
                result: Ok(vec![CommentNode {
                    comment: comment("c1", "p1"),
                    replies: vec![CommentNode {
                        comment: comment("c2", "p1"),
                        replies: Vec::new(),
                    }],
                }]),
            },
            now,
        );
        assert_eq!(app.comments["p1"].comment_count(), 2);

        app.close_comments("p1");
        assert!(!app.upload(PathBuf::from("/tmp/clip.ogg"), None, Some("p1")));
        app.handle_message(
            AppMessage::CommentCreated {
                post_id: "p1".into(),
                local_id: "l1".into(),
                result: Ok(comment("c3", "p1")),
            },
            now,
        );
        app.handle_message(
            AppMessage::MediaUploaded {
                target: Some("p1".into()),
                result: Ok(upload("m1")),
            },
            now,
        );
        assert!(app.comments.is_empty());
        assert_eq!(app.composer.selected_media(), None);
    }

    fn pending_local_id(app: &ForumClient, post_id: &str) -> String {
        let pending = &app.comments[post_id].pending;
        assert_eq!(pending.len(), 1);
        pending[0].local_id.clone()
    }

    #[test]
    fn successful_comment_replaces_placeholder_and_reconciles() {
        let now = Instant::now();
        let mut app = client();
        app.comments.insert("p1".into(), CommentsState::default());
        app.handle_message(
            AppMessage::CommentsLoaded {
                post_id: "p1".into(),
                result: Ok(vec![CommentNode {
                    comment: comment("c1", "p1"),
                    replies: Vec::new(),
                }]),
            },
            now,
        );

        let state = app.comments.get_mut("p1").expect("open view");
        state.composer.set_parent(Some("c1".into()));
        state.composer.editor_mut().push_text("agreed", Vec::new(), now);
        assert_eq!(app.submit_comment("p1", now), Ok(true));
        let local_id = pending_local_id(&app, "p1");
        assert_eq!(app.comments["p1"].pending[0].request.parent_id.as_deref(), Some("c1"));

        app.handle_message(
            AppMessage::CommentCreated {
                post_id: "p1".into(),
                local_id,
                result: Ok(reply("c2", "p1", Some("c1"))),
            },
            now,
        );
        let state = &app.comments["p1"];
        assert!(state.pending.is_empty());
        assert!(state.loading);
        assert_eq!(state.tree[0].replies[0].comment.id, "c2");
        assert_eq!(state.composer.parent_id(), None);
        assert!(state.composer.editor().is_blank());

        app.handle_message(
            AppMessage::CommentsLoaded {
                post_id: "p1".into(),
                result: Ok(vec![CommentNode {
                    comment: comment("c1", "p1"),
                    replies: vec![CommentNode {
                        comment: reply("c2", "p1", Some("c1")),
                        replies: Vec::new(),
                    }],
                }]),
            },
            now,
        );
        let state = &app.comments["p1"];
        assert!(!state.loading);
        assert_eq!(state.comment_count(), 2);
    }

    #[test]
    fn rejected_comment_keeps_draft_and_surfaces_error() {
        let now = Instant::now();
        let mut app = client();
        app.comments.insert("p1".into(), CommentsState::default());
        let state = app.comments.get_mut("p1").expect("open view");
        state.composer.editor_mut().push_text("second try", Vec::new(), now);
        app.submit_comment("p1", now).expect("submit");
        let local_id = pending_local_id(&app, "p1");

        app.handle_message(
            AppMessage::CommentCreated {
                post_id: "p1".into(),
                local_id,
                result: Err(anyhow!("request failed (404 Not Found): parent comment not found")),
            },
            now,
        );
        let state = &app.comments["p1"];
        assert!(state.pending.is_empty());
        assert_eq!(state.comment_count(), 0);
        assert!(state
            .composer
            .error
            .as_deref()
            .unwrap_or("")
            .contains("parent comment not found"));
        assert!(state.composer.editor().get_serialized().contains("second try"));
        assert!(state.composer.can_submit());
    }

    #[test]
    fn confirmed_comment_with_unknown_parent_lands_at_top_level() {
        let mut state = CommentsState::default();
        state.insert_confirmed(comment("c1", "p1"));
        state.insert_confirmed(reply("c2", "p1", Some("gone")));
        state.insert_confirmed(reply("c3", "p1", Some("c1")));
        state.insert_confirmed(reply("c3", "p1", Some("c1")));
        let top: Vec<_> = state.tree.iter().map(|n| n.comment.id.as_str()).collect();
        assert_eq!(top, vec!["c1", "c2"]);
        assert_eq!(state.comment_count(), 3);
    }

    #[test]
    fn comment_upload_goes_to_that_comment_draft() {
        let now = Instant::now();
        let mut app = client();
        app.comments.insert("p1".into(), CommentsState::default());
        assert!(app.upload(PathBuf::from("/tmp/does-not-exist.ogg"), None, Some("p1")));
        assert!(app.comments["p1"].composer.is_uploading());
        assert!(!app.composer.is_uploading());

        app.handle_message(
            AppMessage::MediaUploaded {
                target: Some("p1".into()),
                result: Ok(upload("m2")),
            },
            now,
        );
        let draft = &app.comments["p1"].composer;
        assert!(!draft.is_uploading());
        assert_eq!(draft.selected_media().and_then(|m| m.id.as_deref()), Some("m2"));
        assert_eq!(app.composer.selected_media(), None);
    }

    #[test]
    fn tick_publishes_settled_drafts() {
        let start = Instant::now();
        let mut app = client();
        app.comments.insert("p1".into(), CommentsState::default());
        for step in 0..4u64 {
            let at = start + Duration::from_millis(step * 50);
            app.composer.editor_mut().push_text("a", Vec::new(), at);
            assert_eq!(app.tick(at), 0);
        }
        app.comments
            .get_mut("p1")
            .expect("open view")
            .composer
            .editor_mut()
            .push_text("reply", Vec::new(), start);

        let settled = start + Duration::from_millis(150) + CHANGE_DEBOUNCE;
        app.tick(settled);
        assert_eq!(app.composer.snapshot().revision, 1);
        assert_eq!(app.composer.snapshot().html, "aaaa");
        assert!(app.comments["p1"].composer.snapshot().has_content);

        app.tick(settled + CHANGE_DEBOUNCE);
        assert_eq!(app.composer.snapshot().revision, 1);
    }

    #[test]
    fn channel_messages_are_drained() {
        let mut app = client();
        app.tx
            .send(AppMessage::FeedLoaded {
                offset: 0,
                result: Ok(vec![post("p1", None), post("p2", None)]),
            })
            .expect("send");
        app.tx
            .send(AppMessage::FeedLoaded {
                offset: 2,
                result: Err(anyhow!("connection refused")),
            })
            .expect("send");
        assert_eq!(app.tick(Instant::now()), 2);
        assert_eq!(app.feed.posted_count(), 2);
        assert!(!app.feed.exhausted);
        assert_eq!(app.feed.error.as_deref(), Some("connection refused"));
    }
}
