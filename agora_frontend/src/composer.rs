//! Draft state for new posts and comments, and the optimistic feed that
//! displays them before the server answers.

use agora_content::markup::decode_entities;
use agora_content::{
    is_persisted_url, render_media_only, MediaNode, MediaPreview, SelectedMedia,
};
use std::time::Instant;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use thiserror::Error;

use crate::editor::RichEditor;
use crate::models::{CreateContentRequest, MediaUpload, PostView};

lazy_static! {
    static ref TITLE_ATTR: Regex = Regex::new(r#"title="([^"]*)""#).expect("title regex");
    static ref MEDIA_TAG: Regex =
        Regex::new(r"(?i)<(img|video|audio|embed)\b").expect("media tag regex");
    static ref TAG: Regex = Regex::new(r"<[^>]*>").expect("tag regex");
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("a submission is already in flight")]
    AlreadySubmitting,
    #[error("wait for the upload to finish before posting")]
    UploadInProgress,
}

/// Builds the create request for `html`, or `None` when there is nothing
/// to send (no visible text and no media tag).
pub fn build_submission(
    user_id: &str,
    html: &str,
    selected: Option<&SelectedMedia>,
    title_override: Option<&str>,
    parent_id: Option<&str>,
) -> Option<CreateContentRequest> {
    let text = decode_entities(&TAG.replace_all(html, " "));
    if text.trim().is_empty() && !MEDIA_TAG.is_match(html) {
        return None;
    }

    let media_title = title_override
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .or_else(|| first_title_attr(html));

    Some(CreateContentRequest {
        user_id: user_id.to_string(),
        content: html.to_string(),
        media_id: selected.and_then(|media| media.id.clone()),
        media_title,
        thumbnail: selected
            .and_then(|media| media.thumbnail.as_deref())
            .filter(|url| is_persisted_url(url))
            .map(str::to_string),
        parent_id: parent_id.map(str::to_string),
    })
}

fn first_title_attr(html: &str) -> Option<String> {
    TITLE_ATTR
        .captures(html)
        .map(|caps| decode_entities(&caps[1]))
        .filter(|title| !title.trim().is_empty())
}

/// What the surrounding form last saw of the draft. Refreshed only when the
/// editor's debounced change notification fires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftSnapshot {
    pub html: String,
    pub has_content: bool,
    pub revision: u64,
}

#[derive(Debug, Default)]
pub struct Composer {
    editor: RichEditor,
    snapshot: DraftSnapshot,
    selected_media: Option<SelectedMedia>,
    title_override: String,
    parent_id: Option<String>,
    uploads_in_flight: usize,
    pub submitting: bool,
    pub error: Option<String>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_to(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Self::default()
        }
    }

    pub fn editor(&self) -> &RichEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut RichEditor {
        &mut self.editor
    }

    pub fn selected_media(&self) -> Option<&SelectedMedia> {
        self.selected_media.as_ref()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn set_parent(&mut self, parent_id: Option<String>) {
        self.parent_id = parent_id;
    }

    pub fn title_override(&self) -> &str {
        &self.title_override
    }

    pub fn set_title_override(&mut self, title: impl Into<String>) {
        self.title_override = title.into();
    }

    pub fn is_uploading(&self) -> bool {
        self.uploads_in_flight > 0
    }

    pub fn begin_upload(&mut self) {
        self.uploads_in_flight += 1;
        self.error = None;
    }

    pub fn snapshot(&self) -> &DraftSnapshot {
        &self.snapshot
    }

    /// Takes the editor's pending change notification, if its quiet window
    /// has passed, into the snapshot. Returns whether the snapshot changed.
    pub fn poll_editor(&mut self, now: Instant) -> bool {
        let Some(html) = self.editor.poll_change(now) else {
            return false;
        };
        self.snapshot.has_content =
            build_submission("", &html, self.selected_media.as_ref(), None, None).is_some();
        self.snapshot.html = html;
        self.snapshot.revision += 1;
        true
    }

    /// Inserts the uploaded asset as one finished node. With several uploads
    /// in flight the last one to complete becomes the selected media. An
    /// upload without a URL is reported as an error and nothing is inserted.
    pub fn attach_upload(&mut self, upload: &MediaUpload, now: Instant) -> bool {
        self.uploads_in_flight = self.uploads_in_flight.saturating_sub(1);
        let mut node = MediaNode::new(upload.kind, upload.url.clone());
        if let Some(title) = upload.title.as_deref().filter(|t| !t.trim().is_empty()) {
            node = node.titled(title);
        }
        if let Some(thumbnail) = upload.thumbnail.as_deref().filter(|t| is_persisted_url(t)) {
            node = node.with_thumbnail(thumbnail);
        }
        if !self.editor.insert_media(node, now) {
            warn!("upload {} came back without a url", upload.id);
            self.error = Some(format!("upload {} has no url", upload.id));
            return false;
        }
        self.selected_media = Some(upload.to_selected());
        true
    }

    pub fn upload_failed(&mut self, message: impl Into<String>) {
        self.uploads_in_flight = self.uploads_in_flight.saturating_sub(1);
        self.error = Some(message.into());
    }

    pub fn can_submit(&self) -> bool {
        !self.submitting
            && !self.is_uploading()
            && build_submission(
                "",
                &self.editor.get_serialized(),
                self.selected_media.as_ref(),
                None,
                None,
            )
            .is_some()
    }

    /// Applies the title override to the selected media node and builds the
    /// request. `Ok(None)` means there is nothing to send; the draft is left
    /// alone and no request should be issued.
    pub fn prepare(
        &mut self,
        user_id: &str,
        now: Instant,
    ) -> Result<Option<CreateContentRequest>, ComposeError> {
        if self.submitting {
            return Err(ComposeError::AlreadySubmitting);
        }
        if self.is_uploading() {
            return Err(ComposeError::UploadInProgress);
        }

        let title_override = self.title_override.trim().to_string();
        if let Some(selected) = &self.selected_media {
            if !title_override.is_empty()
                && !self.editor.set_media_title(selected, &title_override, now)
            {
                debug!("selected media {} no longer in the draft; title not applied", selected.src);
            }
        }

        let request = build_submission(
            user_id,
            &self.editor.get_serialized(),
            self.selected_media.as_ref(),
            Some(title_override.as_str()),
            self.parent_id.as_deref(),
        );
        if request.is_some() {
            self.submitting = true;
            self.error = None;
        }
        Ok(request)
    }

    pub fn finish_ok(&mut self, now: Instant) {
        self.editor.clear(now);
        self.selected_media = None;
        self.title_override.clear();
        self.submitting = false;
        self.error = None;
    }

    /// Keeps the draft so the user can resubmit.
    pub fn finish_err(&mut self, message: impl Into<String>) {
        self.submitting = false;
        self.error = Some(message.into());
    }
}

#[derive(Debug, Clone)]
pub enum FeedItem {
    Pending {
        local_id: String,
        request: CreateContentRequest,
        created_at: DateTime<Utc>,
    },
    Posted(PostView),
}

impl FeedItem {
    pub fn is_pending(&self) -> bool {
        matches!(self, FeedItem::Pending { .. })
    }

    pub fn content(&self) -> &str {
        match self {
            FeedItem::Pending { request, .. } => &request.content,
            FeedItem::Posted(post) => &post.content,
        }
    }

    pub fn media_title(&self) -> Option<&str> {
        match self {
            FeedItem::Pending { request, .. } => request.media_title.as_deref(),
            FeedItem::Posted(post) => post.media_title.as_deref(),
        }
    }

    pub fn preview(&self) -> MediaPreview {
        render_media_only(self.content(), self.media_title(), None)
    }
}

/// Locally displayed list of posts. Pending items always sit at the front.
#[derive(Debug, Default)]
pub struct FeedState {
    items: Vec<FeedItem>,
    pub loading: bool,
    pub error: Option<String>,
    pub exhausted: bool,
}

impl FeedState {
    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn posts(&self) -> impl Iterator<Item = &PostView> {
        self.items.iter().filter_map(|item| match item {
            FeedItem::Posted(post) => Some(post),
            FeedItem::Pending { .. } => None,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_pending()).count()
    }

    pub fn prepend_pending(&mut self, request: CreateContentRequest) -> String {
        let local_id = uuid::Uuid::new_v4().to_string();
        self.items.insert(
            0,
            FeedItem::Pending {
                local_id: local_id.clone(),
                request,
                created_at: Utc::now(),
            },
        );
        local_id
    }

    /// Swaps the pending item for the server row. Returns `false` if the
    /// pending item was already dropped.
    pub fn confirm(&mut self, local_id: &str, post: PostView) -> bool {
        self.items
            .retain(|item| !matches!(item, FeedItem::Posted(existing) if existing.id == post.id));
        match self.position_of(local_id) {
            Some(index) => {
                self.items[index] = FeedItem::Posted(post);
                true
            }
            None => false,
        }
    }

    pub fn reject(&mut self, local_id: &str) -> bool {
        match self.position_of(local_id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replaces every server row with a freshly fetched first page; pending
    /// items stay in front.
    pub fn reconcile(&mut self, posts: Vec<PostView>, limit: usize) {
        self.exhausted = posts.len() < limit;
        self.items.retain(FeedItem::is_pending);
        self.items.extend(posts.into_iter().map(FeedItem::Posted));
        self.loading = false;
        self.error = None;
    }

    /// Appends a further page, skipping rows already shown.
    pub fn append_page(&mut self, posts: Vec<PostView>, limit: usize) {
        self.exhausted = posts.len() < limit;
        for post in posts {
            if !self.posts().any(|existing| existing.id == post.id) {
                self.items.push(FeedItem::Posted(post));
            }
        }
        self.loading = false;
    }

    pub fn posted_count(&self) -> usize {
        self.items.len() - self.pending_count()
    }

    fn position_of(&self, local_id: &str) -> Option<usize> {
        self.items.iter().position(
            |item| matches!(item, FeedItem::Pending { local_id: id, .. } if id == local_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_content::{Mark, MediaKind};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    use crate::editor::CHANGE_DEBOUNCE;

    fn upload(id: &str, thumbnail: Option<&str>) -> MediaUpload {
        MediaUpload {
            id: id.into(),
            url: format!("/media/{id}/raw"),
            kind: MediaKind::Video,
            title: Some("Original".into()),
            thumbnail: thumbnail.map(str::to_string),
        }
    }

    fn post(id: &str, content: &str) -> PostView {
        PostView {
            id: id.into(),
            author_id: "u1".into(),
            content: content.into(),
            media_id: None,
            media_type: None,
            media_title: None,
            thumbnail: None,
            attached_media_ids: Vec::new(),
            media_preview: Vec::new(),
            excerpt: String::new(),
            like_count: 0,
            comment_count: 0,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn empty_drafts_build_nothing() {
        assert_eq!(build_submission("u1", "", None, None, None), None);
        assert_eq!(
            build_submission("u1", "<p>  &nbsp; </p><br>", None, Some("Title"), None),
            None
        );

        let mut composer = Composer::new();
        assert!(!composer.can_submit());
        assert_eq!(composer.prepare("u1", Instant::now()), Ok(None));
        assert!(!composer.submitting);
    }

    #[test]
    fn media_only_body_is_submitted() {
        let html = r#"<img src="/media/a/raw" title="Sunset &amp; sea">"#;
        let request = build_submission("u1", html, None, None, None).expect("request");
        assert_eq!(request.media_title.as_deref(), Some("Sunset & sea"));
        assert_eq!(request.media_id, None);
    }

    #[test]
    fn override_wins_and_transient_thumbnails_are_dropped() {
        let selected = SelectedMedia {
            id: Some("m1".into()),
            src: "/media/m1/raw".into(),
            kind: MediaKind::Video,
            title: None,
            thumbnail: Some("blob:http://localhost/abc".into()),
        };
        let html = r#"hi<video src="/media/m1/raw" title="Node" controls></video>"#;
        let request = build_submission("u1", html, Some(&selected), Some(" Mine "), Some("c1"))
            .expect("request");
        assert_eq!(
            request,
            CreateContentRequest {
                user_id: "u1".into(),
                content: html.into(),
                media_id: Some("m1".into()),
                media_title: Some("Mine".into()),
                thumbnail: None,
                parent_id: Some("c1".into()),
            }
        );

        let persisted = SelectedMedia {
            thumbnail: Some("/media/m1/thumb".into()),
            ..selected
        };
        let request = build_submission("u1", html, Some(&persisted), Some("  "), None)
            .expect("request");
        assert_eq!(request.media_title.as_deref(), Some("Node"));
        assert_eq!(request.thumbnail.as_deref(), Some("/media/m1/thumb"));
    }

    #[test]
    fn prepare_applies_title_to_the_selected_node() {
        let now = Instant::now();
        let mut composer = Composer::new();
        composer.begin_upload();
        assert_eq!(composer.prepare("u1", now), Err(ComposeError::UploadInProgress));
        assert!(composer.attach_upload(&upload("m1", Some("data:image/png;base64,AAAA")), now));
        composer.set_title_override("Renamed");

        let request = composer.prepare("u1", now).expect("prepare").expect("request");
        assert_eq!(request.media_id.as_deref(), Some("m1"));
        assert_eq!(request.media_title.as_deref(), Some("Renamed"));
        assert!(request.content.contains(r#"title="Renamed""#));
        assert!(!request.content.contains("data:image"));
        assert_eq!(composer.prepare("u1", now), Err(ComposeError::AlreadySubmitting));
    }

    #[test]
    fn missing_media_node_skips_title_but_still_submits() {
        let now = Instant::now();
        let mut composer = Composer::new();
        composer.attach_upload(&upload("m1", None), now);
        composer.editor_mut().remove_media("/media/m1/raw", now);
        composer.editor_mut().push_text("just text", vec![Mark::Italic], now);
        composer.set_title_override("Lost");

        let request = composer.prepare("u1", now).expect("prepare").expect("request");
        assert_eq!(request.media_id.as_deref(), Some("m1"));
        assert!(!request.content.contains("title="));
        assert_eq!(request.media_title.as_deref(), Some("Lost"));
    }

    #[test]
    fn failed_submission_keeps_the_draft() {
        let now = Instant::now();
        let mut composer = Composer::new();
        composer.editor_mut().push_text("keep me", Vec::new(), now);
        composer.prepare("u1", now).expect("prepare").expect("request");
        composer.finish_err("request failed (500): internal server error");

        assert!(!composer.submitting);
        assert!(composer.error.is_some());
        assert!(composer.can_submit());
        assert!(composer.editor().get_serialized().contains("keep me"));

        composer.prepare("u1", now).expect("prepare").expect("request");
        composer.finish_ok(now);
        assert!(composer.editor().is_blank());
        assert_eq!(composer.error, None);
    }

    #[test]
    fn upload_without_url_is_not_inserted() {
        let now = Instant::now();
        let mut composer = Composer::new();
        composer.begin_upload();
        let mut broken = upload("m2", None);
        broken.url = String::new();
        assert!(!composer.attach_upload(&broken, now));
        assert!(!composer.is_uploading());
        assert_eq!(composer.selected_media(), None);
        assert!(composer.error.is_some());
        assert!(composer.editor().is_blank());
    }

    #[test]
    fn burst_of_edits_reaches_the_form_once() {
        let start = Instant::now();
        let mut composer = Composer::new();
        let mut last_edit = start;
        for step in 0..6u64 {
            last_edit = start + Duration::from_millis(step * 40);
            composer
                .editor_mut()
                .push_text(&format!("word{step} "), Vec::new(), last_edit);
            assert!(!composer.poll_editor(last_edit));
        }
        assert_eq!(composer.snapshot(), &DraftSnapshot::default());

        assert!(composer.poll_editor(last_edit + CHANGE_DEBOUNCE));
        assert_eq!(composer.snapshot().revision, 1);
        assert!(composer.snapshot().has_content);
        assert_eq!(composer.snapshot().html, composer.editor().get_serialized());
        assert!(composer.snapshot().html.contains("word5"));
        assert!(!composer.poll_editor(last_edit + CHANGE_DEBOUNCE * 4));

        composer.prepare("u1", last_edit).expect("prepare").expect("request");
        let cleared_at = last_edit + Duration::from_secs(1);
        composer.finish_ok(cleared_at);
        assert!(composer.poll_editor(cleared_at + CHANGE_DEBOUNCE));
        assert_eq!(
            composer.snapshot(),
            &DraftSnapshot {
                html: String::new(),
                has_content: false,
                revision: 2,
            }
        );
    }

    #[test]
    fn optimistic_items_are_confirmed_then_reconciled() {
        let mut feed = FeedState::default();
        feed.reconcile(vec![post("p0", "older")], 20);
        assert!(feed.exhausted);

        let request = build_submission("u1", "hello", None, None, None).expect("request");
        let local = feed.prepend_pending(request);
        let other = feed.prepend_pending(
            build_submission("u1", "second", None, None, None).expect("request"),
        );
        assert_eq!(feed.pending_count(), 2);
        assert!(feed.items()[0].is_pending());

        assert!(feed.confirm(&local, post("p1", "hello")));
        assert!(feed.reject(&other));
        assert!(!feed.reject(&other));
        assert_eq!(feed.pending_count(), 0);

        let mut fresh = post("p1", "hello");
        fresh.media_title = Some("Server title".into());
        feed.reconcile(vec![fresh, post("p0", "older")], 2);
        assert!(!feed.exhausted);
        let ids: Vec<_> = feed.posts().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p0"]);
        assert_eq!(feed.items()[0].media_title(), Some("Server title"));
    }

    #[test]
    fn reconcile_keeps_pending_in_front() {
        let mut feed = FeedState::default();
        let local = feed.prepend_pending(
            build_submission("u1", r#"<img src="/media/x/raw">"#, None, None, None)
                .expect("request"),
        );
        feed.reconcile(vec![post("p9", "from server")], 20);
        assert_eq!(feed.items().len(), 2);
        assert!(feed.items()[0].is_pending());
        assert_eq!(feed.items()[0].preview().descriptors().len(), 1);

        feed.append_page(vec![post("p9", "dup"), post("p8", "next")], 20);
        assert_eq!(feed.posted_count(), 2);
        assert!(feed.reject(&local));
    }
}
