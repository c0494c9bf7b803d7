//! In-memory rich content editor.
//!
//! The document is a [`ContentBody`]; the serialized markup only exists at
//! the boundaries (`get_serialized` / `set_content`). Every mutation takes
//! the caller's clock and schedules a trailing-edge change notification
//! through [`Debouncer`].

use std::time::{Duration, Instant};

use agora_content::{
    markup, media_src_key, ContentBody, Mark, MarkupError, MediaNode, Node, SelectedMedia,
    TextSpan,
};

pub const CHANGE_DEBOUNCE: Duration = Duration::from_millis(300);

/// Single-slot trailing-edge debouncer. Each `push` replaces the pending
/// value and resets the deadline; `poll` yields the value once the window
/// has passed without another push.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.window));
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left until the pending value fires, if any.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, deadline)| deadline.saturating_duration_since(now))
    }

    /// Drops the pending value without emitting it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[derive(Debug)]
pub struct RichEditor {
    body: ContentBody,
    changes: Debouncer<String>,
}

impl Default for RichEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl RichEditor {
    pub fn new() -> Self {
        Self {
            body: ContentBody::new(),
            changes: Debouncer::new(CHANGE_DEBOUNCE),
        }
    }

    pub fn body(&self) -> &ContentBody {
        &self.body
    }

    pub fn is_blank(&self) -> bool {
        self.body.is_blank()
    }

    pub fn get_serialized(&self) -> String {
        markup::serialize(&self.body)
    }

    /// Replaces the document. On a parse error the current document is
    /// left untouched.
    pub fn set_content(&mut self, serialized: &str, now: Instant) -> Result<(), MarkupError> {
        let body = markup::parse(serialized)?;
        self.body = body;
        self.touch(now);
        Ok(())
    }

    pub fn push_text(&mut self, text: &str, marks: Vec<Mark>, now: Instant) {
        self.body.push_text(TextSpan::with_marks(text, marks));
        self.touch(now);
    }

    pub fn push_break(&mut self, now: Instant) {
        self.body.push_break();
        self.touch(now);
    }

    /// Inserts a fully built node in one step. A node without a source is
    /// refused and `false` returned; blank titles and thumbnails are dropped
    /// so the document matches what its markup reads back as.
    pub fn insert_media(&mut self, node: MediaNode, now: Instant) -> bool {
        if !self.body.push_media(node) {
            return false;
        }
        self.touch(now);
        true
    }

    /// Swaps the node embedding `src` for `node`. Returns `false` when no
    /// such node exists or `node` has no source.
    pub fn replace_media(&mut self, src: &str, node: MediaNode, now: Instant) -> bool {
        let Some(node) = node.normalized() else {
            return false;
        };
        let Some(slot) = self.find_media_slot(src) else {
            return false;
        };
        *slot = node;
        self.touch(now);
        true
    }

    /// Sets the title of the node embedding `selected`. Returns `false`
    /// without touching the document when no such node exists.
    pub fn set_media_title(&mut self, selected: &SelectedMedia, title: &str, now: Instant) -> bool {
        let title = title.trim();
        let Some(node) = self.find_media_slot(&selected.src) else {
            return false;
        };
        node.title = if title.is_empty() {
            None
        } else {
            Some(title.to_string())
        };
        self.touch(now);
        true
    }

    pub fn remove_media(&mut self, src: &str, now: Instant) -> bool {
        let key = media_src_key(src).to_string();
        let before = self.body.nodes.len();
        self.body.nodes.retain(|node| match node {
            Node::Media(media) => media_src_key(&media.src) != key,
            _ => true,
        });
        let removed = self.body.nodes.len() != before;
        if removed {
            self.touch(now);
        }
        removed
    }

    pub fn clear(&mut self, now: Instant) {
        self.body = ContentBody::new();
        self.touch(now);
    }

    /// Latest serialized document once the debounce window has elapsed.
    pub fn poll_change(&mut self, now: Instant) -> Option<String> {
        self.changes.poll(now)
    }

    pub fn change_pending(&self) -> bool {
        self.changes.is_pending()
    }

    fn touch(&mut self, now: Instant) {
        let serialized = self.get_serialized();
        self.changes.push(serialized, now);
    }

    fn find_media_slot(&mut self, src: &str) -> Option<&mut MediaNode> {
        let key = media_src_key(src).to_string();
        self.body
            .media_nodes_mut()
            .find(|media| media_src_key(&media.src) == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_content::MediaKind;
    use pretty_assertions::assert_eq;

    fn selected(src: &str) -> SelectedMedia {
        SelectedMedia {
            id: Some("m1".into()),
            src: src.into(),
            kind: MediaKind::Video,
            title: None,
            thumbnail: None,
        }
    }

    #[test]
    fn debouncer_emits_latest_value_once_after_quiet_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(CHANGE_DEBOUNCE);
        for step in 0..5u64 {
            debouncer.push(step, start + Duration::from_millis(step * 50));
        }
        let last_push = start + Duration::from_millis(200);

        assert_eq!(debouncer.poll(last_push + Duration::from_millis(299)), None);
        assert_eq!(debouncer.poll(last_push + CHANGE_DEBOUNCE), Some(4));
        assert_eq!(debouncer.poll(last_push + Duration::from_secs(5)), None);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn debouncer_push_resets_deadline() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(CHANGE_DEBOUNCE);
        debouncer.push("a", start);
        debouncer.push("b", start + Duration::from_millis(250));
        assert_eq!(debouncer.poll(start + Duration::from_millis(300)), None);
        assert_eq!(
            debouncer.remaining(start + Duration::from_millis(300)),
            Some(Duration::from_millis(250))
        );
        assert_eq!(debouncer.poll(start + Duration::from_millis(550)), Some("b"));
    }

    #[test]
    fn burst_of_edits_yields_one_notification_with_final_state() {
        let start = Instant::now();
        let mut editor = RichEditor::new();
        editor.push_text("hello", Vec::new(), start);
        editor.push_text(" world", vec![Mark::Bold], start + Duration::from_millis(100));
        editor.push_break(start + Duration::from_millis(200));
        assert!(editor.change_pending());

        let last_edit = start + Duration::from_millis(200);
        assert_eq!(editor.poll_change(start + CHANGE_DEBOUNCE), None);
        let emitted = editor
            .poll_change(last_edit + CHANGE_DEBOUNCE)
            .expect("one notification");
        assert_eq!(emitted, editor.get_serialized());
        assert_eq!(editor.poll_change(last_edit + Duration::from_secs(1)), None);
    }

    #[test]
    fn set_content_round_trips_and_rejects_broken_markup() {
        let now = Instant::now();
        let mut editor = RichEditor::new();
        editor.push_text("intro ", Vec::new(), now);
        assert!(editor.insert_media(
            MediaNode::new(MediaKind::Image, "/media/1/raw").titled("Pic"),
            now
        ));
        let serialized = editor.get_serialized();

        let mut other = RichEditor::new();
        other.set_content(&serialized, now).expect("parse");
        assert_eq!(other.body(), editor.body());

        assert!(other.set_content("<p>broken <img src=\"/x\"", now).is_err());
        assert_eq!(other.body(), editor.body());
    }

    #[test]
    fn inserted_media_matches_its_markup() {
        let now = Instant::now();
        let mut editor = RichEditor::new();
        editor.push_text("x", Vec::new(), now);
        assert!(!editor.insert_media(MediaNode::new(MediaKind::Video, ""), now));
        assert!(editor.insert_media(
            MediaNode::new(MediaKind::Image, "/media/a/raw")
                .titled(" ")
                .with_thumbnail(" "),
            now
        ));
        assert!(!editor.replace_media("/media/a/raw", MediaNode::new(MediaKind::Image, " "), now));

        let mut reread = RichEditor::new();
        reread.set_content(&editor.get_serialized(), now).expect("parse");
        assert_eq!(reread.body(), editor.body());
        assert_eq!(editor.body().media_nodes().count(), 1);
    }

    #[test]
    fn media_title_update_is_skipped_when_node_is_gone() {
        let now = Instant::now();
        let mut editor = RichEditor::new();
        editor.insert_media(MediaNode::new(MediaKind::Video, "/media/m1/raw"), now);

        assert!(editor.set_media_title(&selected("http://host/media/m1/raw"), "Clip", now));
        assert_eq!(
            editor.body().find_media("/media/m1/raw").and_then(|m| m.title.clone()),
            Some("Clip".to_string())
        );

        assert!(editor.remove_media("/media/m1/raw", now));
        assert!(!editor.set_media_title(&selected("/media/m1/raw"), "Clip", now));
        assert!(editor.is_blank());
    }

    #[test]
    fn replace_and_clear() {
        let now = Instant::now();
        let mut editor = RichEditor::new();
        editor.insert_media(MediaNode::new(MediaKind::Image, "blob:local/1"), now);
        let replaced = editor.replace_media(
            "blob:local/1",
            MediaNode::new(MediaKind::Image, "/media/9/raw").with_thumbnail("/media/9/thumb"),
            now,
        );
        assert!(replaced);
        assert!(editor.body().find_media("/media/9/raw").is_some());
        assert!(!editor.replace_media("blob:local/1", MediaNode::new(MediaKind::Image, "x"), now));

        editor.clear(now);
        assert!(editor.body().is_empty());
    }
}
