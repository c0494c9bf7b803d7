use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Playback kind of an embedded media node. The same vocabulary is used for
/// `MediaAsset.type` in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Pdf,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Pdf => "pdf",
            MediaKind::Document => "document",
        }
    }

    pub fn from_mime(mime: &str) -> Self {
        match mime {
            m if m.starts_with("image/") => MediaKind::Image,
            m if m.starts_with("video/") => MediaKind::Video,
            m if m.starts_with("audio/") => MediaKind::Audio,
            "application/pdf" => MediaKind::Pdf,
            _ => MediaKind::Document,
        }
    }

    /// Whether an element of this kind takes part in playback coordination.
    pub fn is_playable(&self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Audio)
    }

    pub(crate) fn tag(&self) -> &'static str {
        match self {
            MediaKind::Image => "img",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Pdf | MediaKind::Document => "embed",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            "pdf" => Ok(MediaKind::Pdf),
            "document" => Ok(MediaKind::Document),
            other => Err(format!("unknown media kind `{other}`")),
        }
    }
}

/// Inline formatting applied to a text span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mark", rename_all = "lowercase")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Link { href: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl TextSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn with_marks(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaNode {
    pub kind: MediaKind,
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl MediaNode {
    pub fn new(kind: MediaKind, src: impl Into<String>) -> Self {
        Self {
            kind,
            src: src.into(),
            title: None,
            thumbnail: None,
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// The node as the markup reader would hand it back: blank titles and
    /// thumbnails become `None`, and a node without a source is no node.
    pub fn normalized(mut self) -> Option<Self> {
        if self.src.trim().is_empty() {
            return None;
        }
        self.title = self.title.filter(|title| !title.trim().is_empty());
        self.thumbnail = self.thumbnail.filter(|thumb| !thumb.trim().is_empty());
        Some(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Text(TextSpan),
    LineBreak,
    Media(MediaNode),
}

/// A post or comment body: an ordered sequence of inline nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBody {
    pub nodes: Vec<Node>,
}

impl ContentBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a text span, merging it into the previous span when both carry
    /// the same marks so the sequence stays in normal form. Repeated marks
    /// collapse to their first occurrence.
    pub fn push_text(&mut self, mut span: TextSpan) {
        if span.text.is_empty() {
            return;
        }
        let mut seen: Vec<Mark> = Vec::with_capacity(span.marks.len());
        span.marks.retain(|mark| {
            if seen.contains(mark) {
                false
            } else {
                seen.push(mark.clone());
                true
            }
        });
        if let Some(Node::Text(last)) = self.nodes.last_mut() {
            if last.marks == span.marks {
                last.text.push_str(&span.text);
                return;
            }
        }
        self.nodes.push(Node::Text(span));
    }

    pub fn push_break(&mut self) {
        self.nodes.push(Node::LineBreak);
    }

    /// Appends the normalized node. Returns `false` when the node has no
    /// source and was left out.
    pub fn push_media(&mut self, node: MediaNode) -> bool {
        match node.normalized() {
            Some(node) => {
                self.nodes.push(Node::Media(node));
                true
            }
            None => false,
        }
    }

    pub fn media_nodes(&self) -> impl Iterator<Item = &MediaNode> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Media(media) => Some(media),
            _ => None,
        })
    }

    pub fn media_nodes_mut(&mut self) -> impl Iterator<Item = &mut MediaNode> {
        self.nodes.iter_mut().filter_map(|node| match node {
            Node::Media(media) => Some(media),
            _ => None,
        })
    }

    pub fn find_media(&self, src: &str) -> Option<&MediaNode> {
        self.media_nodes().find(|media| media.src == src)
    }

    pub fn find_media_mut(&mut self, src: &str) -> Option<&mut MediaNode> {
        self.media_nodes_mut().find(|media| media.src == src)
    }

    pub fn has_media(&self) -> bool {
        self.media_nodes().next().is_some()
    }

    /// Concatenated text content; line breaks become `\n`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(span) => out.push_str(&span.text),
                Node::LineBreak => out.push('\n'),
                Node::Media(_) => {}
            }
        }
        out
    }

    pub fn has_text(&self) -> bool {
        self.nodes.iter().any(|node| match node {
            Node::Text(span) => !span.text.trim().is_empty(),
            _ => false,
        })
    }

    /// Neither visible text nor media: nothing worth submitting.
    pub fn is_blank(&self) -> bool {
        !self.has_text() && !self.has_media()
    }
}
