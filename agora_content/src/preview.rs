use crate::markup;
use crate::node::{ContentBody, MediaKind};
use serde::{Deserialize, Serialize};

/// Media the author picked in the composer (usually a freshly uploaded
/// asset). The preview uses it only to fill in a missing thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedMedia {
    #[serde(default)]
    pub id: Option<String>,
    pub src: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// One renderable media item for the list/preview widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    pub src: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPreview {
    /// Media digest of a readable body, in document order.
    Media(Vec<MediaDescriptor>),
    /// The body could not be read; show it verbatim.
    Raw(String),
}

impl MediaPreview {
    pub fn descriptors(&self) -> &[MediaDescriptor] {
        match self {
            MediaPreview::Media(items) => items,
            MediaPreview::Raw(_) => &[],
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, MediaPreview::Raw(_))
    }
}

/// Extracts only the media of a serialized body. Never fails: unreadable
/// markup comes back as [`MediaPreview::Raw`].
pub fn render_media_only(
    serialized: &str,
    title_override: Option<&str>,
    fallback: Option<&SelectedMedia>,
) -> MediaPreview {
    match markup::parse(serialized) {
        Ok(body) => MediaPreview::Media(body.media_digest(title_override, fallback)),
        Err(err) => {
            tracing::debug!(error = %err, "media preview falling back to raw content");
            MediaPreview::Raw(serialized.to_string())
        }
    }
}

impl ContentBody {
    /// Walks the tree and maps every media node to a descriptor. Title
    /// precedence: non-blank override, then the node's title, then "".
    /// Thumbnail precedence: the node's, then the fallback's.
    pub fn media_digest(
        &self,
        title_override: Option<&str>,
        fallback: Option<&SelectedMedia>,
    ) -> Vec<MediaDescriptor> {
        let title_override = title_override.filter(|title| !title.trim().is_empty());
        self.media_nodes()
            .map(|node| MediaDescriptor {
                kind: node.kind,
                src: node.src.clone(),
                title: title_override
                    .map(str::to_string)
                    .or_else(|| node.title.clone())
                    .unwrap_or_default(),
                thumbnail: node
                    .thumbnail
                    .clone()
                    .or_else(|| fallback.and_then(|selected| selected.thumbnail.clone())),
            })
            .collect()
    }
}

/// Whether `url` points at stored media rather than a client-local preview
/// (`blob:` object URLs, inline `data:` payloads).
pub fn is_persisted_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && !url.starts_with("blob:") && !url.starts_with("data:")
}

/// Registry lookup key for a node `src`: absolute URLs pointing at this
/// server are reduced to their `/media/...` path.
pub fn media_src_key(src: &str) -> &str {
    let src = src.trim();
    match src.find("/media/") {
        Some(start) => &src[start..],
        None => src,
    }
}

/// Plain-text excerpt of a serialized body for list views. Falls back to
/// an HTML-to-text rendering when the body is not readable content.
pub fn excerpt(serialized: &str, max_chars: usize) -> String {
    let text = match markup::parse(serialized) {
        Ok(body) => body.plain_text(),
        Err(_) => html2text::from_read(serialized.as_bytes(), 120),
    };
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_KINDS: &str = concat!(
        "<p>intro <strong>text</strong></p>",
        "<img src=\"/media/1/raw\" title=\"pic\">",
        "<video src=\"/media/2/raw\" controls></video>",
        "<audio src=\"/media/3/raw\" title=\"song\" data-thumbnail=\"/media/3/cover\"></audio>",
        "<embed type=\"application/pdf\" src=\"/media/4/raw\">",
    );

    #[test]
    fn one_descriptor_per_media_node_with_kind_mapping() {
        let preview = render_media_only(ALL_KINDS, None, None);
        let kinds: Vec<_> = preview.descriptors().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![MediaKind::Image, MediaKind::Video, MediaKind::Audio, MediaKind::Pdf]
        );
    }

    #[test]
    fn body_without_media_yields_nothing() {
        let preview = render_media_only("<p>just <em>words</em></p>", None, None);
        assert_eq!(preview, MediaPreview::Media(Vec::new()));
    }

    #[test]
    fn title_precedence() {
        let html = "<img src=\"/a\" title=\"own\">";
        let with_override = render_media_only(html, Some("override"), None);
        assert_eq!(with_override.descriptors()[0].title, "override");

        let own = render_media_only(html, None, None);
        assert_eq!(own.descriptors()[0].title, "own");

        let blank_override = render_media_only(html, Some("  "), None);
        assert_eq!(blank_override.descriptors()[0].title, "own");

        let none = render_media_only("<img src=\"/a\">", None, None);
        assert_eq!(none.descriptors()[0].title, "");
    }

    #[test]
    fn thumbnail_falls_back_to_selected_media() {
        let selected = SelectedMedia {
            id: Some("m1".into()),
            src: "/media/2/raw".into(),
            kind: MediaKind::Video,
            title: None,
            thumbnail: Some("/media/2/thumb".into()),
        };
        let preview = render_media_only(ALL_KINDS, None, Some(&selected));
        let thumbs: Vec<_> = preview
            .descriptors()
            .iter()
            .map(|d| d.thumbnail.as_deref())
            .collect();
        assert_eq!(
            thumbs,
            vec![
                Some("/media/2/thumb"),
                Some("/media/2/thumb"),
                Some("/media/3/cover"),
                Some("/media/2/thumb"),
            ]
        );
    }

    #[test]
    fn malformed_markup_renders_raw() {
        let broken = "<p>unfinished <img src=\"/a\"";
        let preview = render_media_only(broken, Some("x"), None);
        assert_eq!(preview, MediaPreview::Raw(broken.to_string()));
        assert!(preview.descriptors().is_empty());
    }

    #[test]
    fn excerpt_collapses_and_truncates() {
        assert_eq!(excerpt("<p>hello</p><p>  world </p>", 80), "hello world");
        assert_eq!(excerpt("abcdefghij", 4), "abcd…");
    }

    #[test]
    fn local_previews_are_not_persisted() {
        assert!(is_persisted_url("/media/1/raw"));
        assert!(is_persisted_url("https://cdn.example/thumb.png"));
        assert!(!is_persisted_url("blob:http://localhost/123"));
        assert!(!is_persisted_url("data:image/png;base64,AAAA"));
        assert!(!is_persisted_url("   "));
    }

    #[test]
    fn src_key_strips_origin() {
        assert_eq!(media_src_key("http://localhost:8080/media/9/raw"), "/media/9/raw");
        assert_eq!(media_src_key("/media/9/raw"), "/media/9/raw");
        assert_eq!(media_src_key("https://elsewhere/x.png"), "https://elsewhere/x.png");
    }
}
