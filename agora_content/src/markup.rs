//! HTML-flavoured serialization of [`ContentBody`].
//!
//! The writer emits a small, regular subset: formatting tags around text,
//! `<br>` for line breaks and one element per media node. The reader accepts
//! that subset plus the usual editor wrappers (`<p>`, `<div>`, headings,
//! lists), which it flattens into line breaks. Anything structurally broken
//! is reported as a [`MarkupError`] instead of being guessed at.

use crate::error::MarkupError;
use crate::node::{ContentBody, Mark, MediaKind, MediaNode, Node, TextSpan};
use lazy_static::lazy_static;
use regex::Regex;

pub const PDF_MIME: &str = "application/pdf";

lazy_static! {
    static ref ATTRIBUTE: Regex =
        Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .expect("attribute pattern compiles");
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "li", "ul", "ol", "pre",
    "figure", "section", "article",
];

/// Parses serialized content into a node tree.
pub fn parse(input: &str) -> Result<ContentBody, MarkupError> {
    let tokens = tokenize(input)?;
    let mut builder = TreeBuilder::default();
    for token in tokens {
        builder.feed(token)?;
    }
    builder.finish()
}

/// Serializes a node tree. `parse(&serialize(body))` yields `body` again for
/// any tree in normal form (adjacent spans with equal marks merged).
pub fn serialize(body: &ContentBody) -> String {
    let mut out = String::new();
    for node in &body.nodes {
        match node {
            Node::Text(span) => write_span(&mut out, span),
            Node::LineBreak => out.push_str("<br>"),
            Node::Media(media) => write_media(&mut out, media),
        }
    }
    out
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
        offset: usize,
    },
    Close {
        name: String,
        offset: usize,
    },
}

fn tokenize(input: &str) -> Result<Vec<Token<'_>>, MarkupError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }
        let starts_markup = matches!(
            bytes.get(pos + 1),
            Some(b) if b.is_ascii_alphabetic() || *b == b'/' || *b == b'!'
        );
        if !starts_markup {
            // A bare `<` (as in "a < b") is text.
            pos += 1;
            continue;
        }
        if text_start < pos {
            tokens.push(Token::Text(&input[text_start..pos]));
        }

        if input[pos..].starts_with("<!--") {
            let end = input[pos + 4..]
                .find("-->")
                .ok_or(MarkupError::UnterminatedComment { offset: pos })?;
            pos += 4 + end + 3;
        } else if bytes[pos + 1] == b'!' {
            let end = input[pos..]
                .find('>')
                .ok_or(MarkupError::UnterminatedTag { offset: pos })?;
            pos += end + 1;
        } else {
            let end = find_tag_end(bytes, pos).ok_or(MarkupError::UnterminatedTag { offset: pos })?;
            tokens.push(parse_tag(&input[pos + 1..end], pos)?);
            pos = end + 1;
        }
        text_start = pos;
    }

    if text_start < bytes.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    Ok(tokens)
}

fn find_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (idx, &byte) in bytes.iter().enumerate().skip(start + 1) {
        match quote {
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None if byte == b'"' || byte == b'\'' => quote = Some(byte),
            None if byte == b'<' => return None,
            None if byte == b'>' => return Some(idx),
            None => {}
        }
    }
    None
}

fn parse_tag(inner: &str, offset: usize) -> Result<Token<'static>, MarkupError> {
    let (closing, body) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(body.len());
    if name_len == 0 {
        return Err(MarkupError::MalformedTag { offset });
    }
    let name = body[..name_len].to_ascii_lowercase();
    let rest = &body[name_len..];

    if closing {
        if !rest.trim().is_empty() {
            return Err(MarkupError::MalformedTag { offset });
        }
        return Ok(Token::Close { name, offset });
    }

    let trimmed = rest.trim_end();
    let (attr_src, self_closing) = match trimmed.strip_suffix('/') {
        Some(attrs) => (attrs, true),
        None => (trimmed, false),
    };
    if !attr_src.is_empty() && !attr_src.starts_with(char::is_whitespace) {
        return Err(MarkupError::MalformedTag { offset });
    }

    let attrs = ATTRIBUTE
        .captures_iter(attr_src)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            Some((key, value))
        })
        .collect();

    Ok(Token::Open {
        name,
        attrs,
        self_closing,
        offset,
    })
}

#[derive(Debug)]
enum FrameKind {
    Mark(Mark),
    Block,
    Transparent,
    Media(MediaNode),
}

#[derive(Debug)]
struct Frame {
    name: String,
    offset: usize,
    kind: FrameKind,
}

#[derive(Default)]
struct TreeBuilder {
    body: ContentBody,
    stack: Vec<Frame>,
    pending_break: bool,
}

impl TreeBuilder {
    fn feed(&mut self, token: Token<'_>) -> Result<(), MarkupError> {
        match token {
            Token::Text(raw) => {
                if self.inside_media() {
                    return Ok(());
                }
                let text = decode_entities(raw);
                // Indentation between block wrappers is not content.
                if text.is_empty() || (self.pending_break && text.trim().is_empty()) {
                    return Ok(());
                }
                self.flush_break();
                let marks = self.current_marks();
                self.body.push_text(TextSpan::with_marks(text, marks));
            }
            Token::Open {
                name,
                attrs,
                self_closing,
                offset,
            } => self.open(name, attrs, self_closing, offset),
            Token::Close { name, offset } => self.close(name, offset)?,
        }
        Ok(())
    }

    fn open(&mut self, name: String, attrs: Vec<(String, String)>, self_closing: bool, offset: usize) {
        if self.inside_media() {
            // Only <source> matters inside <video>/<audio>; fallback markup is ignored.
            if name == "source" {
                if let Some(Frame {
                    kind: FrameKind::Media(node),
                    ..
                }) = self.stack.last_mut()
                {
                    if node.src.is_empty() {
                        node.src = attr(&attrs, "src").unwrap_or_default();
                    }
                }
            }
            if !self_closing && !VOID_ELEMENTS.contains(&name.as_str()) {
                self.stack.push(Frame {
                    name,
                    offset,
                    kind: FrameKind::Transparent,
                });
            }
            return;
        }

        match name.as_str() {
            "br" => {
                self.flush_break();
                self.body.push_break();
            }
            "img" => self.emit_media(media_from_attrs(MediaKind::Image, &attrs)),
            "embed" => {
                let kind = match attr(&attrs, "type") {
                    Some(mime) if mime.eq_ignore_ascii_case(PDF_MIME) => MediaKind::Pdf,
                    _ => MediaKind::Document,
                };
                self.emit_media(media_from_attrs(kind, &attrs));
            }
            "video" | "audio" => {
                let kind = if name == "video" {
                    MediaKind::Video
                } else {
                    MediaKind::Audio
                };
                let node = media_from_attrs(kind, &attrs);
                if self_closing {
                    self.emit_media(node);
                } else {
                    self.stack.push(Frame {
                        name,
                        offset,
                        kind: FrameKind::Media(node),
                    });
                }
            }
            _ if VOID_ELEMENTS.contains(&name.as_str()) => {}
            _ => {
                let kind = match mark_for(&name, &attrs) {
                    Some(mark) => FrameKind::Mark(mark),
                    None if BLOCK_ELEMENTS.contains(&name.as_str()) => {
                        self.request_break();
                        FrameKind::Block
                    }
                    None => FrameKind::Transparent,
                };
                if self_closing {
                    return;
                }
                self.stack.push(Frame { name, offset, kind });
            }
        }
    }

    fn close(&mut self, name: String, offset: usize) -> Result<(), MarkupError> {
        if VOID_ELEMENTS.contains(&name.as_str()) {
            return Ok(());
        }
        let Some(top) = self.stack.last() else {
            return Err(MarkupError::UnexpectedClosingTag { name, offset });
        };
        if top.name != name {
            return Err(MarkupError::MismatchedTag {
                expected: top.name.clone(),
                found: name,
                offset,
            });
        }
        let frame = self
            .stack
            .pop()
            .ok_or(MarkupError::UnexpectedClosingTag { name, offset })?;
        match frame.kind {
            FrameKind::Media(node) => self.emit_media(node),
            FrameKind::Block => self.request_break(),
            FrameKind::Mark(_) | FrameKind::Transparent => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<ContentBody, MarkupError> {
        if let Some(frame) = self.stack.into_iter().next_back() {
            return Err(MarkupError::UnclosedTag {
                name: frame.name,
                offset: frame.offset,
            });
        }
        Ok(self.body)
    }

    fn emit_media(&mut self, node: MediaNode) {
        if node.src.trim().is_empty() {
            tracing::debug!(kind = %node.kind, "dropping media element without src");
            return;
        }
        self.flush_break();
        self.body.push_media(node);
    }

    fn inside_media(&self) -> bool {
        self.stack
            .iter()
            .any(|frame| matches!(frame.kind, FrameKind::Media(_)))
    }

    fn current_marks(&self) -> Vec<Mark> {
        let mut marks: Vec<Mark> = Vec::new();
        for frame in &self.stack {
            if let FrameKind::Mark(mark) = &frame.kind {
                if !marks.contains(mark) {
                    marks.push(mark.clone());
                }
            }
        }
        marks
    }

    /// Block boundaries only turn into a break once more content follows,
    /// so wrappers never leave leading or trailing breaks behind.
    fn request_break(&mut self) {
        if !matches!(self.body.nodes.last(), None | Some(Node::LineBreak)) {
            self.pending_break = true;
        }
    }

    fn flush_break(&mut self) {
        if std::mem::take(&mut self.pending_break) {
            self.body.push_break();
        }
    }
}

fn attr(attrs: &[(String, String)], key: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
}

fn non_empty_attr(attrs: &[(String, String)], key: &str) -> Option<String> {
    attr(attrs, key).filter(|value| !value.trim().is_empty())
}

fn media_from_attrs(kind: MediaKind, attrs: &[(String, String)]) -> MediaNode {
    MediaNode {
        kind,
        src: attr(attrs, "src").unwrap_or_default(),
        title: non_empty_attr(attrs, "title"),
        thumbnail: non_empty_attr(attrs, "data-thumbnail")
            .or_else(|| non_empty_attr(attrs, "thumbnail"))
            .or_else(|| non_empty_attr(attrs, "poster")),
    }
}

fn mark_for(name: &str, attrs: &[(String, String)]) -> Option<Mark> {
    match name {
        "strong" | "b" => Some(Mark::Bold),
        "em" | "i" => Some(Mark::Italic),
        "u" => Some(Mark::Underline),
        "s" | "del" | "strike" => Some(Mark::Strike),
        "code" => Some(Mark::Code),
        "a" => attr(attrs, "href").map(|href| Mark::Link { href }),
        _ => None,
    }
}

fn mark_tags(mark: &Mark) -> (String, &'static str) {
    match mark {
        Mark::Bold => ("<strong>".into(), "</strong>"),
        Mark::Italic => ("<em>".into(), "</em>"),
        Mark::Underline => ("<u>".into(), "</u>"),
        Mark::Strike => ("<s>".into(), "</s>"),
        Mark::Code => ("<code>".into(), "</code>"),
        Mark::Link { href } => (format!("<a href=\"{}\">", escape_attr(href)), "</a>"),
    }
}

fn write_span(out: &mut String, span: &TextSpan) {
    let tags: Vec<_> = span.marks.iter().map(mark_tags).collect();
    for (open, _) in &tags {
        out.push_str(open);
    }
    out.push_str(&escape_text(&span.text));
    for (_, close) in tags.iter().rev() {
        out.push_str(close);
    }
}

fn write_media(out: &mut String, media: &MediaNode) {
    out.push('<');
    out.push_str(media.kind.tag());
    if media.kind == MediaKind::Pdf {
        out.push_str(&format!(" type=\"{PDF_MIME}\""));
    }
    out.push_str(&format!(" src=\"{}\"", escape_attr(&media.src)));
    if let Some(title) = &media.title {
        out.push_str(&format!(" title=\"{}\"", escape_attr(title)));
    }
    if let Some(thumbnail) = &media.thumbnail {
        out.push_str(&format!(" data-thumbnail=\"{}\"", escape_attr(thumbnail)));
    }
    match media.kind {
        MediaKind::Video | MediaKind::Audio => {
            out.push_str(" controls></");
            out.push_str(media.kind.tag());
            out.push('>');
        }
        _ => out.push('>'),
    }
}

pub fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(raw: &str) -> String {
    escape_text(raw).replace('"', "&quot;")
}

pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&candidate[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00a0}'),
        _ => {
            let numeric = name.strip_prefix('#')?;
            let code = match numeric.strip_prefix(|c| c == 'x' || c == 'X') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
