//! Rich post/comment content shared by the Agora server and client: the
//! node tree, its HTML-flavoured serialization and the media-only preview.

pub mod error;
pub mod markup;
pub mod node;
pub mod preview;

pub use error::MarkupError;
pub use node::{ContentBody, Mark, MediaKind, MediaNode, Node, TextSpan};
pub use preview::{
    is_persisted_url, media_src_key, render_media_only, MediaDescriptor, MediaPreview,
    SelectedMedia,
};
