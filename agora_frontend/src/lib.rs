pub mod api;
pub mod app;
pub mod composer;
pub mod editor;
pub mod models;
pub mod playback;

pub use api::ApiClient;
pub use app::{CommentsState, FeedSource, ForumClient, PendingComment};
pub use composer::{
    build_submission, ComposeError, Composer, DraftSnapshot, FeedItem, FeedState,
};
pub use editor::{Debouncer, RichEditor, CHANGE_DEBOUNCE};
pub use playback::{MediaElement, PlaybackCoordinator, PlaybackSession};
