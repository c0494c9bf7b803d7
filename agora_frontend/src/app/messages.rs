use std::time::Instant;

use log::{error, info};

use crate::models::{CommentNode, CommentView, MediaUpload, PostView};

use super::ForumClient;

pub enum AppMessage {
    FeedLoaded {
        offset: usize,
        result: Result<Vec<PostView>, anyhow::Error>,
    },
    /// `target` names the post whose comment draft asked for the upload;
    /// `None` is the post draft.
    MediaUploaded {
        target: Option<String>,
        result: Result<MediaUpload, anyhow::Error>,
    },
    PostCreated {
        local_id: String,
        result: Result<PostView, anyhow::Error>,
    },
    CommentCreated {
        post_id: String,
        local_id: String,
        result: Result<CommentView, anyhow::Error>,
    },
    CommentsLoaded {
        post_id: String,
        result: Result<Vec<CommentNode>, anyhow::Error>,
    },
}

pub(super) fn process_messages(app: &mut ForumClient, now: Instant) -> usize {
    let mut handled = 0;
    while let Ok(message) = app.rx.try_recv() {
        handle_message(app, message, now);
        handled += 1;
    }
    handled
}

pub(super) fn handle_message(app: &mut ForumClient, message: AppMessage, now: Instant) {
    match message {
        AppMessage::FeedLoaded { offset, result } => {
            app.feed.loading = false;
            match result {
                Ok(posts) if offset == 0 => app.feed.reconcile(posts, app.page_limit),
                Ok(posts) => app.feed.append_page(posts, app.page_limit),
                Err(err) => app.feed.error = Some(err.to_string()),
            }
        }
        AppMessage::MediaUploaded { target, result } => {
            let composer = match target.as_deref() {
                Some(post_id) => match app.comments.get_mut(post_id) {
                    Some(state) => &mut state.composer,
                    None => {
                        info!("dropping upload for closed comment view {post_id}");
                        return;
                    }
                },
                None => &mut app.composer,
            };
            match result {
                Ok(upload) => {
                    if composer.attach_upload(&upload, now) {
                        info!("attached media {} ({})", upload.id, upload.kind.as_str());
                    }
                }
                Err(err) => composer.upload_failed(err.to_string()),
            }
        }
        AppMessage::PostCreated { local_id, result } => match result {
            Ok(post) => {
                app.composer.finish_ok(now);
                if !app.feed.confirm(&local_id, post) {
                    info!("post {local_id} confirmed after its placeholder was dropped");
                }
                app.refresh_feed();
            }
            Err(err) => {
                error!("failed to create post: {err}");
                app.feed.reject(&local_id);
                app.composer.finish_err(err.to_string());
            }
        },
        AppMessage::CommentCreated {
            post_id,
            local_id,
            result,
        } => {
            let Some(state) = app.comments.get_mut(&post_id) else {
                return;
            };
            state.remove_pending(&local_id);
            match result {
                Ok(comment) => {
                    info!("comment {} added to {}", comment.id, post_id);
                    state.insert_confirmed(comment);
                    state.composer.finish_ok(now);
                    state.composer.set_parent(None);
                    app.load_comments(&post_id);
                }
                Err(err) => {
                    error!("failed to create comment: {err}");
                    state.composer.finish_err(err.to_string());
                }
            }
        }
        AppMessage::CommentsLoaded { post_id, result } => {
            let Some(state) = app.comments.get_mut(&post_id) else {
                return;
            };
            state.loading = false;
            match result {
                Ok(tree) => {
                    state.tree = tree;
                    state.error = None;
                }
                Err(err) => state.error = Some(err.to_string()),
            }
        }
    }
}
