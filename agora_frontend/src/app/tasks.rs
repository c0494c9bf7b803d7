use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;

use log::error;

use crate::api::ApiClient;
use crate::models::CreateContentRequest;

use super::messages::AppMessage;
use super::FeedSource;

// A failed send means the receiving view is gone; the result is dropped.

pub fn load_feed(
    client: ApiClient,
    tx: Sender<AppMessage>,
    source: FeedSource,
    user_id: String,
    limit: usize,
    offset: usize,
) {
    thread::spawn(move || {
        let result = match source {
            FeedSource::Recent => client.list_posts(limit, offset),
            FeedSource::Following => client.feed(&user_id, limit, offset),
        };
        if tx.send(AppMessage::FeedLoaded { offset, result }).is_err() {
            error!("failed to send FeedLoaded message");
        }
    });
}

pub fn upload_media(
    client: ApiClient,
    tx: Sender<AppMessage>,
    path: PathBuf,
    title: Option<String>,
    target: Option<String>,
) {
    thread::spawn(move || {
        let result = client.upload_media(&path, title.as_deref());
        if tx.send(AppMessage::MediaUploaded { target, result }).is_err() {
            error!("failed to send MediaUploaded message");
        }
    });
}

pub fn create_post(
    client: ApiClient,
    tx: Sender<AppMessage>,
    local_id: String,
    payload: CreateContentRequest,
) {
    thread::spawn(move || {
        let result = client.create_post(&payload);
        if tx.send(AppMessage::PostCreated { local_id, result }).is_err() {
            error!("failed to send PostCreated message");
        }
    });
}

pub fn create_comment(
    client: ApiClient,
    tx: Sender<AppMessage>,
    post_id: String,
    local_id: String,
    payload: CreateContentRequest,
) {
    thread::spawn(move || {
        let result = client.create_comment(&post_id, &payload);
        if tx
            .send(AppMessage::CommentCreated {
                post_id,
                local_id,
                result,
            })
            .is_err()
        {
            error!("failed to send CommentCreated message");
        }
    });
}

pub fn load_comments(client: ApiClient, tx: Sender<AppMessage>, post_id: String) {
    thread::spawn(move || {
        let result = client.comment_tree(&post_id);
        if tx
            .send(AppMessage::CommentsLoaded { post_id, result })
            .is_err()
        {
            error!("failed to send CommentsLoaded message");
        }
    });
}
