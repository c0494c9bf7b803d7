use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use reqwest::Url;
use serde::Serialize;

use crate::models::{
    CommentNode, CommentView, CreateContentRequest, CreateUserInput, ErrorBody, FollowSummary,
    LikeSummary, MediaUpload, PostView, UserView,
};

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
struct UserRef<'a> {
    user_id: &'a str,
}

#[derive(Serialize)]
struct FollowerRef<'a> {
    follower_id: &'a str,
}

#[derive(Serialize)]
struct TitleUpdate<'a> {
    title: Option<&'a str>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base = sanitize_base_url(base_url.into())?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> Result<()> {
        self.base_url = sanitize_base_url(base_url.into())?;
        Ok(())
    }

    pub fn create_user(&self, input: &CreateUserInput) -> Result<UserView> {
        let url = self.url("/users")?;
        let response = self.client.post(url).json(input).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn list_posts(&self, limit: usize, offset: usize) -> Result<Vec<PostView>> {
        let mut url = self.url("/posts")?;
        set_page(&mut url, limit, offset);
        let response = self.client.get(url).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn feed(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<PostView>> {
        let mut url = self.url(&format!("/feed/{user_id}"))?;
        set_page(&mut url, limit, offset);
        let response = self.client.get(url).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn get_post(&self, post_id: &str) -> Result<PostView> {
        let url = self.url(&format!("/posts/{post_id}"))?;
        let response = self.client.get(url).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn create_post(&self, request: &CreateContentRequest) -> Result<PostView> {
        let url = self.url("/posts")?;
        let response = self.client.post(url).json(request).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn create_comment(
        &self,
        post_id: &str,
        request: &CreateContentRequest,
    ) -> Result<CommentView> {
        let url = self.url(&format!("/posts/{post_id}/comments"))?;
        let response = self.client.post(url).json(request).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn list_comments(
        &self,
        post_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommentView>> {
        let mut url = self.url(&format!("/posts/{post_id}/comments"))?;
        set_page(&mut url, limit, offset);
        let response = self.client.get(url).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn comment_tree(&self, post_id: &str) -> Result<Vec<CommentNode>> {
        let url = self.url(&format!("/posts/{post_id}/comments/tree"))?;
        let response = self.client.get(url).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn upload_media(&self, path: &Path, title: Option<&str>) -> Result<MediaUpload> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        self.upload_media_bytes(file_name, data, title)
    }

    /// The server sniffs the media type, so no mime is declared here.
    pub fn upload_media_bytes(
        &self,
        file_name: String,
        data: Vec<u8>,
        title: Option<&str>,
    ) -> Result<MediaUpload> {
        let url = self.url("/media")?;
        let mut form = Form::new().part("file", Part::bytes(data).file_name(file_name));
        if let Some(title) = title.map(str::trim).filter(|title| !title.is_empty()) {
            form = form.text("title", title.to_string());
        }
        let response = self.client.post(url).multipart(form).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn update_media_title(&self, media_id: &str, title: Option<&str>) -> Result<MediaUpload> {
        let url = self.url(&format!("/media/{media_id}"))?;
        let response = self
            .client
            .patch(url)
            .json(&TitleUpdate { title })
            .send()?;
        Ok(ensure_success(response)?.json()?)
    }

    pub fn like_post(&self, post_id: &str, user_id: &str, liked: bool) -> Result<LikeSummary> {
        self.toggle_like(&format!("/posts/{post_id}/like"), user_id, liked)
    }

    pub fn like_comment(
        &self,
        comment_id: &str,
        user_id: &str,
        liked: bool,
    ) -> Result<LikeSummary> {
        self.toggle_like(&format!("/comments/{comment_id}/like"), user_id, liked)
    }

    pub fn follow(&self, follower_id: &str, followee_id: &str, follow: bool) -> Result<FollowSummary> {
        let url = self.url(&format!("/users/{followee_id}/follow"))?;
        let body = FollowerRef { follower_id };
        let request = if follow {
            self.client.post(url)
        } else {
            self.client.delete(url)
        };
        let response = request.json(&body).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    /// Absolute URL for a server-relative media `src`.
    pub fn media_url(&self, src: &str) -> String {
        if src.starts_with("http://") || src.starts_with("https://") {
            src.to_string()
        } else {
            format!("{}/{}", self.base_url, src.trim_start_matches('/'))
        }
    }

    fn toggle_like(&self, path: &str, user_id: &str, liked: bool) -> Result<LikeSummary> {
        let url = self.url(path)?;
        let request = if liked {
            self.client.post(url)
        } else {
            self.client.delete(url)
        };
        let response = request.json(&UserRef { user_id }).send()?;
        Ok(ensure_success(response)?.json()?)
    }

    fn url(&self, path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).context("invalid base URL")?;
        url.set_path(path.trim_start_matches('/'));
        Ok(url)
    }
}

fn set_page(url: &mut Url, limit: usize, offset: usize) {
    url.query_pairs_mut()
        .append_pair("limit", &limit.to_string())
        .append_pair("offset", &offset.to_string());
}

/// Surfaces the server's `{error}` message for non-2xx responses.
fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());
    Err(anyhow!("request failed ({status}): {message}"))
}

fn sanitize_base_url(mut base: String) -> Result<String> {
    if !base.starts_with("http://") && !base.starts_with("https://") {
        base = format!("http://{base}");
    }
    while base.ends_with('/') {
        base.pop();
    }
    let _ = Url::parse(&base).context("invalid base URL")?;
    Ok(base)
}
