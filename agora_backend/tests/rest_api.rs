use agora_backend::api;
use agora_backend::bootstrap;
use agora_backend::config::{AgoraConfig, AgoraPaths};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tokio::time::{sleep, Duration};

struct TestServer {
    _dir: TempDir,
    server: tokio::task::JoinHandle<()>,
    base_url: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempdir().expect("tempdir");
        let port = next_port();
        let config = AgoraConfig::new(port, AgoraPaths::from_base_dir(dir.path()).expect("paths"));
        let resources = bootstrap::initialize(&config).expect("bootstrap");
        let server = tokio::spawn(async move {
            let _ = api::serve_http(config, resources.database).await;
        });
        let base_url = format!("http://127.0.0.1:{port}");
        wait_for_health(&base_url).await;
        Self {
            _dir: dir,
            server,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("post response");
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get response");
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn create_user(&self, username: &str) -> String {
        let (status, body) = self
            .post_json("/users", json!({ "username": username }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().expect("user id").to_string()
    }

    async fn shutdown(self) {
        self.server.abort();
        let _ = self.server.await;
    }
}

fn next_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .unwrap()
        .port()
}

async fn wait_for_health(base_url: &str) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("server did not become healthy in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn upload_then_post_with_attached_media() {
    let server = TestServer::start().await;
    let alice = server.create_user("alice").await;

    let form = Form::new()
        .part(
            "file",
            Part::bytes(b"fake video bytes".to_vec())
                .file_name("clip.mp4")
                .mime_str("video/mp4")
                .expect("mime"),
        )
        .text("title", "Beach clip")
        .text("thumbnail", "blob:http://localhost/preview")
        .text("uploader_id", alice.clone());
    let resp = server
        .client
        .post(server.url("/media"))
        .multipart(form)
        .send()
        .await
        .expect("upload response");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let media: Value = resp.json().await.expect("media json");
    let media_id = media["id"].as_str().expect("media id").to_string();
    let media_url = media["url"].as_str().expect("media url").to_string();
    assert_eq!(media["type"], "video");
    assert_eq!(media["title"], "Beach clip");
    assert!(media.get("thumbnail").is_none());

    let raw = server
        .client
        .get(server.url(&media_url))
        .send()
        .await
        .expect("raw response");
    assert_eq!(raw.status(), StatusCode::OK);
    assert_eq!(
        raw.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("video/mp4")
    );
    assert_eq!(raw.bytes().await.expect("raw bytes").as_ref(), b"fake video bytes");

    let content = format!(
        "<p>day at the <strong>beach</strong></p><video src=\"{media_url}\" title=\"Waves\" controls></video>"
    );
    let (status, post) = server
        .post_json(
            "/posts",
            json!({ "user_id": alice, "content": content, "media_id": media_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{post}");
    assert_eq!(post["media_type"], "video");
    assert_eq!(post["media_title"], "Waves");
    assert_eq!(post["attached_media_ids"], json!([media_id]));
    assert_eq!(post["media_preview"][0]["kind"], "video");
    assert_eq!(post["excerpt"], "day at the beach");

    let (status, listed) = server.get_json("/posts?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["id"], post["id"]);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_requests_carry_error_bodies() {
    let server = TestServer::start().await;
    let alice = server.create_user("alice").await;

    let (status, body) = server
        .post_json("/posts", json!({ "user_id": alice, "content": "  <p> </p>" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let (status, body) = server
        .post_json("/posts", json!({ "user_id": "ghost", "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());

    let (status, _) = server
        .post_json("/users", json!({ "username": "ALICE" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = server.get_json("/media/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());

    let resp = server
        .client
        .post(server.url("/posts"))
        .header("content-type", "application/json")
        .body(r#"{"user_id":"#)
        .send()
        .await
        .expect("post response");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("json error body");
    assert!(body["error"].as_str().is_some());

    let (status, body) = server
        .post_json("/posts", json!({ "content": "no author" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().is_some());

    let (status, body) = server.get_json("/posts?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let (status, body) = server.get_json("/no/such/route").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn comments_likes_follows_and_feed() {
    let server = TestServer::start().await;
    let alice = server.create_user("alice").await;
    let bob = server.create_user("bob").await;

    let (_, post) = server
        .post_json("/posts", json!({ "user_id": bob, "content": "hello from bob" }))
        .await;
    let post_id = post["id"].as_str().expect("post id").to_string();

    let (status, root) = server
        .post_json(
            &format!("/posts/{post_id}/comments"),
            json!({ "user_id": alice, "content": "hi bob" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{root}");
    let (status, reply) = server
        .post_json(
            &format!("/posts/{post_id}/comments"),
            json!({ "user_id": bob, "content": "hi alice", "parent_id": root["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{reply}");

    let (_, tree) = server
        .get_json(&format!("/posts/{post_id}/comments/tree"))
        .await;
    assert_eq!(tree.as_array().map(Vec::len), Some(1));
    assert_eq!(tree[0]["replies"][0]["id"], reply["id"]);

    for _ in 0..2 {
        let (status, like) = server
            .post_json(&format!("/posts/{post_id}/like"), json!({ "user_id": alice }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(like["like_count"], 1);
    }

    let (status, _) = server
        .post_json(&format!("/users/{alice}/follow"), json!({ "follower_id": alice }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .post_json(&format!("/users/{bob}/follow"), json!({ "follower_id": alice }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, feed) = server.get_json(&format!("/feed/{alice}")).await;
    assert_eq!(feed.as_array().map(Vec::len), Some(1));
    assert_eq!(feed[0]["id"], post["id"]);
    assert_eq!(feed[0]["like_count"], 1);
    assert_eq!(feed[0]["comment_count"], 2);

    let resp = server
        .client
        .delete(server.url(&format!("/posts/{post_id}")))
        .send()
        .await
        .expect("delete response");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let (status, _) = server
        .get_json(&format!("/posts/{post_id}/comments"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server.shutdown().await;
}
