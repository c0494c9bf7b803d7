use std::path::PathBuf;
use std::time::Instant;

use agora_content::{render_media_only, MediaPreview};
use agora_frontend::api::ApiClient;
use agora_frontend::composer::Composer;
use agora_frontend::models::{CommentNode, CreateUserInput, PostView};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Command-line client for an Agora server")]
struct Args {
    /// Server address, e.g. http://127.0.0.1:8080
    #[arg(long, env = "AGORA_BASE_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a user account
    Register {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// List recent posts, or the followed-authors feed with --user
    Feed {
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Publish a post, optionally uploading one media file first
    Post {
        #[arg(long)]
        user: String,
        #[arg(default_value = "")]
        body: String,
        /// Treat BODY as serialized markup instead of plain text
        #[arg(long)]
        markup: bool,
        #[arg(long)]
        media: Option<PathBuf>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Comment on a post
    Comment {
        #[arg(long)]
        user: String,
        post_id: String,
        body: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        markup: bool,
    },
    /// Print the threaded comments of a post
    Tree { post_id: String },
    /// Like a post, or remove the like with --undo
    Like {
        #[arg(long)]
        user: String,
        post_id: String,
        #[arg(long)]
        undo: bool,
    },
    /// Follow a user, or stop following with --undo
    Follow {
        #[arg(long)]
        user: String,
        followee_id: String,
        #[arg(long)]
        undo: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let client = ApiClient::new(args.base_url)?;

    match args.command {
        Command::Register {
            username,
            display_name,
        } => {
            let user = client.create_user(&CreateUserInput {
                username,
                display_name,
                bio: None,
            })?;
            println!("{}\t{}", user.id, user.username);
        }
        Command::Feed {
            user,
            limit,
            offset,
        } => {
            let posts = match user.as_deref() {
                Some(user_id) => client.feed(user_id, limit, offset)?,
                None => client.list_posts(limit, offset)?,
            };
            for post in &posts {
                print_post(post);
            }
            if posts.len() < limit {
                info!("end of feed");
            }
        }
        Command::Post {
            user,
            body,
            markup,
            media,
            title,
        } => {
            let mut composer = Composer::new();
            fill_draft(&mut composer, &body, markup)?;
            if let Some(path) = media {
                composer.begin_upload();
                match client.upload_media(&path, title.as_deref()) {
                    Ok(upload) => {
                        if !composer.attach_upload(&upload, Instant::now()) {
                            anyhow::bail!("server returned upload {} without a url", upload.id);
                        }
                    }
                    Err(err) => {
                        composer.upload_failed(err.to_string());
                        return Err(err);
                    }
                }
            }
            if let Some(title) = title {
                composer.set_title_override(title);
            }
            let Some(request) = composer.prepare(&user, Instant::now())? else {
                warn!("nothing to post");
                return Ok(());
            };
            let post = client.create_post(&request)?;
            composer.finish_ok(Instant::now());
            print_post(&post);
        }
        Command::Comment {
            user,
            post_id,
            body,
            parent,
            markup,
        } => {
            let mut composer = match parent {
                Some(parent) => Composer::reply_to(parent),
                None => Composer::new(),
            };
            fill_draft(&mut composer, &body, markup)?;
            let Some(request) = composer.prepare(&user, Instant::now())? else {
                warn!("nothing to post");
                return Ok(());
            };
            let comment = client.create_comment(&post_id, &request)?;
            println!("{}\t{}", comment.id, comment.excerpt);
        }
        Command::Tree { post_id } => {
            let tree = client.comment_tree(&post_id)?;
            print_tree(&tree, 0);
        }
        Command::Like {
            user,
            post_id,
            undo,
        } => {
            let summary = client.like_post(&post_id, &user, !undo)?;
            println!("{} likes", summary.like_count);
        }
        Command::Follow {
            user,
            followee_id,
            undo,
        } => {
            let summary = client.follow(&user, &followee_id, !undo)?;
            println!(
                "{} {} {}",
                summary.follower_id,
                if summary.following { "follows" } else { "does not follow" },
                summary.followee_id
            );
        }
    }
    Ok(())
}

fn fill_draft(composer: &mut Composer, body: &str, markup: bool) -> Result<()> {
    let now = Instant::now();
    if markup {
        composer
            .editor_mut()
            .set_content(body, now)
            .context("body is not valid markup")?;
    } else if !body.trim().is_empty() {
        composer.editor_mut().push_text(body, Vec::new(), now);
    }
    Ok(())
}

fn print_post(post: &PostView) {
    println!(
        "{}  {}  {} likes  {} comments",
        post.id, post.created_at, post.like_count, post.comment_count
    );
    if !post.excerpt.is_empty() {
        println!("    {}", post.excerpt);
    }
    match render_media_only(&post.content, post.media_title.as_deref(), None) {
        MediaPreview::Media(items) => {
            for item in items {
                println!("    [{}] {} {}", item.kind.as_str(), item.title, item.src);
            }
        }
        MediaPreview::Raw(raw) => println!("    {raw}"),
    }
}

fn print_tree(nodes: &[CommentNode], depth: usize) {
    for node in nodes {
        println!(
            "{:indent$}{}  {}",
            "",
            node.comment.id,
            node.comment.excerpt,
            indent = depth * 2
        );
        print_tree(&node.replies, depth + 1);
    }
}
