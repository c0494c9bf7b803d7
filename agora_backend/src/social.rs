use crate::database::models::{FollowRecord, LikeRecord, LikeTarget};
use crate::database::repositories::{
    CommentRepository, FollowRepository, LikeRepository, PostRepository, SqliteRepositories,
    UserRepository,
};
use crate::database::Database;
use crate::error::AgoraError;
use crate::users::UserView;
use crate::utils::now_utc_iso;
use anyhow::Result;
use serde::Serialize;

#[derive(Clone)]
pub struct SocialService {
    database: Database,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeSummary {
    pub target: LikeTarget,
    pub target_id: String,
    pub like_count: usize,
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowSummary {
    pub follower_id: String,
    pub followee_id: String,
    pub following: bool,
}

impl SocialService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Idempotent: liking twice leaves a single like behind.
    pub fn like(&self, target: LikeTarget, target_id: &str, user_id: &str) -> Result<LikeSummary> {
        self.database.with_repositories(|repos| {
            ensure_target(&repos, target, target_id)?;
            ensure_user(&repos, user_id)?;
            let added = repos.likes().add(&LikeRecord {
                target,
                target_id: target_id.to_string(),
                user_id: user_id.to_string(),
                created_at: now_utc_iso(),
            })?;
            if added {
                tracing::debug!(kind = ?target, target_id, user_id, "like added");
            }
            summarize_like(&repos, target, target_id, user_id)
        })
    }

    pub fn unlike(
        &self,
        target: LikeTarget,
        target_id: &str,
        user_id: &str,
    ) -> Result<LikeSummary> {
        self.database.with_repositories(|repos| {
            ensure_target(&repos, target, target_id)?;
            repos.likes().remove(target, target_id, user_id)?;
            summarize_like(&repos, target, target_id, user_id)
        })
    }

    pub fn follow(&self, follower_id: &str, followee_id: &str) -> Result<FollowSummary> {
        if follower_id == followee_id {
            return Err(AgoraError::invalid("users cannot follow themselves"));
        }
        self.database.with_repositories(|repos| {
            ensure_user(&repos, follower_id)?;
            ensure_user(&repos, followee_id)?;
            let added = repos.follows().follow(&FollowRecord {
                follower_id: follower_id.to_string(),
                followee_id: followee_id.to_string(),
                created_at: now_utc_iso(),
            })?;
            if added {
                tracing::info!(follower_id, followee_id, "follow added");
            }
            Ok(FollowSummary {
                follower_id: follower_id.to_string(),
                followee_id: followee_id.to_string(),
                following: true,
            })
        })
    }

    pub fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<FollowSummary> {
        self.database.with_repositories(|repos| {
            ensure_user(&repos, followee_id)?;
            repos.follows().unfollow(follower_id, followee_id)?;
            Ok(FollowSummary {
                follower_id: follower_id.to_string(),
                followee_id: followee_id.to_string(),
                following: false,
            })
        })
    }

    pub fn followers(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<UserView>> {
        self.database.with_repositories(|repos| {
            ensure_user(&repos, user_id)?;
            let users = repos.follows().followers(user_id, limit, offset)?;
            Ok(users.into_iter().map(UserView::from_record).collect())
        })
    }

    pub fn following(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<UserView>> {
        self.database.with_repositories(|repos| {
            ensure_user(&repos, user_id)?;
            let users = repos.follows().following(user_id, limit, offset)?;
            Ok(users.into_iter().map(UserView::from_record).collect())
        })
    }
}

fn summarize_like(
    repos: &SqliteRepositories<'_>,
    target: LikeTarget,
    target_id: &str,
    user_id: &str,
) -> Result<LikeSummary> {
    let likes = repos.likes();
    Ok(LikeSummary {
        target,
        target_id: target_id.to_string(),
        like_count: likes.count(target, target_id)?,
        liked: likes.has_liked(target, target_id, user_id)?,
    })
}

fn ensure_target(repos: &SqliteRepositories<'_>, target: LikeTarget, target_id: &str) -> Result<()> {
    let exists = match target {
        LikeTarget::Post => repos.posts().get(target_id)?.is_some(),
        LikeTarget::Comment => repos.comments().get(target_id)?.is_some(),
    };
    if !exists {
        let what = match target {
            LikeTarget::Post => "post",
            LikeTarget::Comment => "comment",
        };
        return Err(AgoraError::not_found(format!("{what} {target_id}")));
    }
    Ok(())
}

fn ensure_user(repos: &SqliteRepositories<'_>, user_id: &str) -> Result<()> {
    if repos.users().get(user_id)?.is_none() {
        return Err(AgoraError::not_found(format!("user {user_id}")));
    }
    Ok(())
}
