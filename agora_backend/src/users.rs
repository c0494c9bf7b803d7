use crate::database::models::UserRecord;
use crate::database::repositories::UserRepository;
use crate::database::Database;
use crate::error::AgoraError;
use crate::utils::{new_id, non_blank, now_utc_iso};
use anyhow::Result;
use serde::{Deserialize, Serialize};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;

#[derive(Clone)]
pub struct UserService {
    database: Database,
}

impl UserService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create_user(&self, input: CreateUserInput) -> Result<UserView> {
        let username = input.username.trim().to_string();
        validate_username(&username)?;
        let record = UserRecord {
            id: new_id(),
            username,
            display_name: non_blank(input.display_name),
            bio: non_blank(input.bio),
            created_at: now_utc_iso(),
        };
        self.database.with_repositories(|repos| {
            let users = repos.users();
            if users.get_by_username(&record.username)?.is_some() {
                return Err(AgoraError::conflict(format!(
                    "username {} is already taken",
                    record.username
                )));
            }
            users.create(&record)
        })?;
        tracing::info!(user_id = %record.id, username = %record.username, "registered user");
        Ok(UserView::from_record(record))
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserView>> {
        let record = self.database.with_repositories(|repos| repos.users().get(id))?;
        Ok(record.map(UserView::from_record))
    }

    pub fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<UserView>> {
        self.database.with_repositories(|repos| {
            let users = repos.users().list(limit, offset)?;
            Ok(users.into_iter().map(UserView::from_record).collect())
        })
    }
}

fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AgoraError::invalid(format!(
            "username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AgoraError::invalid(
            "username may only contain letters, digits and underscores",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
}

impl UserView {
    pub(crate) fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            display_name: record.display_name,
            bio: record.bio,
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> UserService {
        let conn = Connection::open_in_memory().expect("db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");
        UserService::new(db)
    }

    fn input(username: &str) -> CreateUserInput {
        CreateUserInput {
            username: username.into(),
            display_name: Some("  ".into()),
            bio: Some("hello".into()),
        }
    }

    #[test]
    fn create_get_and_list() {
        let service = setup();
        let alice = service.create_user(input("alice")).expect("alice");
        assert_eq!(alice.display_name, None);
        assert_eq!(alice.bio.as_deref(), Some("hello"));
        service.create_user(input("bob_2")).expect("bob");

        let fetched = service.get_user(&alice.id).expect("get").expect("exists");
        assert_eq!(fetched.username, "alice");
        assert!(service.get_user("nobody").expect("get").is_none());

        let page = service.list_users(1, 1).expect("list");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].username, "bob_2");
    }

    #[test]
    fn duplicate_usernames_conflict_case_insensitively() {
        let service = setup();
        service.create_user(input("carol")).expect("carol");
        let err = service.create_user(input("Carol")).expect_err("duplicate");
        assert!(matches!(
            err.downcast_ref::<AgoraError>(),
            Some(AgoraError::Conflict(_))
        ));
    }

    #[test]
    fn usernames_are_validated() {
        let service = setup();
        let long = "x".repeat(33);
        for bad in ["ab", "has space", "dash-ed", long.as_str()] {
            let err = service.create_user(input(bad)).expect_err(bad);
            assert!(matches!(
                err.downcast_ref::<AgoraError>(),
                Some(AgoraError::Invalid(_))
            ));
        }
    }
}
