use crate::database::models::{NewUser, UserRecord};
use crate::database::repositories::UserRepository;
use crate::database::Database;
use crate::error::{is_constraint_violation, ServiceError, ServiceResult};
use crate::utils::{non_empty, now_utc_iso};
use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Deserialize;

const MAX_USERNAME_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Profile edits. Missing or blank fields keep the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    database: Database,
}

impl AccountService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn register(&self, input: RegisterInput) -> ServiceResult<UserRecord> {
        let username = validate_username(&input.username)?;
        let email = validate_email(&input.email)?;
        if input.password.is_empty() {
            return Err(ServiceError::invalid("password may not be empty"));
        }
        let password_hash = hash_password(&input.password)?;
        let record = NewUser {
            username: username.clone(),
            email,
            password_hash,
            created_at: now_utc_iso(),
        };

        let created = self.database.with_repositories(|repos| {
            let users = repos.users();
            let id = users.create(&record)?;
            users
                .get(id)?
                .ok_or_else(|| anyhow!("registration lost newly inserted user"))
        });
        match created {
            Ok(user) => {
                tracing::info!(user_id = user.id, username = %user.username, "user registered");
                Ok(user)
            }
            Err(err) if is_constraint_violation(&err) => Err(ServiceError::Conflict(format!(
                "username {username:?} is already taken"
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Checks credentials. Unknown users and wrong passwords are
    /// indistinguishable to the caller.
    pub fn login(&self, input: LoginInput) -> ServiceResult<UserRecord> {
        let username = input.username.trim();
        let user = self
            .database
            .with_repositories(|repos| repos.users().get_by_username(username))?;
        let Some(user) = user else {
            tracing::debug!(username, "login for unknown user");
            return Err(ServiceError::Unauthorized);
        };
        if !verify_password(&input.password, &user.password_hash) {
            tracing::debug!(user_id = user.id, "login with wrong password");
            return Err(ServiceError::Unauthorized);
        }
        Ok(user)
    }

    pub fn find(&self, user_id: i64) -> ServiceResult<Option<UserRecord>> {
        Ok(self
            .database
            .with_repositories(|repos| repos.users().get(user_id))?)
    }

    pub fn get(&self, user_id: i64) -> ServiceResult<UserRecord> {
        self.find(user_id)?
            .ok_or_else(|| ServiceError::not_found(format!("user {user_id} not found")))
    }

    pub fn update_profile(&self, user_id: i64, update: ProfileUpdate) -> ServiceResult<UserRecord> {
        let current = self.get(user_id)?;
        let email = match non_empty(update.email) {
            Some(email) => validate_email(&email)?,
            None => current.email.clone(),
        };
        let password_hash = match update.password.filter(|p| !p.is_empty()) {
            Some(password) => hash_password(&password)?,
            None => current.password_hash.clone(),
        };
        let updated_at = now_utc_iso();
        self.database.with_repositories(|repos| {
            repos
                .users()
                .update_credentials(user_id, &email, &password_hash, &updated_at)
        })?;
        tracing::info!(user_id, "profile updated");
        self.get(user_id)
    }
}

fn validate_username(raw: &str) -> ServiceResult<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ServiceError::invalid("username may not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ServiceError::invalid(format!(
            "username may be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(ServiceError::invalid(
            "username may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(username.to_string())
}

fn validate_email(raw: &str) -> ServiceResult<String> {
    let email = raw.trim();
    if !email.is_empty() && !email.contains('@') {
        return Err(ServiceError::invalid("email address must contain '@'"));
    }
    Ok(email.to_string())
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|err| anyhow!("failed to encode password salt: {err}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Returns false for a mismatch or an unparseable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::warn!(error = %err, "stored password hash is malformed");
            false
        }
    }
}
