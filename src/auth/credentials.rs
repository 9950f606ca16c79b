//! Credential store: registration, login, token resolution and account removal.

use rusqlite::Connection;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::session;
use crate::config::AuthConfig;
use crate::db::models::User;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::requests::{NewUser, UserChanges};

pub fn register(conn: &Connection, new_user: &NewUser, auth: &AuthConfig) -> AppResult<User> {
    let hash = hash_password(&new_user.password, auth.bcrypt_cost)?;
    let user = users::insert(conn, new_user, &hash)?;
    tracing::info!("Registered user {} ({})", user.nickname, user.id);
    Ok(user)
}

/// Checks email and password and opens a new session. Unknown email and
/// wrong password fail the same way.
pub fn authenticate(
    conn: &Connection,
    email: &str,
    password: &str,
    auth: &AuthConfig,
) -> AppResult<(User, String)> {
    let email = email.trim().to_lowercase();
    let user = match users::find_by_email(conn, &email)? {
        Some(user) if verify_password(password, &user.password_hash) => user,
        _ => {
            tracing::warn!("Failed login attempt for {}", email);
            return Err(AppError::InvalidCredentials);
        }
    };

    session::purge_expired(conn, &user.id)?;
    let token = session::create_session(conn, &user.id, auth.session_hours)?;
    tracing::info!("User {} logged in", user.nickname);
    Ok((user, token))
}

pub fn resolve(conn: &Connection, token: &str) -> AppResult<User> {
    let user_id = session::resolve_session(conn, token)?.ok_or(AppError::Unauthorized)?;
    users::find_by_id(conn, &user_id)?.ok_or(AppError::Unauthorized)
}

pub fn revoke(conn: &Connection, user: &User, token: &str) -> AppResult<()> {
    if session::delete_session(conn, &user.id, token)? {
        tracing::info!("User {} logged out", user.nickname);
    }
    Ok(())
}

/// Applies profile changes. A new password is re-hashed and signs out every
/// other session of the user; `current_token` stays valid.
pub fn update_profile(
    conn: &mut Connection,
    user_id: &str,
    changes: &UserChanges,
    auth: &AuthConfig,
    current_token: &str,
) -> AppResult<User> {
    let hash = changes
        .password
        .as_deref()
        .map(|p| hash_password(p, auth.bcrypt_cost))
        .transpose()?;

    let tx = conn.transaction()?;
    let user = users::update(&tx, user_id, changes, hash.as_deref())?;
    if hash.is_some() {
        let revoked = session::revoke_others(&tx, user_id, current_token)?;
        tracing::info!(
            "Password changed for {}; revoked {} other session(s)",
            user.nickname,
            revoked
        );
    }
    tx.commit()?;
    Ok(user)
}

pub fn delete_account(conn: &mut Connection, user_id: &str) -> AppResult<User> {
    users::delete_cascade(conn, user_id)
}
