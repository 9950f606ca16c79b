use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::friends;
use crate::db::models::User;
use crate::db::{fold_case, new_id, now_iso};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::requests::{NewUser, UserChanges};

const USER_COLUMNS: &str =
    "id, email, nickname, password_hash, name, last_name, age, bio, avatar, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        nickname: row.get(2)?,
        password_hash: row.get(3)?,
        name: row.get(4)?,
        last_name: row.get(5)?,
        age: row.get(6)?,
        bio: row.get(7)?,
        avatar: row.get(8)?,
        friends: Vec::new(),
        created_at: row.get(9)?,
    })
}

fn find_one(conn: &Connection, column: &str, value: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let user = conn.query_row(&sql, params![value], map_user).optional()?;
    match user {
        Some(mut user) => {
            user.friends = friends::friend_ids(conn, &user.id)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<User>> {
    find_one(conn, "id", id)
}

pub fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<User>> {
    find_one(conn, "email", email)
}

pub fn find_by_nickname(conn: &Connection, nickname: &str) -> AppResult<Option<User>> {
    find_one(conn, "nickname", nickname)
}

pub fn get_by_id(conn: &Connection, id: &str) -> AppResult<User> {
    find_by_id(conn, id)?.ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub fn exists(conn: &Connection, id: &str) -> AppResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?)
}

/// Fails with `Conflict` when `email` or `nickname` is held by an account
/// other than `except_id`.
fn ensure_unique(
    conn: &Connection,
    email: Option<&str>,
    nickname: Option<&str>,
    except_id: Option<&str>,
) -> AppResult<()> {
    let except_id = except_id.unwrap_or("");
    if let Some(email) = email {
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE email = ?1 AND id <> ?2",
            params![email, except_id],
            |row| row.get(0),
        )?;
        if taken {
            return Err(AppError::Conflict("Email is already registered".into()));
        }
    }
    if let Some(nickname) = nickname {
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE nickname = ?1 AND id <> ?2",
            params![nickname, except_id],
            |row| row.get(0),
        )?;
        if taken {
            return Err(AppError::Conflict("Nickname is already taken".into()));
        }
    }
    Ok(())
}

fn conflict_on_unique(err: rusqlite::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Email or nickname already in use".into())
    } else {
        err.into()
    }
}

/// Inserts a new account. `password_hash` must already be hashed.
pub fn insert(conn: &Connection, user: &NewUser, password_hash: &str) -> AppResult<User> {
    ensure_unique(conn, Some(&user.email), Some(&user.nickname), None)?;

    let id = new_id();
    conn.execute(
        "INSERT INTO users (id, email, nickname, nickname_folded, password_hash, name, last_name, age, bio, avatar, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            user.email,
            user.nickname,
            fold_case(&user.nickname),
            password_hash,
            user.name,
            user.last_name,
            user.age,
            user.bio,
            user.avatar,
            now_iso(),
        ],
    )
    .map_err(conflict_on_unique)?;

    get_by_id(conn, &id)
}

/// Applies validated profile changes. `password_hash` replaces the stored
/// hash when the caller changed the password. An empty `last_name`, `bio` or
/// `avatar` sets the column to NULL.
/// hash when the caller changed the password.
pub fn update(
    conn: &Connection,
    id: &str,
    changes: &UserChanges,
    password_hash: Option<&str>,
) -> AppResult<User> {
    ensure_unique(
        conn,
        changes.email.as_deref(),
        changes.nickname.as_deref(),
        Some(id),
    )?;

    let updated = conn
        .execute(
            "UPDATE users SET
                email = COALESCE(?2, email),
                nickname = COALESCE(?3, nickname),
                nickname_folded = COALESCE(?10, nickname_folded),
                password_hash = COALESCE(?4, password_hash),
                name = COALESCE(?5, name),
                last_name = CASE WHEN ?6 IS NULL THEN last_name ELSE NULLIF(?6, '') END,
                age = COALESCE(?7, age),
                bio = CASE WHEN ?8 IS NULL THEN bio ELSE NULLIF(?8, '') END,
                avatar = CASE WHEN ?9 IS NULL THEN avatar ELSE NULLIF(?9, '') END
             WHERE id = ?1",
            params![
                id,
                changes.email,
                changes.nickname,
                password_hash,
                changes.name,
                changes.last_name,
                changes.age,
                changes.bio,
                changes.avatar,
                changes.nickname.as_deref().map(fold_case),
            ],
        )
        .map_err(conflict_on_unique)?;

    if updated == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }
    get_by_id(conn, id)
}

/// Removes an account and everything hanging off it in one transaction.
/// Like counters of posts the user had liked are decremented first so they
/// keep matching their like sets.
pub fn delete_cascade(conn: &mut Connection, id: &str) -> AppResult<User> {
    let tx = conn.transaction()?;
    let user = get_by_id(&tx, id)?;
    tx.execute(
        "UPDATE posts SET likes = likes - 1
         WHERE id IN (SELECT post_id FROM post_likes WHERE user_id = ?1)",
        params![id],
    )?;
    tx.execute("DELETE FROM post_likes WHERE user_id = ?1", params![id])?;
    tx.execute("DELETE FROM comments WHERE user_id = ?1", params![id])?;
    let posts = tx.execute("DELETE FROM posts WHERE user_id = ?1", params![id])?;
    let edges = tx.execute(
        "DELETE FROM friendships WHERE user_id = ?1 OR friend_id = ?1",
        params![id],
    )?;
    tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
    tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    tx.commit()?;

    tracing::info!(
        "Deleted account {} ({} posts, {} friend edges)",
        user.nickname,
        posts,
        edges
    );
    Ok(user)
}

/// Substring match on the folded nickname; `pattern` must already be folded.
pub fn search_by_nickname(conn: &Connection, pattern: &str) -> AppResult<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE nickname_folded LIKE ?1 ESCAPE '\\' ORDER BY nickname",
        USER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut users = stmt
        .query_map(params![pattern], map_user)?
        .collect::<Result<Vec<_>, _>>()?;
    for user in &mut users {
        user.friends = friends::friend_ids(conn, &user.id)?;
    }
    Ok(users)
}
