//! Social graph.
//!
//! Friendship is mutual: every edge is stored in both directions and both
//! rows are written or removed in the same transaction. `friend_id` is indexed
//! so the reverse side of a user's edges is a direct lookup.

use rusqlite::{params, Connection};

use crate::db::models::User;
use crate::db::{now_iso, users};
use crate::error::{AppError, AppResult};

/// Friend ids of `user_id`, oldest friendship first.
pub fn friend_ids(conn: &Connection, user_id: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT friend_id FROM friendships WHERE user_id = ?1 ORDER BY created_at, rowid",
    )?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn are_friends(conn: &Connection, user_id: &str, other_id: &str) -> AppResult<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
        params![user_id, other_id],
        |row| row.get(0),
    )?)
}

pub fn list_friends(conn: &Connection, user_id: &str) -> AppResult<Vec<User>> {
    let mut friends = Vec::new();
    for id in friend_ids(conn, user_id)? {
        if let Some(friend) = users::find_by_id(conn, &id)? {
            friends.push(friend);
        }
    }
    Ok(friends)
}

pub fn add_friend(conn: &mut Connection, user_id: &str, target_id: &str) -> AppResult<Vec<User>> {
    if user_id == target_id {
        return Err(AppError::BadRequest("You cannot add yourself as a friend".into()));
    }
    if !users::exists(conn, target_id)? {
        return Err(AppError::NotFound("User not found".into()));
    }
    if are_friends(conn, user_id, target_id)? {
        return Err(AppError::Conflict("You are already friends".into()));
    }

    let created_at = now_iso();
    let tx = conn.transaction()?;
    for (from, to) in [(user_id, target_id), (target_id, user_id)] {
        tx.execute(
            "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at) VALUES (?1, ?2, ?3)",
            params![from, to, created_at],
        )?;
    }
    tx.commit()?;

    list_friends(conn, user_id)
}

/// Removing a friendship that does not exist is a no-op.
pub fn remove_friend(
    conn: &mut Connection,
    user_id: &str,
    target_id: &str,
) -> AppResult<Vec<User>> {
    if !users::exists(conn, target_id)? {
        return Err(AppError::NotFound("User not found".into()));
    }

    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM friendships
         WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
        params![user_id, target_id],
    )?;
    tx.commit()?;

    list_friends(conn, user_id)
}
