use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::new_id;
use crate::error::AppResult;

/// Create a new session for a user. Returns the bearer token.
///
/// A user may hold any number of sessions at once, one per device.
pub fn create_session(conn: &Connection, user_id: &str, hours: u64) -> AppResult<String> {
    let token = generate_token();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![new_id(), user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// The id of the user holding `token`, if the session exists and has not expired.
pub fn resolve_session(conn: &Connection, token: &str) -> AppResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| row.get(0),
        )
        .optional()?)
}

/// Revoke exactly one token. The user's other sessions stay valid.
pub fn delete_session(conn: &Connection, user_id: &str, token: &str) -> AppResult<bool> {
    let removed = conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND token = ?2",
        params![user_id, token],
    )?;
    Ok(removed > 0)
}

/// Revoke every session of a user except `keep_token`. Returns how many were removed.
pub fn revoke_others(conn: &Connection, user_id: &str, keep_token: &str) -> AppResult<usize> {
    Ok(conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND token <> ?2",
        params![user_id, keep_token],
    )?)
}

/// Drop a user's expired sessions. Returns how many were removed.
pub fn purge_expired(conn: &Connection, user_id: &str) -> AppResult<usize> {
    Ok(conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND expires_at <= datetime('now')",
        params![user_id],
    )?)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_user, test_pool};

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn sessions_resolve_until_revoked() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = insert_user(&conn, "a");

        let phone = create_session(&conn, &user, 1).unwrap();
        let laptop = create_session(&conn, &user, 1).unwrap();
        assert_eq!(resolve_session(&conn, &phone).unwrap(), Some(user.clone()));

        assert!(delete_session(&conn, &user, &phone).unwrap());
        assert_eq!(resolve_session(&conn, &phone).unwrap(), None);
        assert_eq!(resolve_session(&conn, &laptop).unwrap(), Some(user.clone()));
        assert!(!delete_session(&conn, &user, &phone).unwrap());
    }

    #[test]
    fn expired_sessions_do_not_resolve() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = insert_user(&conn, "a");
        let token = create_session(&conn, &user, 1).unwrap();

        conn.execute(
            "UPDATE sessions SET expires_at = datetime('now', '-1 hours') WHERE token = ?1",
            params![token],
        )
        .unwrap();
        assert_eq!(resolve_session(&conn, &token).unwrap(), None);
        assert_eq!(purge_expired(&conn, &user).unwrap(), 1);
    }

    #[test]
    fn unknown_token_does_not_resolve() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert_eq!(resolve_session(&conn, "nope").unwrap(), None);
    }
}
