//! Hashtag index: tag names and the post ⇄ tag join table.

use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::LazyLock;

use crate::db::models::Hashtag;
use crate::db::{fold_case, new_id};
use crate::error::AppResult;

static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\w+").unwrap());

/// Distinct `#tags` in `content`, in order of first appearance. Tags keep
/// their leading `#` and their case.
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for m in HASHTAG_RE.find_iter(content) {
        let tag = m.as_str();
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

pub fn find_by_name(conn: &Connection, name: &str) -> AppResult<Option<Hashtag>> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM hashtags WHERE name = ?1",
            params![name],
            |row| {
                Ok(Hashtag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?)
}

/// Looks a tag up by name, creating it the first time it is seen.
pub fn find_or_create(conn: &Connection, name: &str) -> AppResult<Hashtag> {
    conn.execute(
        "INSERT OR IGNORE INTO hashtags (id, name, name_folded) VALUES (?1, ?2, ?3)",
        params![new_id(), name, fold_case(name)],
    )?;
    let id: String = conn.query_row(
        "SELECT id FROM hashtags WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(Hashtag {
        id,
        name: name.to_string(),
    })
}

/// Indexes every tag in `content` against `post_id`. Callers run this inside
/// the transaction that inserts the post.
pub fn link_post(conn: &Connection, post_id: &str, content: &str) -> AppResult<Vec<String>> {
    let tags = extract_hashtags(content);
    for tag in &tags {
        let hashtag = find_or_create(conn, tag)?;
        conn.execute(
            "INSERT OR IGNORE INTO post_hashtags (post_id, hashtag_id) VALUES (?1, ?2)",
            params![post_id, hashtag.id],
        )?;
        tracing::debug!("Linked {} to post {}", tag, post_id);
    }
    Ok(tags)
}

/// Tag names linked to a post, alphabetical.
pub fn names_for_post(conn: &Connection, post_id: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT h.name FROM post_hashtags ph
         JOIN hashtags h ON h.id = ph.hashtag_id
         WHERE ph.post_id = ?1
         ORDER BY h.name",
    )?;
    let names = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Ids of posts linked to any hashtag whose folded name matches the LIKE
/// `pattern`.
pub fn post_ids_matching(conn: &Connection, pattern: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT ph.post_id FROM post_hashtags ph
         JOIN hashtags h ON h.id = ph.hashtag_id
         JOIN posts p ON p.id = ph.post_id
         WHERE h.name_folded LIKE ?1 ESCAPE '\\'
         ORDER BY p.created_at DESC, p.rowid DESC",
    )?;
    let ids = stmt
        .query_map(params![pattern], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}
