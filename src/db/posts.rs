use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::db::hashtags;
use crate::db::models::{Comment, Post};
use crate::db::{fold_case, new_id, now_iso};
use crate::error::{AppError, AppResult};
use crate::requests::{NewPost, PostChanges};

const POST_COLUMNS: &str = "id, content, image, user_id, likes, created_at, updated_at";
const RECENT_ORDER: &str = "ORDER BY created_at DESC, rowid DESC";
const POPULAR_ORDER: &str = "ORDER BY likes DESC, created_at DESC, rowid DESC";

/// One page of a listing. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    /// Missing, non-numeric or zero page numbers fall back to the first page.
    pub fn parse(raw: Option<&str>, size: u32) -> Self {
        let number = raw
            .and_then(|r| r.trim().parse::<u32>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(1);
        Self { number, size }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.size)
    }
}

fn post_not_found() -> AppError {
    AppError::NotFound("Post not found".into())
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        content: row.get(1)?,
        image: row.get(2)?,
        user_id: row.get(3)?,
        likes: row.get(4)?,
        liked_by: Vec::new(),
        comments: Vec::new(),
        hashtags: Vec::new(),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Fills in likes, comments and hashtags for a bare post row.
fn hydrate(conn: &Connection, mut post: Post) -> AppResult<Post> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM post_likes WHERE post_id = ?1 ORDER BY created_at, rowid",
    )?;
    post.liked_by = stmt
        .query_map(params![post.id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, comment, user_id, created_at FROM comments
         WHERE post_id = ?1 ORDER BY created_at, rowid",
    )?;
    post.comments = stmt
        .query_map(params![post.id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                comment: row.get(1)?,
                user_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    post.hashtags = hashtags::names_for_post(conn, &post.id)?;
    Ok(post)
}

fn query_posts(
    conn: &Connection,
    clause: &str,
    params: impl rusqlite::Params,
) -> AppResult<Vec<Post>> {
    let sql = format!("SELECT {} FROM posts {}", POST_COLUMNS, clause);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, map_post)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|post| hydrate(conn, post)).collect()
}

pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS);
    let post = conn.query_row(&sql, params![id], map_post).optional()?;
    post.map(|p| hydrate(conn, p)).transpose()
}

pub fn get_by_id(conn: &Connection, id: &str) -> AppResult<Post> {
    find_by_id(conn, id)?.ok_or_else(post_not_found)
}

/// Loads the given posts, keeping the order of `ids` and skipping unknown ids.
pub fn get_many(conn: &Connection, ids: &[String]) -> AppResult<Vec<Post>> {
    let mut posts = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(post) = find_by_id(conn, id)? {
            posts.push(post);
        }
    }
    Ok(posts)
}

fn owner_of(conn: &Connection, post_id: &str) -> AppResult<String> {
    conn.query_row(
        "SELECT user_id FROM posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(post_not_found)
}

/// Inserts a post and indexes its hashtags in a single transaction, so a
/// failure part way through leaves neither the post nor any of its links.
pub fn create(conn: &mut Connection, owner_id: &str, post: &NewPost) -> AppResult<Post> {
    let id = new_id();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO posts (id, user_id, content, content_folded, image, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            owner_id,
            post.content,
            fold_case(&post.content),
            post.image,
            now_iso()
        ],
    )?;
    let tags = hashtags::link_post(&tx, &id, &post.content)?;
    tx.commit()?;

    tracing::info!("Post {} created with {} hashtag(s)", id, tags.len());
    get_by_id(conn, &id)
}

pub fn like(conn: &mut Connection, post_id: &str, user_id: &str) -> AppResult<Post> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    owner_of(&tx, post_id)?;

    let inserted = tx.execute(
        "INSERT OR IGNORE INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![post_id, user_id, now_iso()],
    )?;
    if inserted == 0 {
        return Err(AppError::Conflict("You already liked this post".into()));
    }
    tx.execute(
        "UPDATE posts SET likes = likes + 1 WHERE id = ?1",
        params![post_id],
    )?;
    tx.commit()?;

    get_by_id(conn, post_id)
}

pub fn unlike(conn: &mut Connection, post_id: &str, user_id: &str) -> AppResult<Post> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    owner_of(&tx, post_id)?;

    let removed = tx.execute(
        "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;
    if removed == 0 {
        return Err(AppError::Conflict("You have not liked this post".into()));
    }
    tx.execute(
        "UPDATE posts SET likes = likes - 1 WHERE id = ?1",
        params![post_id],
    )?;
    tx.commit()?;

    get_by_id(conn, post_id)
}

/// Anyone signed in may comment on any post.
pub fn add_comment(conn: &Connection, post_id: &str, user_id: &str, text: &str) -> AppResult<Post> {
    owner_of(conn, post_id)?;
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, comment, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new_id(), post_id, user_id, text, now_iso()],
    )?;
    get_by_id(conn, post_id)
}

/// Only the comment's author may remove it. Returns the post it belonged to.
pub fn delete_comment(conn: &Connection, comment_id: &str, requester_id: &str) -> AppResult<Post> {
    let (post_id, author_id): (String, String) = conn
        .query_row(
            "SELECT post_id, user_id FROM comments WHERE id = ?1",
            params![comment_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))?;

    if author_id != requester_id {
        return Err(AppError::Forbidden(
            "You can only delete your own comments".into(),
        ));
    }

    conn.execute("DELETE FROM comments WHERE id = ?1", params![comment_id])?;
    get_by_id(conn, &post_id)
}

/// Owner-only edit of content and/or image. An empty image removes it.
/// Hashtags are not re-indexed.
pub fn update(
    conn: &Connection,
    post_id: &str,
    requester_id: &str,
    changes: &PostChanges,
) -> AppResult<Post> {
    if owner_of(conn, post_id)? != requester_id {
        return Err(AppError::Forbidden("You can only edit your own posts".into()));
    }

    conn.execute(
        "UPDATE posts SET
            content = COALESCE(?2, content),
            content_folded = COALESCE(?5, content_folded),
            image = CASE WHEN ?3 IS NULL THEN image ELSE NULLIF(?3, '') END,
            updated_at = ?4
         WHERE id = ?1",
        params![
            post_id,
            changes.content,
            changes.image,
            now_iso(),
            changes.content.as_deref().map(fold_case)
        ],
    )?;
    get_by_id(conn, post_id)
}

/// Owner-only delete. Likes, comments and hashtag links go with the post;
/// the hashtags themselves stay.
pub fn delete(conn: &mut Connection, post_id: &str, requester_id: &str) -> AppResult<Post> {
    let post = get_by_id(conn, post_id)?;
    if post.user_id != requester_id {
        return Err(AppError::Forbidden(
            "You can only delete your own posts".into(),
        ));
    }

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM post_likes WHERE post_id = ?1", params![post_id])?;
    tx.execute("DELETE FROM comments WHERE post_id = ?1", params![post_id])?;
    tx.execute("DELETE FROM post_hashtags WHERE post_id = ?1", params![post_id])?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
    tx.commit()?;

    Ok(post)
}

pub fn list_by_owner(conn: &Connection, user_id: &str) -> AppResult<Vec<Post>> {
    query_posts(
        conn,
        &format!("WHERE user_id = ?1 {}", RECENT_ORDER),
        params![user_id],
    )
}

pub fn list_all(conn: &Connection) -> AppResult<Vec<Post>> {
    query_posts(conn, RECENT_ORDER, params![])
}

pub fn list_popular(conn: &Connection, page: Page) -> AppResult<Vec<Post>> {
    query_posts(
        conn,
        &format!("{} LIMIT ?1 OFFSET ?2", POPULAR_ORDER),
        params![page.size, page.offset()],
    )
}

pub fn list_recent(conn: &Connection, page: Page) -> AppResult<Vec<Post>> {
    query_posts(
        conn,
        &format!("{} LIMIT ?1 OFFSET ?2", RECENT_ORDER),
        params![page.size, page.offset()],
    )
}

/// Posts whose folded content matches the LIKE `pattern`, newest first.
pub fn search_content(conn: &Connection, pattern: &str) -> AppResult<Vec<Post>> {
    query_posts(
        conn,
        &format!("WHERE content_folded LIKE ?1 ESCAPE '\\' {}", RECENT_ORDER),
        params![pattern],
    )
}
