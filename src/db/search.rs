use rusqlite::Connection;
use std::collections::HashSet;

use crate::db::models::SearchResults;
use crate::db::{fold_case, hashtags, posts, users};
use crate::error::{AppError, AppResult};

/// Escapes LIKE wildcards and wraps the text for a substring match.
pub fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Searches post content, hashtag names and user nicknames, ignoring case
/// in any script.
///
/// Posts reached both through their content and through one of their
/// hashtags are returned once; content matches come first.
pub fn search(conn: &Connection, text: &str) -> AppResult<SearchResults> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Search text is required".into()));
    }
    let pattern = like_pattern(&fold_case(text));

    let mut found = posts::search_content(conn, &pattern)?;
    let mut seen: HashSet<String> = found.iter().map(|p| p.id.clone()).collect();

    let tagged: Vec<String> = hashtags::post_ids_matching(conn, &pattern)?
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect();
    found.extend(posts::get_many(conn, &tagged)?);

    let users = users::search_by_nickname(conn, &pattern)?;

    Ok(SearchResults {
        posts: found,
        users,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_user, test_pool};
    use crate::requests::NewPost;

    fn post(content: &str) -> NewPost {
        NewPost {
            content: content.into(),
            image: None,
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn content_and_hashtag_matches_are_deduplicated() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let owner = insert_user(&conn, "writer");
        let both = posts::create(&mut conn, &owner, &post("loving #rust today")).unwrap();
        let other = posts::create(&mut conn, &owner, &post("nothing here")).unwrap();

        let results = search(&conn, "rust").unwrap();
        assert_eq!(results.posts.len(), 1);
        assert_eq!(results.posts[0].id, both.id);
        assert!(results.posts.iter().all(|p| p.id != other.id));
    }

    #[test]
    fn hashtag_prefixed_query_finds_tagged_posts() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let owner = insert_user(&conn, "writer");
        let tagged = posts::create(&mut conn, &owner, &post("weekend #Hiking trip")).unwrap();

        let results = search(&conn, "#hiking").unwrap();
        assert_eq!(results.posts.len(), 1);
        assert_eq!(results.posts[0].id, tagged.id);
    }

    #[test]
    fn users_match_by_nickname() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        insert_user(&conn, "RustAcean");
        insert_user(&conn, "gopher");

        let results = search(&conn, "rust").unwrap();
        assert!(results.posts.is_empty());
        assert_eq!(results.users.len(), 1);
        assert_eq!(results.users[0].nickname, "RustAcean");
    }

    #[test]
    fn case_folding_covers_accented_text() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let owner = insert_user(&conn, "Élodie");
        let holiday = posts::create(&mut conn, &owner, &post("Vacances d'ÉTÉ #Été")).unwrap();

        let results = search(&conn, "été").unwrap();
        assert_eq!(results.posts.len(), 1);
        assert_eq!(results.posts[0].id, holiday.id);

        let results = search(&conn, "#ÉTÉ").unwrap();
        assert_eq!(results.posts.len(), 1);

        let results = search(&conn, "élodie").unwrap();
        assert_eq!(results.users.len(), 1);
        assert_eq!(results.users[0].nickname, "Élodie");
    }

    #[test]
    fn edited_content_is_searchable() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let owner = insert_user(&conn, "writer");
        let created = posts::create(&mut conn, &owner, &post("first draft")).unwrap();

        let changes = crate::requests::PostChanges {
            content: Some("Straße gesperrt".into()),
            image: None,
        };
        posts::update(&conn, &created.id, &owner, &changes).unwrap();

        assert_eq!(search(&conn, "GESPERRT").unwrap().posts.len(), 1);
        assert_eq!(search(&conn, "straße").unwrap().posts.len(), 1);
        assert!(search(&conn, "draft").unwrap().posts.is_empty());
    }

    #[test]
    fn wildcards_are_literal() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let owner = insert_user(&conn, "writer");
        posts::create(&mut conn, &owner, &post("plain text")).unwrap();

        assert!(search(&conn, "%").unwrap().posts.is_empty());
        assert!(matches!(search(&conn, "   "), Err(AppError::BadRequest(_))));
    }
}
