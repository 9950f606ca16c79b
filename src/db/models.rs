use serde::Serialize;

/// A registered account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub nickname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    /// Friend ids in the order the friendships were made.
    pub friends: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub content: String,
    pub image: Option<String>,
    pub user_id: String,
    pub likes: i64,
    pub liked_by: Vec<String>,
    pub comments: Vec<Comment>,
    pub hashtags: Vec<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub comment: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Hashtag {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub posts: Vec<Post>,
    pub users: Vec<User>,
}
