//! Request bodies accepted by the JSON API.
//!
//! Each body is deserialized with `deny_unknown_fields`, so a key outside the
//! accepted set fails the whole request before anything touches the database.
//! `validate` then turns the raw body into a value the stores can trust.

use serde::Deserialize;

use crate::error::{AppError, AppResult};

pub const MAX_POST_LEN: usize = 2000;
pub const MAX_COMMENT_LEN: usize = 500;
pub const MAX_NICKNAME_LEN: usize = 30;
pub const MIN_PASSWORD_LEN: usize = 7;
pub const MAX_AGE: u32 = 150;

// --- Users ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub nickname: String,
    pub password: String,
    pub name: String,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// Registration data that passed validation. The password is still plaintext
/// and is hashed by the credential store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub nickname: String,
    pub password: String,
    pub name: String,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

impl RegisterRequest {
    pub fn validate(self) -> AppResult<NewUser> {
        Ok(NewUser {
            email: validate_email(&self.email)?,
            nickname: validate_nickname(&self.nickname)?,
            password: validate_password(self.password)?,
            name: required("Name", &self.name)?,
            last_name: optional(self.last_name),
            age: self.age.map(validate_age).transpose()?,
            bio: optional(self.bio),
            avatar: optional(self.avatar)
                .map(|a| validate_url("Avatar", &a))
                .transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// Validated profile changes. `None` leaves the column untouched; an empty
/// string clears an optional column (`lastName`, `bio`, `avatar`).
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<u32>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(self) -> AppResult<UserChanges> {
        let changes = UserChanges {
            email: self.email.as_deref().map(validate_email).transpose()?,
            nickname: self.nickname.as_deref().map(validate_nickname).transpose()?,
            password: self.password.map(validate_password).transpose()?,
            name: self.name.as_deref().map(|n| required("Name", n)).transpose()?,
            last_name: clearable(self.last_name),
            age: self.age.map(validate_age).transpose()?,
            bio: clearable(self.bio),
            avatar: clearable_url("Avatar", self.avatar)?,
        };
        if changes.is_empty() {
            return Err(AppError::BadRequest("Nothing to update".into()));
        }
        Ok(changes)
    }
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.nickname.is_none()
            && self.password.is_none()
            && self.name.is_none()
            && self.last_name.is_none()
            && self.age.is_none()
            && self.bio.is_none()
            && self.avatar.is_none()
    }
}

// --- Posts ---

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub content: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub content: String,
    pub image: Option<String>,
}

impl CreatePostRequest {
    pub fn validate(self) -> AppResult<NewPost> {
        Ok(NewPost {
            content: validate_content(&self.content)?,
            image: optional(self.image)
                .map(|i| validate_url("Image", &i))
                .transpose()?,
        })
    }
}

/// Partial post update. Only `content` and `image` may be changed.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub image: Option<String>,
}

/// `image: Some("")` removes the image.
#[derive(Debug, Default, Clone)]
pub struct PostChanges {
    pub content: Option<String>,
    pub image: Option<String>,
}

impl UpdatePostRequest {
    pub fn validate(self) -> AppResult<PostChanges> {
        if self.content.is_none() && self.image.is_none() {
            return Err(AppError::BadRequest("Nothing to update".into()));
        }
        Ok(PostChanges {
            content: self.content.as_deref().map(validate_content).transpose()?,
            image: clearable_url("Image", self.image)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub comment: String,
}

impl CommentRequest {
    pub fn validate(self) -> AppResult<String> {
        let comment = required("Comment", &self.comment)?;
        if comment.chars().count() > MAX_COMMENT_LEN {
            return Err(AppError::BadRequest(format!(
                "Comment must be {} characters or less",
                MAX_COMMENT_LEN
            )));
        }
        Ok(comment)
    }
}

// --- Field rules ---

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trims without dropping empties: on update an empty value means "clear".
fn clearable(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

fn clearable_url(field: &str, value: Option<String>) -> AppResult<Option<String>> {
    match clearable(value) {
        Some(v) if v.is_empty() => Ok(Some(v)),
        Some(v) => validate_url(field, &v).map(Some),
        None => Ok(None),
    }
}

pub fn validate_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    let invalid = || AppError::BadRequest("Email is invalid".into());

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let domain_ok = domain
        .split('.')
        .all(|label| !label.is_empty())
        && domain.contains('.');
    if local.is_empty()
        || domain.contains('@')
        || !domain_ok
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(email)
}

pub fn validate_nickname(nickname: &str) -> AppResult<String> {
    let nickname = required("Nickname", nickname)?;
    if nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Nickname must be {} characters or less",
            MAX_NICKNAME_LEN
        )));
    }
    if !nickname
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    {
        return Err(AppError::BadRequest(
            "Nickname may only contain letters, digits, '_' and '.'".into(),
        ));
    }
    Ok(nickname)
}

pub fn validate_password(password: String) -> AppResult<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if password.to_lowercase().contains("password") {
        return Err(AppError::BadRequest(
            "Password cannot contain \"password\"".into(),
        ));
    }
    Ok(password)
}

fn validate_age(age: u32) -> AppResult<u32> {
    if age > MAX_AGE {
        return Err(AppError::BadRequest("Age is invalid".into()));
    }
    Ok(age)
}

pub fn validate_content(content: &str) -> AppResult<String> {
    let content = required("Content", content)?;
    if content.chars().count() > MAX_POST_LEN {
        return Err(AppError::BadRequest(format!(
            "Content must be {} characters or less",
            MAX_POST_LEN
        )));
    }
    Ok(content)
}

/// Accepts absolute http(s) URLs only.
pub fn validate_url(field: &str, raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
            Ok(raw.to_string())
        }
        _ => Err(AppError::BadRequest(format!("{} is invalid", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_body() -> RegisterRequest {
        RegisterRequest {
            email: " A@X.com ".into(),
            nickname: "a1".into(),
            password: "hunter22".into(),
            name: "Ada".into(),
            last_name: None,
            age: Some(36),
            bio: Some("   ".into()),
            avatar: None,
        }
    }

    #[test]
    fn register_normalizes_fields() {
        let user = register_body().validate().unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.bio, None);
        assert_eq!(user.age, Some(36));
    }

    #[test]
    fn register_rejects_weak_passwords() {
        let mut body = register_body();
        body.password = "short".into();
        assert!(matches!(body.validate(), Err(AppError::BadRequest(_))));

        let mut body = register_body();
        body.password = "MyPassword1".into();
        assert!(matches!(body.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("user@sub.example.org").is_ok());
        assert!(validate_email("userexample.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@example").is_err());
        assert!(validate_email("user@example..com").is_err());
        assert!(validate_email("us er@example.com").is_err());
    }

    #[test]
    fn nickname_rules() {
        assert_eq!(validate_nickname("  ada_l.  ").unwrap(), "ada_l.");
        assert!(validate_nickname("").is_err());
        assert!(validate_nickname("has space").is_err());
        assert!(validate_nickname("#tag").is_err());
        assert!(validate_nickname(&"x".repeat(MAX_NICKNAME_LEN + 1)).is_err());
    }

    #[test]
    fn image_must_be_http_url() {
        assert!(validate_url("Image", "https://cdn.example.com/a.png").is_ok());
        assert!(validate_url("Image", "http://example.com").is_ok());
        assert!(validate_url("Image", "not a url").is_err());
        assert!(validate_url("Image", "ftp://example.com/a.png").is_err());
        assert!(validate_url("Image", "javascript:alert(1)").is_err());
    }

    #[test]
    fn post_content_is_trimmed_and_required() {
        let post = CreatePostRequest {
            content: "  hello  ".into(),
            image: Some("".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(post.content, "hello");
        assert!(post.image.is_none());

        let empty = CreatePostRequest {
            content: "   ".into(),
            image: None,
        };
        assert!(empty.validate().is_err());

        let long = CreatePostRequest {
            content: "a".repeat(MAX_POST_LEN + 1),
            image: None,
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn post_update_rejects_unknown_fields() {
        let parsed: Result<UpdatePostRequest, _> =
            serde_json::from_str(r#"{"content": "new", "userId": "someone-else"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn post_update_requires_a_field() {
        assert!(UpdatePostRequest::default().validate().is_err());
        let changes = UpdatePostRequest {
            content: None,
            image: Some("https://example.com/x.png".into()),
        }
        .validate()
        .unwrap();
        assert!(changes.content.is_none());
        assert!(changes.image.is_some());
    }

    #[test]
    fn empty_optional_fields_clear_on_update() {
        let changes = UpdateUserRequest {
            bio: Some("   ".into()),
            avatar: Some("".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(changes.bio.as_deref(), Some(""));
        assert_eq!(changes.avatar.as_deref(), Some(""));

        let bad = UpdateUserRequest {
            avatar: Some("nope".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let changes = UpdatePostRequest {
            content: None,
            image: Some(" ".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(changes.image.as_deref(), Some(""));
    }

    #[test]
    fn user_update_rejects_empty_and_unknown() {
        assert!(UpdateUserRequest::default().validate().is_err());
        let parsed: Result<UpdateUserRequest, _> =
            serde_json::from_str(r#"{"tokens": []}"#);
        assert!(parsed.is_err());
        let parsed: UpdateUserRequest =
            serde_json::from_str(r#"{"lastName": "Byron", "age": 20}"#).unwrap();
        let changes = parsed.validate().unwrap();
        assert_eq!(changes.last_name.as_deref(), Some("Byron"));
        assert_eq!(changes.age, Some(20));
    }

    #[test]
    fn comment_rules() {
        assert_eq!(
            CommentRequest { comment: " nice ".into() }.validate().unwrap(),
            "nice"
        );
        assert!(CommentRequest { comment: "".into() }.validate().is_err());
        assert!(CommentRequest {
            comment: "c".repeat(MAX_COMMENT_LEN + 1)
        }
        .validate()
        .is_err());
    }
}
