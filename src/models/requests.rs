//! Request DTOs for the notification service API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for POST /api/sendPost
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    /// Post body; sanitized upstream
    pub content: String,
}

impl CreatePostRequest {
    /// Minimum visible characters in a post
    pub const MIN_VISIBLE_CHARS: usize = 5;

    /// Validates the request data
    ///
    /// Counts non-whitespace characters of the raw content, markup included,
    /// so `<p></p>` passes. Markup is not parsed here.
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let visible = self.content.chars().filter(|c| !c.is_whitespace()).count();
        if visible < Self::MIN_VISIBLE_CHARS {
            return Some(format!(
                "Post must contain at least {} visible characters",
                Self::MIN_VISIBLE_CHARS
            ));
        }
        None
    }
}

/// Request body for the endpoints that act on one post
/// (deletePost, likePost, unlikePost)
#[derive(Debug, Clone, Deserialize)]
pub struct PostIdRequest {
    pub id: String,
}

impl PostIdRequest {
    pub fn validate(&self) -> Option<String> {
        if self.id.trim().is_empty() {
            return Some("Post id cannot be empty".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_post_request_deserialize() {
        let req: CreatePostRequest = serde_json::from_str(r#"{"content": "<p>hello</p>"}"#).unwrap();
        assert_eq!(req.content, "<p>hello</p>");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_too_short_post() {
        let req = CreatePostRequest {
            content: " a b \n c ".to_string(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_counts_raw_markup() {
        let req = CreatePostRequest {
            content: "<p></p>".to_string(),
        };
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_post_id_request() {
        let req: PostIdRequest = serde_json::from_str(r#"{"id": "42"}"#).unwrap();
        assert!(req.validate().is_none());

        let empty = PostIdRequest { id: "  ".to_string() };
        assert!(empty.validate().is_some());
    }
}
