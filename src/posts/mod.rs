//! Posts Module
//!
//! Post records and the storage boundary the request handlers call before
//! publishing events. The relational backend is external; the in-memory
//! repository serves single-process deployments and tests.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StorageError;

pub use memory::MemoryPostRepository;

/// A published post as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "postId")]
    pub id: String,
    pub user_id: String,
    pub user_display_name: String,
    #[serde(rename = "post")]
    pub content: String,
    #[serde(rename = "pubTime", with = "chrono::serde::ts_milliseconds")]
    pub published_at: DateTime<Utc>,
    pub likes: u64,
    #[serde(skip)]
    pub user_email: String,
}

/// Data needed to create a post; id and timestamp are assigned by storage.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: String,
    pub user_email: String,
    pub user_display_name: String,
    pub content: String,
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post, StorageError>;

    /// Deletes a post owned by `user_id`.
    async fn delete_own(&self, post_id: &str, user_id: &str) -> Result<(), StorageError>;

    /// Deletes any post (moderator action).
    async fn delete_any(&self, post_id: &str) -> Result<(), StorageError>;

    /// Records a like; liking twice is a no-op. Returns the new like count.
    async fn like(&self, post_id: &str, user_id: &str) -> Result<u64, StorageError>;

    /// Removes a like if present. Returns the new like count.
    async fn unlike(&self, post_id: &str, user_id: &str) -> Result<u64, StorageError>;

    /// Most recent posts, newest first.
    async fn newest(&self, limit: usize) -> Result<Vec<Post>, StorageError>;

    /// Posts published before `post_id`, newest first.
    async fn newest_before(&self, post_id: &str, limit: usize) -> Result<Vec<Post>, StorageError>;
}
