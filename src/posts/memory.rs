use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewPost, Post, PostRepository};
use crate::error::StorageError;

#[derive(Debug, Default)]
struct Inner {
    /// Oldest first
    posts: Vec<Post>,
    /// (post id, user id)
    likes: HashSet<(String, String)>,
}

impl Inner {
    fn position(&self, post_id: &str) -> Result<usize, StorageError> {
        self.posts
            .iter()
            .position(|p| p.id == post_id)
            .ok_or_else(|| StorageError::NotFound(post_id.to_string()))
    }

    fn remove(&mut self, index: usize) {
        let post = self.posts.remove(index);
        self.likes.retain(|(id, _)| *id != post.id);
    }

    fn refresh_likes(&mut self, index: usize) -> u64 {
        let id = &self.posts[index].id;
        let count = self.likes.iter().filter(|(post, _)| post == id).count() as u64;
        self.posts[index].likes = count;
        count
    }
}

/// Process-local post storage.
#[derive(Debug, Default)]
pub struct MemoryPostRepository {
    inner: RwLock<Inner>,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, StorageError> {
        let post = Post {
            id: Uuid::new_v4().to_string(),
            user_id: post.user_id,
            user_display_name: post.user_display_name,
            content: post.content,
            published_at: Utc::now(),
            likes: 0,
            user_email: post.user_email,
        };

        self.inner.write().await.posts.push(post.clone());
        Ok(post)
    }

    async fn delete_own(&self, post_id: &str, user_id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let index = inner.position(post_id)?;
        if inner.posts[index].user_id != user_id {
            return Err(StorageError::NotOwner);
        }
        inner.remove(index);
        Ok(())
    }

    async fn delete_any(&self, post_id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let index = inner.position(post_id)?;
        inner.remove(index);
        Ok(())
    }

    async fn like(&self, post_id: &str, user_id: &str) -> Result<u64, StorageError> {
        let mut inner = self.inner.write().await;
        let index = inner.position(post_id)?;
        inner
            .likes
            .insert((post_id.to_string(), user_id.to_string()));
        Ok(inner.refresh_likes(index))
    }

    async fn unlike(&self, post_id: &str, user_id: &str) -> Result<u64, StorageError> {
        let mut inner = self.inner.write().await;
        let index = inner.position(post_id)?;
        inner
            .likes
            .remove(&(post_id.to_string(), user_id.to_string()));
        Ok(inner.refresh_likes(index))
    }

    async fn newest(&self, limit: usize) -> Result<Vec<Post>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.posts.iter().rev().take(limit).cloned().collect())
    }

    async fn newest_before(&self, post_id: &str, limit: usize) -> Result<Vec<Post>, StorageError> {
        let inner = self.inner.read().await;
        let index = inner.position(post_id)?;
        Ok(inner.posts[..index].iter().rev().take(limit).cloned().collect())
    }
}
