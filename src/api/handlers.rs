//! API Handlers
//!
//! HTTP request handlers for each endpoint. Mutation handlers commit to
//! storage first and only then publish an event to live subscribers.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    extract::{Path, State},
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONNECTION},
        StatusCode,
    },
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Extension, Json,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::auth::{
    Authenticator, Identity, IdentityVerifier, ModerationStore, StaticModeration,
    StaticTokenVerifier,
};
use crate::broadcast::{Broadcaster, ChannelSink, ConnectionPump, EventEnvelope, HeartbeatPolicy};
use crate::cache::{self, CacheStore, CachedValue, SharedCache};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{
    CheckResponse, CreatePostRequest, HealthResponse, PostIdRequest, StatsResponse,
};
use crate::posts::{MemoryPostRepository, NewPost, Post, PostRepository};

/// Events buffered between a pump and its HTTP response body.
const FRAME_BUFFER: usize = 16;

/// Page size of the post listing endpoints.
const PAGE_SIZE: usize = 10;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Short-TTL cache for tokens and permissions
    pub cache: SharedCache<CachedValue>,
    /// Open event-stream connections
    pub broadcaster: Broadcaster,
    /// Cached identity and permission checks
    pub auth: Authenticator,
    /// Post storage
    pub posts: Arc<dyn PostRepository>,
    /// Pump loop cadence for new connections
    pub heartbeat: HeartbeatPolicy,
    /// Flipped to true when the server shuts down
    pub shutdown: watch::Receiver<bool>,
    /// Largest accepted post content in bytes
    pub max_post_bytes: usize,
}

impl AppState {
    /// Creates state around explicit backends.
    pub fn new(
        config: &Config,
        verifier: Arc<dyn IdentityVerifier>,
        moderation: Arc<dyn ModerationStore>,
        posts: Arc<dyn PostRepository>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let cache = cache::shared(CacheStore::new());
        let auth = Authenticator::new(cache.clone(), verifier, moderation, config.auth_settings());

        Self {
            cache,
            broadcaster: Broadcaster::new(),
            auth,
            posts,
            heartbeat: config.heartbeat(),
            shutdown,
            max_post_bytes: config.max_post_bytes,
        }
    }

    /// Creates state with the built-in token table, moderation lists and
    /// in-memory post storage.
    pub fn from_config(config: &Config, shutdown: watch::Receiver<bool>) -> Self {
        let verifier = StaticTokenVerifier::from_entries(&config.auth_tokens);
        let moderation = StaticModeration::new(&config.admin_emails, &config.blacklisted_emails);
        Self::new(
            config,
            Arc::new(verifier),
            Arc::new(moderation),
            Arc::new(MemoryPostRepository::new()),
            shutdown,
        )
    }
}

/// Handler for GET /api/events
///
/// Registers a subscriber, spawns its pump loop and streams the events it
/// produces as `text/event-stream`. The pump ends when the client goes away
/// or the server shuts down, which in turn ends the response.
pub async fn events_handler(State(state): State<AppState>) -> Response {
    let subscription = state.broadcaster.subscribe();
    let (events_tx, mut events_rx) = mpsc::channel::<Event>(FRAME_BUFFER);
    let mut pump = ConnectionPump::new(
        subscription,
        ChannelSink::new(events_tx),
        state.heartbeat,
        state.shutdown.clone(),
    );

    tokio::spawn(async move {
        pump.run().await;
    });

    let events = stream! {
        while let Some(event) = events_rx.recv().await {
            yield Ok::<_, Infallible>(event);
        }
    };

    // Sse sets content-type and cache-control itself
    (
        [(CONNECTION, "keep-alive"), (ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Sse::new(events),
    )
        .into_response()
}

/// Handler for GET /api/check
pub async fn check_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<CheckResponse>> {
    let admin = state.auth.is_admin(&identity.email).await?;
    Ok(Json(CheckResponse { admin }))
}

/// Handler for POST /api/sendPost
///
/// Responds with the new post id and publishes `newPost`.
pub async fn create_post_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreatePostRequest>,
) -> Result<String> {
    if req.content.len() > state.max_post_bytes {
        return Err(ApiError::PayloadTooLarge);
    }
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let post = state
        .posts
        .create(NewPost {
            user_id: identity.uid,
            user_email: identity.email,
            user_display_name: identity.display_name,
            content: req.content,
        })
        .await?;

    info!(post_id = %post.id, "Post created");
    publish_new_post(&state.broadcaster, &post);

    Ok(post.id)
}

/// Handler for POST /api/deletePost
///
/// Moderators may delete any post, everyone else only their own.
pub async fn delete_post_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<PostIdRequest>,
) -> Result<StatusCode> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    if state.auth.is_admin(&identity.email).await? {
        state.posts.delete_any(&req.id).await?;
    } else {
        state.posts.delete_own(&req.id, &identity.uid).await?;
    }

    info!(post_id = %req.id, uid = %identity.uid, "Post deleted");
    state.broadcaster.publish(&EventEnvelope::deleted_post(req.id));

    Ok(StatusCode::OK)
}

/// Handler for POST /api/likePost
pub async fn like_post_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<PostIdRequest>,
) -> Result<StatusCode> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let likes = state.posts.like(&req.id, &identity.uid).await?;
    debug!(post_id = %req.id, likes, "Post liked");
    state.broadcaster.publish(&EventEnvelope::likes_updated(req.id));

    Ok(StatusCode::OK)
}

/// Handler for POST /api/unlikePost
pub async fn unlike_post_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<PostIdRequest>,
) -> Result<StatusCode> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let likes = state.posts.unlike(&req.id, &identity.uid).await?;
    debug!(post_id = %req.id, likes, "Post unliked");
    state.broadcaster.publish(&EventEnvelope::likes_updated(req.id));

    Ok(StatusCode::OK)
}

/// Handler for GET /api/tenNewestPosts
pub async fn newest_posts_handler(State(state): State<AppState>) -> Result<Json<Vec<Post>>> {
    Ok(Json(state.posts.newest(PAGE_SIZE).await?))
}

/// Handler for GET /api/getNextTenPosts/:postId
pub async fn next_posts_handler(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<Post>>> {
    Ok(Json(state.posts.newest_before(&post_id, PAGE_SIZE).await?))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.lock().await.stats();
    Json(StatsResponse::new(&stats, state.broadcaster.subscriber_count()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

fn publish_new_post(broadcaster: &Broadcaster, post: &Post) {
    match EventEnvelope::new_post(post) {
        Ok(envelope) => {
            broadcaster.publish(&envelope);
        }
        // The post is committed either way; live viewers just miss it
        Err(err) => warn!(post_id = %post.id, "Failed to serialize post event: {err}"),
    }
}
