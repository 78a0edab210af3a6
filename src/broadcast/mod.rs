//! Broadcast Module
//!
//! Fan-out of post events to every open event-stream connection.
//!
//! # Message Flow
//! 1. A client opens `GET /api/events`; the handler subscribes and spawns a
//!    [`ConnectionPump`] for it.
//! 2. A mutation handler commits to storage, builds an [`EventEnvelope`] and
//!    calls [`Broadcaster::publish`], which only appends to in-memory queues.
//! 3. Each pump writes its queued messages (or a heartbeat) to its own stream
//!    and deregisters itself when the stream dies.
//!
//! Delivery is best-effort: there is no replay for late or reconnecting
//! subscribers.

pub mod envelope;
pub mod pump;
pub mod registry;

pub use envelope::{normalize_line_breaks, sse_frame, EventEnvelope, EventKind, PING, PING_FRAME};
pub use pump::{
    ChannelSink, ConnectionPump, FrameSink, HeartbeatPolicy, PumpExit, PumpState, WriterSink,
};
pub use registry::{Broadcaster, Message, SubscriberId, Subscription};
