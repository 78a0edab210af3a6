//! Per-connection pump loop.
//!
//! Each open event stream gets one [`ConnectionPump`] running as its own task.
//! The pump waits on whichever comes first of: shutdown, peer disconnect, a
//! queued message, or a heartbeat tick. Queued messages are written in
//! arrival order; after enough empty ticks a `PING` event is written instead.
//! Any write failure ends the connection and deregisters the subscriber.

use std::time::Duration;

use async_trait::async_trait;
use axum::response::sse::Event;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::envelope::{normalize_line_breaks, sse_frame, PING};
use super::registry::{Message, Subscription};
use crate::error::TransmitError;

// == Heartbeat Policy ==
/// How often the pump wakes up and how many quiet wake-ups precede a ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    /// Scheduling resolution of the pump loop
    pub tick: Duration,
    /// Consecutive empty ticks before a ping is written
    pub idle_ticks: u32,
}

impl HeartbeatPolicy {
    pub fn new(tick: Duration, idle_ticks: u32) -> Self {
        Self { tick, idle_ticks }
    }

    /// Quiet time after which a ping goes out.
    pub fn idle_window(&self) -> Duration {
        self.tick * self.idle_ticks.max(1)
    }
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            idle_ticks: 5,
        }
    }
}

// == States ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Draining,
    Pinging,
    Closed,
}

/// Why a pump loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The peer went away
    Disconnected,
    /// A write failed or wrote nothing
    WriteFailed,
    /// The server is shutting down
    Shutdown,
    /// The subscriber was removed from the registry by someone else
    Removed,
}

// == Frame Sink ==
/// Outbound byte stream of one connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Writes one message as a single event and flushes it.
    async fn send_data(&mut self, data: &str) -> Result<(), TransmitError>;

    /// Resolves once the peer is known to be gone. May never resolve.
    async fn closed(&mut self);
}

/// Sink feeding the bounded channel behind an axum [`Sse`](axum::response::sse::Sse)
/// response.
///
/// The receiver is dropped when the client disconnects, which both fails
/// later sends and resolves [`FrameSink::closed`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    events: mpsc::Sender<Event>,
}

impl ChannelSink {
    pub fn new(events: mpsc::Sender<Event>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_data(&mut self, data: &str) -> Result<(), TransmitError> {
        // Event::data splits on LF; a stray CR would make it panic
        let event = Event::default().data(normalize_line_breaks(data));
        self.events
            .send(event)
            .await
            .map_err(|_| TransmitError::Closed)
    }

    async fn closed(&mut self) {
        self.events.closed().await
    }
}

/// Sink over any async writer. A write that accepts zero bytes is a failure.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> FrameSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_data(&mut self, data: &str) -> Result<(), TransmitError> {
        let frame = sse_frame(data);
        let mut remaining = frame.as_bytes();
        while !remaining.is_empty() {
            let written = self.writer.write(remaining).await?;
            if written == 0 {
                return Err(TransmitError::ZeroWrite);
            }
            remaining = &remaining[written..];
        }
        self.writer.flush().await?;
        Ok(())
    }

    async fn closed(&mut self) {
        // A plain writer only reports disconnects through failed writes
        std::future::pending::<()>().await
    }
}

/// Resolves once shutdown was requested or its sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

// == Connection Pump ==
enum Wake {
    Shutdown,
    Disconnected,
    Removed,
    Message(Message),
    Tick,
}

/// Moves one subscriber's queued messages onto its stream.
pub struct ConnectionPump<S> {
    subscription: Subscription,
    sink: S,
    policy: HeartbeatPolicy,
    shutdown: watch::Receiver<bool>,
    state: PumpState,
    idle_ticks: u32,
}

impl<S: FrameSink> ConnectionPump<S> {
    pub fn new(
        subscription: Subscription,
        sink: S,
        policy: HeartbeatPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            subscription,
            sink,
            policy,
            shutdown,
            state: PumpState::Idle,
            idle_ticks: 0,
        }
    }

    /// Runs until the connection closes, then deregisters the subscriber.
    pub async fn run(&mut self) -> PumpExit {
        let subscriber = self.subscription.id().clone();
        debug!(subscriber = %subscriber, "Event stream pump started");

        let exit = self.pump().await;

        let last_state = self.state;
        self.enter(PumpState::Closed);
        self.subscription.close();
        match exit {
            PumpExit::WriteFailed => {
                warn!(subscriber = %subscriber, ?last_state, "Event stream closed after write failure")
            }
            PumpExit::Shutdown => {
                info!(subscriber = %subscriber, ?last_state, "Event stream closed for shutdown")
            }
            _ => debug!(subscriber = %subscriber, ?exit, "Event stream closed"),
        }
        exit
    }

    fn enter(&mut self, state: PumpState) {
        trace!(subscriber = %self.subscription.id(), from = ?self.state, to = ?state, "Pump state");
        self.state = state;
    }

    async fn pump(&mut self) -> PumpExit {
        let ping_after = self.policy.idle_ticks.max(1);
        let mut ticker = interval_at(Instant::now() + self.policy.tick, self.policy.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wake = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => Wake::Shutdown,
                _ = self.sink.closed() => Wake::Disconnected,
                message = self.subscription.next() => match message {
                    Some(message) => Wake::Message(message),
                    None => Wake::Removed,
                },
                _ = ticker.tick() => Wake::Tick,
            };

            match wake {
                Wake::Shutdown => return PumpExit::Shutdown,
                Wake::Disconnected => return PumpExit::Disconnected,
                Wake::Removed => return PumpExit::Removed,
                Wake::Message(first) => {
                    self.enter(PumpState::Draining);
                    let mut batch = vec![first];
                    batch.extend(self.subscription.drain());

                    for message in batch {
                        if let Err(exit) = self.deliver(&message).await {
                            return exit;
                        }
                    }

                    self.idle_ticks = 0;
                    self.enter(PumpState::Idle);
                }
                Wake::Tick => {
                    self.idle_ticks += 1;
                    if self.idle_ticks < ping_after {
                        continue;
                    }

                    self.enter(PumpState::Pinging);
                    if let Err(exit) = self.deliver(PING).await {
                        return exit;
                    }

                    self.idle_ticks = 0;
                    self.enter(PumpState::Idle);
                }
            }
        }
    }

    /// Writes one message. A peer that stops reading must not hold the pump
    /// past shutdown, so the write races the shutdown signal.
    async fn deliver(&mut self, data: &str) -> Result<(), PumpExit> {
        let sent = tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => return Err(PumpExit::Shutdown),
            sent = self.sink.send_data(data) => sent,
        };

        sent.map_err(|err| {
            warn!(subscriber = %self.subscription.id(), state = ?self.state, "Failed to write event: {err}");
            PumpExit::WriteFailed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{Broadcaster, EventEnvelope, PING_FRAME};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Sink that hands each complete frame to a channel.
    struct FrameRecorder {
        frames: mpsc::Sender<String>,
    }

    #[async_trait]
    impl FrameSink for FrameRecorder {
        async fn send_data(&mut self, data: &str) -> Result<(), TransmitError> {
            self.frames
                .send(sse_frame(data))
                .await
                .map_err(|_| TransmitError::Closed)
        }

        async fn closed(&mut self) {
            self.frames.closed().await
        }
    }

    fn recording_pump(
        broadcaster: &Broadcaster,
        policy: HeartbeatPolicy,
    ) -> (
        ConnectionPump<FrameRecorder>,
        mpsc::Receiver<String>,
        watch::Sender<bool>,
    ) {
        let (frames_tx, frames_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pump = ConnectionPump::new(
            broadcaster.subscribe(),
            FrameRecorder { frames: frames_tx },
            policy,
            shutdown_rx,
        );
        (pump, frames_rx, shutdown_tx)
    }

    /// Writer that accepts nothing.
    struct ZeroWriter;

    impl AsyncWrite for ZeroWriter {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(0))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_heartbeat_policy_default() {
        let policy = HeartbeatPolicy::default();
        assert_eq!(policy.tick, Duration::from_secs(1));
        assert_eq!(policy.idle_ticks, 5);
        assert_eq!(policy.idle_window(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_connection_pings_before_any_event() {
        let broadcaster = Broadcaster::new();
        let (mut pump, mut frames, _shutdown) =
            recording_pump(&broadcaster, HeartbeatPolicy::default());
        let task = tokio::spawn(async move { pump.run().await });

        let started = Instant::now();
        assert_eq!(frames.recv().await.as_deref(), Some(PING_FRAME));
        assert!(started.elapsed() >= Duration::from_secs(5));

        broadcaster.publish(&EventEnvelope::deleted_post("1"));
        assert_eq!(frames.recv().await.as_deref(), Some("data: delPost;1\n\n"));

        drop(frames);
        assert_eq!(task.await.unwrap(), PumpExit::Disconnected);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_resets_idle_countdown() {
        let broadcaster = Broadcaster::new();
        let (mut pump, mut frames, _shutdown) =
            recording_pump(&broadcaster, HeartbeatPolicy::default());
        let task = tokio::spawn(async move { pump.run().await });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        broadcaster.publish(&EventEnvelope::likes_updated("4"));
        assert_eq!(frames.recv().await.as_deref(), Some("data: updateLikes;4\n\n"));

        let after_event = Instant::now();
        assert_eq!(frames.recv().await.as_deref(), Some(PING_FRAME));
        assert!(after_event.elapsed() >= Duration::from_secs(4));

        drop(frames);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_queued_messages_are_written_in_order() {
        let broadcaster = Broadcaster::new();
        let (mut pump, mut frames, _shutdown) =
            recording_pump(&broadcaster, HeartbeatPolicy::default());

        for id in ["1", "2", "3"] {
            broadcaster.publish(&EventEnvelope::deleted_post(id));
        }
        let task = tokio::spawn(async move { pump.run().await });

        for id in ["1", "2", "3"] {
            assert_eq!(frames.recv().await.unwrap(), format!("data: delPost;{id}\n\n"));
        }

        drop(frames);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_removes_subscriber() {
        let broadcaster = Broadcaster::new();
        let writer = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
            .build();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut pump = ConnectionPump::new(
            broadcaster.subscribe(),
            WriterSink::new(writer),
            HeartbeatPolicy::default(),
            shutdown_rx,
        );

        assert_eq!(broadcaster.publish(&EventEnvelope::deleted_post("1")), 1);
        assert_eq!(pump.run().await, PumpExit::WriteFailed);

        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(broadcaster.publish(&EventEnvelope::deleted_post("2")), 0);
    }

    #[tokio::test]
    async fn test_zero_byte_write_is_a_failure() {
        let broadcaster = Broadcaster::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut pump = ConnectionPump::new(
            broadcaster.subscribe(),
            WriterSink::new(ZeroWriter),
            HeartbeatPolicy::default(),
            shutdown_rx,
        );

        broadcaster.publish(&EventEnvelope::deleted_post("1"));

        assert_eq!(pump.run().await, PumpExit::WriteFailed);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_writer_sink_writes_and_flushes_frames() {
        let writer = tokio_test::io::Builder::new()
            .write(b"data: newPost;{}\n\n")
            .write(PING_FRAME.as_bytes())
            .build();
        let mut sink = WriterSink::new(writer);

        sink.send_data("newPost;{}").await.unwrap();
        sink.send_data(PING).await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_sink_keeps_multi_line_data_in_one_event() {
        let writer = tokio_test::io::Builder::new()
            .write(b"data: delPost;1\ndata: \ndata: data: forged\n\n")
            .build();
        let mut sink = WriterSink::new(writer);

        sink.send_data("delPost;1\n\ndata: forged").await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_sink_accepts_carriage_returns() {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let mut sink = ChannelSink::new(events_tx);

        sink.send_data("delPost;1\r\n\rforged").await.unwrap();

        assert!(events_rx.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_unblocks_idle_pump() {
        let broadcaster = Broadcaster::new();
        let (mut pump, _frames, shutdown) =
            recording_pump(&broadcaster, HeartbeatPolicy::default());
        let task = tokio::spawn(async move { pump.run().await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.send(true).unwrap();

        assert_eq!(task.await.unwrap(), PumpExit::Shutdown);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_unblocks_pump_stuck_on_full_stream() {
        let broadcaster = Broadcaster::new();
        // Receiver kept alive but never read: the second send parks
        let (events_tx, _events_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut pump = ConnectionPump::new(
            broadcaster.subscribe(),
            ChannelSink::new(events_tx),
            HeartbeatPolicy::default(),
            shutdown_rx,
        );

        for id in ["1", "2", "3"] {
            broadcaster.publish(&EventEnvelope::deleted_post(id));
        }
        let task = tokio::spawn(async move { pump.run().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(broadcaster.subscriber_count(), 1);

        shutdown_tx.send(true).unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("pump should stop on shutdown")
            .unwrap();
        assert_eq!(exit, PumpExit::Shutdown);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_unblocks_idle_pump() {
        let broadcaster = Broadcaster::new();
        let (mut pump, frames, _shutdown) = recording_pump(
            &broadcaster,
            HeartbeatPolicy::new(Duration::from_secs(3600), 5),
        );
        let task = tokio::spawn(async move { pump.run().await });

        drop(frames);

        assert_eq!(task.await.unwrap(), PumpExit::Disconnected);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_external_removal_ends_pump() {
        let broadcaster = Broadcaster::new();
        let (mut pump, _frames, _shutdown) = recording_pump(
            &broadcaster,
            HeartbeatPolicy::new(Duration::from_secs(3600), 5),
        );
        let id = pump.subscription.id().clone();
        let task = tokio::spawn(async move { pump.run().await });

        broadcaster.unsubscribe(&id);

        assert_eq!(task.await.unwrap(), PumpExit::Removed);
    }
}
