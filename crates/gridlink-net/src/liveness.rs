//! Heartbeat bookkeeping: round-trip latency from ping/pong pairs.
//!
//! The protocol's ping carries no sequence number, so at most one
//! measurement is outstanding. A new ping replaces an unanswered one.

use std::time::Duration;

use tokio::time::Instant;

/// Tracks the outstanding ping and the most recent round-trip time.
#[derive(Debug, Default)]
pub struct LivenessMonitor {
    last_ping_sent_at: Option<Instant>,
    latest_latency: Option<Duration>,
    pings_sent: u64,
    pongs_received: u64,
}

impl LivenessMonitor {
    /// Create a monitor with no measurements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a ping was written to the transport at `now`.
    pub fn on_ping_sent(&mut self, now: Instant) {
        if self.last_ping_sent_at.is_some() {
            tracing::trace!("previous ping unanswered, restarting measurement");
        }
        self.last_ping_sent_at = Some(now);
        self.pings_sent += 1;
    }

    /// Record a pong received at `now` and return the measured latency.
    ///
    /// Returns `None` for a pong with no outstanding ping.
    pub fn on_pong(&mut self, now: Instant) -> Option<Duration> {
        let Some(sent_at) = self.last_ping_sent_at.take() else {
            tracing::debug!("pong without outstanding ping ignored");
            return None;
        };
        let rtt = now.saturating_duration_since(sent_at);
        self.latest_latency = Some(rtt);
        self.pongs_received += 1;
        Some(rtt)
    }

    /// Most recent round-trip time in whole milliseconds.
    pub fn latest_latency_ms(&self) -> Option<u64> {
        self.latest_latency
            .map(|rtt| u64::try_from(rtt.as_millis()).unwrap_or(u64::MAX))
    }

    /// Whether a ping is waiting for its pong.
    pub fn has_outstanding_ping(&self) -> bool {
        self.last_ping_sent_at.is_some()
    }

    /// Total pings recorded this session.
    pub fn pings_sent(&self) -> u64 {
        self.pings_sent
    }

    /// Total pongs matched this session.
    pub fn pongs_received(&self) -> u64 {
        self.pongs_received
    }

    /// Forget all measurements. Called when a session starts or ends.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
