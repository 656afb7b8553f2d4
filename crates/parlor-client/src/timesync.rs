use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use parlor_common::protocol::ClientMessage;

pub const SYNC_SAMPLES: usize = 5;
/// Spacing between probes, to avoid bursty correlated samples.
pub const SAMPLE_SPACING_MS: u64 = 100;
/// A pong that never arrives fails the batch instead of hanging it.
pub const PONG_TIMEOUT_MS: u64 = 1000;

/// Estimates the offset between the local clock and the server clock
/// from round-trip probe samples, so countdown displays agree across
/// clients.
///
/// Each sample: send `Ping` at local time t0, receive
/// `Pong(server_now)` at local time t1, estimate one-way latency as
/// rtt/2 and offset as `(server_now - t1) + latency`. The final offset
/// is the arithmetic mean over the batch.
pub struct TimeSync {
    offset_ms: f64,
    latency_ms: f64,
    synced: bool,
}

impl TimeSync {
    pub fn new() -> Self {
        Self {
            offset_ms: 0.0,
            latency_ms: 0.0,
            synced: false,
        }
    }

    /// False until the first full sample batch completes.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    /// Best-effort shared clock: local now plus the estimated offset.
    pub fn server_time_ms(&self) -> i64 {
        Utc::now().timestamp_millis() + self.offset_ms.round() as i64
    }

    /// Run one full probe batch. `pongs` must carry the server
    /// timestamps of `Pong` replies, routed here by the message pump.
    pub async fn sync(
        &mut self,
        tx: &mpsc::Sender<ClientMessage>,
        pongs: &mut mpsc::Receiver<i64>,
    ) -> anyhow::Result<()> {
        let mut samples = Vec::with_capacity(SYNC_SAMPLES);

        for i in 0..SYNC_SAMPLES {
            let t0 = Utc::now().timestamp_millis();
            tx.send(ClientMessage::Ping).await?;

            let server_now = timeout(Duration::from_millis(PONG_TIMEOUT_MS), pongs.recv())
                .await
                .map_err(|_| anyhow::anyhow!("clock-sync sample {} timed out", i + 1))?
                .ok_or_else(|| anyhow::anyhow!("pong channel closed"))?;

            let t1 = Utc::now().timestamp_millis();
            let rtt = (t1 - t0) as f64;
            self.latency_ms = rtt / 2.0;
            samples.push((server_now - t1) as f64 + self.latency_ms);

            if i + 1 < SYNC_SAMPLES {
                sleep(Duration::from_millis(SAMPLE_SPACING_MS)).await;
            }
        }

        self.offset_ms = samples.iter().sum::<f64>() / samples.len() as f64;
        self.synced = true;
        tracing::info!(
            "clock sync complete: offset {:.2} ms, latency {:.2} ms",
            self.offset_ms,
            self.latency_ms
        );
        Ok(())
    }
}

impl Default for TimeSync {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echo responder with a fixed artificial clock offset and no jitter.
    fn spawn_responder(
        offset_ms: i64,
        mut pings: mpsc::Receiver<ClientMessage>,
        pong_tx: mpsc::Sender<i64>,
    ) {
        tokio::spawn(async move {
            while let Some(msg) = pings.recv().await {
                if matches!(msg, ClientMessage::Ping) {
                    let skewed_now = Utc::now().timestamp_millis() + offset_ms;
                    if pong_tx.send(skewed_now).await.is_err() {
                        break;
                    }
                }
            }
        });
    }

    #[tokio::test]
    async fn test_offset_converges_on_skewed_server() {
        let injected = 1234i64;
        let (ping_tx, ping_rx) = mpsc::channel(8);
        let (pong_tx, mut pong_rx) = mpsc::channel(8);
        spawn_responder(injected, ping_rx, pong_tx);

        let mut sync = TimeSync::new();
        assert!(!sync.is_synced());
        sync.sync(&ping_tx, &mut pong_rx).await.unwrap();

        assert!(sync.is_synced());
        let error = (sync.offset_ms() - injected as f64).abs();
        assert!(error <= 5.0, "offset error {} ms too large", error);

        let drift = (sync.server_time_ms() - (Utc::now().timestamp_millis() + injected)).abs();
        assert!(drift <= 10);
    }

    #[tokio::test]
    async fn test_zero_offset_server() {
        let (ping_tx, ping_rx) = mpsc::channel(8);
        let (pong_tx, mut pong_rx) = mpsc::channel(8);
        spawn_responder(0, ping_rx, pong_tx);

        let mut sync = TimeSync::new();
        sync.sync(&ping_tx, &mut pong_rx).await.unwrap();
        assert!(sync.offset_ms().abs() <= 5.0);
        assert!(sync.latency_ms() >= 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_pong_times_out() {
        let (ping_tx, _ping_rx) = mpsc::channel(8);
        let (_pong_tx, mut pong_rx) = mpsc::channel::<i64>(8);

        let mut sync = TimeSync::new();
        let err = sync.sync(&ping_tx, &mut pong_rx).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(!sync.is_synced());
    }
}
