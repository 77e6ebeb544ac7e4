//! Replay of captured notification logs through a simulated die
//!
//! A log holds one hex-encoded notification frame per line. Blank lines and
//! lines starting with `#` are skipped, and whitespace inside a frame is
//! ignored, so `53 c0 00 16` and `53c00016` are the same frame.

use anyhow::{Context, Result};
use godice_core::Color;
use godice_session::{memory_transport, DieSession, OrientationUpdate, SessionConfig, SessionError};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Outcome of a replay
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub frames: usize,
    pub updates: Vec<OrientationUpdate>,
    pub battery: Option<u8>,
    pub color: Option<Color>,
}

/// Parse a frame log
pub fn parse_frame_log(content: &str) -> Result<Vec<Vec<u8>>> {
    let mut frames = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let compact: String = line.split_whitespace().collect();
        let frame = hex::decode(&compact)
            .with_context(|| format!("Invalid hex frame on line {}", number + 1))?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Push `frames` through a session and collect what it produces.
///
/// With `query` set, a battery and a color request are issued before the
/// first frame, so `Bat`/`Col` frames in the log can answer them.
pub async fn replay_frames(
    frames: Vec<Vec<u8>>,
    config: SessionConfig,
    query: bool,
) -> Result<ReplayReport> {
    let (transport, mut device) = memory_transport();
    let session = DieSession::with_config(transport, config);
    session.connect().await?;

    let mut updates = session.subscribe_orientation_channel().await?;
    let collector = tokio::spawn(async move {
        let mut collected = Vec::new();
        while let Some(update) = updates.recv().await {
            collected.push(update);
        }
        collected
    });

    let mut queries = None;
    if query {
        let battery = tokio::spawn({
            let session = session.clone();
            async move { session.get_battery().await }
        });
        // The request is pending once its frame has been written
        device.next_write().await;
        let color = tokio::spawn({
            let session = session.clone();
            async move { session.get_color().await }
        });
        device.next_write().await;
        queries = Some((battery, color));
    }

    let mut report = ReplayReport {
        frames: frames.len(),
        ..ReplayReport::default()
    };

    for frame in frames {
        device.notify(frame).await?;
    }

    session.disconnect().await?;
    session.unsubscribe_orientation().await?;
    report.updates = collector.await?;

    if let Some((battery, color)) = queries {
        report.battery = answered(battery.await?, "battery");
        report.color = answered(color.await?, "color");
    }

    info!(
        frames = report.frames,
        updates = report.updates.len(),
        "Replay finished"
    );
    Ok(report)
}

fn answered<T>(result: Result<T, SessionError>, kind: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(SessionError::Disconnected) => {
            debug!(kind = kind, "Log did not answer request");
            None
        }
        Err(e) => {
            warn!(kind = kind, error = %e, "Request failed during replay");
            None
        }
    }
}
