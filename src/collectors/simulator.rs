//! Synthetic line generator for demonstrations
//!
//! Bypasses the file tailer and feeds the classifier directly: mostly
//! healthy INFO lines with periodic plain-text panics and structured JSON
//! error records mixed in. Any producer of `RawLine` satisfies the rest of
//! the pipeline, and this is the simplest one.

use crate::events::RawLine;
use chrono::Utc;
use log::info;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Lines emitted between short pauses, to keep the rate high but bounded
const BURST_SIZE: u64 = 100;

/// Synthetic RawLine producer
pub struct Simulator {
    output: mpsc::Sender<RawLine>,
    shutdown: watch::Receiver<bool>,
}

impl Simulator {
    pub fn new(output: mpsc::Sender<RawLine>, shutdown: watch::Receiver<bool>) -> Self {
        Self { output, shutdown }
    }

    /// Generate the line with the given sequence number
    fn generate(seq: u64) -> String {
        if seq % 500 == 0 && seq > 0 {
            format!("panic!: Kernel panic at worker.rs:{}", seq)
        } else if seq % 700 == 0 && seq > 0 {
            format!(
                "{{\"level\": \"error\", \"service\": \"simulator\", \"msg\": \"Critical usage {}\"}}",
                seq
            )
        } else {
            format!("[INFO] System healthy {}", seq)
        }
    }

    /// Run until shutdown, producing lines at a steady high rate
    pub async fn run(mut self) {
        info!("Simulator started");
        let mut seq = 0u64;

        loop {
            for _ in 0..BURST_SIZE {
                let line = RawLine {
                    source_id: 0,
                    seq,
                    text: Self::generate(seq),
                    observed_at: Utc::now(),
                };
                seq += 1;
                if self.output.send(line).await.is_err() {
                    return;
                }
            }

            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = tokio::time::sleep(Duration::from_millis(1)) => {}
            }
        }

        info!("Simulator stopped after {} lines", seq);
    }
}
