use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Serialize;

use crate::prober::ProbeOutcome;

/// Summary of a finished (or interrupted) run. All times in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatistics {
    pub destination: String,
    pub address: Ipv4Addr,
    pub transmitted: u32,
    pub received: u32,
    pub packet_loss_percent: u32,
    pub elapsed_ms: f64,
    pub rtt_min_ms: f64,
    pub rtt_avg_ms: f64,
    pub rtt_max_ms: f64,
    pub rtt_mdev_ms: f64,
}

impl RunStatistics {
    /// `transmitted` counts attempted probes, which may exceed the number of
    /// collected outcomes when a probe was cut short.
    pub fn compute(
        destination: &str,
        address: Ipv4Addr,
        transmitted: u32,
        outcomes: &[ProbeOutcome],
        elapsed: Duration,
    ) -> Self {
        let rtts: Vec<f64> = outcomes.iter().filter_map(ProbeOutcome::rtt).collect();
        let received = rtts.len() as u32;
        let packet_loss_percent = if transmitted == 0 {
            0
        } else {
            transmitted.saturating_sub(received) * 100 / transmitted
        };

        let (rtt_min_ms, rtt_avg_ms, rtt_max_ms, rtt_mdev_ms) = if rtts.is_empty() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let n = rtts.len() as f64;
            let mean = rtts.iter().sum::<f64>() / n;
            let mean_sq = rtts.iter().map(|r| r * r).sum::<f64>() / n;
            // rounding can push the variance slightly below zero
            let mdev = (mean_sq - mean * mean).max(0.0).sqrt();
            let min = rtts.iter().copied().fold(f64::INFINITY, f64::min);
            let max = rtts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (min * 1000.0, mean * 1000.0, max * 1000.0, mdev * 1000.0)
        };

        Self {
            destination: destination.to_string(),
            address,
            transmitted,
            received,
            packet_loss_percent,
            elapsed_ms: elapsed.as_nanos() as f64 / 1_000_000.0,
            rtt_min_ms,
            rtt_avg_ms,
            rtt_max_ms,
            rtt_mdev_ms,
        }
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} ping statistics ---", self.destination)?;
        writeln!(
            f,
            "{} packets transmitted, {} packets received, {}% packet loss, time {}ms",
            self.transmitted,
            self.received,
            self.packet_loss_percent,
            self.elapsed_ms as u64
        )?;
        write!(
            f,
            "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            self.rtt_min_ms, self.rtt_avg_ms, self.rtt_max_ms, self.rtt_mdev_ms
        )
    }
}
