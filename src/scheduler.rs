use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use anyhow::Result;
use tracing::{debug, info};

use crate::prober::icmp::{send_and_await, IcmpTransport};
use crate::prober::{ProbeOutcome, Target};
use crate::stats::RunStatistics;

pub struct Scheduler {
    count: u32,
    timeout: Duration,
}

impl Scheduler {
    pub fn new(count: u32, timeout_ms: u64) -> Result<Self> {
        Ok(Self {
            count,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Runs `count` probes back to back, one at a time.
    ///
    /// `open` is called for every probe and the transport is dropped once the
    /// probe ends. After a reply the loop sleeps out the rest of the timeout,
    /// so probes go out at most once per timeout period. Setting `cancel` to
    /// true stops the run, including mid-probe; statistics then cover what was
    /// attempted so far.
    pub async fn run<T, O, R>(
        &self,
        target: &Target,
        identifier: u16,
        mut open: O,
        mut cancel: watch::Receiver<bool>,
        mut report: R,
    ) -> Result<RunStatistics>
    where
        T: IcmpTransport,
        O: FnMut() -> Result<T>,
        R: FnMut(u32, &ProbeOutcome),
    {
        let start = Instant::now();
        let mut outcomes = Vec::new();
        let mut transmitted = 0;

        for seq in 1..=self.count {
            if *cancel.borrow() {
                break;
            }
            transmitted = seq;

            let mut transport = open()?;
            let probe = send_and_await(
                &mut transport,
                target.address,
                identifier,
                seq as u16,
                self.timeout,
            );
            let outcome = tokio::select! {
                outcome = probe => outcome,
                _ = cancelled(&mut cancel) => {
                    debug!(seq, "probe interrupted");
                    break;
                }
            };
            drop(transport);

            report(seq, &outcome);
            let pause = match &outcome {
                ProbeOutcome::Success { rtt } => self
                    .timeout
                    .saturating_sub(Duration::try_from_secs_f64(*rtt).unwrap_or_default()),
                ProbeOutcome::Failure { .. } => Duration::ZERO,
            };
            outcomes.push(outcome);

            if !pause.is_zero() {
                tokio::select! {
                    _ = sleep(pause) => {}
                    _ = cancelled(&mut cancel) => break,
                }
            }
        }

        if *cancel.borrow() {
            info!(transmitted, "run interrupted");
        }
        Ok(RunStatistics::compute(
            &target.host,
            target.address,
            transmitted,
            &outcomes,
            start.elapsed(),
        ))
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    // a dropped sender means nobody can interrupt us anymore
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
