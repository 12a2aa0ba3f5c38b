use prometheus::{Encoder, TextEncoder, HistogramVec, IntCounterVec, GaugeVec, Opts, Registry};
use warp::{Filter, Rejection, Reply};
use std::net::SocketAddr;
use std::sync::Mutex;
use once_cell::sync::Lazy;

use crate::prober::ProbeOutcome;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static RTT_GAUGE: Lazy<GaugeVec> = Lazy::new(|| {
    let opts = Opts::new("ping_rtt_milliseconds_current", "Round-trip time of the latest echo reply in milliseconds");
    let gauge = GaugeVec::new(opts, &["target"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

static PROBE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("ping_probes_total", "Total number of echo requests sent");
    let ctr = IntCounterVec::new(opts, &["target"]).unwrap();
    REGISTRY.register(Box::new(ctr.clone())).unwrap();
    ctr
});

static FAILURE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("ping_failures_total", "Total number of failed echo requests by reason");
    let ctr = IntCounterVec::new(opts, &["target", "reason"]).unwrap();
    REGISTRY.register(Box::new(ctr.clone())).unwrap();
    ctr
});

// Only registered when latency history is enabled
static RTT_HISTOGRAM: Lazy<Mutex<Option<HistogramVec>>> = Lazy::new(|| Mutex::new(None));

pub fn initialize_metrics(enable_latency_history: bool) {
    if !enable_latency_history {
        return;
    }
    let mut guard = match RTT_HISTOGRAM.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if guard.is_some() {
        return;
    }

    let opts = Opts::new("ping_rtt_milliseconds", "Round-trip time in milliseconds");
    let hist = HistogramVec::new(
        prometheus::HistogramOpts {
            common_opts: opts,
            buckets: vec![
                0.05, 0.1, 0.2, 0.5, 1.0,
                2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0
            ],
        },
        &["target"],
    ).expect("creating histogram");

    REGISTRY.register(Box::new(hist.clone())).unwrap();
    *guard = Some(hist);
}

pub async fn serve_metrics(addr: SocketAddr) {
    warp::serve(metrics_route()).run(addr).await;
}

fn metrics_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("metrics").map(|| {
        warp::http::Response::builder()
            .header("Content-Type", TextEncoder::new().format_type())
            .body(gather_text())
            .unwrap()
    })
}

/// Current registry contents in the Prometheus text format.
pub fn gather_text() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let mf = REGISTRY.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&mf, &mut buf) {
        tracing::error!("failed to encode metrics: {}", e);
    }
    buf
}

pub fn observe_outcome(target: &str, outcome: &ProbeOutcome) {
    PROBE_COUNTER.with_label_values(&[target]).inc();

    match outcome {
        ProbeOutcome::Success { rtt } => {
            let rtt_ms = rtt * 1000.0;
            RTT_GAUGE.with_label_values(&[target]).set(rtt_ms);

            if let Ok(guard) = RTT_HISTOGRAM.lock() {
                if let Some(ref hist) = *guard {
                    hist.with_label_values(&[target]).observe(rtt_ms);
                }
            }
        }
        ProbeOutcome::Failure { reason } => {
            FAILURE_COUNTER
                .with_label_values(&[target, reason.as_str()])
                .inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exposition() -> String {
        String::from_utf8(gather_text()).unwrap()
    }

    #[test]
    fn records_replies_and_failures() {
        observe_outcome("metrics-a", &ProbeOutcome::Success { rtt: 0.25 });
        observe_outcome("metrics-a", &ProbeOutcome::Failure { reason: "Request timed out".into() });

        let text = exposition();
        assert!(text.contains(r#"ping_probes_total{target="metrics-a"} 2"#), "{}", text);
        assert!(text.contains(r#"ping_rtt_milliseconds_current{target="metrics-a"} 250"#), "{}", text);
        assert!(
            text.contains(r#"ping_failures_total{reason="Request timed out",target="metrics-a"} 1"#),
            "{}",
            text
        );
    }

    #[test]
    fn history_histogram_is_opt_in() {
        initialize_metrics(true);
        initialize_metrics(true);
        observe_outcome("metrics-b", &ProbeOutcome::Success { rtt: 0.003 });

        let text = exposition();
        assert!(text.contains(r#"ping_rtt_milliseconds_count{target="metrics-b"} 1"#), "{}", text);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_registry() {
        observe_outcome("metrics-c", &ProbeOutcome::Success { rtt: 0.5 });

        let resp = warp::test::request().path("/metrics").reply(&metrics_route()).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()["content-type"],
            TextEncoder::new().format_type()
        );
        let body = String::from_utf8(resp.body().to_vec()).unwrap();
        assert!(body.contains(r#"ping_probes_total{target="metrics-c"} 1"#), "{}", body);
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let resp = warp::test::request().path("/").reply(&metrics_route()).await;
        assert_eq!(resp.status(), 404);
    }
}
