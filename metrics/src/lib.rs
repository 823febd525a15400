pub mod server;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

pub type SharedMetrics = Arc<Metrics>;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    peers: IntGauge,
    peer_connection_events: IntCounterVec,
    peer_disconnection_events: IntCounterVec,
    // Sync
    local_head_number: IntGauge,
    headers_imported: IntCounter,
    sync_tasks: IntCounterVec,
    active_sync_tasks: IntGauge,
    header_requests: IntCounterVec,
    request_timeouts: IntCounter,
    batch_fetch_time: HistogramVec,
    // Chain
    chain_reorgs: IntCounter,
    chain_reorg_depth: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let peers = IntGauge::with_opts(Opts::new("les_peers_connected", "Number of connected LES peers")).unwrap();
        registry.register(Box::new(peers.clone())).unwrap();

        // Network
        let peer_connection_events = IntCounterVec::new(
            Opts::new("les_peer_connection_events_total", "Total number of peer connection events"),
            &["direction", "result"],
        ).unwrap();
        registry.register(Box::new(peer_connection_events.clone())).unwrap();

        let peer_disconnection_events = IntCounterVec::new(
            Opts::new("les_peer_disconnection_events_total", "Total number of peer disconnection events"),
            &["reason"],
        ).unwrap();
        registry.register(Box::new(peer_disconnection_events.clone())).unwrap();

        // Sync
        let local_head_number = IntGauge::with_opts(Opts::new("les_local_head_number", "Block number of the local canonical head")).unwrap();
        registry.register(Box::new(local_head_number.clone())).unwrap();

        let headers_imported = IntCounter::with_opts(Opts::new("les_headers_imported_total", "Total number of headers written to the store")).unwrap();
        registry.register(Box::new(headers_imported.clone())).unwrap();

        let sync_tasks = IntCounterVec::new(
            Opts::new("les_sync_tasks_total", "Total number of finished sync tasks"),
            &["outcome"],
        ).unwrap();
        registry.register(Box::new(sync_tasks.clone())).unwrap();

        let active_sync_tasks = IntGauge::with_opts(Opts::new("les_sync_tasks_active", "Number of running sync tasks")).unwrap();
        registry.register(Box::new(active_sync_tasks.clone())).unwrap();

        let header_requests = IntCounterVec::new(
            Opts::new("les_header_requests_total", "Total number of GetBlockHeaders requests"),
            &["result"],
        ).unwrap();
        registry.register(Box::new(header_requests.clone())).unwrap();

        let request_timeouts = IntCounter::with_opts(Opts::new("les_request_timeouts_total", "Total number of header requests that timed out")).unwrap();
        registry.register(Box::new(request_timeouts.clone())).unwrap();

        let batch_fetch_time = HistogramVec::new(
            HistogramOpts::new("les_batch_fetch_time_seconds", "Time taken to fetch and validate a header batch")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &[],
        ).unwrap();
        registry.register(Box::new(batch_fetch_time.clone())).unwrap();

        // Chain
        let chain_reorgs = IntCounter::with_opts(Opts::new("les_chain_reorgs_total", "Total number of canonical chain reorgs")).unwrap();
        registry.register(Box::new(chain_reorgs.clone())).unwrap();

        let chain_reorg_depth = HistogramVec::new(
            HistogramOpts::new("les_chain_reorg_depth", "Depth of canonical chain reorgs (in blocks)")
                .buckets(vec![1.0, 2.0, 3.0, 5.0, 7.0, 10.0, 20.0, 30.0, 50.0, 100.0]),
            &[],
        ).unwrap();
        registry.register(Box::new(chain_reorg_depth.clone())).unwrap();

        Self {
            registry,
            peers,
            peer_connection_events,
            peer_disconnection_events,
            local_head_number,
            headers_imported,
            sync_tasks,
            active_sync_tasks,
            header_requests,
            request_timeouts,
            batch_fetch_time,
            chain_reorgs,
            chain_reorg_depth,
        }
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer).expect("failed to encode metrics");
        String::from_utf8(buffer).expect("metrics not utf8")
    }

    pub fn set_peers(&self, v: i64) {
        self.peers.set(v);
    }

    // Network
    pub fn inc_peer_connection(&self, direction: &str, result: &str) {
        self.peer_connection_events.with_label_values(&[direction, result]).inc();
    }

    pub fn inc_peer_disconnection(&self, reason: &str) {
        self.peer_disconnection_events.with_label_values(&[reason]).inc();
    }

    // Sync
    pub fn set_local_head_number(&self, v: u64) {
        self.local_head_number.set(i64::try_from(v).unwrap_or(i64::MAX));
    }

    pub fn inc_headers_imported(&self, count: u64) {
        self.headers_imported.inc_by(count);
    }

    pub fn inc_sync_task(&self, outcome: &str) {
        self.sync_tasks.with_label_values(&[outcome]).inc();
    }

    pub fn set_active_sync_tasks(&self, v: i64) {
        self.active_sync_tasks.set(v);
    }

    pub fn inc_header_request(&self, result: &str) {
        self.header_requests.with_label_values(&[result]).inc();
    }

    pub fn inc_request_timeouts(&self, count: u64) {
        self.request_timeouts.inc_by(count);
    }

    pub fn observe_batch_fetch_time(&self, seconds: f64) {
        self.batch_fetch_time.with_label_values::<&str>(&[]).observe(seconds);
    }

    // Chain
    pub fn inc_chain_reorgs(&self) {
        self.chain_reorgs.inc();
    }

    pub fn observe_chain_reorg_depth(&self, depth: f64) {
        self.chain_reorg_depth.with_label_values::<&str>(&[]).observe(depth);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_reports_sync_counters() {
        let metrics = Metrics::new();
        metrics.set_local_head_number(42);
        metrics.inc_headers_imported(10);
        metrics.inc_sync_task("committed");
        metrics.inc_chain_reorgs();

        let text = metrics.gather();
        assert!(text.contains("les_local_head_number 42"));
        assert!(text.contains("les_headers_imported_total 10"));
        assert!(text.contains("les_sync_tasks_total{outcome=\"committed\"} 1"));
        assert!(text.contains("les_chain_reorgs_total 1"));
    }

    #[test]
    fn test_unlabelled_histograms_observe() {
        let metrics = Metrics::new();
        metrics.observe_batch_fetch_time(0.02);
        metrics.observe_chain_reorg_depth(3.0);

        let text = metrics.gather();
        assert!(text.contains("les_batch_fetch_time_seconds_count 1"));
        assert!(text.contains("les_chain_reorg_depth_count 1"));
    }
}
