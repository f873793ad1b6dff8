use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Queue message outcomes (persisted, dead-lettered by reason)
// - Storage errors and save retries
// - Dead-letter publishing, including failed publishes
// - Cache hits, misses, evictions and size
// - HTTP read path requests and latency
//
// The registry is owned by `Metrics` and passed around explicitly, so tests
// can build as many independent instances as they like.
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Pipeline Metrics
    pub messages_processed: IntCounterVec,
    pub message_processing_duration: Histogram,

    // Storage & Retry Metrics
    pub db_errors: IntCounterVec,
    pub retry_attempts_total: IntCounterVec,
    pub retry_outcome: IntCounterVec,

    // DLQ Metrics
    pub dlq_messages: IntCounterVec,
    pub dlq_publish_failures: IntCounter,

    // Cache Metrics
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub cache_evictions: IntCounter,
    pub cache_size: IntGauge,

    // HTTP Metrics
    pub http_requests: IntCounterVec,
    pub http_request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Pipeline Metrics
        let messages_processed = IntCounterVec::new(
            Opts::new("kafka_messages_processed_total", "Queue messages by terminal outcome"),
            &["status"],
        )?;
        registry.register(Box::new(messages_processed.clone()))?;

        let message_processing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "message_processing_duration_seconds",
                "Time from fetch to terminal outcome for one message",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )?;
        registry.register(Box::new(message_processing_duration.clone()))?;

        // Storage & Retry Metrics
        let db_errors = IntCounterVec::new(
            Opts::new("db_errors_total", "Storage errors by operation"),
            &["operation"],
        )?;
        registry.register(Box::new(db_errors.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Failed attempts that were eligible for retry"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_outcome = IntCounterVec::new(
            Opts::new("retry_outcome_total", "Final outcome of retried operations"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(retry_outcome.clone()))?;

        // DLQ Metrics
        let dlq_messages = IntCounterVec::new(
            Opts::new("dlq_messages_total", "Messages published to the dead-letter topic"),
            &["reason"],
        )?;
        registry.register(Box::new(dlq_messages.clone()))?;

        let dlq_publish_failures = IntCounter::new(
            "dlq_publish_failures_total",
            "Messages committed even though the dead-letter publish failed",
        )?;
        registry.register(Box::new(dlq_publish_failures.clone()))?;

        // Cache Metrics
        let cache_hits = IntCounter::new("cache_hits_total", "Cache lookups that found the key")?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses = IntCounter::new("cache_misses_total", "Cache lookups that missed")?;
        registry.register(Box::new(cache_misses.clone()))?;

        let cache_evictions = IntCounter::new(
            "cache_evictions_total",
            "Entries evicted as least recently used",
        )?;
        registry.register(Box::new(cache_evictions.clone()))?;

        let cache_size = IntGauge::new("cache_size_items", "Entries currently cached")?;
        registry.register(Box::new(cache_size.clone()))?;

        // HTTP Metrics
        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by handler and status"),
            &["handler", "status"],
        )?;
        registry.register(Box::new(http_requests.clone()))?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration"),
            &["handler"],
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            registry,
            messages_processed,
            message_processing_duration,
            db_errors,
            retry_attempts_total,
            retry_outcome,
            dlq_messages,
            dlq_publish_failures,
            cache_hits,
            cache_misses,
            cache_evictions,
            cache_size,
            http_requests,
            http_request_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    /// Helper to record the terminal outcome of one queue message
    pub fn record_message_processed(&self, status: &str, duration_secs: f64) {
        self.messages_processed.with_label_values(&[status]).inc();
        self.message_processing_duration.observe(duration_secs);
    }

    /// Helper to record a storage error
    pub fn record_db_error(&self, operation: &str) {
        self.db_errors.with_label_values(&[operation]).inc();
    }

    /// Helper to record a failed, retry-eligible attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        let attempt = attempt.to_string();
        self.retry_attempts_total
            .with_label_values(&[operation, attempt.as_str()])
            .inc();
    }

    /// Helper to record retry outcome
    pub fn record_retry_outcome(&self, operation: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.retry_outcome.with_label_values(&[operation, outcome]).inc();
    }

    /// Helper to record a dead-lettered message
    pub fn record_dlq_message(&self, reason: &str) {
        self.dlq_messages.with_label_values(&[reason]).inc();
    }

    pub fn record_dlq_publish_failure(&self) {
        self.dlq_publish_failures.inc();
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.inc();
        } else {
            self.cache_misses.inc();
        }
    }

    pub fn record_cache_eviction(&self) {
        self.cache_evictions.inc();
    }

    pub fn set_cache_size(&self, size: usize) {
        self.cache_size.set(size as i64);
    }

    pub fn record_http_request(&self, handler: &str, status: u16) {
        let status = status.to_string();
        self.http_requests
            .with_label_values(&[handler, status.as_str()])
            .inc();
    }
}
