// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order lifecycle transitions (created, confirmed, cancelled, delivered)
// - Stock movements caused by orders (reserved, restored)
// - Business rule rejections per service operation
// - Unit of work outcomes and durations
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub order_transitions: IntCounterVec,
    pub order_items_added: IntCounter,

    // Stock Metrics
    pub stock_units: IntCounterVec,

    // Service Metrics
    pub rule_violations: IntCounterVec,
    pub unit_of_work_outcomes: IntCounterVec,
    pub operation_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Metrics
        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Orders entering each status"),
            &["status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let order_items_added = IntCounter::new(
            "order_items_added_total",
            "Total successful add-item operations",
        )?;
        registry.register(Box::new(order_items_added.clone()))?;

        // Stock Metrics
        let stock_units = IntCounterVec::new(
            Opts::new("stock_units_total", "Stock units moved by orders"),
            &["direction"],
        )?;
        registry.register(Box::new(stock_units.clone()))?;

        // Service Metrics
        let rule_violations = IntCounterVec::new(
            Opts::new("rule_violations_total", "Operations rejected by a business rule"),
            &["operation"],
        )?;
        registry.register(Box::new(rule_violations.clone()))?;

        let unit_of_work_outcomes = IntCounterVec::new(
            Opts::new("unit_of_work_total", "Units of work by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(unit_of_work_outcomes.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new("operation_duration_seconds", "Service operation duration including retries")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            registry,
            order_transitions,
            order_items_added,
            stock_units,
            rule_violations,
            unit_of_work_outcomes,
            operation_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record an order reaching `status`
    pub fn record_order_transition(&self, status: &str) {
        self.order_transitions.with_label_values(&[status]).inc();
    }

    /// Helper to record an item added to an order along with its reservation
    pub fn record_item_added(&self, reserved_units: i64) {
        self.order_items_added.inc();
        self.record_stock_movement("reserved", reserved_units);
    }

    /// Helper to record stock units moving in `direction` ("reserved" or "restored")
    pub fn record_stock_movement(&self, direction: &str, units: i64) {
        if units > 0 {
            self.stock_units.with_label_values(&[direction]).inc_by(units as u64);
        }
    }

    /// Helper to record a finished unit of work
    pub fn record_operation(&self, operation: &str, duration_secs: f64, committed: bool) {
        let outcome = if committed { "committed" } else { "rolled_back" };
        self.unit_of_work_outcomes.with_label_values(&[operation, outcome]).inc();
        self.operation_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    pub fn record_rule_violation(&self, operation: &str) {
        self.rule_violations.with_label_values(&[operation]).inc();
    }
}
