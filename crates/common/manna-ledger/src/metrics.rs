use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref LEDGER_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "manna_ledger_operations_total",
        "Total number of operations against the manna ledger",
        &["operation", "status"]
    ).unwrap();

    pub static ref PURCHASES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "manna_purchases_total",
        "Total number of successful upgrade purchases",
        &["category"]
    ).unwrap();

    pub static ref MANNA_GRANTED_TOTAL: IntCounter = register_int_counter!(
        "manna_granted_total",
        "Total manna awarded to players"
    ).unwrap();

    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "manna_store_errors_total",
        "Total number of errors raised by the player store",
        &["store", "operation"]
    ).unwrap();
}

/// Count one ledger operation outcome. `status` is `"success"` or an error kind.
pub fn record_operation(operation: &str, status: &str) {
    LEDGER_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

pub fn record_store_error(store: &str, operation: &str) {
    STORE_ERRORS_TOTAL.with_label_values(&[store, operation]).inc();
}

/// Text exposition of every registered metric.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode Prometheus metrics: {}", e);
        return format!("# ERROR: Failed to encode metrics: {}\n", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert Prometheus buffer to UTF-8: {}", e);
        "# ERROR: Failed to convert buffer to UTF-8\n".to_string()
    })
}
