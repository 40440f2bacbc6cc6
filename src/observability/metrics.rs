//! Pipeline metrics.
//!
//! # Metrics
//! - `logvault_events_accepted_total` (counter): events a sink took, by sink
//! - `logvault_events_delivered_total` (counter): events confirmed by a remote store
//! - `logvault_delivery_failures_total` (counter): failed delivery attempts
//! - `logvault_dead_lettered_total` (counter): events routed to dead-letter
//! - `logvault_events_dropped_total` (counter): events lost for good
//! - `logvault_template_registration_failures_total` (counter)
//!
//! No exporter is installed here; a host may install any `metrics` recorder.

pub fn record_event_accepted(sink: &str) {
    metrics::counter!("logvault_events_accepted_total", "sink" => sink.to_owned()).increment(1);
}

pub fn record_delivered(sink: &str, count: usize) {
    metrics::counter!("logvault_events_delivered_total", "sink" => sink.to_owned())
        .increment(count as u64);
}

pub fn record_delivery_failure(sink: &str) {
    metrics::counter!("logvault_delivery_failures_total", "sink" => sink.to_owned()).increment(1);
}

pub fn record_dead_lettered(sink: &str, count: usize) {
    metrics::counter!("logvault_dead_lettered_total", "sink" => sink.to_owned())
        .increment(count as u64);
}

pub fn record_dropped(sink: &str, count: usize) {
    metrics::counter!("logvault_events_dropped_total", "sink" => sink.to_owned())
        .increment(count as u64);
}

pub fn record_template_registration_failure(sink: &str) {
    metrics::counter!("logvault_template_registration_failures_total", "sink" => sink.to_owned())
        .increment(1);
}
