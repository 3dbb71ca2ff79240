// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

use livedesk_core::types::{RequestOutcome, SenderRole};
use metrics::{describe_counter, describe_histogram};

pub const REQUESTS_TOTAL: &str = "livedesk_requests_total";
pub const MESSAGES_TOTAL: &str = "livedesk_messages_total";
pub const AUTO_REPLIES_TOTAL: &str = "livedesk_auto_replies_total";
pub const VISITORS_CREATED_TOTAL: &str = "livedesk_visitors_created_total";
pub const REQUEST_LATENCY_SECONDS: &str = "livedesk_request_latency_seconds";

/// Register all livedesk metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Relay operations by action and outcome");
    describe_counter!(MESSAGES_TOTAL, "Messages stored, by sender role");
    describe_counter!(AUTO_REPLIES_TOTAL, "Offline auto-replies stored");
    describe_counter!(VISITORS_CREATED_TOTAL, "Visitor rows created");
    describe_histogram!(
        REQUEST_LATENCY_SECONDS,
        "Relay operation latency in seconds"
    );
}

/// Record a finished relay operation.
pub fn record_request(action: &'static str, outcome: RequestOutcome, latency_secs: f64) {
    metrics::counter!(REQUESTS_TOTAL, "action" => action, "outcome" => outcome.to_string())
        .increment(1);
    metrics::histogram!(REQUEST_LATENCY_SECONDS, "action" => action).record(latency_secs);
}

/// Record a stored message.
pub fn record_message(role: SenderRole) {
    metrics::counter!(MESSAGES_TOTAL, "role" => role.as_str()).increment(1);
}

pub fn record_auto_reply() {
    metrics::counter!(AUTO_REPLIES_TOTAL).increment(1);
}

pub fn record_visitor_created() {
    metrics::counter!(VISITORS_CREATED_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn recorded_metrics_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            record_request("send_message", RequestOutcome::Ok, 0.012);
            record_request("send_message", RequestOutcome::Ok, 0.020);
            record_request("get_messages", RequestOutcome::Unauthorized, 0.001);
            record_message(SenderRole::Visitor);
            record_auto_reply();
            record_visitor_created();
        });

        let text = handle.render();
        assert!(
            text.contains(r#"livedesk_requests_total{action="send_message",outcome="ok"} 2"#),
            "got:\n{text}"
        );
        assert!(text.contains(r#"outcome="unauthorized""#));
        assert!(text.contains(r#"livedesk_messages_total{role="visitor"} 1"#));
        assert!(text.contains("livedesk_auto_replies_total 1"));
        assert!(text.contains("livedesk_visitors_created_total 1"));
        assert!(text.contains("livedesk_request_latency_seconds"));
    }
}
