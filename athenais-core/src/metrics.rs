// ABOUTME: Dispatch and membership counters recorded through the `metrics` facade
// ABOUTME: No-ops until the host process installs a recorder

pub const EVENTS_RECEIVED: &str = "athenais_events_received_total";
pub const EVENTS_SUPPRESSED: &str = "athenais_events_suppressed_total";
pub const HANDLER_FAILURES: &str = "athenais_handler_failures_total";
pub const READ_RECEIPT_FAILURES: &str = "athenais_read_receipt_failures_total";
pub const ROOMS_JOINED: &str = "athenais_rooms_joined_total";
pub const ROOMS_LEFT: &str = "athenais_rooms_left_total";

pub fn record_event_received(event_type: &str) {
    metrics::counter!(EVENTS_RECEIVED, "event_type" => event_type.to_string()).increment(1);
}

pub fn record_event_suppressed() {
    metrics::counter!(EVENTS_SUPPRESSED).increment(1);
}

pub fn record_handler_failure(event_type: &str) {
    metrics::counter!(HANDLER_FAILURES, "event_type" => event_type.to_string()).increment(1);
}

pub fn record_read_receipt_failure() {
    metrics::counter!(READ_RECEIPT_FAILURES).increment(1);
}

pub fn record_room_joined() {
    metrics::counter!(ROOMS_JOINED).increment(1);
}

pub fn record_room_left() {
    metrics::counter!(ROOMS_LEFT).increment(1);
}
