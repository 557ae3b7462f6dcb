// ABOUTME: Verifies that reconciliation and dispatch move the exported counters
// ABOUTME: Runs a bot on a current-thread runtime under a thread-local debugging recorder

use athenais_core::metrics::{
    EVENTS_RECEIVED, EVENTS_SUPPRESSED, HANDLER_FAILURES, READ_RECEIPT_FAILURES, ROOMS_JOINED,
    ROOMS_LEFT,
};
use athenais_core::testing::MockTransport;
use athenais_core::{Bot, Event, EventType, HandlerError, PluginRegistry, RoomSet, Route, Transport};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const BOT: &str = "@bot:example.org";
const ALICE: &str = "@alice:example.org";
const ROOM_A: &str = "!a:example.org";
const ROOM_B: &str = "!b:example.org";
const ROOM_C: &str = "!c:example.org";

/// Counter totals by metric name, summed across label sets.
fn counters(snapshotter: &Snapshotter) -> HashMap<String, u64> {
    let mut totals = HashMap::new();
    for (key, _, _, value) in snapshotter.snapshot().into_vec() {
        if let DebugValue::Counter(n) = value {
            *totals.entry(key.key().name().to_string()).or_insert(0) += n;
        }
    }
    totals
}

#[test]
fn test_bot_run_records_reconcile_and_dispatch_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let transport = Arc::new(
        MockTransport::new(BOT)
            .with_joined(&[ROOM_A, ROOM_B])
            .fail_mark_read("receipt rejected"),
    );
    let desired: RoomSet = [ROOM_B, ROOM_C].iter().map(|r| r.to_string()).collect();
    let mut bot = Bot::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        desired,
        PluginRegistry::new(),
    );
    bot.route(Route::new(EventType::ROOM_MESSAGE, |evt: Arc<Event>| async move {
        match evt.as_message().map(|m| m.body).as_deref() {
            Some("fail") => Err(HandlerError::msg("refused")),
            _ => Ok(()),
        }
    }));

    transport.push_event(Event::text_message(ALICE, ROOM_B, "$1", "hello"));
    transport.push_event(Event::text_message(BOT, ROOM_B, "$2", "echo"));
    transport.push_event(Event::text_message(ALICE, ROOM_B, "$3", "fail"));
    transport.end_stream();

    // The sync task is spawned onto the same thread, so the local recorder sees it
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    metrics::with_local_recorder(&recorder, || {
        runtime
            .block_on(bot.run(CancellationToken::new()))
            .unwrap();
    });

    let totals = counters(&snapshotter);
    assert_eq!(totals.get(ROOMS_LEFT), Some(&1));
    assert_eq!(totals.get(ROOMS_JOINED), Some(&1));
    assert_eq!(totals.get(EVENTS_RECEIVED), Some(&3));
    assert_eq!(totals.get(EVENTS_SUPPRESSED), Some(&1));
    assert_eq!(totals.get(HANDLER_FAILURES), Some(&1));
    assert_eq!(totals.get(READ_RECEIPT_FAILURES), Some(&1));
}
