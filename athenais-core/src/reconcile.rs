// ABOUTME: Aligns the bot's joined rooms with the configured desired room set
// ABOUTME: Leaves rooms not desired, joins desired rooms not joined; idempotent

use crate::error::ReconcileError;
use crate::metrics;
use crate::transport::{RoomSet, Transport};

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub left: Vec<String>,
    pub joined: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.left.is_empty() && self.joined.is_empty()
    }
}

/// Rooms to leave and rooms to join to turn `joined` into `desired`.
pub fn plan(joined: &RoomSet, desired: &RoomSet) -> (RoomSet, RoomSet) {
    let to_leave = joined.difference(desired).cloned().collect();
    let to_join = desired.difference(joined).cloned().collect();
    (to_leave, to_join)
}

/// Run one reconciliation pass against `transport`.
///
/// The first failing leave/join aborts the pass; operations that already
/// succeeded are not rolled back.
pub async fn reconcile(
    transport: &dyn Transport,
    desired: &RoomSet,
) -> Result<ReconcileReport, ReconcileError> {
    let joined = transport
        .joined_rooms()
        .await
        .map_err(|e| ReconcileError::JoinedRooms(e.into()))?;

    let (to_leave, to_join) = plan(&joined, desired);
    tracing::debug!(
        joined = joined.len(),
        desired = desired.len(),
        to_leave = to_leave.len(),
        to_join = to_join.len(),
        "Reconciling room membership"
    );

    let mut report = ReconcileReport::default();

    for room_id in to_leave {
        transport
            .leave_room(&room_id)
            .await
            .map_err(|e| ReconcileError::Leave {
                room_id: room_id.clone(),
                source: e.into(),
            })?;
        tracing::info!(room_id = %room_id, "Left room not in desired set");
        metrics::record_room_left();
        report.left.push(room_id);
    }

    for room_id in to_join {
        transport
            .join_room(&room_id)
            .await
            .map_err(|e| ReconcileError::Join {
                room_id: room_id.clone(),
                source: e.into(),
            })?;
        tracing::info!(room_id = %room_id, "Joined desired room");
        metrics::record_room_joined();
        report.joined.push(room_id);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, TransportCall};

    fn rooms(ids: &[&str]) -> RoomSet {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_symmetric_difference() {
        let (leave, join) = plan(&rooms(&["!b", "!c"]), &rooms(&["!a", "!b"]));
        assert_eq!(leave, rooms(&["!c"]));
        assert_eq!(join, rooms(&["!a"]));
    }

    #[tokio::test]
    async fn test_already_aligned_issues_no_operations() {
        let transport = MockTransport::new("@bot:x").with_joined(&["!a", "!b"]);
        let report = reconcile(&transport, &rooms(&["!a", "!b"])).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(transport.calls(), vec![TransportCall::JoinedRooms]);
    }

    #[tokio::test]
    async fn test_leaves_extra_and_joins_missing() {
        let transport = MockTransport::new("@bot:x").with_joined(&["!b", "!c"]);
        let report = reconcile(&transport, &rooms(&["!a", "!b"])).await.unwrap();

        assert_eq!(report.left, vec!["!c".to_string()]);
        assert_eq!(report.joined, vec!["!a".to_string()]);
        assert_eq!(transport.joined(), rooms(&["!a", "!b"]));

        let touching_b = transport
            .calls()
            .into_iter()
            .filter(|c| c.room_id() == Some("!b"))
            .count();
        assert_eq!(touching_b, 0);
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let transport = MockTransport::new("@bot:x").with_joined(&["!c"]);
        let desired = rooms(&["!a"]);

        reconcile(&transport, &desired).await.unwrap();
        let report = reconcile(&transport, &desired).await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn test_snapshot_failure_aborts() {
        let transport = MockTransport::new("@bot:x").fail_joined_rooms("homeserver down");
        let err = reconcile(&transport, &rooms(&["!a"])).await.unwrap_err();

        assert!(matches!(err, ReconcileError::JoinedRooms(_)));
        assert_eq!(transport.calls(), vec![TransportCall::JoinedRooms]);
    }

    #[tokio::test]
    async fn test_join_failure_stops_pass_without_rollback() {
        let transport = MockTransport::new("@bot:x")
            .with_joined(&["!old"])
            .fail_join("!a", "forbidden");
        let err = reconcile(&transport, &rooms(&["!a", "!b"])).await.unwrap_err();

        match err {
            ReconcileError::Join { room_id, .. } => assert_eq!(room_id, "!a"),
            other => panic!("expected join error, got {:?}", other),
        }
        // The leave that already happened stays; !b was never attempted.
        assert!(!transport.joined().contains("!old"));
        assert!(!transport
            .calls()
            .contains(&TransportCall::Join("!b".to_string())));
    }

    #[tokio::test]
    async fn test_leave_failure_is_reported() {
        let transport = MockTransport::new("@bot:x")
            .with_joined(&["!c"])
            .fail_leave("!c", "not allowed");
        let err = reconcile(&transport, &rooms(&[])).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Leave { ref room_id, .. } if room_id == "!c"));
    }
}
