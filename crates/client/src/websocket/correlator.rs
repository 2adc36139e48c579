// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Request id allocation and reply correlation.
//!
//! Ids start at 1 and increase by one per request for the lifetime of the session. They survive
//! reconnects and return to zero only on an explicit disconnect. Every pending request is
//! completed at most once: completion removes it from the map, so a duplicate or late reply
//! finds nothing and is dropped.

use ahash::AHashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use super::{
    enums::RequestKind,
    error::{WsApiError, WsApiResult},
    messages::RequestResult,
};
use crate::common::{consts::SERVER_ERROR_STATUS, parse::server_error_message};

/// Completion slot of a pending request.
pub type ReplySender = oneshot::Sender<WsApiResult<Value>>;

/// What happened to a correlated frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The pending request completed successfully.
    Resolved,
    /// The pending request completed with an error.
    Rejected,
    /// Intermediate acknowledgement; the request keeps waiting for its typed reply.
    Acknowledged,
    /// No pending request has this id.
    Unmatched,
}

#[derive(Debug)]
struct PendingRequest {
    kind: RequestKind,
    result_only: bool,
    tx: ReplySender,
}

impl PendingRequest {
    fn complete(self, result: WsApiResult<Value>) -> ReplyOutcome {
        let outcome = if result.is_ok() {
            ReplyOutcome::Resolved
        } else {
            ReplyOutcome::Rejected
        };
        // Receiver may have been dropped by a caller that stopped waiting
        let _ = self.tx.send(result);
        outcome
    }
}

/// Tracks in-flight requests by correlation id.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    last_request_id: u64,
    pending: AHashMap<String, PendingRequest>,
}

impl RequestCorrelator {
    /// Creates a new [`RequestCorrelator`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next request id.
    pub fn next_request_id(&mut self) -> u64 {
        self.last_request_id += 1;
        self.last_request_id
    }

    #[must_use]
    pub fn last_request_id(&self) -> u64 {
        self.last_request_id
    }

    /// Records a request as pending. Must be called before its frame is sent.
    pub fn register(
        &mut self,
        request_id: u64,
        kind: RequestKind,
        result_only: bool,
        tx: ReplySender,
    ) {
        self.pending.insert(
            request_id.to_string(),
            PendingRequest {
                kind,
                result_only,
                tx,
            },
        );
    }

    /// Handles a correlated reply carrying a payload.
    pub fn on_reply(&mut self, request_id: &str, status: u16, msg: Value) -> ReplyOutcome {
        let Some(pending) = self.pending.remove(request_id) else {
            return ReplyOutcome::Unmatched;
        };

        if status >= SERVER_ERROR_STATUS {
            return pending.complete(Err(server_error(status, &msg)));
        }

        pending.complete(Ok(msg))
    }

    /// Handles a correlated `result` frame.
    ///
    /// For result-only requests this is the final reply. For any other request it is an
    /// intermediate acknowledgement that only completes the request when it reports failure.
    pub fn on_result(&mut self, request_id: &str, status: u16, msg: Value) -> ReplyOutcome {
        let Some(pending) = self.pending.get(request_id) else {
            return ReplyOutcome::Unmatched;
        };

        if status < SERVER_ERROR_STATUS && !pending.result_only {
            match serde_json::from_value::<RequestResult>(msg.clone()) {
                Ok(result) if result.success => return ReplyOutcome::Acknowledged,
                Ok(result) => {
                    return self.complete(
                        request_id,
                        Err(WsApiError::Unsuccessful {
                            reason: result.reason,
                        }),
                    );
                }
                Err(e) => {
                    tracing::warn!("Undecodable result for request {request_id}: {e}");
                    return self.complete(
                        request_id,
                        Err(WsApiError::Json(format!("invalid result wrapper: {e}"))),
                    );
                }
            }
        }

        self.on_reply(request_id, status, msg)
    }

    /// Completes a pending request with `error`, e.g. when its frame could not be sent.
    pub fn reject(&mut self, request_id: u64, error: WsApiError) -> ReplyOutcome {
        self.complete(&request_id.to_string(), Err(error))
    }

    /// Rejects every pending authentication request.
    ///
    /// Returns the number of requests rejected.
    pub fn on_authentication_failed(&mut self) -> usize {
        let ids: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.kind == RequestKind::Authenticate)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &ids {
            self.complete(
                id,
                Err(WsApiError::Authentication(
                    "session authentication failed".to_string(),
                )),
            );
        }

        ids.len()
    }

    /// Discards every pending request and restarts ids from zero.
    ///
    /// Discarded requests are never answered; their receivers observe a closed channel.
    /// Returns the number of requests discarded.
    pub fn reset(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        self.last_request_id = 0;
        discarded
    }

    /// Returns the number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns whether a request with this id is pending.
    #[must_use]
    pub fn contains(&self, request_id: u64) -> bool {
        self.pending.contains_key(&request_id.to_string())
    }

    fn complete(&mut self, request_id: &str, result: WsApiResult<Value>) -> ReplyOutcome {
        match self.pending.remove(request_id) {
            Some(pending) => pending.complete(result),
            None => ReplyOutcome::Unmatched,
        }
    }
}

fn server_error(status: u16, msg: &Value) -> WsApiError {
    WsApiError::Server {
        status,
        message: server_error_message(msg),
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tokio::sync::oneshot::error::TryRecvError;

    use super::*;

    #[fixture]
    fn correlator() -> RequestCorrelator {
        RequestCorrelator::new()
    }

    fn issue(
        correlator: &mut RequestCorrelator,
        kind: RequestKind,
        result_only: bool,
    ) -> (u64, oneshot::Receiver<WsApiResult<Value>>) {
        let (tx, rx) = oneshot::channel();
        let id = correlator.next_request_id();
        correlator.register(id, kind, result_only, tx);
        (id, rx)
    }

    #[rstest]
    fn test_ids_start_at_one_and_increase(mut correlator: RequestCorrelator) {
        let ids: Vec<u64> = (0..3).map(|_| correlator.next_request_id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[rstest]
    fn test_out_of_order_replies_resolve_their_own_requests(mut correlator: RequestCorrelator) {
        let (a, mut rx_a) = issue(&mut correlator, RequestKind::Call, false);
        let (b, mut rx_b) = issue(&mut correlator, RequestKind::Call, false);

        assert_eq!(
            correlator.on_reply(&b.to_string(), 2000, json!("b")),
            ReplyOutcome::Resolved
        );
        assert_eq!(
            correlator.on_reply(&a.to_string(), 2000, json!("a")),
            ReplyOutcome::Resolved
        );

        assert_eq!(rx_a.try_recv().unwrap().unwrap(), json!("a"));
        assert_eq!(rx_b.try_recv().unwrap().unwrap(), json!("b"));
    }

    #[rstest]
    fn test_duplicate_reply_is_unmatched(mut correlator: RequestCorrelator) {
        let (id, _rx) = issue(&mut correlator, RequestKind::Call, false);

        correlator.on_reply(&id.to_string(), 2000, json!(1));

        assert_eq!(
            correlator.on_reply(&id.to_string(), 2000, json!(2)),
            ReplyOutcome::Unmatched
        );
        assert!(correlator.is_empty());
    }

    #[rstest]
    fn test_server_error_status_rejects(mut correlator: RequestCorrelator) {
        let (id, mut rx) = issue(&mut correlator, RequestKind::Call, false);

        let outcome = correlator.on_reply(
            &id.to_string(),
            4000,
            json!({"message": "invalid user_balance_id"}),
        );

        assert_eq!(outcome, ReplyOutcome::Rejected);
        match rx.try_recv().unwrap() {
            Err(WsApiError::Server { status, message }) => {
                assert_eq!(status, 4000);
                assert_eq!(message, "invalid user_balance_id");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[rstest]
    fn test_status_below_threshold_resolves(mut correlator: RequestCorrelator) {
        let (id, mut rx) = issue(&mut correlator, RequestKind::Call, false);

        correlator.on_reply(&id.to_string(), 3999, json!({"message": "fine"}));

        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[rstest]
    fn test_result_only_request_resolves_on_result(mut correlator: RequestCorrelator) {
        let (id, mut rx) = issue(&mut correlator, RequestKind::Subscribe, true);

        let outcome = correlator.on_result(&id.to_string(), 0, json!({"success": true}));

        assert_eq!(outcome, ReplyOutcome::Resolved);
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!({"success": true}));
    }

    #[rstest]
    fn test_successful_ack_keeps_payload_request_pending(mut correlator: RequestCorrelator) {
        let (id, mut rx) = issue(&mut correlator, RequestKind::Call, false);

        let outcome = correlator.on_result(&id.to_string(), 0, json!({"success": true}));

        assert_eq!(outcome, ReplyOutcome::Acknowledged);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(correlator.contains(id));

        correlator.on_reply(&id.to_string(), 2000, json!({"items": []}));
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!({"items": []}));
    }

    #[rstest]
    fn test_failed_ack_rejects_payload_request(mut correlator: RequestCorrelator) {
        let (id, mut rx) = issue(&mut correlator, RequestKind::Call, false);

        let outcome = correlator.on_result(
            &id.to_string(),
            0,
            json!({"success": false, "reason": "not allowed"}),
        );

        assert_eq!(outcome, ReplyOutcome::Rejected);
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(WsApiError::Unsuccessful { reason: Some(r) }) if r == "not allowed"
        ));
        assert!(!correlator.contains(id));
    }

    #[rstest]
    fn test_malformed_ack_rejects_payload_request(mut correlator: RequestCorrelator) {
        let (id, mut rx) = issue(&mut correlator, RequestKind::Call, false);

        let outcome = correlator.on_result(&id.to_string(), 0, json!("ok"));

        assert_eq!(outcome, ReplyOutcome::Rejected);
        assert!(matches!(rx.try_recv().unwrap(), Err(WsApiError::Json(_))));
        assert!(!correlator.contains(id));
    }

    #[rstest]
    fn test_authentication_failure_rejects_only_auth_requests(mut correlator: RequestCorrelator) {
        let (_, mut rx_auth) = issue(&mut correlator, RequestKind::Authenticate, false);
        let (call, mut rx_call) = issue(&mut correlator, RequestKind::Call, false);

        assert_eq!(correlator.on_authentication_failed(), 1);

        assert!(matches!(
            rx_auth.try_recv().unwrap(),
            Err(WsApiError::Authentication(_))
        ));
        assert!(matches!(rx_call.try_recv(), Err(TryRecvError::Empty)));
        assert!(correlator.contains(call));
    }

    #[rstest]
    fn test_reset_discards_and_restarts_ids(mut correlator: RequestCorrelator) {
        let (_, mut rx) = issue(&mut correlator, RequestKind::Call, false);
        issue(&mut correlator, RequestKind::Call, false);

        assert_eq!(correlator.reset(), 2);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));
        assert_eq!(correlator.next_request_id(), 1);
    }

    #[rstest]
    fn test_dropped_receiver_does_not_panic(mut correlator: RequestCorrelator) {
        let (id, rx) = issue(&mut correlator, RequestKind::Call, false);
        drop(rx);

        assert_eq!(
            correlator.on_reply(&id.to_string(), 2000, json!(null)),
            ReplyOutcome::Resolved
        );
    }
}
