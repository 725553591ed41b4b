//! Event dispatcher: parse envelopes, validate per type, fan out to callbacks.
//!
//! The dispatcher is deliberately forgiving: malformed messages are logged and
//! dropped, envelopes missing a required field are dropped silently, unknown
//! event types are ignored, and a missing callback is a no-op. Nothing that
//! happens here may disturb the connection.

use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::envelope::{BoardEnvelope, BoardEventType};

type PayloadFn = Box<dyn Fn(Value) + Send + Sync>;
type ItemIdFn = Box<dyn Fn(String) + Send + Sync>;
type ItemMovedFn = Box<dyn Fn(String, String, String, Option<Value>) + Send + Sync>;

/// Consumer-supplied callback set, one optional slot per event type.
///
/// The whole set can be replaced at any time via
/// [`StreamHandle::set_callbacks`](crate::connection::StreamHandle::set_callbacks)
/// without disturbing the connection; the driver reads the latest set at
/// dispatch time.
#[derive(Default)]
pub struct BoardCallbacks {
    item_added: Option<PayloadFn>,
    item_moved: Option<ItemMovedFn>,
    item_updated: Option<PayloadFn>,
    item_deleted: Option<ItemIdFn>,
    board_updated: Option<PayloadFn>,
    mission_completed: Option<PayloadFn>,
    final_review_started: Option<PayloadFn>,
    final_review_complete: Option<PayloadFn>,
    post_checks_started: Option<PayloadFn>,
    post_check_update: Option<PayloadFn>,
    post_checks_complete: Option<PayloadFn>,
    documentation_started: Option<PayloadFn>,
    documentation_complete: Option<PayloadFn>,
}

impl fmt::Debug for BoardCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardCallbacks")
            .field("item_added", &self.item_added.is_some())
            .field("item_moved", &self.item_moved.is_some())
            .field("item_updated", &self.item_updated.is_some())
            .field("item_deleted", &self.item_deleted.is_some())
            .field("board_updated", &self.board_updated.is_some())
            .field("mission_completed", &self.mission_completed.is_some())
            .finish_non_exhaustive()
    }
}

impl BoardCallbacks {
    /// Create an empty callback set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A work item was created; invoked with the item payload.
    #[must_use]
    pub fn on_item_added(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.item_added = Some(Box::new(f));
        self
    }

    /// A work item moved; invoked with `(item_id, from_stage, to_stage, item)`
    /// where `item` is the optional refreshed payload.
    #[must_use]
    pub fn on_item_moved(
        mut self,
        f: impl Fn(String, String, String, Option<Value>) + Send + Sync + 'static,
    ) -> Self {
        self.item_moved = Some(Box::new(f));
        self
    }

    /// A work item changed; invoked with the item payload.
    #[must_use]
    pub fn on_item_updated(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.item_updated = Some(Box::new(f));
        self
    }

    /// A work item was removed; invoked with its id.
    #[must_use]
    pub fn on_item_deleted(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.item_deleted = Some(Box::new(f));
        self
    }

    /// The board snapshot changed; invoked with the board payload.
    #[must_use]
    pub fn on_board_updated(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.board_updated = Some(Box::new(f));
        self
    }

    /// The mission finished; invoked with the whole payload.
    #[must_use]
    pub fn on_mission_completed(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.mission_completed = Some(Box::new(f));
        self
    }

    /// Final review started; invoked with the whole payload.
    #[must_use]
    pub fn on_final_review_started(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.final_review_started = Some(Box::new(f));
        self
    }

    /// Final review finished; invoked with the whole payload.
    #[must_use]
    pub fn on_final_review_complete(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.final_review_complete = Some(Box::new(f));
        self
    }

    /// Post-mission checks started; invoked with the whole payload.
    #[must_use]
    pub fn on_post_checks_started(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.post_checks_started = Some(Box::new(f));
        self
    }

    /// Progress from a post-mission check; invoked with the whole payload.
    #[must_use]
    pub fn on_post_check_update(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.post_check_update = Some(Box::new(f));
        self
    }

    /// Post-mission checks finished; invoked with the whole payload.
    #[must_use]
    pub fn on_post_checks_complete(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.post_checks_complete = Some(Box::new(f));
        self
    }

    /// Documentation started; invoked with the whole payload.
    #[must_use]
    pub fn on_documentation_started(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.documentation_started = Some(Box::new(f));
        self
    }

    /// Documentation finished; invoked with the whole payload.
    #[must_use]
    pub fn on_documentation_complete(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.documentation_complete = Some(Box::new(f));
        self
    }
}

/// Parse a raw message body and invoke at most one registered callback.
///
/// Parse failures are logged and swallowed; the stream stays open.
pub fn dispatch_message(callbacks: &BoardCallbacks, raw: &str) {
    let envelope: BoardEnvelope = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, "Dropping malformed stream message");
            return;
        }
    };
    dispatch_envelope(callbacks, envelope);
}

/// Validate a parsed envelope per its type and fan out to the matching
/// callback. Envelopes missing a required field are dropped without invoking
/// anything.
pub fn dispatch_envelope(callbacks: &BoardCallbacks, envelope: BoardEnvelope) {
    let BoardEnvelope {
        event_type, data, ..
    } = envelope;

    match event_type {
        BoardEventType::ItemAdded => {
            let Some(item) = data.get("item").cloned() else {
                debug!(event_type = ?event_type, "Dropping event with missing item");
                return;
            };
            if let Some(cb) = &callbacks.item_added {
                cb(item);
            }
        }
        BoardEventType::ItemMoved => {
            let (Some(item_id), Some(from_stage), Some(to_stage)) = (
                string_field(&data, "itemId"),
                string_field(&data, "fromStage"),
                string_field(&data, "toStage"),
            ) else {
                debug!(event_type = ?event_type, "Dropping item-moved with missing fields");
                return;
            };
            if let Some(cb) = &callbacks.item_moved {
                cb(item_id, from_stage, to_stage, data.get("item").cloned());
            }
        }
        BoardEventType::ItemUpdated => {
            let Some(item) = data.get("item").cloned() else {
                debug!(event_type = ?event_type, "Dropping event with missing item");
                return;
            };
            if let Some(cb) = &callbacks.item_updated {
                cb(item);
            }
        }
        BoardEventType::ItemDeleted => {
            let Some(item_id) = string_field(&data, "itemId") else {
                debug!(event_type = ?event_type, "Dropping item-deleted with missing itemId");
                return;
            };
            if let Some(cb) = &callbacks.item_deleted {
                cb(item_id);
            }
        }
        BoardEventType::BoardUpdated => {
            let Some(board) = data.get("board").cloned() else {
                debug!(event_type = ?event_type, "Dropping board-updated with missing board");
                return;
            };
            if let Some(cb) = &callbacks.board_updated {
                cb(board);
            }
        }
        // Lifecycle events carry their whole payload through unvalidated.
        BoardEventType::MissionCompleted => invoke(&callbacks.mission_completed, data),
        BoardEventType::FinalReviewStarted => invoke(&callbacks.final_review_started, data),
        BoardEventType::FinalReviewComplete => invoke(&callbacks.final_review_complete, data),
        BoardEventType::PostChecksStarted => invoke(&callbacks.post_checks_started, data),
        BoardEventType::PostCheckUpdate => invoke(&callbacks.post_check_update, data),
        BoardEventType::PostChecksComplete => invoke(&callbacks.post_checks_complete, data),
        BoardEventType::DocumentationStarted => invoke(&callbacks.documentation_started, data),
        BoardEventType::DocumentationComplete => invoke(&callbacks.documentation_complete, data),
        BoardEventType::Unknown => {
            debug!("Ignoring unknown event type");
        }
    }
}

fn invoke(callback: &Option<PayloadFn>, data: Value) {
    if let Some(cb) = callback {
        cb(data);
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_owned)
}
