//! Render → UI messaging.
//!
//! The render thread never touches UI-owned state. Everything it learns is
//! posted as a [`UiMessage`] and applied later by whoever drains the
//! [`UiInbox`] on the UI thread.

use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use gnomon_core::{ObjectId, ShapeKind, ShapeParams, Transform};

use crate::command::Reply;
use crate::error::EngineResult;

/// Where a created object came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedFrom {
    /// A parametric primitive.
    Primitive {
        /// Kind created.
        kind: ShapeKind,
        /// Parameters it was created with.
        params: ShapeParams,
    },
    /// An imported mesh file.
    Import {
        /// Source path.
        path: PathBuf,
    },
}

/// Message posted from the render thread to the UI thread.
#[derive(Debug)]
pub enum UiMessage {
    /// The engine session became ready (`true`) or was torn down.
    EngineReady(bool),
    /// The engine selection changed, or a pick confirmed it.
    SelectionChanged {
        /// Selected object, [`ObjectId::NONE`] for none.
        id: ObjectId,
        /// True when a successful pick produced this notification.
        picked: bool,
    },
    /// The selected object's transform was polled.
    TransformPolled {
        /// Selected object.
        id: ObjectId,
        /// Its engine transform.
        transform: Transform,
        /// True while a gizmo drag is in progress.
        dragging: bool,
    },
    /// A create or import command ran.
    Created {
        /// Display name chosen by the UI when the command was issued.
        name: String,
        /// What was created.
        source: CreatedFrom,
        /// New id and its initial engine transform, or the failure.
        outcome: EngineResult<(ObjectId, Transform)>,
        /// Resolves the caller's ticket once the tree is updated. Dropped
        /// on failure.
        reply: Reply<ObjectId>,
    },
    /// A delete command ran.
    Deleted {
        /// Object that was targeted.
        id: ObjectId,
        /// Engine outcome.
        outcome: EngineResult<()>,
        /// Resolves the caller's ticket once the tree is updated.
        reply: Reply<bool>,
    },
    /// A scene clear ran.
    Cleared {
        /// Resolves the caller's ticket once the tree is updated.
        reply: Reply<bool>,
    },
    /// A one-shot transform read for a node (selection or creation pull).
    TransformFetched {
        /// Object read.
        id: ObjectId,
        /// Its engine transform.
        transform: Transform,
    },
    /// A parameter-driven scale was applied on the render thread.
    ScaleApplied {
        /// Object whose parameters changed.
        id: ObjectId,
        /// Scale the parameters call for.
        desired: [f32; 3],
        /// `Ok(true)` if the engine scale was rewritten, `Ok(false)` if it
        /// already matched, `Err` if the object could not be read or written.
        outcome: EngineResult<bool>,
    },
}

/// Posting half, owned by the render side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UiPoster {
    sender: Sender<UiMessage>,
}

/// Receiving half, drained on the UI thread.
#[derive(Debug)]
pub struct UiInbox {
    receiver: Receiver<UiMessage>,
}

/// Creates a connected poster/inbox pair.
#[must_use]
pub fn ui_channel() -> (UiPoster, UiInbox) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (UiPoster { sender }, UiInbox { receiver })
}

impl UiPoster {
    /// Posts a message. Never blocks. Returns false if the UI side is gone.
    pub fn post(&self, message: UiMessage) -> bool {
        if self.sender.send(message).is_err() {
            tracing::debug!("ui side gone, message dropped");
            return false;
        }
        true
    }
}

impl UiInbox {
    /// Takes one message without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<UiMessage> {
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for one message.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<UiMessage> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes every queued message.
    pub fn drain(&self) -> impl Iterator<Item = UiMessage> + '_ {
        self.receiver.try_iter()
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_and_drain_in_order() {
        let (poster, inbox) = ui_channel();
        assert!(poster.post(UiMessage::EngineReady(true)));
        assert!(poster.post(UiMessage::SelectionChanged {
            id: ObjectId(4),
            picked: false,
        }));

        let messages: Vec<_> = inbox.drain().collect();
        assert!(matches!(messages[0], UiMessage::EngineReady(true)));
        assert!(matches!(
            messages[1],
            UiMessage::SelectionChanged {
                id: ObjectId(4),
                picked: false
            }
        ));
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_post_after_inbox_dropped() {
        let (poster, inbox) = ui_channel();
        drop(inbox);
        assert!(!poster.post(UiMessage::EngineReady(false)));
    }

    #[test]
    fn test_recv_timeout_empty() {
        let (_poster, inbox) = ui_channel();
        assert!(inbox.recv_timeout(Duration::from_millis(1)).is_none());
    }
}
