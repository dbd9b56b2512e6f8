use labflow_model::ObjectId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

use crate::FrameId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    pub sequence_no: u64,
    pub timestamp: String,
    pub kind: RuntimeEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RuntimeEventKind {
    Run(RunEvent),
    Node(NodeEvent),
    Call(CallEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    Started {
        run_id: String,
        activity_id: ObjectId,
    },
    Completed {
        run_id: String,
        activity_id: ObjectId,
        steps: usize,
    },
    Failed {
        run_id: String,
        activity_id: ObjectId,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeEvent {
    Fired {
        run_id: String,
        frame: FrameId,
        node_id: ObjectId,
        node_type: String,
    },
    IssueRecorded {
        run_id: String,
        frame: FrameId,
        node_id: Option<ObjectId>,
        message: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallEvent {
    Started {
        run_id: String,
        frame: FrameId,
        node_id: ObjectId,
        behavior_id: ObjectId,
        callee_frame: FrameId,
        mode: String,
    },
    Blocked {
        run_id: String,
        frame: FrameId,
        node_id: ObjectId,
    },
    Completed {
        run_id: String,
        frame: FrameId,
        node_id: ObjectId,
        behavior_id: ObjectId,
    },
}

pub trait RuntimeEventObserver: Send + Sync {
    fn on_event(&self, event: &RuntimeEvent);
}

impl<F> RuntimeEventObserver for F
where
    F: Fn(&RuntimeEvent) + Send + Sync,
{
    fn on_event(&self, event: &RuntimeEvent) {
        self(event);
    }
}

pub type SharedRuntimeEventObserver = Arc<dyn RuntimeEventObserver>;
pub type RuntimeEventSender = mpsc::UnboundedSender<RuntimeEvent>;
pub type RuntimeEventReceiver = mpsc::UnboundedReceiver<RuntimeEvent>;

#[derive(Clone)]
enum Subscriber {
    Observer(SharedRuntimeEventObserver),
    Channel(RuntimeEventSender),
}

/// Numbers, stamps and delivers runtime events to its subscribers.
///
/// Clones share one sequence counter: runs reporting through clones of the
/// same sink draw their sequence numbers from one increasing series.
#[derive(Clone, Default)]
pub struct RuntimeEventSink {
    subscribers: Vec<Subscriber>,
    sequence: Arc<AtomicU64>,
}

impl RuntimeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: SharedRuntimeEventObserver) -> Self {
        Self::new().observer(observer)
    }

    pub fn with_sender(sender: RuntimeEventSender) -> Self {
        Self::new().sender(sender)
    }

    pub fn observer(mut self, observer: SharedRuntimeEventObserver) -> Self {
        self.subscribers.push(Subscriber::Observer(observer));
        self
    }

    pub fn sender(mut self, sender: RuntimeEventSender) -> Self {
        self.subscribers.push(Subscriber::Channel(sender));
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.subscribers.is_empty()
    }

    /// Sequence number of the latest published event; 0 before the first.
    pub fn last_sequence_no(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Stamps `kind` with the next sequence number and the current time and
    /// delivers it. Without subscribers nothing is numbered and `None` is
    /// returned.
    pub fn publish(&self, kind: RuntimeEventKind) -> Option<u64> {
        if !self.is_enabled() {
            return None;
        }
        let sequence_no = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        self.deliver(RuntimeEvent {
            sequence_no,
            timestamp: timestamp_now(),
            kind,
        });
        Some(sequence_no)
    }

    fn deliver(&self, event: RuntimeEvent) {
        for subscriber in &self.subscribers {
            match subscriber {
                Subscriber::Observer(observer) => observer.on_event(&event),
                Subscriber::Channel(sender) => {
                    if sender.send(event.clone()).is_err() {
                        trace!(sequence_no = event.sequence_no, "event_receiver_closed");
                    }
                }
            }
        }
    }
}

pub fn runtime_event_channel() -> (RuntimeEventSender, RuntimeEventReceiver) {
    mpsc::unbounded_channel()
}

pub(crate) fn timestamp_now() -> String {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "{}.{:03}Z",
        since_epoch.as_secs(),
        since_epoch.subsec_millis()
    )
}
