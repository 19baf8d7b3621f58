//! Card events and their dispatch
//!
//! Recognized cards create a state entry in the registry and removed cards drop theirs. After
//! the registry is updated, every listener whose filter matches the event is notified.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::card_info::CardInfoRepository;
use crate::card_state::CardStateEntry;
use crate::handle::ConnectionHandle;
use crate::registry::CardStateRegistry;

/// Events about cards in readers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEvent {
    /// Card was recognized in a reader slot
    Recognized {
        /// Connection handle of the slot
        handle: ConnectionHandle,
        /// Recognized card type URI
        card_type: String,
        /// Interface protocol, e.g. `T=1`
        interface_protocol: Option<String>,
    },
    /// Card was removed from a reader slot
    Removed {
        /// Connection handle of the slot
        handle: ConnectionHandle,
    },
}

impl CardEvent {
    /// Connection handle the event refers to
    pub const fn handle(&self) -> &ConnectionHandle {
        match self {
            Self::Recognized { handle, .. } | Self::Removed { handle } => handle,
        }
    }
}

/// Sender for card events
pub type CardEventSender = Sender<CardEvent>;
/// Receiver for card events
pub type CardEventReceiver = Receiver<CardEvent>;

/// Create an unbounded channel for card events
pub fn card_event_channel() -> (CardEventSender, CardEventReceiver) {
    unbounded()
}

/// Selects the events a listener receives
pub trait EventFilter: Send + Sync {
    /// Whether the listener wants this event
    fn matches(&self, event: &CardEvent) -> bool;
}

/// Receives dispatched card events
pub trait CardEventListener: Send + Sync {
    /// Called on the dispatching thread after the registry was updated
    fn on_event(&self, event: &CardEvent);
}

impl CardEventListener for CardEventSender {
    fn on_event(&self, event: &CardEvent) {
        if self.send(event.clone()).is_err() {
            debug!("Card event receiver is gone");
        }
    }
}

/// Matches removal of the card in one reader slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRemovedFilter {
    ifd_name: String,
    slot_index: Option<u64>,
}

impl CardRemovedFilter {
    /// Filter for a reader and slot
    pub fn new(ifd_name: impl Into<String>, slot_index: Option<u64>) -> Self {
        Self {
            ifd_name: ifd_name.into(),
            slot_index,
        }
    }

    /// Filter for the slot a connection handle points to
    pub fn for_handle(handle: &ConnectionHandle) -> Option<Self> {
        Some(Self::new(handle.ifd_name()?, handle.slot_index()))
    }
}

impl EventFilter for CardRemovedFilter {
    fn matches(&self, event: &CardEvent) -> bool {
        let CardEvent::Removed { handle } = event else {
            return false;
        };
        handle.ifd_name() == Some(self.ifd_name.as_str()) && handle.slot_index() == self.slot_index
    }
}

/// Matches every event
#[derive(Debug, Clone, Copy, Default)]
pub struct AllEvents;

impl EventFilter for AllEvents {
    fn matches(&self, _event: &CardEvent) -> bool {
        true
    }
}

/// Identifies a subscription for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    filter: Box<dyn EventFilter>,
    listener: Arc<dyn CardEventListener>,
}

/// Applies card events to the registry and fans them out to listeners
pub struct EventDispatcher {
    registry: Arc<CardStateRegistry>,
    repository: Arc<dyn CardInfoRepository>,
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    /// Dispatcher that keeps `registry` in sync using card info from `repository`
    pub fn new(registry: Arc<CardStateRegistry>, repository: Arc<dyn CardInfoRepository>) -> Self {
        Self {
            registry,
            repository,
            subscriptions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registry this dispatcher maintains
    pub const fn registry(&self) -> &Arc<CardStateRegistry> {
        &self.registry
    }

    /// Register a listener for the events `filter` matches
    pub fn subscribe(
        &self,
        filter: impl EventFilter + 'static,
        listener: Arc<dyn CardEventListener>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            id,
            filter: Box::new(filter),
            listener,
        });
        id
    }

    /// Remove a listener, returning whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        subscriptions.len() != before
    }

    /// Apply an event to the registry, then notify matching listeners
    pub fn dispatch(&self, event: &CardEvent) {
        match event {
            CardEvent::Recognized {
                handle,
                card_type,
                interface_protocol,
            } => match self.repository.card_info(card_type) {
                Some(card_info) => {
                    let handle = handle.clone().with_card_type(card_type.as_str());
                    let entry =
                        CardStateEntry::new(handle, card_info, interface_protocol.clone());
                    info!(entry = %entry, card_type = %card_type, "Card recognized");
                    self.registry.add_entry(Arc::new(entry));
                }
                None => warn!(card_type = %card_type, "No card info for recognized card type"),
            },
            CardEvent::Removed { handle } => {
                let removed = self.registry.remove_entry(handle);
                info!(%handle, count = removed.len(), "Card removed");
            }
        }

        // notify outside the lock
        let listeners: Vec<_> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|subscription| subscription.filter.matches(event))
            .map(|subscription| subscription.listener.clone())
            .collect();
        for listener in listeners {
            listener.on_event(event);
        }
    }

    /// Dispatch events from `receiver` until every sender is dropped
    pub fn run(&self, receiver: &CardEventReceiver) {
        for event in receiver.iter() {
            self.dispatch(&event);
        }
        debug!("Card event channel closed");
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("registry", &self.registry)
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish_non_exhaustive()
    }
}
