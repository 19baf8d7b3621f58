//! Per-connection card state
//!
//! A [`CardStateEntry`] is created when a card is recognized and lives in the
//! [`CardStateRegistry`](crate::registry::CardStateRegistry) until the card is removed. Entries
//! compare, order and hash by their serial number only, so the mutable parts never affect
//! their position in the registry's sets.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::card_info::{CardApplicationInfo, CardInfo, ServiceAction};
use crate::handle::ConnectionHandle;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Protocol URIs with special meaning in the state entry
pub mod protocol_uri {
    /// PACE
    pub const PACE: &str = "urn:oid:0.4.0.127.0.7.2.2.4";
    /// Extended Access Control 2
    pub const EAC: &str = "urn:oid:1.3.162.15480.3.0.14.2";
    /// PIN compare
    pub const PIN_COMPARE: &str = "urn:oid:1.3.162.15480.3.0.9";
    /// Generic cryptography
    pub const GENERIC_CRYPTO: &str = "urn:oid:1.3.162.15480.3.0.25";
}

/// Key of a protocol object in a state entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolKind {
    /// PACE
    Pace,
    /// Extended Access Control
    Eac,
    /// PIN compare
    PinCompare,
    /// Generic cryptography
    GenericCrypto,
    /// Any other protocol, by URI
    Other(String),
}

impl ProtocolKind {
    /// Protocol for a URI
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            protocol_uri::PACE => Self::Pace,
            protocol_uri::EAC => Self::Eac,
            protocol_uri::PIN_COMPARE => Self::PinCompare,
            protocol_uri::GENERIC_CRYPTO => Self::GenericCrypto,
            other => Self::Other(other.to_string()),
        }
    }

    /// Protocol URI
    pub fn uri(&self) -> &str {
        match self {
            Self::Pace => protocol_uri::PACE,
            Self::Eac => protocol_uri::EAC,
            Self::PinCompare => protocol_uri::PIN_COMPARE,
            Self::GenericCrypto => protocol_uri::GENERIC_CRYPTO,
            Self::Other(uri) => uri,
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// State a protocol keeps between the steps of a multi-step exchange
pub trait ProtocolState: Send + Sync + fmt::Debug {
    /// Access to the concrete type
    fn as_any(&self) -> &dyn Any;
}

/// Reference to a DID within a card application
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DidRef {
    /// Application identifier
    pub application: Bytes,
    /// DID name
    pub name: String,
}

#[derive(Debug, Default)]
struct MutableState {
    authenticated: BTreeSet<DidRef>,
    protocols: HashMap<ProtocolKind, Box<dyn ProtocolState>>,
    last_selected_ef: Option<Bytes>,
}

/// State of one connection to a card
pub struct CardStateEntry {
    serial: u64,
    handle: Mutex<ConnectionHandle>,
    card_info: Arc<CardInfo>,
    interface_protocol: Option<String>,
    state: Mutex<MutableState>,
}

impl CardStateEntry {
    /// New entry for a recognized card
    ///
    /// The handle's card application is set to the implicitly selected application.
    pub fn new(
        handle: ConnectionHandle,
        card_info: Arc<CardInfo>,
        interface_protocol: Option<String>,
    ) -> Self {
        let handle = handle
            .with_card_application(card_info.implicitly_selected_application.clone());
        Self {
            serial: NEXT_SERIAL.fetch_add(1, AtomicOrdering::Relaxed),
            handle: Mutex::new(handle),
            card_info,
            interface_protocol,
            state: Mutex::new(MutableState::default()),
        }
    }

    /// Fresh entry for the same card under another handle
    ///
    /// The card info is shared; authentication state and protocols start empty.
    pub fn derive(&self, handle: ConnectionHandle) -> Self {
        Self::new(handle, self.card_info.clone(), self.interface_protocol.clone())
    }

    /// Process-wide unique serial number
    pub const fn serial_number(&self) -> u64 {
        self.serial
    }

    /// Current connection handle
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.lock().clone()
    }

    pub(crate) fn replace_handle(&self, handle: ConnectionHandle) -> ConnectionHandle {
        std::mem::replace(&mut *self.handle.lock(), handle)
    }

    /// Card info of the recognized card type
    pub const fn card_info(&self) -> &Arc<CardInfo> {
        &self.card_info
    }

    /// Card type URI
    pub fn card_type(&self) -> &str {
        &self.card_info.card_type
    }

    /// Interface protocol reported by the reader, e.g. `T=1`
    pub fn interface_protocol(&self) -> Option<&str> {
        self.interface_protocol.as_deref()
    }

    /// Currently selected card application
    pub fn current_application(&self) -> Option<&CardApplicationInfo> {
        let handle = self.handle.lock();
        let aid = handle.card_application()?;
        self.card_info.application(aid)
    }

    //
    // Authentication state
    //

    /// Mark a DID of an application as authenticated
    pub fn add_authenticated(&self, did_name: &str, application: &[u8]) {
        debug!(serial = self.serial, did = did_name, "DID authenticated");
        self.state.lock().authenticated.insert(DidRef {
            application: Bytes::copy_from_slice(application),
            name: did_name.to_string(),
        });
    }

    /// Drop the authenticated mark of a DID
    pub fn remove_authenticated(&self, did_name: &str, application: &[u8]) {
        self.state.lock().authenticated.remove(&DidRef {
            application: Bytes::copy_from_slice(application),
            name: did_name.to_string(),
        });
    }

    /// DIDs authenticated in this connection
    pub fn authenticated_dids(&self) -> BTreeSet<DidRef> {
        self.state.lock().authenticated.clone()
    }

    /// Whether a DID is authenticated, resolving its application from the card info
    pub fn is_authenticated(&self, did_name: &str) -> bool {
        let Some(application) = self.card_info.application_for_did(did_name) else {
            return false;
        };
        self.is_authenticated_in(did_name, &application.identifier)
    }

    /// Whether a DID of a specific application is authenticated
    pub fn is_authenticated_in(&self, did_name: &str, application: &[u8]) -> bool {
        self.state
            .lock()
            .authenticated
            .iter()
            .any(|did| did.name == did_name && did.application.as_ref() == application)
    }

    //
    // Access control
    //

    /// Check the access condition of a card application
    ///
    /// Without an identifier the implicitly selected application is checked. A missing
    /// condition denies access.
    pub fn check_application_security_condition(
        &self,
        application: Option<&[u8]>,
        action: ServiceAction,
    ) -> bool {
        let aid = application.unwrap_or(&self.card_info.implicitly_selected_application[..]);
        self.card_info
            .application(aid)
            .and_then(|app| app.access.get(&action))
            .is_some_and(|condition| condition.evaluate(&|name: &str| self.is_authenticated(name)))
    }

    /// Check the access condition of a DID
    pub fn check_did_security_condition(
        &self,
        application: &[u8],
        did_name: &str,
        action: ServiceAction,
    ) -> bool {
        self.card_info
            .application(application)
            .and_then(|app| app.did(did_name))
            .and_then(|did| did.access.get(&action))
            .is_some_and(|condition| condition.evaluate(&|name: &str| self.is_authenticated(name)))
    }

    /// Check the access condition of a data set
    pub fn check_data_set_security_condition(
        &self,
        application: &[u8],
        data_set: &str,
        action: ServiceAction,
    ) -> bool {
        self.card_info
            .application(application)
            .and_then(|app| app.data_set(data_set))
            .and_then(|data_set| data_set.access.get(&action))
            .is_some_and(|condition| condition.evaluate(&|name: &str| self.is_authenticated(name)))
    }

    //
    // Protocol objects
    //

    /// Store the state of a protocol, replacing any previous one
    pub fn set_protocol(&self, kind: ProtocolKind, protocol: Box<dyn ProtocolState>) {
        debug!(serial = self.serial, protocol = %kind, "Storing protocol state");
        self.state.lock().protocols.insert(kind, protocol);
    }

    /// Run `f` with the stored state of a protocol, if it has type `T`
    pub fn with_protocol<T: 'static, R>(
        &self,
        kind: &ProtocolKind,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        let state = self.state.lock();
        let protocol = state.protocols.get(kind)?;
        protocol.as_any().downcast_ref::<T>().map(f)
    }

    /// Whether a protocol state is stored
    pub fn has_protocol(&self, kind: &ProtocolKind) -> bool {
        self.state.lock().protocols.contains_key(kind)
    }

    /// Remove the state of one protocol
    pub fn remove_protocol(&self, kind: &ProtocolKind) -> Option<Box<dyn ProtocolState>> {
        self.state.lock().protocols.remove(kind)
    }

    /// Remove every protocol state, returning what was stored
    pub fn remove_all_protocols(&self) -> Vec<Box<dyn ProtocolState>> {
        let mut state = self.state.lock();
        debug!(
            serial = self.serial,
            count = state.protocols.len(),
            "Removing protocols from card state entry"
        );
        state.protocols.drain().map(|(_, protocol)| protocol).collect()
    }

    //
    // Selected EF
    //

    /// Remember the FCP of the last selected EF
    pub fn set_fcp_of_selected_ef(&self, fcp: impl Into<Bytes>) {
        self.state.lock().last_selected_ef = Some(fcp.into());
    }

    /// Forget the last selected EF
    pub fn unset_fcp_of_selected_ef(&self) {
        self.state.lock().last_selected_ef = None;
    }

    /// FCP of the last selected EF
    pub fn fcp_of_selected_ef(&self) -> Option<Bytes> {
        self.state.lock().last_selected_ef.clone()
    }
}

impl fmt::Debug for CardStateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardStateEntry")
            .field("serial", &self.serial)
            .field("handle", &*self.handle.lock())
            .field("card_type", &self.card_info.card_type)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CardStateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [{}]", self.serial, self.handle.lock())
    }
}

impl PartialEq for CardStateEntry {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
    }
}

impl Eq for CardStateEntry {}

impl PartialOrd for CardStateEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CardStateEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.serial.cmp(&other.serial)
    }
}

impl Hash for CardStateEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card_info::tests::{ESIGN_AID, ROOT_AID, sample_card_info};

    #[derive(Debug)]
    struct Counter(u32);

    impl ProtocolState for Counter {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn entry() -> CardStateEntry {
        CardStateEntry::new(
            ConnectionHandle::new().with_ifd_name("Reader"),
            Arc::new(sample_card_info()),
            Some("T=1".to_string()),
        )
    }

    #[test]
    fn test_new_entry_selects_implicit_application() {
        let entry = entry();
        assert_eq!(entry.handle().card_application().unwrap().as_ref(), ROOT_AID);
        assert_eq!(entry.current_application().unwrap().name, "MF");
        assert_eq!(entry.interface_protocol(), Some("T=1"));
    }

    #[test]
    fn test_serial_identity() {
        let first = entry();
        let second = first.derive(first.handle().with_slot_handle(vec![1]));
        assert_ne!(first, second);
        assert!(second.serial_number() > first.serial_number());
        assert!(Arc::ptr_eq(first.card_info(), second.card_info()));
        assert_eq!(second.handle().slot_handle().unwrap().as_ref(), &[1]);
    }

    #[test]
    fn test_authentication_state() {
        let entry = entry();
        assert!(!entry.is_authenticated("PIN"));
        entry.add_authenticated("PIN", ROOT_AID);
        assert!(entry.is_authenticated("PIN"));
        assert!(!entry.is_authenticated_in("PIN", ESIGN_AID));
        entry.remove_authenticated("PIN", ROOT_AID);
        assert!(entry.authenticated_dids().is_empty());
    }

    #[test]
    fn test_security_conditions() {
        let entry = entry();
        assert!(entry.check_application_security_condition(None, ServiceAction::CardApplicationConnect));
        assert!(!entry.check_application_security_condition(
            Some(ESIGN_AID),
            ServiceAction::CardApplicationConnect
        ));
        // no condition for the action
        assert!(!entry.check_application_security_condition(None, ServiceAction::DsiWrite));
        assert!(!entry.check_data_set_security_condition(ESIGN_AID, "EF.C.CH.QES", ServiceAction::DsiRead));
        assert!(entry.check_did_security_condition(ROOT_AID, "PIN", ServiceAction::DidAuthenticate));
        assert!(!entry.check_did_security_condition(ROOT_AID, "PUK", ServiceAction::DidAuthenticate));

        entry.add_authenticated("CAN", ROOT_AID);
        assert!(entry.check_data_set_security_condition(ESIGN_AID, "EF.C.CH.QES", ServiceAction::DsiRead));
        assert!(!entry.check_application_security_condition(
            Some(ESIGN_AID),
            ServiceAction::CardApplicationConnect
        ));
    }

    #[test]
    fn test_protocol_objects() {
        let entry = entry();
        entry.set_protocol(ProtocolKind::Pace, Box::new(Counter(3)));
        assert!(entry.has_protocol(&ProtocolKind::Pace));
        assert_eq!(entry.with_protocol(&ProtocolKind::Pace, |c: &Counter| c.0), Some(3));
        assert_eq!(entry.with_protocol(&ProtocolKind::Eac, |c: &Counter| c.0), None);

        entry.set_protocol(ProtocolKind::from_uri("urn:example"), Box::new(Counter(1)));
        assert_eq!(entry.remove_all_protocols().len(), 2);
        assert!(!entry.has_protocol(&ProtocolKind::Pace));
    }

    #[test]
    fn test_protocol_uris() {
        assert_eq!(ProtocolKind::from_uri(protocol_uri::PACE), ProtocolKind::Pace);
        assert_eq!(ProtocolKind::from_uri(protocol_uri::EAC), ProtocolKind::Eac);
        assert_eq!(ProtocolKind::from_uri("urn:x").uri(), "urn:x");
    }

    #[test]
    fn test_selected_ef() {
        let entry = entry();
        entry.set_fcp_of_selected_ef(vec![0x62, 0x00]);
        assert!(entry.fcp_of_selected_ef().is_some());
        entry.unset_fcp_of_selected_ef();
        assert!(entry.fcp_of_selected_ef().is_none());
    }
}
