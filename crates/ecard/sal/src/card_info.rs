//! Static description of card types
//!
//! Card info is read only and shared between every state entry of the same card through an
//! `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use derive_more::Display;

use crate::security_condition::SecurityCondition;

/// Service actions that access control lists are keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum ServiceAction {
    /// Connect to a card application
    CardApplicationConnect,
    /// Select a data set
    DataSetSelect,
    /// Read a data set item
    DsiRead,
    /// Write a data set item
    DsiWrite,
    /// Read a DID structure
    DidGet,
    /// Authenticate with a DID
    DidAuthenticate,
}

/// Access control list of a card application, DID or data set
pub type AccessControlList = HashMap<ServiceAction, SecurityCondition>;

/// Password length limits of a PACE DID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceMarker {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
}

/// Card authentication object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidInfo {
    /// DID name, unique within the application
    pub name: String,
    /// Protocol URI
    pub protocol: String,
    /// PACE parameters, for PACE DIDs
    pub pace_marker: Option<PaceMarker>,
    /// Access control list
    pub access: AccessControlList,
}

/// Data set within a card application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSetInfo {
    /// Data set name
    pub name: String,
    /// Access control list
    pub access: AccessControlList,
}

/// Card application with its DIDs and data sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardApplicationInfo {
    /// Application identifier
    pub identifier: Bytes,
    /// Application name
    pub name: String,
    /// Access control list of the application itself
    pub access: AccessControlList,
    /// DIDs of the application
    pub dids: Vec<DidInfo>,
    /// Data sets of the application
    pub data_sets: Vec<DataSetInfo>,
}

impl CardApplicationInfo {
    /// DID by name
    pub fn did(&self, name: &str) -> Option<&DidInfo> {
        self.dids.iter().find(|did| did.name == name)
    }

    /// Data set by name
    pub fn data_set(&self, name: &str) -> Option<&DataSetInfo> {
        self.data_sets.iter().find(|data_set| data_set.name == name)
    }
}

/// Description of a card type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    /// Card type URI
    pub card_type: String,
    /// Application selected after reset
    pub implicitly_selected_application: Bytes,
    /// Applications on the card
    pub applications: Vec<CardApplicationInfo>,
}

impl CardInfo {
    /// Application by identifier
    pub fn application(&self, identifier: &[u8]) -> Option<&CardApplicationInfo> {
        self.applications
            .iter()
            .find(|app| app.identifier.as_ref() == identifier)
    }

    /// First application that defines a DID with this name
    pub fn application_for_did(&self, did_name: &str) -> Option<&CardApplicationInfo> {
        self.applications.iter().find(|app| app.did(did_name).is_some())
    }
}

/// Source of card info by card type
pub trait CardInfoRepository: Send + Sync {
    /// Card info for a card type URI
    fn card_info(&self, card_type: &str) -> Option<Arc<CardInfo>>;
}

impl CardInfoRepository for HashMap<String, Arc<CardInfo>> {
    fn card_info(&self, card_type: &str) -> Option<Arc<CardInfo>> {
        self.get(card_type).cloned()
    }
}
