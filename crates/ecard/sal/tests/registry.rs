//! Registry lookups and removal across all indices

use std::sync::Arc;

use bytes::Bytes;
use ecard_sal::{
    CardApplicationInfo, CardInfo, CardStateEntry, CardStateRegistry, ConnectionHandle,
    ProtocolKind, ProtocolState,
};

const APP_A1: &[u8] = &[0xA1];

#[derive(Debug)]
struct PaceRun;

impl ProtocolState for PaceRun {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn card_info() -> Arc<CardInfo> {
    Arc::new(CardInfo {
        card_type: "http://bsi.bund.de/cif/npa.xml".to_string(),
        implicitly_selected_application: Bytes::from_static(APP_A1),
        applications: vec![CardApplicationInfo {
            identifier: Bytes::from_static(APP_A1),
            name: "A1".to_string(),
            access: Default::default(),
            dids: vec![],
            data_sets: vec![],
        }],
    })
}

fn add(registry: &CardStateRegistry, handle: ConnectionHandle) -> Arc<CardStateEntry> {
    let entry = Arc::new(CardStateEntry::new(handle, card_info(), None));
    registry.add_entry(entry.clone());
    entry
}

#[test]
fn test_intersection_over_present_keys() {
    let registry = CardStateRegistry::new();
    let both = add(
        &registry,
        ConnectionHandle::new().with_session_id("S1").with_context_handle(vec![0xC1]),
    );
    let session_only = add(&registry, ConnectionHandle::new().with_session_id("S1"));
    let context_only = add(&registry, ConnectionHandle::new().with_context_handle(vec![0xC1]));

    let query = ConnectionHandle::new()
        .with_session_id("S1")
        .with_context_handle(vec![0xC1]);
    assert_eq!(registry.get_matching_entries(&query, true), vec![both.clone()]);

    let all = registry.get_matching_entries(&ConnectionHandle::new(), true);
    assert_eq!(all, vec![both, session_only, context_only]);
}

#[test]
fn test_removal_without_slot_handle_is_complete() {
    let registry = CardStateRegistry::new();
    let handle = ConnectionHandle::new()
        .with_session_id("S1")
        .with_context_handle(vec![0xC1])
        .with_slot_handle(vec![0x01]);
    let entry = add(&registry, handle);
    entry.set_protocol(ProtocolKind::Pace, Box::new(PaceRun));

    let query = ConnectionHandle::new().with_context_handle(vec![0xC1]);
    assert_eq!(registry.remove_entry(&query).len(), 1);

    for query in [
        ConnectionHandle::new().with_session_id("S1"),
        ConnectionHandle::new().with_context_handle(vec![0xC1]),
        ConnectionHandle::new().with_slot_handle(vec![0x01]),
        ConnectionHandle::new(),
    ] {
        assert!(registry.get_matching_entries(&query, false).is_empty(), "{query}");
    }
    assert!(!entry.has_protocol(&ProtocolKind::Pace));
}

#[test]
fn test_query_without_application_returns_entry() {
    let registry = CardStateRegistry::new();
    let entry = add(&registry, ConnectionHandle::new().with_context_handle(vec![0xC1]));
    assert_eq!(entry.handle().card_application().map(|aid| aid.as_ref()), Some(APP_A1));

    let query = ConnectionHandle::new().with_context_handle(vec![0xC1]);
    assert_eq!(registry.get_entry(&query, true), Some(entry));
}
