//! Connection handles
//!
//! A [`ConnectionHandle`] addresses a card application through any combination of context
//! handle, reader, slot and channel session. Handles are values: changing a field yields a new
//! handle, and the registry re-indexes entries whose handle was replaced.

use std::fmt;

use bytes::Bytes;

/// Address of a connected card application
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    context_handle: Option<Bytes>,
    ifd_name: Option<String>,
    slot_index: Option<u64>,
    slot_handle: Option<Bytes>,
    session_id: Option<String>,
    card_type: Option<String>,
    card_application: Option<Bytes>,
}

impl ConnectionHandle {
    /// Empty handle, which matches every entry
    pub fn new() -> Self {
        Self::default()
    }

    /// Context handle of the interface device layer
    pub const fn context_handle(&self) -> Option<&Bytes> {
        self.context_handle.as_ref()
    }

    /// Reader name
    pub fn ifd_name(&self) -> Option<&str> {
        self.ifd_name.as_deref()
    }

    /// Slot index within the reader
    pub const fn slot_index(&self) -> Option<u64> {
        self.slot_index
    }

    /// Handle of the connected slot
    pub const fn slot_handle(&self) -> Option<&Bytes> {
        self.slot_handle.as_ref()
    }

    /// Session identifier of the channel handle
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Recognized card type
    pub fn card_type(&self) -> Option<&str> {
        self.card_type.as_deref()
    }

    /// Current card application identifier
    pub const fn card_application(&self) -> Option<&Bytes> {
        self.card_application.as_ref()
    }

    /// Copy with the context handle replaced
    pub fn with_context_handle(mut self, context_handle: impl Into<Bytes>) -> Self {
        self.context_handle = Some(context_handle.into());
        self
    }

    /// Copy with the reader name replaced
    pub fn with_ifd_name(mut self, ifd_name: impl Into<String>) -> Self {
        self.ifd_name = Some(ifd_name.into());
        self
    }

    /// Copy with the slot index replaced
    pub const fn with_slot_index(mut self, slot_index: u64) -> Self {
        self.slot_index = Some(slot_index);
        self
    }

    /// Copy with the slot handle replaced
    pub fn with_slot_handle(mut self, slot_handle: impl Into<Bytes>) -> Self {
        self.slot_handle = Some(slot_handle.into());
        self
    }

    /// Copy without a slot handle
    pub fn without_slot_handle(mut self) -> Self {
        self.slot_handle = None;
        self
    }

    /// Copy with the channel session replaced
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Copy with the recognized card type replaced
    pub fn with_card_type(mut self, card_type: impl Into<String>) -> Self {
        self.card_type = Some(card_type.into());
        self
    }

    /// Copy with the card application replaced
    pub fn with_card_application(mut self, card_application: impl Into<Bytes>) -> Self {
        self.card_application = Some(card_application.into());
        self
    }

    /// Copy without a card application
    pub fn without_card_application(mut self) -> Self {
        self.card_application = None;
        self
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encode = |value: Option<&Bytes>| value.map_or_else(|| "-".to_string(), hex::encode);
        write!(
            f,
            "ctx={} ifd={} idx={} slot={} session={} type={} app={}",
            encode(self.context_handle()),
            self.ifd_name().unwrap_or("-"),
            self.slot_index.map_or_else(|| "-".to_string(), |idx| idx.to_string()),
            encode(self.slot_handle()),
            self.session_id().unwrap_or("-"),
            self.card_type().unwrap_or("-"),
            encode(self.card_application()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_leave_original_untouched() {
        let base = ConnectionHandle::new().with_context_handle(vec![0x01]);
        let derived = base.clone().with_slot_handle(vec![0xAB]).with_slot_index(0);
        assert!(base.slot_handle().is_none());
        assert_eq!(derived.slot_handle().unwrap().as_ref(), &[0xAB]);
        assert_eq!(derived.context_handle(), base.context_handle());
        assert!(derived.without_slot_handle().slot_handle().is_none());
    }

    #[test]
    fn test_display() {
        let handle = ConnectionHandle::new()
            .with_ifd_name("Reader 0")
            .with_slot_index(1)
            .with_card_application(hex::decode("E80704007F00070302").unwrap());
        assert_eq!(
            handle.to_string(),
            "ctx=- ifd=Reader 0 idx=1 slot=- session=- type=- app=e80704007f00070302"
        );
    }
}
