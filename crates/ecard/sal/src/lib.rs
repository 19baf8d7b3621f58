//! Service access layer state for eID clients
//!
//! This crate keeps track of connected cards: which card application is selected, which DIDs
//! the holder has authenticated and which protocol runs are in flight. It also provides the
//! access condition evaluator and the name based view on DIDAuthenticate data.
//!
//! ## Overview
//!
//! - [`CardStateRegistry`] indexes [`CardStateEntry`] values by session, context and slot
//! - [`SecurityCondition`] is evaluated against the authentication state of an entry
//! - [`AuthDataMap`] and [`AuthDataResponse`] read and write protocol input and output
//! - [`EventDispatcher`] keeps the registry in sync with [`CardEvent`]s
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod auth_data;
pub mod card_info;
pub mod card_state;
pub mod error;
pub mod event;
pub mod handle;
pub mod registry;
pub mod result;
pub mod security_condition;

pub use auth_data::{AuthDataElement, AuthDataMap, AuthDataResponse, DidAuthenticationData};
pub use card_info::{
    AccessControlList, CardApplicationInfo, CardInfo, CardInfoRepository, DataSetInfo, DidInfo,
    PaceMarker, ServiceAction,
};
pub use card_state::{CardStateEntry, DidRef, ProtocolKind, ProtocolState, protocol_uri};
pub use error::{Error, Result, ResultExt};
pub use event::{
    AllEvents, CardEvent, CardEventListener, CardEventReceiver, CardEventSender,
    CardRemovedFilter, EventDispatcher, EventFilter, SubscriptionId, card_event_channel,
};
pub use handle::ConnectionHandle;
pub use registry::CardStateRegistry;
pub use result::{ResultMajor, ResultStatus, minor};
pub use security_condition::SecurityCondition;

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::{
        AuthDataMap, AuthDataResponse, CardEvent, CardStateEntry, CardStateRegistry,
        ConnectionHandle, Error, ProtocolKind, ResultExt, ResultStatus, SecurityCondition,
        ServiceAction,
    };
}
