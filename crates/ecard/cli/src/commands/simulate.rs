//! EAC against a simulated card

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use ecard_eac::simulator::{self, NPA_CARD_TYPE, SampleService, SimulatedCard};
use ecard_eac::{DidAuthenticate, EacConfig, EacProtocol, EacSession, PinState};
use ecard_sal::{
    CardEvent, CardInfo, CardStateRegistry, ConnectionHandle, EventDispatcher, ProtocolKind,
    card_event_channel,
};
use tracing::info;

use crate::utils::console::ConsoleConsent;
use crate::utils::display;

const READER: &str = "Simulated Reader 0";
const SLOT_HANDLE: &[u8] = &[0x00, 0x01];
const CONTEXT_HANDLE: &[u8] = &[0xEC, 0x01];

/// Options of the simulate command
#[derive(Debug)]
pub struct SimulateArgs {
    /// PIN to try first
    pub pin: Option<String>,
    /// PIN the card expects
    pub card_pin: String,
    /// CAN of the card
    pub can: String,
    /// Initial retry counter
    pub pin_state: PinState,
    /// Password entry on the reader
    pub native: bool,
    /// Skip confirmations
    pub yes: bool,
    /// Transaction information of the eService
    pub transaction_info: Option<String>,
}

/// Insert a simulated card and run DIDAuthenticate with EAC1 input for the PIN
pub fn simulate_command(args: SimulateArgs) -> Result<()> {
    let mut repository: HashMap<String, Arc<CardInfo>> = HashMap::new();
    repository.insert(NPA_CARD_TYPE.to_string(), Arc::new(simulator::card_info()));
    let dispatcher = EventDispatcher::new(Arc::new(CardStateRegistry::new()), Arc::new(repository));

    let handle = ConnectionHandle::new()
        .with_context_handle(CONTEXT_HANDLE)
        .with_ifd_name(READER)
        .with_slot_index(0)
        .with_slot_handle(SLOT_HANDLE);
    let (events, receiver) = card_event_channel();
    events
        .send(CardEvent::Recognized {
            handle: handle.clone(),
            card_type: NPA_CARD_TYPE.to_string(),
            interface_protocol: Some("T=1".to_string()),
        })
        .context("Failed to queue the card event")?;
    drop(events);
    dispatcher.run(&receiver);

    let card = SimulatedCard::new(SLOT_HANDLE, &args.card_pin, &args.can)
        .with_pin_state(args.pin_state);
    let consent = ConsoleConsent::new(args.pin, args.yes);
    let service = SampleService {
        transaction_info: args.transaction_info,
        ..SampleService::default()
    };
    let request = DidAuthenticate::new(handle.clone(), "PIN", service.eac1_input()?);
    let config = EacConfig::new().with_native_pin_entry(args.native);

    info!(reader = READER, pin_state = %args.pin_state, "Starting EAC against the simulated card");
    let response = EacProtocol::new(config, &card, &consent)
        .with_event_dispatcher(&dispatcher)
        .did_authenticate(dispatcher.registry(), &request);

    if !response.is_ok() {
        println!("{}", display::failure(&response.result.to_string()));
        bail!(
            "EAC failed: {}",
            response.result.minor.as_deref().unwrap_or("unknown error")
        );
    }
    let data = response.data.context("EAC finished without output")?;

    println!("{}", display::heading("EAC1 output"));
    for element in &data.elements {
        println!("{}", display::field(&element.name, &element.text));
    }

    let session = dispatcher
        .registry()
        .get_entry(&handle, true)
        .and_then(|entry| {
            entry.with_protocol(&ProtocolKind::Eac, |session: &EacSession| session.clone())
        })
        .context("No EAC session stored for the card")?;
    println!("{}", display::heading("Session"));
    println!("{}", display::field("CHAT", session.chat()));
    println!("{}", display::field("Certificates below the CAR", session.chain().len()));
    println!("{}", display::field("PIN state", card.pin_state()));
    println!("{}", display::success("PIN authenticated"));

    Ok(())
}
