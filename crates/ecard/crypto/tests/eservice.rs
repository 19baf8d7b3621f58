//! CHAT negotiation against a terminal certificate and its description

use ecard_crypto::{AccessRight, CertificateDescription, Chat, DataGroup, SpecialFunction, TerminalType};

const TERMINAL_CHAT: &str = "7F4C12060904007F00070301020253053C0F13FFE7";

#[test]
fn test_bare_chat_fixup_yields_full_encoding() {
    let fixed = Chat::fixup(&hex::decode("3C0F13FFE7").unwrap());
    assert_eq!(fixed.len(), 21);
    let chat = Chat::from_bytes(&fixed).unwrap();
    assert_eq!(chat.terminal_type(), TerminalType::AuthenticationTerminal);
    assert_eq!(chat.to_string(), TERMINAL_CHAT);
}

#[test]
fn test_optional_chat_is_bounded_by_terminal_chat() {
    let terminal = Chat::from_bytes(&hex::decode(TERMINAL_CHAT).unwrap()).unwrap();

    let mut required = Chat::default();
    required.set_right(AccessRight::Special(SpecialFunction::AgeVerification), true);
    assert!(required.is_covered_by(&terminal));

    let mut optional = Chat::default();
    for dg in DataGroup::all() {
        optional.set_right(AccessRight::Read(dg), true);
    }
    optional.set_right(AccessRight::Special(SpecialFunction::CanAllowed), true);
    optional.restrict_access_rights(&terminal);

    assert!(optional.is_covered_by(&terminal));
    assert!(!optional.has_right(AccessRight::Special(SpecialFunction::CanAllowed)));
    let read: Vec<u8> = optional
        .read_access()
        .into_iter()
        .filter_map(|(dg, granted)| granted.then_some(dg.number()))
        .collect();
    assert_eq!(read, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 13, 17, 18, 19, 20]);
}

#[test]
fn test_description_from_hex() {
    // SEQUENCE { OID plain, [1] "Issuer", [3] "Subject", [5] "ToU" }
    let data = hex::decode(concat!(
        "3028",
        "060A04007F00070301030101",
        "A1080C06497373756572",
        "A3090C075375626A656374",
        "A5050C03546F55",
    ))
    .unwrap();
    let description = CertificateDescription::from_bytes(&data).unwrap();
    assert_eq!(description.issuer_name(), Some("Issuer"));
    assert_eq!(description.subject_name(), Some("Subject"));
    assert_eq!(description.terms_of_usage().unwrap().as_bytes(), b"ToU");
}
