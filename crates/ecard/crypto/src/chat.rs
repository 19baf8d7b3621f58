//! Certificate Holder Authorization Template
//!
//! A CHAT names the terminal type with an OID and carries a bitmap of the rights the holder is
//! authorized for (`7F4C { 06 oid, 53 discretionary data }`). Bits are numbered from the most
//! significant bit of the first byte, so bit 0 is `0x80` of byte 0 and bit 39 is `0x01` of
//! byte 4.
//!
//! For authentication terminals the bitmap is five bytes:
//!
//! | bits     | meaning                          |
//! |----------|----------------------------------|
//! | 0..=1    | role                             |
//! | 2..=6    | write access DG17..DG21          |
//! | 11..=31  | read access DG21..DG01           |
//! | 32..=39  | special functions                |
//!
//! Inspection systems and signature terminals use a single byte with the role and two
//! access rights in bits 6 and 7.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use derive_more::Display;
use ecard_tlv::{Parser, Tag, Tlv};
use tracing::warn;

use crate::error::{Error, Result};
use crate::oid::{self, ObjectIdentifier};

/// Tag of the CHAT object
pub const CHAT_TAG: Tag = Tag::application_constructed(0x4C);
const OID_TAG: Tag = Tag::universal(6);
const DISCRETIONARY_DATA_TAG: Tag = Tag::application(0x13);

/// Header prepended to bare authentication terminal bitmaps
const AT_CHAT_PREFIX: [u8; 16] = [
    0x7F, 0x4C, 0x12, 0x06, 0x09, 0x04, 0x00, 0x7F, 0x00, 0x07, 0x03, 0x01, 0x02, 0x02, 0x53, 0x05,
];

/// Terminal type named by the CHAT OID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TerminalType {
    /// `id-IS`
    #[display("InspectionSystem")]
    InspectionSystem,
    /// `id-AT`
    #[display("AuthenticationTerminal")]
    AuthenticationTerminal,
    /// `id-ST`
    #[display("SignatureTerminal")]
    SignatureTerminal,
}

impl TerminalType {
    /// Object identifier of the terminal type
    pub const fn oid(self) -> &'static [u64] {
        match self {
            Self::InspectionSystem => oid::ID_IS,
            Self::AuthenticationTerminal => oid::ID_AT,
            Self::SignatureTerminal => oid::ID_ST,
        }
    }

    /// Terminal type for an object identifier
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Self::InspectionSystem, Self::AuthenticationTerminal, Self::SignatureTerminal]
            .into_iter()
            .find(|kind| oid == kind.oid())
    }

    const fn data_len(self) -> usize {
        match self {
            Self::AuthenticationTerminal => 5,
            Self::InspectionSystem | Self::SignatureTerminal => 1,
        }
    }
}

/// Role encoded in the two leading bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Role {
    /// Country verifying certificate authority
    #[display("CVCA")]
    Cvca,
    /// Official domestic document verifier
    #[display("DV_OFFICIAL")]
    DvOfficial,
    /// Non-official or foreign document verifier
    #[display("DV_NON_OFFICIAL")]
    DvNonOfficial,
    /// End entity inspection system
    #[display("INSPECTION_TERMINAL")]
    InspectionTerminal,
    /// End entity authentication terminal
    #[display("AUTHENTICATION_TERMINAL")]
    AuthenticationTerminal,
    /// End entity signature terminal
    #[display("SIGNATURE_TERMINAL")]
    SignatureTerminal,
}

impl Role {
    /// Whether the role belongs to an end entity certificate
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::InspectionTerminal | Self::AuthenticationTerminal | Self::SignatureTerminal
        )
    }
}

/// Data group number between 1 and 21
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("DG{:02}", _0)]
pub struct DataGroup(u8);

impl DataGroup {
    /// Data group `number`, if it is in range
    pub const fn new(number: u8) -> Option<Self> {
        if number >= 1 && number <= 21 {
            Some(Self(number))
        } else {
            None
        }
    }

    /// Data group number
    pub const fn number(self) -> u8 {
        self.0
    }

    /// All data groups in ascending order
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=21).map(Self)
    }
}

impl FromStr for DataGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix("DG")
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(Self::new)
            .ok_or_else(|| Error::UnknownRight(s.to_string()))
    }
}

/// Special functions of authentication terminals, in bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum SpecialFunction {
    /// Install qualified certificate
    #[display("INSTALL_QUALIFIED_CERTIFICATE")]
    InstallQualifiedCertificate,
    /// Install certificate
    #[display("INSTALL_CERTIFICATE")]
    InstallCertificate,
    /// PIN management
    #[display("PIN_MANAGEMENT")]
    PinManagement,
    /// CAN allowed
    #[display("CAN_ALLOWED")]
    CanAllowed,
    /// Privileged terminal
    #[display("PRIVILEGED_TERMINAL")]
    PrivilegedTerminal,
    /// Restricted identification
    #[display("RESTRICTED_IDENTIFICATION")]
    RestrictedIdentification,
    /// Community ID verification
    #[display("COMMUNITY_ID_VERIFICATION")]
    CommunityIdVerification,
    /// Age verification
    #[display("AGE_VERIFICATION")]
    AgeVerification,
}

impl SpecialFunction {
    /// All special functions in bit order
    pub const ALL: [Self; 8] = [
        Self::InstallQualifiedCertificate,
        Self::InstallCertificate,
        Self::PinManagement,
        Self::CanAllowed,
        Self::PrivilegedTerminal,
        Self::RestrictedIdentification,
        Self::CommunityIdVerification,
        Self::AgeVerification,
    ];
}

impl FromStr for SpecialFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|function| function.to_string() == s)
            .ok_or_else(|| Error::UnknownRight(s.to_string()))
    }
}

/// Rights of inspection systems and signature terminals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum TerminalRight {
    /// Read access to the fingerprint (IS)
    #[display("DG03")]
    Dg03,
    /// Read access to the iris image (IS)
    #[display("DG04")]
    Dg04,
    /// Generate electronic signature (ST)
    #[display("GENERATE_SIGNATURE")]
    GenerateSignature,
    /// Generate qualified electronic signature (ST)
    #[display("GENERATE_QUALIFIED_SIGNATURE")]
    GenerateQualifiedSignature,
}

impl FromStr for TerminalRight {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            Self::Dg03,
            Self::Dg04,
            Self::GenerateSignature,
            Self::GenerateQualifiedSignature,
        ]
        .into_iter()
        .find(|right| right.to_string() == s)
        .ok_or_else(|| Error::UnknownRight(s.to_string()))
    }
}

/// A single right that can be granted by a CHAT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum AccessRight {
    /// Write access to a data group
    #[display("write {_0}")]
    Write(DataGroup),
    /// Read access to a data group
    #[display("read {_0}")]
    Read(DataGroup),
    /// Special function
    #[display("{_0}")]
    Special(SpecialFunction),
    /// Inspection system or signature terminal right
    #[display("{_0}")]
    Terminal(TerminalRight),
}

impl AccessRight {
    /// Bit index of this right for a terminal type, if the type supports it
    const fn bit(self, terminal_type: TerminalType) -> Option<usize> {
        use TerminalType::*;
        match (self, terminal_type) {
            (Self::Write(dg), AuthenticationTerminal) if dg.0 >= 17 => {
                Some(2 + (dg.0 - 17) as usize)
            }
            (Self::Read(dg), AuthenticationTerminal) => Some(31 - (dg.0 - 1) as usize),
            (Self::Special(function), AuthenticationTerminal) => Some(32 + function as usize),
            (Self::Terminal(TerminalRight::Dg04), InspectionSystem) => Some(6),
            (Self::Terminal(TerminalRight::Dg03), InspectionSystem) => Some(7),
            (Self::Terminal(TerminalRight::GenerateQualifiedSignature), SignatureTerminal) => {
                Some(6)
            }
            (Self::Terminal(TerminalRight::GenerateSignature), SignatureTerminal) => Some(7),
            _ => None,
        }
    }

    /// Rights defined for a terminal type, in display order
    pub fn for_terminal_type(terminal_type: TerminalType) -> Vec<Self> {
        match terminal_type {
            TerminalType::AuthenticationTerminal => DataGroup::all()
                .map(Self::Read)
                .chain(DataGroup::all().filter(|dg| dg.0 >= 17).map(Self::Write))
                .chain(SpecialFunction::ALL.into_iter().map(Self::Special))
                .collect(),
            TerminalType::InspectionSystem => vec![
                Self::Terminal(TerminalRight::Dg03),
                Self::Terminal(TerminalRight::Dg04),
            ],
            TerminalType::SignatureTerminal => vec![
                Self::Terminal(TerminalRight::GenerateSignature),
                Self::Terminal(TerminalRight::GenerateQualifiedSignature),
            ],
        }
    }
}

/// Certificate Holder Authorization Template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chat {
    terminal_type: TerminalType,
    data: [u8; 5],
}

impl Default for Chat {
    /// Authentication terminal CHAT with no rights
    fn default() -> Self {
        Self::new(TerminalType::AuthenticationTerminal)
    }
}

impl Chat {
    /// Terminal CHAT with no rights set
    pub const fn new(terminal_type: TerminalType) -> Self {
        Self {
            terminal_type,
            data: [0; 5],
        }
    }

    /// Decode an encoded `7F4C` object
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::try_from(&Tlv::from_bytes(data)?)
    }

    /// Complete a bare five byte authentication terminal bitmap into a full CHAT encoding
    ///
    /// Any other input is returned unchanged.
    pub fn fixup(data: &[u8]) -> Bytes {
        if data.len() == 5 {
            warn!(
                chat = %hex::encode_upper(data),
                "CHAT is only the discretionary data, assuming an authentication terminal"
            );
            let mut full = Vec::with_capacity(AT_CHAT_PREFIX.len() + data.len());
            full.extend_from_slice(&AT_CHAT_PREFIX);
            full.extend_from_slice(data);
            Bytes::from(full)
        } else {
            Bytes::copy_from_slice(data)
        }
    }

    /// Terminal type
    pub const fn terminal_type(&self) -> TerminalType {
        self.terminal_type
    }

    /// Role of the certificate holder
    pub const fn role(&self) -> Role {
        match self.data[0] & 0xC0 {
            0xC0 => Role::Cvca,
            0x80 => Role::DvOfficial,
            0x40 => Role::DvNonOfficial,
            _ => match self.terminal_type {
                TerminalType::InspectionSystem => Role::InspectionTerminal,
                TerminalType::AuthenticationTerminal => Role::AuthenticationTerminal,
                TerminalType::SignatureTerminal => Role::SignatureTerminal,
            },
        }
    }

    /// Replace the role bits
    pub const fn set_role(&mut self, role: Role) {
        let bits = match role {
            Role::Cvca => 0xC0,
            Role::DvOfficial => 0x80,
            Role::DvNonOfficial => 0x40,
            _ => 0x00,
        };
        self.data[0] = (self.data[0] & 0x3F) | bits;
    }

    /// Discretionary data as encoded for this terminal type
    pub fn discretionary_data(&self) -> &[u8] {
        &self.data[..self.terminal_type.data_len()]
    }

    /// Whether `right` is granted
    pub fn has_right(&self, right: AccessRight) -> bool {
        right
            .bit(self.terminal_type)
            .is_some_and(|bit| self.data[bit / 8] & (0x80 >> (bit % 8)) != 0)
    }

    /// Grant or revoke `right`
    ///
    /// Returns `false` if the right does not exist for this terminal type.
    pub fn set_right(&mut self, right: AccessRight, selected: bool) -> bool {
        let Some(bit) = right.bit(self.terminal_type) else {
            return false;
        };
        let mask = 0x80 >> (bit % 8);
        if selected {
            self.data[bit / 8] |= mask;
        } else {
            self.data[bit / 8] &= !mask;
        }
        true
    }

    /// Set read access to a data group given by name, e.g. `DG04`
    pub fn set_read_access_by_name(&mut self, name: &str, selected: bool) -> Result<bool> {
        Ok(self.set_right(AccessRight::Read(name.parse()?), selected))
    }

    /// Set write access to a data group given by name, e.g. `DG17`
    pub fn set_write_access_by_name(&mut self, name: &str, selected: bool) -> Result<bool> {
        Ok(self.set_right(AccessRight::Write(name.parse()?), selected))
    }

    /// Set a special function given by name, e.g. `AGE_VERIFICATION`
    pub fn set_special_function_by_name(&mut self, name: &str, selected: bool) -> Result<bool> {
        Ok(self.set_right(AccessRight::Special(name.parse()?), selected))
    }

    /// Set an inspection system or signature terminal right given by name
    pub fn set_access_right_by_name(&mut self, name: &str, selected: bool) -> Result<bool> {
        Ok(self.set_right(AccessRight::Terminal(name.parse()?), selected))
    }

    /// Every right defined for this terminal type with its current state
    pub fn rights(&self) -> Vec<(AccessRight, bool)> {
        AccessRight::for_terminal_type(self.terminal_type)
            .into_iter()
            .map(|right| (right, self.has_right(right)))
            .collect()
    }

    /// Rights that are granted
    pub fn granted_rights(&self) -> Vec<AccessRight> {
        self.rights()
            .into_iter()
            .filter_map(|(right, granted)| granted.then_some(right))
            .collect()
    }

    /// Read access per data group
    pub fn read_access(&self) -> Vec<(DataGroup, bool)> {
        DataGroup::all()
            .map(|dg| (dg, self.has_right(AccessRight::Read(dg))))
            .collect()
    }

    /// Special functions and whether they are granted
    pub fn special_functions(&self) -> Vec<(SpecialFunction, bool)> {
        SpecialFunction::ALL
            .into_iter()
            .map(|function| (function, self.has_right(AccessRight::Special(function))))
            .collect()
    }

    /// Clear every right that `mask` does not grant
    ///
    /// A mask for a different terminal type grants nothing.
    pub fn restrict_access_rights(&mut self, mask: &Self) {
        for (right, granted) in self.rights() {
            if granted && !mask.has_right(right) {
                self.set_right(right, false);
            }
        }
    }

    /// Whether every right granted here is also granted by `other`
    pub fn is_covered_by(&self, other: &Self) -> bool {
        self.granted_rights()
            .into_iter()
            .all(|right| other.has_right(right))
    }

    /// Encode as a `7F4C` TLV object
    pub fn to_tlv(&self) -> Tlv {
        Tlv::constructed(
            CHAT_TAG,
            vec![
                Tlv::primitive(OID_TAG, oid::encode_arcs(self.terminal_type.oid())),
                Tlv::primitive(
                    DISCRETIONARY_DATA_TAG,
                    Bytes::copy_from_slice(self.discretionary_data()),
                ),
            ],
        )
    }

    /// Encoded `7F4C` object
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_tlv().to_bytes(false)
    }
}

impl TryFrom<&Tlv> for Chat {
    type Error = Error;

    fn try_from(tlv: &Tlv) -> Result<Self> {
        if tlv.tag() != CHAT_TAG {
            return Err(Error::MalformedChat("not a CHAT object"));
        }
        let mut fields = Parser::children_of(tlv);
        let oid = ObjectIdentifier::from_der_value(fields.expect(OID_TAG)?.value())?;
        let data = fields.expect(DISCRETIONARY_DATA_TAG)?;

        let terminal_type =
            TerminalType::from_oid(&oid).ok_or(Error::MalformedChat("unknown terminal type"))?;
        let value = data.value();
        if value.len() != terminal_type.data_len() {
            return Err(Error::MalformedChat("discretionary data has the wrong length"));
        }

        let mut chat = Self::new(terminal_type);
        chat.data[..value.len()].copy_from_slice(value);
        Ok(chat)
    }
}

impl fmt::Display for Chat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT_CHAT: &str = "7F4C12060904007F00070301020253053C0F13FFE7";

    fn dg(number: u8) -> DataGroup {
        DataGroup::new(number).unwrap()
    }

    #[test]
    fn test_decode_authentication_terminal() {
        let chat = Chat::from_bytes(&hex::decode(AT_CHAT).unwrap()).unwrap();
        assert_eq!(chat.terminal_type(), TerminalType::AuthenticationTerminal);
        assert_eq!(chat.role(), Role::AuthenticationTerminal);

        // 0x3C: write DG17..DG20
        for n in 17..=20 {
            assert!(chat.has_right(AccessRight::Write(dg(n))), "write DG{n}");
        }
        assert!(!chat.has_right(AccessRight::Write(dg(21))));

        // byte 3 = 0xFF: read DG01..DG08
        for n in 1..=8 {
            assert!(chat.has_right(AccessRight::Read(dg(n))), "read DG{n}");
        }
        // byte 1 = 0x0F: bits 12..15 are DG20..DG17
        assert!(chat.has_right(AccessRight::Read(dg(17))));
        assert!(!chat.has_right(AccessRight::Read(dg(21))));

        // 0xE7
        assert!(chat.has_right(AccessRight::Special(SpecialFunction::InstallQualifiedCertificate)));
        assert!(!chat.has_right(AccessRight::Special(SpecialFunction::CanAllowed)));
        assert!(chat.has_right(AccessRight::Special(SpecialFunction::AgeVerification)));

        assert_eq!(chat.to_string(), AT_CHAT);
    }

    #[test]
    fn test_read_dg21_and_write_dg21_bits() {
        let mut chat = Chat::default();
        assert!(chat.set_right(AccessRight::Read(dg(21)), true));
        assert_eq!(chat.discretionary_data(), &[0x00, 0x10, 0x00, 0x00, 0x00]);

        let mut chat = Chat::default();
        assert!(chat.set_right(AccessRight::Write(dg(21)), true));
        assert_eq!(chat.discretionary_data(), &[0x02, 0x00, 0x00, 0x00, 0x00]);

        // write access only exists for DG17..DG21
        assert!(!chat.set_right(AccessRight::Write(dg(16)), true));
    }

    #[test]
    fn test_role_bits() {
        let mut chat = Chat::default();
        chat.set_role(Role::Cvca);
        assert_eq!(chat.role(), Role::Cvca);
        chat.set_role(Role::DvNonOfficial);
        assert_eq!(chat.role(), Role::DvNonOfficial);
        assert!(!chat.role().is_terminal());
        chat.set_role(Role::AuthenticationTerminal);
        assert!(chat.role().is_terminal());
    }

    #[test]
    fn test_inspection_system_rights() {
        let data = hex::decode("7F4C0E060904007F0007030102015301 03".replace(' ', "")).unwrap();
        let chat = Chat::from_bytes(&data).unwrap();
        assert_eq!(chat.role(), Role::InspectionTerminal);
        assert!(chat.has_right(AccessRight::Terminal(TerminalRight::Dg03)));
        assert!(chat.has_right(AccessRight::Terminal(TerminalRight::Dg04)));
        assert!(!chat.has_right(AccessRight::Terminal(TerminalRight::GenerateSignature)));
        assert_eq!(chat.to_bytes(), data);
    }

    #[test]
    fn test_signature_terminal_encodes_both_rights() {
        let mut chat = Chat::new(TerminalType::SignatureTerminal);
        chat.set_access_right_by_name("GENERATE_SIGNATURE", true).unwrap();
        assert_eq!(chat.discretionary_data(), &[0x01]);
        chat.set_access_right_by_name("GENERATE_QUALIFIED_SIGNATURE", true).unwrap();
        assert_eq!(chat.discretionary_data(), &[0x03]);
    }

    #[test]
    fn test_set_by_name() {
        let mut chat = Chat::default();
        assert!(chat.set_read_access_by_name("DG04", true).unwrap());
        assert!(chat.set_special_function_by_name("AGE_VERIFICATION", true).unwrap());
        assert!(chat.set_write_access_by_name("DG17", true).unwrap());
        assert!(!chat.set_access_right_by_name("DG03", true).unwrap());
        assert_eq!(
            chat.set_read_access_by_name("DG22", true),
            Err(Error::UnknownRight("DG22".to_string()))
        );
        assert!(chat.set_special_function_by_name("FLY", true).is_err());
        assert_eq!(chat.granted_rights().len(), 3);
    }

    #[test]
    fn test_restrict_and_cover() {
        let terminal = Chat::from_bytes(&hex::decode(AT_CHAT).unwrap()).unwrap();

        let mut requested = Chat::default();
        requested.set_right(AccessRight::Read(dg(1)), true);
        requested.set_right(AccessRight::Read(dg(21)), true);
        assert!(!requested.is_covered_by(&terminal));

        requested.restrict_access_rights(&terminal);
        assert!(requested.has_right(AccessRight::Read(dg(1))));
        assert!(!requested.has_right(AccessRight::Read(dg(21))));
        assert!(requested.is_covered_by(&terminal));
        assert!(Chat::default().is_covered_by(&terminal));
    }

    #[test]
    fn test_restrict_by_other_terminal_type_clears_everything() {
        let mut chat = Chat::from_bytes(&hex::decode(AT_CHAT).unwrap()).unwrap();
        chat.restrict_access_rights(&Chat::new(TerminalType::InspectionSystem));
        assert!(chat.granted_rights().is_empty());
    }

    #[test]
    fn test_fixup() {
        let fixed = Chat::fixup(&hex::decode("3C0F13FFE7").unwrap());
        assert_eq!(fixed.len(), 21);
        assert_eq!(hex::encode_upper(&fixed), AT_CHAT);

        let full = hex::decode(AT_CHAT).unwrap();
        assert_eq!(Chat::fixup(&full).as_ref(), full.as_slice());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            Chat::from_bytes(&hex::decode("7F4C0A0603040007530301").unwrap()),
            Err(Error::Tlv(_))
        ));
        assert_eq!(
            Chat::from_bytes(&hex::decode("7F4C08060204005302FFFF").unwrap()),
            Err(Error::MalformedChat("unknown terminal type"))
        );
        assert_eq!(
            Chat::from_bytes(&hex::decode("7F4C0F060904007F000703010202530200 00".replace(' ', "")).unwrap()),
            Err(Error::MalformedChat("discretionary data has the wrong length"))
        );
    }
}
