//! Certificates and algorithms for eID clients
//!
//! This crate models the TR-03110 structures a terminal presents to an eID card during
//! Extended Access Control, together with the signature algorithm registry used to interpret
//! them.
//!
//! ## Overview
//!
//! - [`Chat`] is the Certificate Holder Authorization Template with its access right bitmap
//! - [`CardVerifiableCertificate`] and [`CertificateChain`] decode and organize CV certificates
//! - [`CertificateDescription`] describes the eService and is bound to its terminal certificate
//! - [`SignatureAlgorithm`] maps mechanism ids, JCA names and algorithm URIs onto each other
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod chat;
pub mod cvc;
pub mod error;
pub mod oid;
pub mod signature;

pub use chat::{AccessRight, Chat, DataGroup, Role, SpecialFunction, TerminalRight, TerminalType};
pub use cvc::{
    CardVerifiableCertificate, CertificateChain, CertificateDescription, CvcDate,
    PublicKeyReference, TermsOfUsage,
};
pub use error::{Error, Result, ResultExt};
pub use oid::ObjectIdentifier;
pub use signature::{HashAlgorithm, KeyType, SignatureAlgorithm};

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::{
        AccessRight, CardVerifiableCertificate, CertificateChain, CertificateDescription, Chat,
        Error, ResultExt, Role, SignatureAlgorithm, TerminalType,
    };
}
