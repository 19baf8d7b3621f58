//! Card-verifiable certificates and the structures that travel with them

pub mod certificate;
pub mod chain;
pub mod description;

pub use certificate::{CardVerifiableCertificate, CvcDate, PublicKey, PublicKeyReference};
pub use chain::CertificateChain;
pub use description::{CertificateDescription, TermsOfUsage};
