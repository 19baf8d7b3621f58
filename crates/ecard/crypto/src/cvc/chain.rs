//! Chain of CV certificates sent by the eService
//!
//! Certificates are classified by the role in their CHAT. The chain is not required to reach
//! a trust anchor; the CVCA usually lives on the card and is referenced only by CAR.

use tracing::{debug, warn};

use super::certificate::{CardVerifiableCertificate, PublicKeyReference};
use crate::chat::Role;
use crate::error::{Error, Result};

/// Ordered set of CV certificates without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateChain {
    certificates: Vec<CardVerifiableCertificate>,
}

impl CertificateChain {
    /// Build a chain, skipping certificates that are already present
    pub fn new(certificates: impl IntoIterator<Item = CardVerifiableCertificate>) -> Self {
        let mut chain = Self::default();
        for certificate in certificates {
            chain.add_certificate(certificate);
        }
        chain
    }

    /// Decode and collect encoded certificates
    pub fn from_encoded<'a>(encoded: impl IntoIterator<Item = &'a [u8]>) -> Result<Self> {
        let certificates = encoded
            .into_iter()
            .map(CardVerifiableCertificate::from_bytes)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(certificates))
    }

    /// Add a certificate, returning `false` if an identical one is already in the chain
    pub fn add_certificate(&mut self, certificate: CardVerifiableCertificate) -> bool {
        if self.contains(&certificate) {
            debug!(chr = %certificate.chr(), "Skipping duplicate certificate");
            return false;
        }
        self.certificates.push(certificate);
        true
    }

    /// Whether a certificate with the same encoding is in the chain
    pub fn contains(&self, certificate: &CardVerifiableCertificate) -> bool {
        self.certificates
            .iter()
            .any(|known| known.encoded() == certificate.encoded())
    }

    /// All certificates in insertion order
    pub fn certificates(&self) -> &[CardVerifiableCertificate] {
        &self.certificates
    }

    /// Number of certificates
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Whether the chain holds no certificate
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Country verifying CA certificates
    pub fn cvca_certificates(&self) -> impl Iterator<Item = &CardVerifiableCertificate> {
        self.by_role(|role| role == Role::Cvca)
    }

    /// Document verifier certificates
    pub fn dv_certificates(&self) -> impl Iterator<Item = &CardVerifiableCertificate> {
        self.by_role(|role| matches!(role, Role::DvOfficial | Role::DvNonOfficial))
    }

    /// Terminal certificates
    pub fn terminal_certificates(&self) -> impl Iterator<Item = &CardVerifiableCertificate> {
        self.by_role(Role::is_terminal)
    }

    /// The terminal certificate at the end of the chain
    pub fn terminal_certificate(&self) -> Option<&CardVerifiableCertificate> {
        self.terminal_certificates().next()
    }

    fn by_role(
        &self,
        accept: impl Fn(Role) -> bool,
    ) -> impl Iterator<Item = &CardVerifiableCertificate> {
        self.certificates
            .iter()
            .filter(move |certificate| accept(certificate.chat().role()))
    }

    /// Check that every terminal and DV certificate is issued by a certificate one level up
    ///
    /// A level without certificates is assumed to be known to the card and is not checked.
    pub fn verify(&self) -> Result<()> {
        let dv: Vec<_> = self.dv_certificates().collect();
        let cvca: Vec<_> = self.cvca_certificates().collect();
        check_issued_by(self.terminal_certificates(), &dv)?;
        check_issued_by(dv.iter().copied(), &cvca)
    }

    /// The certificates below `car`, following CHR to CAR links downwards
    pub fn chain_from_car(&self, car: &PublicKeyReference) -> Self {
        let mut chain = Self::default();
        self.collect_below(car, &mut chain);
        if chain.is_empty() {
            warn!(%car, "No certificate in the chain was issued by the CAR");
        }
        chain
    }

    fn collect_below(&self, car: &PublicKeyReference, chain: &mut Self) {
        for certificate in &self.certificates {
            if certificate.car() == car && chain.add_certificate(certificate.clone()) {
                self.collect_below(certificate.chr(), chain);
            }
        }
    }
}

fn check_issued_by<'a>(
    holders: impl Iterator<Item = &'a CardVerifiableCertificate>,
    authorities: &[&CardVerifiableCertificate],
) -> Result<()> {
    if authorities.is_empty() {
        return Ok(());
    }
    for holder in holders {
        if !authorities.iter().any(|authority| authority.chr() == holder.car()) {
            return Err(Error::MalformedChain(format!(
                "Cannot find a CHR for the CAR ({}).",
                holder.car()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cvc::certificate::tests::build;

    fn cvc(car: &str, chr: &str, role: Role) -> CardVerifiableCertificate {
        CardVerifiableCertificate::from_bytes(&build(car, chr, role, None)).unwrap()
    }

    fn full_chain() -> CertificateChain {
        CertificateChain::new([
            cvc("DECVCA00001", "DECVCA00001", Role::Cvca),
            cvc("DECVCA00001", "DEDV000001", Role::DvOfficial),
            cvc("DEDV000001", "DETERM00001", Role::AuthenticationTerminal),
        ])
    }

    #[test]
    fn test_classification() {
        let chain = full_chain();
        assert_eq!(chain.cvca_certificates().count(), 1);
        assert_eq!(chain.dv_certificates().count(), 1);
        assert_eq!(chain.terminal_certificates().count(), 1);
        assert_eq!(
            chain.terminal_certificate().unwrap().chr().to_string(),
            "DETERM00001"
        );
    }

    #[test]
    fn test_duplicates_are_skipped_not_fatal() {
        let terminal = cvc("DEDV000001", "DETERM00001", Role::AuthenticationTerminal);
        let dv = cvc("DECVCA00001", "DEDV000001", Role::DvOfficial);
        let mut chain = CertificateChain::new([terminal.clone(), terminal.clone(), dv.clone()]);
        // certificates after the duplicate are still taken
        assert_eq!(chain.len(), 2);
        assert!(!chain.add_certificate(dv));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_verify() {
        assert!(full_chain().verify().is_ok());

        // no DV certificate: the terminal CAR is resolved by the card
        let chain = CertificateChain::new([cvc("DEDV000001", "DETERM00001", Role::AuthenticationTerminal)]);
        assert!(chain.verify().is_ok());

        let broken = CertificateChain::new([
            cvc("DECVCA00001", "DEDV000002", Role::DvOfficial),
            cvc("DEDV000001", "DETERM00001", Role::AuthenticationTerminal),
        ]);
        assert_eq!(
            broken.verify(),
            Err(Error::MalformedChain(
                "Cannot find a CHR for the CAR (DEDV000001).".to_string()
            ))
        );
    }

    #[test]
    fn test_chain_from_car() {
        let chain = full_chain();
        let car = PublicKeyReference::new(b"DECVCA00001".to_vec());
        let below = chain.chain_from_car(&car);
        // the self signed CVCA is its own issuer and does not loop
        assert_eq!(below.len(), 3);

        let car = PublicKeyReference::new(b"DEDV000001".to_vec());
        let below = chain.chain_from_car(&car);
        assert_eq!(below.len(), 1);
        assert!(below.terminal_certificate().is_some());

        let unknown = PublicKeyReference::new(b"XX".to_vec());
        assert!(chain.chain_from_car(&unknown).is_empty());
    }
}
