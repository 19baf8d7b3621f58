//! Signature algorithm registry
//!
//! Each [`SignatureAlgorithm`] ties together its PKCS#11 mechanism id, the JCA style name, the
//! XML signature algorithm URI, the key type and the hash function it signs over. All lookups
//! go through one static table.

use std::fmt;

use derive_more::Display;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use tracing::debug;

use crate::error::{Error, Result};
use crate::oid::{self, ObjectIdentifier};

/// Key type a signature algorithm operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum KeyType {
    /// RSA key
    #[display("RSA")]
    Rsa,
    /// Elliptic curve key
    #[display("EC")]
    Ec,
}

/// Hash function used by a signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum HashAlgorithm {
    /// SHA-1
    #[display("SHA-1")]
    Sha1,
    /// SHA-224
    #[display("SHA-224")]
    Sha224,
    /// SHA-256
    #[display("SHA-256")]
    Sha256,
    /// SHA-384
    #[display("SHA-384")]
    Sha384,
    /// SHA-512
    #[display("SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    /// Object identifier of the hash function
    pub const fn oid(self) -> &'static [u64] {
        match self {
            Self::Sha1 => oid::ID_SHA1,
            Self::Sha224 => oid::ID_SHA224,
            Self::Sha256 => oid::ID_SHA256,
            Self::Sha384 => oid::ID_SHA384,
            Self::Sha512 => oid::ID_SHA512,
        }
    }

    /// Output size in bytes
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Hash `data`
    ///
    /// SHA-1 is recognized but not implemented.
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        let hash = match self {
            Self::Sha1 => {
                return Err(Error::UnsupportedAlgorithm(
                    "SHA-1 digests are not supported.".to_string(),
                ));
            }
            Self::Sha224 => Sha224::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        };
        Ok(hash)
    }
}

/// Known signature algorithms, named after their PKCS#11 mechanisms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// Raw RSA PKCS#1 v1.5
    RsaPkcs,
    /// RSA PKCS#1 v1.5 with SHA-1
    Sha1RsaPkcs,
    /// Raw RSA PSS
    RsaPkcsPss,
    /// RSA PSS with SHA-1
    Sha1RsaPkcsPss,
    /// RSA PKCS#1 v1.5 with SHA-256
    Sha256RsaPkcs,
    /// RSA PKCS#1 v1.5 with SHA-384
    Sha384RsaPkcs,
    /// RSA PKCS#1 v1.5 with SHA-512
    Sha512RsaPkcs,
    /// RSA PSS with SHA-256
    Sha256RsaPkcsPss,
    /// RSA PSS with SHA-384
    Sha384RsaPkcsPss,
    /// RSA PSS with SHA-512
    Sha512RsaPkcsPss,
    /// RSA PKCS#1 v1.5 with SHA-224
    Sha224RsaPkcs,
    /// RSA PSS with SHA-224
    Sha224RsaPkcsPss,
    /// Raw ECDSA
    Ecdsa,
    /// ECDSA with SHA-1
    EcdsaSha1,
    /// ECDSA with SHA-224
    EcdsaSha224,
    /// ECDSA with SHA-256
    EcdsaSha256,
    /// ECDSA with SHA-384
    EcdsaSha384,
    /// ECDSA with SHA-512
    EcdsaSha512,
}

/// One row of the registry
#[derive(Debug)]
struct Entry {
    algorithm: SignatureAlgorithm,
    mechanism_id: u64,
    jca_name: &'static str,
    alg_id: &'static str,
    key_type: KeyType,
    hash: Option<HashAlgorithm>,
}

macro_rules! entry {
    ($alg:ident, $id:literal, $jca:literal, $uri:expr, $key:ident, $hash:expr) => {
        Entry {
            algorithm: SignatureAlgorithm::$alg,
            mechanism_id: $id,
            jca_name: $jca,
            alg_id: $uri,
            key_type: KeyType::$key,
            hash: $hash,
        }
    };
}

static TABLE: [Entry; 18] = [
    entry!(RsaPkcs, 0x0001, "NONEwithRSA", "http://ws.openecard.org/alg/rsa", Rsa, None),
    entry!(Sha1RsaPkcs, 0x0006, "SHA1withRSA", "http://www.w3.org/2000/09/xmldsig#rsa-sha1", Rsa, Some(HashAlgorithm::Sha1)),
    entry!(RsaPkcsPss, 0x000D, "NONEwithRSAandMGF1", "http://ws.openecard.org/alg/rsa-MGF1", Rsa, None),
    entry!(Sha1RsaPkcsPss, 0x000E, "SHA1withRSAandMGF1", "http://www.w3.org/2007/05/xmldsig-more#sha1-rsa-MGF1", Rsa, Some(HashAlgorithm::Sha1)),
    entry!(Sha256RsaPkcs, 0x0040, "SHA256withRSA", "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256", Rsa, Some(HashAlgorithm::Sha256)),
    entry!(Sha384RsaPkcs, 0x0041, "SHA384withRSA", "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384", Rsa, Some(HashAlgorithm::Sha384)),
    entry!(Sha512RsaPkcs, 0x0042, "SHA512withRSA", "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512", Rsa, Some(HashAlgorithm::Sha512)),
    entry!(Sha256RsaPkcsPss, 0x0043, "SHA256withRSAandMGF1", "http://www.w3.org/2007/05/xmldsig-more#sha256-rsa-MGF1", Rsa, Some(HashAlgorithm::Sha256)),
    entry!(Sha384RsaPkcsPss, 0x0044, "SHA384withRSAandMGF1", "http://www.w3.org/2007/05/xmldsig-more#sha384-rsa-MGF1", Rsa, Some(HashAlgorithm::Sha384)),
    entry!(Sha512RsaPkcsPss, 0x0045, "SHA512withRSAandMGF1", "http://www.w3.org/2007/05/xmldsig-more#sha512-rsa-MGF1", Rsa, Some(HashAlgorithm::Sha512)),
    entry!(Sha224RsaPkcs, 0x0046, "SHA224withRSA", "http://www.w3.org/2001/04/xmldsig-more#rsa-sha224", Rsa, Some(HashAlgorithm::Sha224)),
    entry!(Sha224RsaPkcsPss, 0x0047, "SHA224withRSAandMGF1", "http://www.w3.org/2007/05/xmldsig-more#sha224-rsa-MGF1", Rsa, Some(HashAlgorithm::Sha224)),
    entry!(Ecdsa, 0x1041, "NONEwithECDSA", "http://ws.openecard.org/alg/ecdsa", Ec, None),
    entry!(EcdsaSha1, 0x1042, "SHA1withECDSA", "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha1", Ec, Some(HashAlgorithm::Sha1)),
    entry!(EcdsaSha224, 0x1043, "SHA224withECDSA", "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha224", Ec, Some(HashAlgorithm::Sha224)),
    entry!(EcdsaSha256, 0x1044, "SHA256withECDSA", "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256", Ec, Some(HashAlgorithm::Sha256)),
    entry!(EcdsaSha384, 0x1045, "SHA384withECDSA", "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384", Ec, Some(HashAlgorithm::Sha384)),
    entry!(EcdsaSha512, 0x1046, "SHA512withECDSA", "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512", Ec, Some(HashAlgorithm::Sha512)),
];

impl SignatureAlgorithm {
    /// Every registered algorithm, in table order
    pub fn all() -> impl Iterator<Item = Self> {
        TABLE.iter().map(|entry| entry.algorithm)
    }

    fn entry(self) -> &'static Entry {
        // the table holds exactly one row per variant, in declaration order
        &TABLE[self as usize]
    }

    /// PKCS#11 mechanism id
    pub fn mechanism_id(self) -> u64 {
        self.entry().mechanism_id
    }

    /// JCA style algorithm name, e.g. `SHA256withECDSA`
    pub fn jca_name(self) -> &'static str {
        self.entry().jca_name
    }

    /// XML signature algorithm URI
    pub fn alg_id(self) -> &'static str {
        self.entry().alg_id
    }

    /// Key type the algorithm operates on
    pub fn key_type(self) -> KeyType {
        self.entry().key_type
    }

    /// Hash function, `None` for raw signature mechanisms
    pub fn hash(self) -> Option<HashAlgorithm> {
        self.entry().hash
    }

    /// RSA PSS with a hash function
    pub const fn is_rsa_pss(self) -> bool {
        matches!(
            self,
            Self::Sha1RsaPkcsPss | Self::Sha256RsaPkcsPss | Self::Sha384RsaPkcsPss | Self::Sha512RsaPkcsPss
        )
    }

    /// RSA signature with a hash function that is not one of the PSS schemes
    pub fn is_rsa_ssa(self) -> bool {
        self.key_type() == KeyType::Rsa && self.hash().is_some() && !self.is_rsa_pss()
    }

    /// Look up an algorithm by PKCS#11 mechanism id
    pub fn from_mechanism_id(id: u64) -> Result<Self> {
        find(|entry| entry.mechanism_id == id).ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("No mechanism defined for ID {id:08x}."))
        })
    }

    /// Look up an algorithm by JCA name
    pub fn from_jca_name(name: &str) -> Result<Self> {
        find(|entry| entry.jca_name == name)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("No JCA Name {name} available.")))
    }

    /// Look up an algorithm by XML signature algorithm URI
    pub fn from_alg_id(alg_id: &str) -> Result<Self> {
        find(|entry| entry.alg_id == alg_id).ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("No Algorithm ID {alg_id} available."))
        })
    }

    /// Translate an algorithm URI into its JCA name
    pub fn alg_id_to_jca_name(alg_id: &str) -> Result<&'static str> {
        find(|entry| entry.alg_id == alg_id)
            .map(Self::jca_name)
            .ok_or_else(|| {
                Error::UnsupportedAlgorithm(format!("No JCA Name available for OID {alg_id}."))
            })
    }

    /// Translate a JCA name into its algorithm URI
    pub fn jca_name_to_alg_id(name: &str) -> Result<&'static str> {
        find(|entry| entry.jca_name == name)
            .map(Self::alg_id)
            .ok_or_else(|| {
                Error::UnsupportedAlgorithm(format!("No OID available for JCA Name {name}."))
            })
    }

    /// Signature scheme named by an `id-TA-*` public key OID in a CV certificate
    pub fn from_ta_oid(oid: &ObjectIdentifier) -> Result<Self> {
        let algorithm = match oid.arcs() {
            a if a == oid::ID_TA_RSA_V1_5_SHA_1 => Self::Sha1RsaPkcs,
            a if a == oid::ID_TA_RSA_V1_5_SHA_256 => Self::Sha256RsaPkcs,
            a if a == oid::ID_TA_RSA_V1_5_SHA_512 => Self::Sha512RsaPkcs,
            a if a == oid::ID_TA_RSA_PSS_SHA_1 => Self::Sha1RsaPkcsPss,
            a if a == oid::ID_TA_RSA_PSS_SHA_256 => Self::Sha256RsaPkcsPss,
            a if a == oid::ID_TA_RSA_PSS_SHA_512 => Self::Sha512RsaPkcsPss,
            a if a == oid::ID_TA_ECDSA_SHA_1 => Self::EcdsaSha1,
            a if a == oid::ID_TA_ECDSA_SHA_224 => Self::EcdsaSha224,
            a if a == oid::ID_TA_ECDSA_SHA_256 => Self::EcdsaSha256,
            a if a == oid::ID_TA_ECDSA_SHA_384 => Self::EcdsaSha384,
            a if a == oid::ID_TA_ECDSA_SHA_512 => Self::EcdsaSha512,
            _ => {
                debug!(%oid, "No signature scheme for terminal authentication OID");
                return Err(Error::UnsupportedAlgorithm(format!(
                    "No signature algorithm defined for OID {oid}."
                )));
            }
        };
        Ok(algorithm)
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jca_name())
    }
}

fn find(predicate: impl Fn(&Entry) -> bool) -> Option<SignatureAlgorithm> {
    TABLE.iter().find(|entry| predicate(entry)).map(|entry| entry.algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_variant_order() {
        for (index, entry) in TABLE.iter().enumerate() {
            assert_eq!(entry.algorithm as usize, index, "{}", entry.jca_name);
        }
    }

    #[test]
    fn test_lookups_agree() {
        for algorithm in SignatureAlgorithm::all() {
            assert_eq!(SignatureAlgorithm::from_mechanism_id(algorithm.mechanism_id()), Ok(algorithm));
            assert_eq!(SignatureAlgorithm::from_jca_name(algorithm.jca_name()), Ok(algorithm));
            assert_eq!(SignatureAlgorithm::from_alg_id(algorithm.alg_id()), Ok(algorithm));
            assert_eq!(
                SignatureAlgorithm::alg_id_to_jca_name(algorithm.alg_id()),
                Ok(algorithm.jca_name())
            );
            assert_eq!(
                SignatureAlgorithm::jca_name_to_alg_id(algorithm.jca_name()),
                Ok(algorithm.alg_id())
            );
        }
    }

    #[test]
    fn test_pss_and_ssa_classification() {
        use SignatureAlgorithm::*;
        assert!(Sha256RsaPkcsPss.is_rsa_pss());
        assert!(!Sha256RsaPkcsPss.is_rsa_ssa());
        assert!(Sha256RsaPkcs.is_rsa_ssa());
        assert!(!RsaPkcs.is_rsa_ssa());
        assert!(!EcdsaSha256.is_rsa_ssa());
        // SHA-224 PSS is not one of the PSS schemes but still hashes with RSA
        assert!(!Sha224RsaPkcsPss.is_rsa_pss());
        assert!(Sha224RsaPkcsPss.is_rsa_ssa());
    }

    #[test]
    fn test_unknown_mechanism_message() {
        assert_eq!(
            SignatureAlgorithm::from_mechanism_id(0xFFFF_FFFF),
            Err(Error::UnsupportedAlgorithm(
                "No mechanism defined for ID ffffffff.".to_string()
            ))
        );
    }

    #[test]
    fn test_digest() {
        assert_eq!(
            hex::encode(HashAlgorithm::Sha256.digest(b"abc").unwrap()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(HashAlgorithm::Sha512.digest(b"").unwrap().len(), 64);
        assert!(matches!(
            HashAlgorithm::Sha1.digest(b"abc"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_from_ta_oid() {
        let oid = ObjectIdentifier::from_arcs(oid::ID_TA_ECDSA_SHA_256).unwrap();
        let algorithm = SignatureAlgorithm::from_ta_oid(&oid).unwrap();
        assert_eq!(algorithm, SignatureAlgorithm::EcdsaSha256);
        assert_eq!(algorithm.hash(), Some(HashAlgorithm::Sha256));
        assert_eq!(algorithm.to_string(), "SHA256withECDSA");

        let unknown = ObjectIdentifier::from_arcs(oid::ID_AT).unwrap();
        assert!(SignatureAlgorithm::from_ta_oid(&unknown).is_err());
    }
}
