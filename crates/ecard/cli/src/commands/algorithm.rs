//! Signature algorithm registry lookups

use anyhow::Result;
use ecard_crypto::SignatureAlgorithm;

use crate::utils::{self, display};

/// Look up an algorithm by mechanism id, JCA name or URI, or list the registry
pub fn algorithm_command(
    mechanism: Option<&str>,
    jca: Option<&str>,
    uri: Option<&str>,
) -> Result<()> {
    let algorithm = match (mechanism, jca, uri) {
        (Some(mechanism), _, _) => {
            SignatureAlgorithm::from_mechanism_id(utils::parse_mechanism(mechanism)?)?
        }
        (_, Some(name), _) => SignatureAlgorithm::from_jca_name(name)?,
        (_, _, Some(uri)) => SignatureAlgorithm::from_alg_id(uri)?,
        (None, None, None) => {
            println!("{}", display::heading("Signature algorithms"));
            for algorithm in SignatureAlgorithm::all() {
                println!(
                    "  {:#010x}  {:<28} {}",
                    algorithm.mechanism_id(),
                    algorithm.jca_name(),
                    algorithm.alg_id()
                );
            }
            return Ok(());
        }
    };
    print_algorithm(algorithm);
    Ok(())
}

fn print_algorithm(algorithm: SignatureAlgorithm) {
    println!("{}", display::heading(algorithm.jca_name()));
    println!("{}", display::field("Mechanism", format!("{:#x}", algorithm.mechanism_id())));
    println!("{}", display::field("URI", algorithm.alg_id()));
    println!("{}", display::field("Key type", algorithm.key_type()));
    match algorithm.hash() {
        Some(hash) => println!("{}", display::field("Hash", hash)),
        None => println!("{}", display::field("Hash", "none")),
    }
    println!("{}", display::field("RSA-PSS", algorithm.is_rsa_pss()));
    println!("{}", display::field("RSA-SSA", algorithm.is_rsa_ssa()));
}
