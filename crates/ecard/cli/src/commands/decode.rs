//! Commands that decode TLV data, CHATs and certificates

use anyhow::{Context, Result};
use ecard_crypto::{CardVerifiableCertificate, CertificateChain, CertificateDescription, Chat};
use ecard_tlv::Tlv;
use tracing::{debug, info};

use crate::utils::{self, display};

/// Print the structure of BER-TLV data
pub fn tlv_command(data: &str) -> Result<()> {
    let bytes = utils::parse_hex("data", data)?;
    let nodes = Tlv::parse_all(&bytes).context("Failed to decode TLV data")?;
    debug!(objects = nodes.len(), "Decoded TLV data");

    println!("{}", display::heading("TLV structure"));
    for node in &nodes {
        print_tlv(node, 1);
    }
    Ok(())
}

fn print_tlv(node: &Tlv, depth: usize) {
    let indent = "  ".repeat(depth);
    if node.is_constructed() {
        println!("{indent}{} ({} bytes)", node.tag(), node.value().len());
        for child in node.children() {
            print_tlv(child, depth + 1);
        }
    } else {
        println!("{indent}{} = {}", node.tag(), hex::encode_upper(node.value()));
    }
}

/// Print the terminal type, role and access rights of a CHAT
pub fn chat_command(data: &str) -> Result<()> {
    let bytes = utils::parse_hex("CHAT", data)?;
    let chat = Chat::from_bytes(&Chat::fixup(&bytes)).context("Failed to decode CHAT")?;
    print_chat(&chat);
    Ok(())
}

fn print_chat(chat: &Chat) {
    println!("{}", display::heading("CHAT"));
    println!("{}", display::field("Encoded", chat));
    println!("{}", display::field("Terminal type", chat.terminal_type()));
    println!("{}", display::field("Role", chat.role()));
    for (right, granted) in chat.rights() {
        println!("  {} {right}", display::granted(granted));
    }
}

/// Print certificates and check their chain and description
pub fn cvc_command(certificates: &[String], description: Option<&str>) -> Result<()> {
    let mut decoded = Vec::with_capacity(certificates.len());
    for (index, certificate) in certificates.iter().enumerate() {
        let bytes = utils::parse_hex("certificate", certificate)?;
        let cvc = CardVerifiableCertificate::from_bytes(&bytes)
            .with_context(|| format!("Failed to decode certificate {}", index + 1))?;
        print_certificate(&cvc);
        decoded.push(cvc);
    }

    let chain = CertificateChain::new(decoded);
    println!("{}", display::heading("Chain"));
    match chain.verify() {
        Ok(()) => println!("{}", display::success("Every certificate is issued one level up")),
        Err(e) => println!("{}", display::failure(&e.to_string())),
    }

    if let Some(description) = description {
        let bytes = utils::parse_hex("description", description)?;
        let description = CertificateDescription::from_bytes(&bytes)
            .context("Failed to decode certificate description")?;
        if let Some(name) = description.subject_name() {
            println!("{}", display::field("Subject", name));
        }
        let terminal = chain
            .terminal_certificate()
            .context("No terminal certificate to check the description against")?;
        match terminal.check_description(description.encoded()) {
            Ok(()) => println!("{}", display::success("Description matches the terminal")),
            Err(e) => println!("{}", display::failure(&e.to_string())),
        }
    }
    info!(certificates = chain.len(), "Certificates checked");
    Ok(())
}

fn print_certificate(cvc: &CardVerifiableCertificate) {
    println!("{}", display::heading(&format!("Certificate {}", cvc.chr())));
    println!("{}", display::field("CAR", cvc.car()));
    println!("{}", display::field("CHR", cvc.chr()));
    println!("{}", display::field("Role", cvc.chat().role()));
    println!("{}", display::field("CHAT", cvc.chat()));
    println!("{}", display::field("Public key", cvc.public_key().oid()));
    match cvc.signature_algorithm() {
        Ok(algorithm) => println!("{}", display::field("Signature", algorithm)),
        Err(e) => println!("{}", display::notice(&e.to_string())),
    }
    println!("{}", display::field("Effective", cvc.effective_date()));
    println!("{}", display::field("Expires", cvc.expiration_date()));
    if let Some(hash) = cvc.description_hash() {
        println!("{}", display::field("Description hash", hex::encode_upper(hash)));
    }
}
