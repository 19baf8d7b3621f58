//! Terminal based user consent

use std::io::{self, BufRead, Write};

use ecard_crypto::Chat;
use ecard_eac::{Step, StepResult, UserConsent};
use parking_lot::Mutex;
use tracing::debug;
use zeroize::Zeroizing;

use super::display;

/// Asks the user on stdin and prints steps to stdout
#[derive(Debug)]
pub struct ConsoleConsent {
    first_pin: Mutex<Option<Zeroizing<String>>>,
    assume_yes: bool,
}

impl ConsoleConsent {
    /// Console consent that tries `pin` first and asks for anything else
    pub fn new(pin: Option<String>, assume_yes: bool) -> Self {
        Self {
            first_pin: Mutex::new(pin.map(Zeroizing::new)),
            assume_yes,
        }
    }

    fn ask(&self, question: &str) -> Option<Zeroizing<String>> {
        print!("{question} ");
        if io::stdout().flush().is_err() {
            return None;
        }
        let mut line = Zeroizing::new(String::new());
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => {
                debug!("Input closed");
                None
            }
            Ok(_) => Some(Zeroizing::new(line.trim().to_string())),
        }
    }

    fn confirm(&self, question: &str) -> Option<bool> {
        if self.assume_yes {
            return Some(true);
        }
        let answer = self.ask(&format!("{question} [Y/n]"))?;
        Some(!matches!(answer.to_ascii_lowercase().as_str(), "n" | "no"))
    }

    fn password(&self, label: &str, first: Option<Zeroizing<String>>) -> StepResult {
        match first.or_else(|| self.ask(&format!("{label}:"))) {
            Some(password) => StepResult::password(&password),
            None => StepResult::cancel(),
        }
    }

    fn chat_selection(&self, required: &Chat, optional: &Chat, selected: &Chat) -> StepResult {
        println!("{}", display::heading("Requested rights"));
        for right in required.granted_rights() {
            println!("  {} {right} (required)", display::granted(true));
        }
        let optional_rights: Vec<_> = optional
            .granted_rights()
            .into_iter()
            .filter(|right| !required.has_right(*right))
            .collect();
        for right in &optional_rights {
            println!("  {} {right}", display::granted(selected.has_right(*right)));
        }
        if optional_rights.is_empty() {
            return StepResult::ok();
        }

        match self.confirm("Grant the optional rights?") {
            Some(true) => StepResult::ok(),
            Some(false) => optional_rights
                .into_iter()
                .fold(StepResult::ok(), |result, right| result.with_right(right, false)),
            None => StepResult::cancel(),
        }
    }
}

impl UserConsent for ConsoleConsent {
    fn show(&self, step: &Step) -> StepResult {
        match step {
            Step::ChatSelection {
                required,
                optional,
                selected,
            } => self.chat_selection(required, optional, selected),
            Step::PinEntry {
                attempts,
                native,
                retry,
                error,
            } => {
                if let Some(error) = error {
                    println!("{}", display::notice(error));
                }
                if let Some(attempts) = attempts {
                    println!("{}", display::field("PIN tries left", attempts));
                }
                if *native {
                    println!("Enter the PIN on the reader.");
                    return StepResult::ok();
                }
                let first = if *retry || error.is_some() {
                    None
                } else {
                    self.first_pin.lock().take()
                };
                self.password("PIN", first)
            }
            Step::CanEntry {
                native,
                wrong_can,
                error,
            } => {
                println!("{}", display::notice("The PIN is suspended, the CAN is required."));
                if *wrong_can {
                    println!("{}", display::notice("The CAN was wrong."));
                }
                if let Some(error) = error {
                    println!("{}", display::notice(error));
                }
                if *native {
                    println!("Enter the CAN on the reader.");
                    return StepResult::ok();
                }
                self.password("CAN", None)
            }
            Step::CvcConfirm {
                holder,
                description,
                transaction_info,
            } => {
                println!("{}", display::heading("Service provider"));
                println!("{}", display::field("Holder", holder));
                for (label, value) in [
                    ("Name", description.subject_name()),
                    ("URL", description.subject_url()),
                    ("Issuer", description.issuer_name()),
                    ("Issuer URL", description.issuer_url()),
                ] {
                    if let Some(value) = value {
                        println!("{}", display::field(label, value));
                    }
                }
                if let Some(terms) = description.terms_of_usage() {
                    println!("{}", display::field("Terms", terms.mime_type()));
                    if terms.mime_type() == "text/plain" {
                        println!("{}", String::from_utf8_lossy(terms.as_bytes()));
                    }
                }
                if let Some(info) = transaction_info {
                    println!("{}", display::field("Transaction", info));
                }
                match self.confirm("Continue with this service provider?") {
                    Some(true) => StepResult::ok(),
                    _ => StepResult::cancel(),
                }
            }
            Step::Processing => {
                println!("Authenticating...");
                StepResult::ok()
            }
            Step::Error {
                title,
                message,
                terminal,
                ..
            } => {
                println!("{}", display::failure(&format!("{title}: {message}")));
                if !terminal {
                    println!("Trying again.");
                }
                StepResult::ok()
            }
        }
    }
}
