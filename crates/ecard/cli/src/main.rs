use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

mod commands;
mod utils;

use commands::*;
use utils::PinStateArg;

#[derive(Parser)]
#[command(version, about = "eID client tool for inspecting CVCs and CHATs and running EAC")]
struct Cli {
    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode BER-TLV data and print its structure
    Tlv {
        /// Data as a hex string
        #[arg(required = true)]
        data: String,
    },

    /// Decode a CHAT and list its access rights
    Chat {
        /// Encoded CHAT or bare discretionary data, as a hex string
        #[arg(required = true)]
        data: String,
    },

    /// Decode card verifiable certificates and check their chain
    Cvc {
        /// Certificates as hex strings
        #[arg(required = true)]
        certificates: Vec<String>,

        /// Certificate description to check against the terminal certificate
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Look up a signature algorithm
    Algorithm {
        /// PKCS#11 mechanism id, decimal or 0x prefixed hex
        #[arg(long, group = "lookup")]
        mechanism: Option<String>,

        /// JCA name, e.g. SHA256withECDSA
        #[arg(long, group = "lookup")]
        jca: Option<String>,

        /// Algorithm URI
        #[arg(long, group = "lookup")]
        uri: Option<String>,
    },

    /// Run the first EAC round against a simulated card
    Simulate {
        /// PIN to try first; prompted for if absent
        #[arg(long)]
        pin: Option<String>,

        /// PIN the simulated card expects
        #[arg(long, default_value = "123456")]
        card_pin: String,

        /// CAN printed on the simulated card
        #[arg(long, default_value = "500540")]
        can: String,

        /// Retry counter of the simulated card
        #[arg(long, value_enum, default_value_t = PinStateArg::Rc3)]
        pin_state: PinStateArg,

        /// Let the reader collect the password
        #[arg(long)]
        native: bool,

        /// Accept the optional rights and the eService without asking
        #[arg(short, long)]
        yes: bool,

        /// Transaction information shown with the eService
        #[arg(long)]
        transaction_info: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Tlv { data } => tlv_command(&data)?,
        Commands::Chat { data } => chat_command(&data)?,
        Commands::Cvc {
            certificates,
            description,
        } => cvc_command(&certificates, description.as_deref())?,
        Commands::Algorithm { mechanism, jca, uri } => {
            algorithm_command(mechanism.as_deref(), jca.as_deref(), uri.as_deref())?
        }
        Commands::Simulate {
            pin,
            card_pin,
            can,
            pin_state,
            native,
            yes,
            transaction_info,
        } => simulate_command(SimulateArgs {
            pin,
            card_pin,
            can,
            pin_state: pin_state.into(),
            native,
            yes,
            transaction_info,
        })?,
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    // RUST_LOG directives take precedence over the verbosity flag
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .init();
}
