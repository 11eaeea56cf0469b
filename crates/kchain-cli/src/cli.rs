use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kchain",
    about = "kchain: a single-authority ledger of kitty ownership",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the ledger HTTP server
    Serve(ServeArgs),
    /// Generate a new signing key
    Keygen,
    /// Derive the address of a public key
    Address(AddressArgs),
    /// Build and inspect transactions
    #[command(subcommand)]
    Tx(TxCommand),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: PathBuf,
}

#[derive(Args)]
pub struct AddressArgs {
    /// Hex-encoded Ed25519 public key
    pub public_key: String,
}

#[derive(Subcommand)]
pub enum TxCommand {
    /// Create a new asset (issuer only)
    Create(CreateArgs),
    /// Transfer an asset to a new owner
    Transfer(TransferArgs),
    /// Decode a hex-encoded transaction
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// Issuer secret key (hex)
    #[arg(long)]
    pub secret: String,
    #[arg(long)]
    pub asset: u64,
    /// Address of the first owner
    #[arg(long)]
    pub to: String,
    /// Opaque payload (hex)
    #[arg(long)]
    pub payload: Option<String>,
}

#[derive(Args)]
pub struct TransferArgs {
    /// Current owner's secret key (hex)
    #[arg(long)]
    pub secret: String,
    /// The asset's unspent transaction (hex encoding)
    #[arg(long)]
    pub prev: String,
    /// Address of the new owner
    #[arg(long)]
    pub to: String,
    /// Opaque payload (hex)
    #[arg(long)]
    pub payload: Option<String>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Hex-encoded transaction
    pub tx: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_tx_create() {
        let cli = Cli::try_parse_from([
            "kchain", "tx", "create", "--secret", "ab", "--asset", "7", "--to", "cd",
        ])
        .unwrap();
        match cli.command {
            Command::Tx(TxCommand::Create(args)) => {
                assert_eq!(args.asset, 7);
                assert_eq!(args.to, "cd");
                assert!(args.payload.is_none());
            }
            _ => panic!("expected tx create"),
        }
    }

    #[test]
    fn format_is_global() {
        let cli = Cli::try_parse_from(["kchain", "keygen", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Keygen));
    }
}
