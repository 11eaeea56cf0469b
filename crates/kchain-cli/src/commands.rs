use anyhow::Context;
use colored::Colorize;
use kchain_crypto::{SigningKey, VerifyingKey};
use kchain_ledger::{Output, Transaction};
use kchain_server::{KchainServer, ServerConfig};
use kchain_types::{Address, AssetId};
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Keygen => cmd_keygen(format),
        Command::Address(args) => cmd_address(args, format),
        Command::Tx(TxCommand::Create(args)) => print_tx(&build_creation(&args)?, format),
        Command::Tx(TxCommand::Transfer(args)) => print_tx(&build_transfer(&args)?, format),
        Command::Tx(TxCommand::Inspect(args)) => cmd_inspect(args),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = ServerConfig::load(&args.config)?;
    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(KchainServer::new(config).serve())?;
    Ok(())
}

fn cmd_keygen(format: OutputFormat) -> anyhow::Result<()> {
    let key = SigningKey::generate();
    let public = key.verifying_key();
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "secret_key": key.to_hex(),
                "public_key": public.to_hex(),
                "address": key.address().to_hex(),
            }))?
        ),
        OutputFormat::Text => {
            println!("{} {}", "secret: ".red().bold(), key.to_hex());
            println!("{} {}", "public: ".bold(), public.to_hex());
            println!("{} {}", "address:".bold(), key.address().to_hex().cyan());
            println!("{}", "Keep the secret key private.".dimmed());
        }
    }
    Ok(())
}

fn cmd_address(args: AddressArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = VerifyingKey::from_hex(args.public_key.trim()).context("invalid public key")?;
    let address = key.to_address().to_hex();
    match format {
        OutputFormat::Json => println!("{}", json!({ "address": address })),
        OutputFormat::Text => println!("{}", address.cyan()),
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let tx = Transaction::from_hex(args.tx.trim()).context("invalid transaction")?;
    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}

fn build_creation(args: &CreateArgs) -> anyhow::Result<Transaction> {
    let issuer = SigningKey::from_hex(args.secret.trim()).context("invalid secret key")?;
    let output = parse_output(&args.to, args.payload.as_deref())?;
    Ok(Transaction::creation(AssetId::new(args.asset), output, &issuer))
}

fn build_transfer(args: &TransferArgs) -> anyhow::Result<Transaction> {
    let owner = SigningKey::from_hex(args.secret.trim()).context("invalid secret key")?;
    let prev = Transaction::from_hex(args.prev.trim()).context("invalid --prev transaction")?;
    if owner.address() != prev.output.address {
        anyhow::bail!(
            "key address {} does not own asset {} (owner is {})",
            owner.address(),
            prev.asset_id,
            prev.output.address
        );
    }
    let output = parse_output(&args.to, args.payload.as_deref())?;
    Ok(Transaction::transfer(&prev, output, &owner))
}

fn parse_output(to: &str, payload: Option<&str>) -> anyhow::Result<Output> {
    let address = Address::from_hex(to.trim()).context("invalid --to address")?;
    let payload = match payload {
        Some(p) => hex::decode(p.trim()).context("invalid --payload hex")?,
        None => Vec::new(),
    };
    Ok(Output::with_payload(address, payload))
}

fn print_tx(tx: &Transaction, format: OutputFormat) -> anyhow::Result<()> {
    let encoded = tx.to_hex()?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "tx": tx, "hex": encoded }))?
        ),
        OutputFormat::Text => {
            let kind = if tx.is_creation() { "creation" } else { "transfer" };
            println!(
                "{} {} of asset {} to {}",
                "✓".green().bold(),
                kind,
                tx.asset_id.to_string().yellow(),
                tx.output.address.short_id().cyan()
            );
            println!("  hash: {}", tx.hash.to_hex().dimmed());
            println!("{encoded}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use kchain_ledger::verify;

    use super::*;

    fn issuer() -> SigningKey {
        SigningKey::from_bytes([1; 32])
    }

    fn alice() -> SigningKey {
        SigningKey::from_bytes([2; 32])
    }

    fn create_args() -> CreateArgs {
        CreateArgs {
            secret: issuer().to_hex(),
            asset: 3,
            to: alice().address().to_hex(),
            payload: Some("cafe".into()),
        }
    }

    #[test]
    fn creation_is_issuer_signed() {
        let tx = build_creation(&create_args()).unwrap();
        assert!(tx.is_creation());
        assert_eq!(tx.output.payload, vec![0xca, 0xfe]);
        assert!(verify(&tx, None, &issuer().verifying_key()).is_ok());
    }

    #[test]
    fn transfer_spends_prev() {
        let created = build_creation(&create_args()).unwrap();
        let args = TransferArgs {
            secret: alice().to_hex(),
            prev: created.to_hex().unwrap(),
            to: issuer().address().to_hex(),
            payload: None,
        };
        let tx = build_transfer(&args).unwrap();
        assert_eq!(tx.input, created.hash);
        assert!(verify(&tx, Some(&created), &issuer().verifying_key()).is_ok());
    }

    #[test]
    fn transfer_by_non_owner_fails() {
        let created = build_creation(&create_args()).unwrap();
        let args = TransferArgs {
            secret: issuer().to_hex(),
            prev: created.to_hex().unwrap(),
            to: issuer().address().to_hex(),
            payload: None,
        };
        assert!(build_transfer(&args).is_err());
    }

    #[test]
    fn bad_inputs_are_reported() {
        let mut args = create_args();
        args.to = "xyz".into();
        assert!(build_creation(&args).is_err());

        let mut args = create_args();
        args.payload = Some("abc".into());
        assert!(build_creation(&args).is_err());
    }
}
