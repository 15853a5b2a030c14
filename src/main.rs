use std::process::ExitCode;

use clap::{Parser, Subcommand};
use orgid_dapp::{
    get_record_by_id, parse_did, Dapp, DappConfig, DappError, DappResult, KeyRecordRaw, KeyType, RevocationReason,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Resolve ORGiD DIDs and manage the local resolution history and keys
#[derive(Debug, Parser)]
#[command(name = "orgid-dapp", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a DID and print its components
    Parse { did: String },
    /// Resolve a DID and record the outcome
    Resolve { did: String },
    /// Inspect the resolution history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
    /// Manage keys
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    List,
    Show { id: String },
    Remove { id: String },
}

#[derive(Debug, Subcommand)]
enum KeysCommand {
    List,
    Add {
        /// Ethereum account address
        public_key: String,
        tag: String,
        #[arg(long)]
        note: Option<String>,
    },
    Remove { tag: String },
    Revoke {
        tag: String,
        /// keyCompromise, affiliationChanged, superseded, cessationOfOperation or privilegeWithdrawn
        reason: RevocationReason,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orgid_dapp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> DappResult<()> {
    match command {
        Command::Parse { did } => print_json(&parse_did(&did)?),
        Command::Resolve { did } => {
            let record = open_dapp()?.resolve(&did).await?;
            print_json(&record)
        }
        Command::History { command } => history(open_dapp()?, command),
        Command::Keys { command } => keys(open_dapp()?, command),
    }
}

fn open_dapp() -> DappResult<Dapp> {
    Dapp::from_config(DappConfig::from_env()?)
}

fn history(mut dapp: Dapp, command: HistoryCommand) -> DappResult<()> {
    match command {
        HistoryCommand::List => {
            for record in dapp.history() {
                println!(
                    "{}  {:<5}  {}  {}  {}",
                    record.id,
                    format!("{:?}", record.record.result).to_uppercase(),
                    record.record.date.to_rfc3339(),
                    record.record.did,
                    record.record.name
                );
            }
            Ok(())
        }
        HistoryCommand::Show { id } => {
            let record = get_record_by_id(dapp.history(), &id).ok_or_else(|| DappError::RecordNotFound(id.clone()))?;
            print_json(record)
        }
        HistoryCommand::Remove { id } => {
            dapp.remove_history_record(&id)?;
            println!("removed {}", id);
            Ok(())
        }
    }
}

fn keys(mut dapp: Dapp, command: KeysCommand) -> DappResult<()> {
    match command {
        KeysCommand::List => print_json(dapp.keys()),
        KeysCommand::Add { public_key, tag, note } => {
            let id = dapp.add_key(KeyRecordRaw {
                key_type: KeyType::EcdsaSecp256k1VerificationKey2019,
                public_key,
                tag,
                note,
                revocation: None,
            })?;
            println!("{}", id);
            Ok(())
        }
        KeysCommand::Remove { tag } => dapp.remove_key(&tag),
        KeysCommand::Revoke { tag, reason } => {
            let key = dapp.revoke_key(&tag, reason)?;
            print_json(&key)
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> DappResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
