use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "notary",
    about = "Document notary: register and look up versioned documents on a ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML config file; environment variables are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

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
    /// Hash, store and record a document
    Register(RegisterArgs),
    /// Find the latest version of the document with this content hash
    Lookup(LookupArgs),
    /// Show a document by id
    Show(ShowArgs),
    /// List every version of a document
    History(IdArgs),
    /// Re-hash the stored copy of a document against the ledger
    Verify(IdArgs),
    /// Print the content hash of a file
    Hash(HashArgs),
    /// Check whether a pending registration has landed
    Reconcile(LookupArgs),
    /// Write the contract ABI and address files for a deployed registry
    Manifest(ManifestArgs),
}

#[derive(Args)]
pub struct RegisterArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub issuer: String,
    /// Issue date, conventionally YYYYMMDD
    #[arg(long)]
    pub date_issued: u64,
    #[arg(long)]
    pub verifier: String,
    /// Register as the next version of this document id
    #[arg(long, value_name = "ID")]
    pub version_of: Option<u64>,
}

#[derive(Args)]
pub struct LookupArgs {
    /// 64 hex characters
    pub hash: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: u64,
    #[arg(long)]
    pub version: Option<u64>,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: u64,
}

#[derive(Args)]
pub struct HashArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ManifestArgs {
    /// Address of the deployed registry contract
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_register_with_version() {
        let cli = Cli::try_parse_from([
            "notary",
            "register",
            "diploma.pdf",
            "--issuer",
            "University of Testing",
            "--date-issued",
            "20240615",
            "--verifier",
            "Registrar",
            "--version-of",
            "3",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        let Command::Register(args) = cli.command else {
            panic!("expected register");
        };
        assert_eq!(args.date_issued, 20240615);
        assert_eq!(args.version_of, Some(3));
    }

    #[test]
    fn show_accepts_version_flag() {
        let cli = Cli::try_parse_from(["notary", "show", "7", "--version", "2"]).unwrap();
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!((args.id, args.version), (7, Some(2)));
    }
}
