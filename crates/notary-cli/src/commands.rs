use std::fs::File;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use notary_crypto::ContentAddresser;
use notary_ledger::{ContractManifest, LedgerConfig};
use notary_registry::{
    RegistrationOutcome, RegistrationRequest, RegistryConfig, RegistryService, Verification,
};
use notary_types::{Address, DocumentId, DocumentMetadata, Record, Version, DIGEST_ALGORITHM};
use serde_json::{json, Value};
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Hash(args) => cmd_hash(args, format),
        Command::Manifest(args) => cmd_manifest(args, cli.config.as_deref()),
        command => {
            debug!(config = ?cli.config, "loading registry configuration");
            let service = RegistryConfig::load(cli.config.as_deref())
                .and_then(|config| config.build())
                .context("cannot set up the registry")?;
            match command {
                Command::Register(args) => cmd_register(&service, args, format).await,
                Command::Lookup(args) => cmd_lookup(&service, args, format).await,
                Command::Show(args) => cmd_show(&service, args, format).await,
                Command::History(args) => cmd_history(&service, args, format).await,
                Command::Verify(args) => cmd_verify(&service, args, format).await,
                Command::Reconcile(args) => cmd_reconcile(&service, args, format).await,
                Command::Hash(_) | Command::Manifest(_) => Ok(()),
            }
        }
    }
}

async fn cmd_register(
    service: &RegistryService,
    args: RegisterArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let metadata = DocumentMetadata::new(args.issuer, args.date_issued, args.verifier);
    let mut request = RegistrationRequest::new(args.file, metadata);
    if let Some(id) = args.version_of {
        request = request.version_of(DocumentId::new(id));
    }

    let outcome = service.register(request).await?;
    if format == OutputFormat::Json {
        return print_json(&serde_json::to_value(&outcome)?);
    }
    match outcome {
        RegistrationOutcome::Confirmed(reg) => {
            println!(
                "{} Registered document {} {}",
                "✓".green().bold(),
                reg.record.id.to_string().bold(),
                reg.record.version.to_string().yellow()
            );
            println!("  Tx:    {} (block {})", reg.receipt.tx_hash.to_string().dimmed(), reg.receipt.block_number);
            print_record(&reg.record);
        }
        RegistrationOutcome::ChainPending(pending) => {
            println!("{} Transaction sent but not yet confirmed", "…".yellow().bold());
            println!("  Tx:       {}", pending.tx_hash.to_string().dimmed());
            println!("  Hash:     {}", pending.doc_hash.to_tagged().cyan());
            println!("  Location: {}", pending.storage_location);
            println!(
                "  Check later with: notary reconcile {}",
                pending.doc_hash.to_hex()
            );
        }
    }
    Ok(())
}

async fn cmd_lookup(
    service: &RegistryService,
    args: LookupArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let found = service.lookup_hex(&args.hash).await?;
    report_record(found, format, || format!("No document registered with hash {}", args.hash))
}

async fn cmd_show(
    service: &RegistryService,
    args: ShowArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let id = DocumentId::new(args.id);
    let found = match args.version {
        Some(v) => service.version(id, Version::new(v)).await?,
        None => service.latest(id).await?,
    };
    report_record(found, format, || match args.version {
        Some(v) => format!("Document {} has no version {}", args.id, v),
        None => format!("No document with id {}", args.id),
    })
}

async fn cmd_history(
    service: &RegistryService,
    args: IdArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let history = service.history(DocumentId::new(args.id)).await?;
    if format == OutputFormat::Json {
        return print_json(&Value::Array(history.iter().map(record_json).collect()));
    }
    if history.is_empty() {
        println!("No document with id {}", args.id);
        return Ok(());
    }
    for record in &history {
        println!(
            "{}  {}  {}  {}",
            record.version.to_string().yellow().bold(),
            record.doc_hash.short_hex().dimmed(),
            record.owner,
            created(record)
        );
    }
    Ok(())
}

async fn cmd_verify(
    service: &RegistryService,
    args: IdArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let Some(report) = service.verify(DocumentId::new(args.id)).await? else {
        println!("No document with id {}", args.id);
        return Ok(());
    };
    if format == OutputFormat::Json {
        return print_json(&verification_json(&report));
    }
    let record = &report.record;
    if report.is_intact() {
        println!(
            "{} Document {} {} matches its ledger hash",
            "✓".green().bold(),
            record.id,
            record.version
        );
    } else {
        println!(
            "{} Document {} {} does NOT match its ledger hash",
            "✗".red().bold(),
            record.id,
            record.version
        );
        println!("  Ledger: {}", record.doc_hash.to_tagged());
        println!("  Stored: {}", report.actual.to_tagged().red());
    }
    Ok(())
}

async fn cmd_reconcile(
    service: &RegistryService,
    args: LookupArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let hash = notary_types::ContentHash::from_hex(&args.hash)
        .with_context(|| format!("invalid hash `{}`", args.hash))?;
    let found = service.resolve(&hash).await?;
    report_record(found, format, || {
        format!("{} is not on the ledger yet", hash.short_hex())
    })
}

fn cmd_hash(args: HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let file = File::open(&args.file).with_context(|| format!("cannot open {}", args.file.display()))?;
    let hash = ContentAddresser::new().hash_reader(file)?;
    if format == OutputFormat::Json {
        return print_json(&json!({
            "file": args.file.display().to_string(),
            "digestAlgorithm": DIGEST_ALGORITHM.tag(),
            "hash": hash.to_hex(),
        }));
    }
    println!("{}  {}", hash.to_hex(), args.file.display());
    Ok(())
}

fn cmd_manifest(args: ManifestArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let address = Address::from_hex(&args.address)
        .with_context(|| format!("invalid address `{}`", args.address))?;
    let paths = ledger_config(config)?;
    let manifest = ContractManifest::registry(address);
    manifest.validate()?;
    manifest.save(&paths.contract_abi_path, &paths.contract_address_path)?;
    println!(
        "{} Wrote {} and {}",
        "✓".green().bold(),
        paths.contract_abi_path.display(),
        paths.contract_address_path.display()
    );
    Ok(())
}

/// Ledger settings alone; the store section is only read from a file.
fn ledger_config(path: Option<&Path>) -> anyhow::Result<LedgerConfig> {
    let config = match path {
        Some(path) => RegistryConfig::from_file(path)?.ledger,
        None => LedgerConfig::from_env()?,
    };
    debug!(?config, "ledger configuration");
    Ok(config)
}

fn report_record(
    found: Option<Record>,
    format: OutputFormat,
    missing: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    match (found, format) {
        (Some(record), OutputFormat::Json) => print_json(&record_json(&record)),
        (None, OutputFormat::Json) => print_json(&Value::Null),
        (Some(record), OutputFormat::Text) => {
            println!(
                "Document {} {}",
                record.id.to_string().bold(),
                record.version.to_string().yellow()
            );
            print_record(&record);
            Ok(())
        }
        (None, OutputFormat::Text) => {
            println!("{}", missing().yellow());
            Ok(())
        }
    }
}

fn print_record(record: &Record) {
    println!("  Hash:     {}", record.doc_hash.to_tagged().cyan());
    println!("  Location: {}", record.storage_location);
    println!("  Issuer:   {}", record.issuer);
    println!("  Issued:   {}", record.date_issued);
    println!("  Verifier: {}", record.verifier);
    println!("  Owner:    {}", record.owner);
    println!("  Created:  {}", created(record));
}

fn created(record: &Record) -> String {
    record
        .created_at_utc()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| record.created_at.to_string())
}

fn record_json(record: &Record) -> Value {
    let mut value = serde_json::to_value(record).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("digestAlgorithm".into(), json!(DIGEST_ALGORITHM.tag()));
    }
    value
}

fn verification_json(report: &Verification) -> Value {
    json!({
        "record": record_json(&report.record),
        "actual": report.actual.to_hex(),
        "intact": report.is_intact(),
    })
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notary_types::{ContentHash, StorageLocation};

    fn record() -> Record {
        Record {
            id: DocumentId::new(1),
            doc_hash: ContentHash::from_digest([0xAB; 32]),
            storage_location: StorageLocation::new("QmDiploma").unwrap(),
            issuer: "University of Testing".into(),
            date_issued: 20240615,
            verifier: "Registrar".into(),
            owner: Address::from_bytes([0x11; 20]),
            version: Version::FIRST,
            created_at: 1_718_409_600,
        }
    }

    #[test]
    fn record_json_carries_digest_tag() {
        let value = record_json(&record());
        assert_eq!(value["digestAlgorithm"], "sha256-v1");
        assert_eq!(value["version"], 1);
        assert_eq!(value["storageLocation"], "QmDiploma");
    }

    #[test]
    fn verification_json_reports_mismatch() {
        let report = Verification {
            record: record(),
            actual: ContentHash::from_digest([0xCD; 32]),
        };
        let value = verification_json(&report);
        assert_eq!(value["intact"], false);
        assert_eq!(value["actual"], "cd".repeat(32));
    }

    #[test]
    fn manifest_goes_where_the_config_file_says() {
        let dir = tempfile::TempDir::new().unwrap();
        let abi = dir.path().join("registry.abi.json");
        let addr = dir.path().join("registry.address");
        let config = dir.path().join("notary.toml");
        std::fs::write(
            &config,
            format!(
                "[store]\nbackend = \"memory\"\n\n[ledger]\ncontract_abi_path = {:?}\ncontract_address_path = {:?}\n",
                abi.display().to_string(),
                addr.display().to_string()
            ),
        )
        .unwrap();

        let address = format!("0x{}", "c0".repeat(20));
        cmd_manifest(ManifestArgs { address }, Some(&config)).unwrap();

        let manifest = ContractManifest::load(&abi, &addr).unwrap();
        assert_eq!(manifest.address, Address::from_bytes([0xC0; 20]));
    }

    #[test]
    fn created_renders_rfc3339() {
        assert_eq!(created(&record()), "2024-06-15T00:00:00+00:00");
    }
}
