pub mod cli;
mod tui_app;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use clap::{ArgAction, Args, Parser, Subcommand};
use cli::{
    errors::CrxCliError,
    helpers::{exit_with_error, planned_outputs, require_exists},
};
use crx_packager::crx::{
    assembler::{assemble_many, PackOptions},
    constants::{DEFAULT_FILE_PATTERN, DEFAULT_UPDATE_URL},
    helpers::{extract_zip_to_directory, parse_crx, verify_crx},
    keys::KeySet,
    manifest::manifest_path,
    tree_hash::compute_file_root_hash,
    verified_contents::{self, write_verified_contents},
};
use std::{fs, path::PathBuf};

#[derive(Parser)]
#[command(name = "crxpack")]
#[command(version)]
#[command(about = "Pack extension bundles into signed CRX3 archives", long_about = None)]
#[command(next_line_help = true)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Log everything
    #[arg(long, global = true)]
    trace: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a signed CRX for each staging directory
    Pack(PackArgs),
    /// Verify a CRX and print its identity
    Inspect(InspectArgs),
    /// Print the tree hash root of each file
    TreeHash {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write brave_metadata/verified_contents.json for a directory
    VerifiedContents(VerifiedContentsArgs),
    /// Pick staging directories to pack from a terminal UI
    Browse(BrowseArgs),
}

#[derive(Args, Clone)]
pub struct KeyArgs {
    /// Extension key (PEM); the package id derives from it
    #[arg(short = 'k', long = "key", env = "CRX_EXTENSION_KEY")]
    extension_key: PathBuf,
    /// Publisher proof key (PEM), repeatable, signs after the extension key
    #[arg(long = "publisher-key")]
    publisher_keys: Vec<PathBuf>,
    /// Key used to sign embedded verified contents
    #[arg(long, env = "CRX_VERIFIED_CONTENTS_KEY")]
    verified_contents_key: Option<PathBuf>,
    /// Files covered by verified contents
    #[arg(long = "verified-contents-pattern", default_value = DEFAULT_FILE_PATTERN)]
    verified_contents_patterns: Vec<String>,
    #[arg(long, default_value = DEFAULT_UPDATE_URL)]
    update_url: String,
}

impl KeyArgs {
    fn load(&self) -> Result<(KeySet, PackOptions)> {
        let keys = KeySet::load(
            &self.extension_key,
            &self.publisher_keys,
            self.verified_contents_key.as_deref(),
        )
        .context("failed to load signing keys")?;
        let options = PackOptions {
            verified_contents_patterns: self.verified_contents_patterns.clone(),
            update_url: self.update_url.clone(),
        };
        Ok((keys, options))
    }
}

#[derive(Args)]
struct PackArgs {
    /// Staging directories, each holding a manifest.json
    #[arg(required = true)]
    staging_dirs: Vec<PathBuf>,
    #[command(flatten)]
    keys: KeyArgs,
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
    /// Also write the raw zip next to the CRX
    #[arg(long)]
    write_zip: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// CRX file to verify
    filename: PathBuf,
    #[arg(long)]
    extract_to: Option<PathBuf>,
}

#[derive(Args)]
struct VerifiedContentsArgs {
    dir: PathBuf,
    #[arg(short = 'k', long = "key", env = "CRX_VERIFIED_CONTENTS_KEY")]
    key: PathBuf,
    #[arg(long)]
    item_id: String,
    #[arg(long)]
    item_version: String,
    #[arg(long = "pattern", default_value = DEFAULT_FILE_PATTERN)]
    patterns: Vec<String>,
    /// Defaults to <DIR>/brave_metadata/verified_contents.json
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct BrowseArgs {
    /// Directory whose subdirectories are offered for packing
    #[arg(long)]
    root: Option<PathBuf>,
    #[command(flatten)]
    keys: KeyArgs,
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("crx_packager={level},crxpack={level}"))
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run_pack(args: PackArgs) -> Result<()> {
    for dir in &args.staging_dirs {
        require_exists(dir);
        if !manifest_path(dir).is_file() {
            exit_with_error(CrxCliError::MissingManifest(dir.display().to_string()));
        }
    }

    let (keys, options) = args.keys.load()?;
    let fallback = keys.extension.extension_id();
    let crx_paths = planned_outputs(&args.out_dir, &args.staging_dirs, &fallback)
        .unwrap_or_else(|error| exit_with_error(error));

    let packaged = assemble_many(&args.staging_dirs, &keys, &options)?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    for (package, crx_path) in packaged.iter().zip(&crx_paths) {
        fs::write(crx_path, &package.crx)
            .with_context(|| format!("failed to write {}", crx_path.display()))?;
        if args.write_zip {
            let zip_path = crx_path.with_extension("zip");
            fs::write(&zip_path, &package.zip)
                .with_context(|| format!("failed to write {}", zip_path.display()))?;
        }
        println!("{} {}", package.extension_id, crx_path.display());
    }

    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    match args.filename.extension().and_then(|e| e.to_str()) {
        Some("crx") => {}
        _ => exit_with_error(CrxCliError::UnsupportedFileType),
    }
    require_exists(&args.filename);

    let data = fs::read(&args.filename)
        .with_context(|| format!("failed to read {}", args.filename.display()))?;
    let package = parse_crx(&data)?;
    let extension_id = verify_crx(&package)?;

    println!("id: {extension_id}");
    println!("crx_id: {}", hex::encode(package.signed_data.crx_id.unwrap_or_default()));
    println!("proofs: {}", package.header.sha256_with_rsa.len());
    println!("header bytes: {}", package.header_length);
    println!("zip bytes: {}", package.zip.len());
    match package.header.verified_contents.as_deref() {
        Some(compressed) => {
            let records = verified_contents::from_compressed_json(compressed)?;
            let payloads = records
                .iter()
                .map(|record| record.decode_payload())
                .collect::<crx_packager::Result<Vec<_>>>()
                .context("failed to decode verified contents")?;
            let files: usize = payloads
                .iter()
                .flat_map(|payload| &payload.content_hashes)
                .map(|hashes| hashes.files.len())
                .sum();
            println!("verified contents: {files} files");
        }
        None => println!("verified contents: none"),
    }

    if let Some(dir) = args.extract_to {
        extract_zip_to_directory(&package.zip, &dir)?;
        println!("Successfully extracted {} to {}", args.filename.display(), dir.display());
    }

    Ok(())
}

fn run_tree_hash(files: Vec<PathBuf>) -> Result<()> {
    for file in files {
        let root = compute_file_root_hash(&file)?;
        println!("{}  {}", URL_SAFE_NO_PAD.encode(root), file.display());
    }
    Ok(())
}

fn run_verified_contents(args: VerifiedContentsArgs) -> Result<()> {
    require_exists(&args.dir);
    let records = verified_contents::build_with_key_file(
        &args.dir,
        &args.patterns,
        &args.item_id,
        &args.item_version,
        Some(&args.key),
    )?;

    let path = match args.output {
        Some(path) => {
            fs::write(&path, serde_json::to_vec(&records)?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            path
        }
        None => write_verified_contents(&args.dir, &records)?,
    };
    println!("{}", path.display());
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Pack(args) => run_pack(args),
        Command::Inspect(args) => run_inspect(args),
        Command::TreeHash { files } => run_tree_hash(files),
        Command::VerifiedContents(args) => run_verified_contents(args),
        Command::Browse(args) => {
            let root = match args.root {
                Some(root) => root,
                None => std::env::current_dir()?,
            };
            require_exists(&root);
            let (keys, options) = args.keys.load()?;
            tui_app::run_tui(root, args.out_dir, keys, options)
                .map_err(|e| anyhow::anyhow!("TUI error: {e}"))
        }
    }
}

pub fn main() {
    let cli = Cli::parse();
    init_tracing(cli.trace, cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
