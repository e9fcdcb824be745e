//! Main entry point for the storezip CLI application.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::Level;

use storezip::cli::{Command, CreateArgs};
use storezip::{Cli, LocalFileReader, ZipExtractor, ZipFileEntry, build_from_parts};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Create(args) => create_archive(args, &cli).await,
        Command::List { archive, verbose } => list_files(archive, *verbose).await,
        Command::Test { archive } => test_archive(archive, &cli).await,
    }
}

/// Read every input file, build the archive and write it out.
///
/// Inputs are read in argument order, which is also the order of the
/// entries in the archive.
async fn create_archive(args: &CreateArgs, cli: &Cli) -> Result<()> {
    if args.names.len() > args.files.len() {
        bail!(
            "Got {} --name values for {} files",
            args.names.len(),
            args.files.len()
        );
    }

    if !args.force && tokio::fs::try_exists(&args.output).await? {
        bail!(
            "{} already exists (use -f to overwrite)",
            args.output.display()
        );
    }

    let mut names = Vec::with_capacity(args.files.len());
    let mut payloads = Vec::with_capacity(args.files.len());

    for (index, path) in args.files.iter().enumerate() {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let name = args.entry_name(index, path);

        if !cli.is_quiet() {
            println!(
                "  adding: {} ({})",
                String::from_utf8_lossy(&name),
                format_size(data.len() as u64)
            );
        }

        names.push(name);
        payloads.push(data);
    }

    let archive = build_from_parts(&names, &payloads)?;

    tokio::fs::write(&args.output, &archive)
        .await
        .with_context(|| format!("Cannot write {}", args.output.display()))?;

    if !cli.is_very_quiet() {
        println!(
            "Wrote {} ({} entries, {})",
            args.output.display(),
            names.len(),
            format_size(archive.len() as u64)
        );
    }

    Ok(())
}

/// List files in the archive.
///
/// Supports two output formats:
/// - Simple format: just file names, one per line
/// - Verbose format (`-v`): size, CRC-32, method and date per entry
async fn list_files(archive: &Path, verbose: bool) -> Result<()> {
    let reader = Arc::new(LocalFileReader::new(archive)?);
    let extractor = ZipExtractor::new(reader);
    let entries = extractor.list_files().await?;

    if !verbose {
        for entry in &entries {
            println!("{}", entry.file_name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>8}  {:>6}  {:>10}  Name",
        "Length", "CRC-32", "Method", "Date"
    );
    println!("{}", "-".repeat(60));

    let mut total = 0u64;
    for entry in &entries {
        println!("{}", format_entry(entry));
        total += entry.uncompressed_size;
    }

    println!("{}", "-".repeat(60));
    println!("{:>10}  {:>30}  {} files", total, "", entries.len());

    Ok(())
}

/// Check every entry, like `unzip -t`.
async fn test_archive(archive: &Path, cli: &Cli) -> Result<()> {
    let reader = Arc::new(LocalFileReader::new(archive)?);
    let extractor = ZipExtractor::new(reader);
    let checks = extractor.verify().await?;

    let mut failed = 0usize;
    for check in &checks {
        match &check.result {
            Ok(()) => {
                if !cli.is_quiet() {
                    println!("    testing: {:<40} OK", check.file_name);
                }
            }
            Err(e) => {
                failed += 1;
                println!("    testing: {:<40} FAILED: {e:#}", check.file_name);
            }
        }
    }

    if failed > 0 {
        bail!(
            "{} of {} entries failed in {}",
            failed,
            checks.len(),
            archive.display()
        );
    }

    if !cli.is_very_quiet() {
        println!("No errors detected in {}.", archive.display());
    }

    Ok(())
}

fn format_entry(entry: &ZipFileEntry) -> String {
    let date = entry
        .mod_date()
        .map(|(year, month, day)| format!("{year:04}-{month:02}-{day:02}"))
        .unwrap_or_else(|| "-".to_string());
    let method = match entry.compression_method.as_u16() {
        0 => "Stored".to_string(),
        8 => "Defl".to_string(),
        other => format!("#{other}"),
    };

    format!(
        "{:>10}  {:08x}  {:>6}  {:>10}  {}",
        entry.uncompressed_size, entry.crc32, method, date, entry.file_name
    )
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
