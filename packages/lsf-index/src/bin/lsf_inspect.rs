//! lsf_inspect: print what a log directory contains.
//!
//! Opens the directory the same way replay tools do (expanding `.gz` logs,
//! reusing a saved index) and prints the type listing, time range, scan
//! statistics and learned names. `--dump` prints decoded messages of one
//! type, optionally starting at a timestamp.
//!
//! Run: cargo run --release --bin lsf_inspect -- <log dir> [--dump EstimatedState --at 1400000000]

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lsf_index::{CatalogCache, FieldValue, LogMessage, LogSource, LogSourceConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect an LSF log directory", long_about = None)]
struct Args {
    /// Log directory (containing Data.lsf or Data.lsf.gz)
    dir: PathBuf,

    /// Print decoded messages of this type
    #[arg(long)]
    dump: Option<String>,

    /// Start the dump at the first message at or after this time (seconds)
    #[arg(long)]
    at: Option<f64>,

    /// Maximum number of messages to dump
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Ignore and do not write the saved index
    #[arg(long)]
    no_cache: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = LogSourceConfig::read_from(&args.dir)
        .with_context(|| format!("reading config in {}", args.dir.display()))?
        .unwrap_or_default();
    if args.no_cache {
        config.persist_index = false;
    }
    let source = LogSource::open_with(&args.dir, config, &CatalogCache::new())
        .with_context(|| format!("opening log directory {}", args.dir.display()))?;

    print_summary(&source);

    if let Some(name) = &args.dump {
        dump(&source, name, args.at, args.limit)?;
    }
    Ok(())
}

fn print_summary(source: &LogSource) {
    let index = source.index();
    let stats = index.stats();

    println!("Log:      {}", source.log_path().display());
    println!("Schema:   {}", source.catalog().version());
    println!("Records:  {} ({} bytes)", index.len(), stats.log_len);
    if let (Some(start), Some(end)) = (index.start_time(), index.end_time()) {
        println!("Time:     {:.3} .. {:.3} ({:.1} s)", start, end, end - start);
    }
    if stats.unknown_type_records > 0 {
        println!(
            "Unknown:  {} records of types {:?}",
            stats.unknown_type_records,
            stats.unknown_type_ids.keys().collect::<Vec<_>>()
        );
    }
    if stats.truncated_tail_bytes > 0 {
        println!("Tail:     {} bytes after the last full record", stats.truncated_tail_bytes);
    }

    println!();
    println!("{:<28} {:>6} {:>10}", "Type", "Id", "Records");
    println!("{}", "-".repeat(46));
    for name in source.list_logs() {
        if let Some(view) = source.get_log(name) {
            println!("{:<28} {:>6} {:>10}", name, view.type_id(), view.len());
        }
    }

    let names = index.names();
    if names.system_count() + names.entity_count() > 0 {
        println!();
        println!("Learned {} system and {} entity names", names.system_count(), names.entity_count());
    }
}

fn dump(source: &LogSource, name: &str, at: Option<f64>, limit: usize) -> anyhow::Result<()> {
    let Some(view) = source.get_log(name) else {
        bail!("no {} messages in this log", name);
    };

    let mut cursor = view.cursor();
    if let Some(t) = at {
        if cursor.seek_to_time(t).is_none() {
            println!("\nno {} at or after {}", name, t);
            return Ok(());
        }
    }

    println!();
    for msg in cursor.take(limit) {
        let msg = msg.with_context(|| format!("decoding {}", name))?;
        print_message(source, &msg);
    }
    Ok(())
}

fn print_message(source: &LogSource, msg: &LogMessage) {
    let src = source
        .system_name(msg.src())
        .map(str::to_string)
        .unwrap_or_else(|| format!("0x{:04X}", msg.src()));
    let ent = source
        .entity_name(msg.src(), msg.src_ent())
        .map(str::to_string)
        .unwrap_or_else(|| msg.src_ent().to_string());

    let fields: Vec<String> = msg
        .body
        .fields()
        .map(|(name, value)| format!("{}={}", name, format_value(value)))
        .collect();
    println!(
        "{:.3} {} [{}/{}] {}",
        msg.timestamp(),
        msg.type_name(),
        src,
        ent,
        fields.join(" ")
    );
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Int(v) => v.to_string(),
        FieldValue::Float(v) => format!("{:.6}", v),
        FieldValue::Text(s) => format!("{:?}", s),
        FieldValue::Bytes(b) => format!("<{} bytes>", b.len()),
        FieldValue::Bits(bits) => {
            let set: Vec<&str> = bits
                .flags
                .iter()
                .filter(|(_, on)| **on)
                .map(|(name, _)| name.as_str())
                .collect();
            format!("0x{:X}[{}]", bits.raw, set.join("|"))
        }
        FieldValue::Message(None) => "null".to_string(),
        FieldValue::Message(Some(inner)) => format!("{}{{..}}", inner.type_name()),
        FieldValue::List(items) => format!("[{} messages]", items.len()),
    }
}
