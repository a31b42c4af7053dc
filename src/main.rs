use clap::{Parser, Subcommand};
use lexchunk::lexicon::publish::publish_all;
use lexchunk::{ChunkStore, LexiconConfig, Result, Verifier, VerifyReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lexchunk", about = "Publish, verify and inspect compact dictionary chunks", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: ./lexchunk.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the source directory
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,

    /// Override the chunk output directory
    #[arg(long, global = true)]
    chunk_dir: Option<PathBuf>,

    /// Restrict to these locales (repeatable)
    #[arg(long = "locale", global = true)]
    locales: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode source records into chunk artifacts
    Publish,

    /// Check that every published entry decodes back to its source record
    Verify {
        /// Maximum number of mismatches to print
        #[arg(long)]
        report_cap: Option<usize>,
    },

    /// Show the contents of one published locale directory
    Inspect {
        /// Published locale directory, e.g. data/chunks/en
        dir: PathBuf,

        /// Print a single entry by id
        #[arg(long)]
        id: Option<String>,

        /// Number of sample entries to list
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let outcome = load_config(&cli).and_then(|config| match cli.command {
        Commands::Publish => publish(&config),
        Commands::Verify { report_cap } => verify(&config, report_cap.unwrap_or(config.report_cap)),
        Commands::Inspect { dir, id, limit } => inspect(&dir, id.as_deref(), limit),
    });

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("\nERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<LexiconConfig> {
    let mut config = LexiconConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = &cli.source_dir {
        config.source_dir = dir.clone();
    }
    if let Some(dir) = &cli.chunk_dir {
        config.chunk_dir = dir.clone();
    }
    if !cli.locales.is_empty() {
        config.locales = cli.locales.clone();
    }
    Ok(config)
}

fn publish(config: &LexiconConfig) -> Result<bool> {
    println!("Publishing {} -> {}", config.source_dir.display(), config.chunk_dir.display());
    println!("{}", "=".repeat(60));

    for (locale, summary) in publish_all(config)? {
        println!("\n[{}]", locale);
        for chunk in &summary.chunks {
            println!("  entries-{}.json: {} entries, {} bytes", chunk.key, chunk.count, chunk.bytes);
        }
        println!(
            "  Total: {} entries in {} chunks, {} -> {} bytes ({:.1}% smaller)",
            summary.total_entries,
            summary.chunks.len(),
            summary.source_bytes,
            summary.compact_bytes,
            summary.reduction_percent()
        );
    }
    Ok(true)
}

fn verify(config: &LexiconConfig, report_cap: usize) -> Result<bool> {
    let verifier = Verifier::from_config(config)?;
    let mut report = VerifyReport::default();

    for locale in verifier.locales() {
        let locale_report = verifier.verify_locale(locale)?;
        println!(
            "[{}] {}/{} entries passed",
            locale, locale_report.passed, locale_report.total
        );
        report.merge(locale_report);
    }

    println!("\n{}", "=".repeat(60));
    print!("{}", report.render(report_cap));
    if report.is_lossless() {
        println!("All entries round-trip losslessly.");
    }
    Ok(report.is_lossless())
}

fn inspect(dir: &Path, id: Option<&str>, limit: usize) -> Result<bool> {
    let store = ChunkStore::open(dir)?;

    if let Some(id) = id {
        let entry = store.get(id)?;
        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| lexchunk::LexiconError::InvalidFormat(e.to_string()))?;
        println!("{}", json);
        return Ok(true);
    }

    let manifest = store.manifest();
    println!("Chunk store: {}", store.dir().display());
    println!("  Format version: {}", manifest.version);
    println!("  Total entries: {}", store.num_entries());
    println!("  Indexed ids: {}", store.index().len());
    println!("\nChunks:");
    for chunk in &manifest.chunks {
        println!("  {:>4}  {:>6} entries  {}", chunk.chunk_key, chunk.count, chunk.file);
    }

    println!("\nSample entries (first {}):", limit);
    for (i, result) in store.iter_entries().take(limit).enumerate() {
        match result {
            Ok((key, entry)) => println!(
                "  {}. [{}] {} ({}) - {}",
                i + 1,
                key,
                entry.primary_word,
                entry.part_of_speech,
                entry.translation.word
            ),
            Err(e) => println!("  {}. <{}>", i + 1, e),
        }
    }
    if store.num_entries() > limit {
        println!("  ... and {} more", store.num_entries() - limit);
    }
    Ok(true)
}
