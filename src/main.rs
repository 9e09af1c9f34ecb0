//! Command-line front end: import and convert CoNLL-U files

use clap::{Parser, Subcommand};
use rebabel_conllu::{ConlluWriter, MemoryStore, UnitType, import_files};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert CoNLL-U treebanks to and from annotation graphs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode files into an in-memory store and report what was read
    Import {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
    /// Decode files, then re-encode the whole store as CoNLL-U
    Convert {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Output file (stdout if omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "rebabel_conllu=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Import { files } => import(&files),
        Command::Convert { files, output } => convert(&files, output),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn import(files: &[PathBuf]) -> io::Result<bool> {
    let mut store = MemoryStore::new();
    let summary = import_files(&mut store, files);

    println!(
        "{} files read, {} failed: {} sentences, {} words, {} tokens",
        summary.succeeded.len(),
        summary.failed.len(),
        store.units_of_type(UnitType::Sentence).len(),
        store.units_of_type(UnitType::Word).len(),
        store.units_of_type(UnitType::Token).len(),
    );
    Ok(summary.is_success())
}

fn convert(files: &[PathBuf], output: Option<PathBuf>) -> io::Result<bool> {
    let mut store = MemoryStore::new();
    let summary = import_files(&mut store, files);

    let mut out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    ConlluWriter::new(&store).write(&mut out)?;
    out.flush()?;

    Ok(summary.is_success())
}
