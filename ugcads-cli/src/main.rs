use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ugcads::config::DEFAULT_DATASET_PATH;
use ugcads::{
    analysis, parse_consent, IngestOptions, IngestRequest, JsonlDataset, Model,
    TranscribeOptions, Validator,
};

#[derive(Parser)]
#[command(name = "ugcads", about = "Ingest short-form video ads into a JSON Lines dataset")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download, transcribe and append one ad to the dataset.
    Ingest(IngestArgs),
    /// Check every record in the dataset against the schema.
    Validate {
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        dataset: PathBuf,
        /// Accepted language tags (repeatable).
        #[arg(long = "language", default_value = "pt-BR")]
        languages: Vec<String>,
    },
    /// List the most frequent hooks.
    Hooks {
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        dataset: PathBuf,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Print one record, selected by id or URL substring.
    Show {
        #[arg(long, conflicts_with = "url_contains", required_unless_present = "url_contains")]
        id: Option<String>,
        #[arg(long)]
        url_contains: Option<String>,
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        dataset: PathBuf,
    },
}

#[derive(Args)]
struct IngestArgs {
    /// Public URL of the ad.
    #[arg(long)]
    url: String,

    /// Content style, one of: testimonial, unboxing, before_after, review,
    /// tutorial, qna, offer, educational, trend, product_haul.
    #[arg(long)]
    ugc_type: String,

    #[arg(long, default_value = "")]
    brand: String,

    #[arg(long, default_value = "")]
    category: String,

    /// Locale tag stamped on the record; also selects the transcription language.
    #[arg(long, default_value = "pt-BR")]
    language: String,

    /// Usage rights cleared: 1, true, yes or y.
    #[arg(long, default_value = "false")]
    terms_ok: String,

    /// Whisper model name, or a path to a .ggml file.
    #[arg(long, default_value = "small")]
    model: String,

    #[arg(long, default_value = "9:16")]
    aspect_ratio: String,

    #[arg(long, default_value = DEFAULT_DATASET_PATH)]
    dataset: PathBuf,

    /// Model cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Disable GPU acceleration.
    #[arg(long)]
    no_gpu: bool,

    /// Number of threads (default: auto).
    #[arg(long)]
    threads: Option<u32>,

    /// Beam search size (default: greedy).
    #[arg(long)]
    beam_size: Option<u32>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ugcads=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Ingest(args) => ingest(args).await,
        Command::Validate { dataset, languages } => validate(dataset, languages),
        Command::Hooks { dataset, limit } => hooks(dataset, limit),
        Command::Show {
            id,
            url_contains,
            dataset,
        } => show(dataset, id, url_contains),
    }
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

async fn ingest(args: IngestArgs) {
    let model = match Model::parse_name(&args.model) {
        Some(m) => m,
        None => {
            eprintln!("Unknown model: {}", args.model);
            fail("use tiny, base, small, medium, large-v2, large-v3, large-v3-turbo or a path to a .ggml file");
        }
    };

    let mut transcribe = TranscribeOptions::new().model(model).gpu(!args.no_gpu);
    if let Some(n) = args.threads {
        transcribe = transcribe.n_threads(n).unwrap_or_else(|e| fail(e));
    }
    if let Some(size) = args.beam_size {
        transcribe = transcribe.beam_size(size).unwrap_or_else(|e| fail(e));
    }
    if let Some(dir) = args.cache_dir {
        transcribe = transcribe.cache_dir(dir);
    }

    let options = IngestOptions::new()
        .transcribe(transcribe)
        .locale(&args.language)
        .unwrap_or_else(|e| fail(e))
        .aspect_ratio(args.aspect_ratio)
        .dataset_path(args.dataset);

    let request = IngestRequest::new(args.url, args.ugc_type)
        .brand(args.brand)
        .category(args.category)
        .terms_ok(parse_consent(&args.terms_ok));

    let summary = ugcads::ingest_url(&request, options)
        .await
        .unwrap_or_else(|e| fail(e));

    match summary.to_json() {
        Ok(json) => println!("{json}"),
        Err(e) => fail(e),
    }
}

fn validate(dataset: PathBuf, languages: Vec<String>) {
    let report = Validator::new(languages)
        .validate_file(&dataset)
        .unwrap_or_else(|e| fail(e));

    for issue in &report.issues {
        println!("{issue}");
    }

    if !report.is_ok() {
        eprintln!(
            "{} issue(s) in {} record(s) of {}",
            report.issues.len(),
            report.records,
            dataset.display()
        );
        std::process::exit(1);
    }
    println!("OK");
}

fn hooks(dataset: PathBuf, limit: usize) {
    let top = analysis::top_hooks_in_file(&dataset, limit).unwrap_or_else(|e| fail(e));

    println!("TOP HOOKS:");
    for entry in top {
        println!("{}\t{}", entry.count, entry.hook);
    }
}

fn show(dataset: PathBuf, id: Option<String>, url_contains: Option<String>) {
    let dataset = JsonlDataset::new(dataset);
    let record = match (id, url_contains) {
        (Some(id), _) => dataset.find_by_id(&id),
        (None, Some(needle)) => dataset.find_by_url(&needle),
        (None, None) => fail("provide --id or --url-contains"),
    }
    .unwrap_or_else(|e| fail(e));

    match record.to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(e) => fail(e),
    }
}
