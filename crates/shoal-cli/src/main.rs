//! # Shoal CLI Entry Point
//!
//! Main binary for the shoal inference load balancer. Loads the worker
//! fleet definition, opens a pool, and dispatches to one of the
//! subcommands.
//!
//! ## Usage
//!
//! ```bash
//! # Probe the fleet and print the status table
//! shoal -c config/workers.json status
//!
//! # Connectivity smoke test (exit code reflects success)
//! shoal -c config/workers.json check
//!
//! # One prompt, completion text on stdout
//! shoal -c config/workers.json prompt "Why is the sky blue?"
//!
//! # A file of prompts, ordered JSON outcomes on stdout
//! shoal -c config/workers.json batch prompts.txt --max-concurrent 8
//!
//! # Throughput measurement with 100 requests
//! shoal -c config/workers.json bench -n 100
//! ```

use anyhow::{Context, Result, bail};
use argh::FromArgs;
use shoal_cli::status;
use shoal_pool::{GenerationParams, PoolSettings, WorkerPool};
use std::sync::Arc;

/// shoal - client-side load balancer for local LLM inference fleets
#[derive(FromArgs)]
struct Cli {
    /// path to the workers definition file (JSON)
    #[argh(option, short = 'c', default = "\"config/workers.json\".to_string()")]
    workers: String,

    /// optional path to a pool settings file (JSON)
    #[argh(option, short = 's')]
    settings: Option<String>,

    #[argh(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Status(StatusArgs),
    Check(CheckArgs),
    Prompt(PromptArgs),
    Batch(BatchArgs),
    Bench(BenchArgs),
}

/// probe the fleet once and print the worker status table
#[derive(FromArgs)]
#[argh(subcommand, name = "status")]
struct StatusArgs {}

/// verify connectivity: probe the fleet and send one test prompt
#[derive(FromArgs)]
#[argh(subcommand, name = "check")]
struct CheckArgs {}

/// process a single prompt
#[derive(FromArgs)]
#[argh(subcommand, name = "prompt")]
struct PromptArgs {
    /// the prompt text
    #[argh(positional)]
    prompt: String,

    /// maximum tokens to generate
    #[argh(option, default = "500")]
    max_tokens: u32,

    /// sampling temperature, clamped to [0, 1]
    #[argh(option, default = "0.7")]
    temperature: f64,

    /// nucleus sampling cutoff, clamped to [0, 1]
    #[argh(option, default = "0.9")]
    top_p: f64,

    /// optional system prompt (chat dialect only)
    #[argh(option)]
    system: Option<String>,

    /// write the full result as JSON to this file instead of printing
    /// the completion text
    #[argh(option, short = 'o')]
    output: Option<String>,
}

/// process a file of prompts (one per line) with bounded concurrency
#[derive(FromArgs)]
#[argh(subcommand, name = "batch")]
struct BatchArgs {
    /// path to the prompts file
    #[argh(positional)]
    file: String,

    /// maximum prompts in flight at once (pool default when omitted)
    #[argh(option)]
    max_concurrent: Option<usize>,

    /// maximum tokens to generate per prompt
    #[argh(option, default = "500")]
    max_tokens: u32,

    /// write the JSON outcomes to this file instead of stdout
    #[argh(option, short = 'o')]
    output: Option<String>,
}

/// measure throughput with canned prompts
#[derive(FromArgs)]
#[argh(subcommand, name = "bench")]
struct BenchArgs {
    /// number of requests to send
    #[argh(option, short = 'n', default = "50")]
    requests: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // prompt and batch write raw text/JSON to stdout for unix tool usage;
    // keep the subscriber out of their way.
    if !matches!(cli.command, Commands::Prompt(_) | Commands::Batch(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    let workers = shoal_pool::load_workers(&cli.workers)
        .with_context(|| format!("loading workers from {}", cli.workers))?;
    tracing::info!(
        workers = workers.len(),
        file = %cli.workers,
        "loaded fleet definition"
    );
    let settings = match &cli.settings {
        Some(path) => {
            PoolSettings::load(path).with_context(|| format!("loading settings from {path}"))?
        }
        None => PoolSettings::default(),
    }
    .apply_env()?;

    let pool = WorkerPool::open(workers, settings).await?;

    let outcome = match cli.command {
        Commands::Status(_) => run_status(&pool).await,
        Commands::Check(_) => run_check(&pool).await,
        Commands::Prompt(args) => run_prompt(&pool, args).await,
        Commands::Batch(args) => run_batch(&pool, args).await,
        Commands::Bench(args) => run_bench(&pool, args).await,
    };

    pool.close().await;
    outcome
}

async fn run_status(pool: &WorkerPool) -> Result<()> {
    let metrics = pool.metrics();
    status::print_status(&metrics.workers, &metrics.requests);
    Ok(())
}

async fn run_check(pool: &WorkerPool) -> Result<()> {
    let healthy = pool.healthy_count();
    println!("healthy workers: {healthy}/{}", pool.worker_count());
    if healthy == 0 {
        bail!("no healthy workers");
    }

    let params = GenerationParams {
        max_tokens: 32,
        ..Default::default()
    };
    match pool.process_request("Hello, how are you?", &params).await {
        Ok(response) => {
            println!(
                "test request ok: worker {} answered in {:.2}s",
                response.worker_id, response.duration_secs
            );
            Ok(())
        }
        Err(e) => Err(e).context("test request failed"),
    }
}

async fn run_prompt(pool: &WorkerPool, args: PromptArgs) -> Result<()> {
    let params = GenerationParams {
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        top_p: args.top_p,
        system_prompt: args.system,
        ..Default::default()
    };

    let response = pool.process_request(&args.prompt, &params).await?;

    match args.output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&response)?;
            std::fs::write(&path, json).with_context(|| format!("writing {path}"))?;
            eprintln!("result saved to {path}");
        }
        None => println!("{}", response.text.trim()),
    }
    Ok(())
}

async fn run_batch(pool: &WorkerPool, args: BatchArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading prompts from {}", args.file))?;
    let prompts: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if prompts.is_empty() {
        bail!("{} contains no prompts", args.file);
    }

    let params = GenerationParams {
        max_tokens: args.max_tokens,
        ..Default::default()
    };
    let progress: shoal_pool::ProgressFn = Arc::new(|done, total, elapsed| {
        eprint!("\r{done}/{total} done ({elapsed:.1}s)");
    });

    let results = pool
        .process_batch(&prompts, &params, args.max_concurrent, Some(progress))
        .await;
    eprintln!();

    let json = serde_json::to_string_pretty(&results)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("writing {path}"))?;
            eprintln!("results saved to {path}");
        }
        None => println!("{json}"),
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        eprintln!("{failed}/{} prompts failed", results.len());
    }
    Ok(())
}

const BENCH_PROMPTS: [&str; 5] = [
    "What is the capital of France?",
    "Explain the concept of machine learning.",
    "Write a short poem about technology.",
    "What are the benefits of renewable energy?",
    "Describe the process of photosynthesis.",
];

async fn run_bench(pool: &WorkerPool, args: BenchArgs) -> Result<()> {
    if args.requests == 0 {
        bail!("bench needs at least one request");
    }

    let prompts: Vec<String> = BENCH_PROMPTS
        .iter()
        .cycle()
        .take(args.requests)
        .map(|p| p.to_string())
        .collect();

    println!("running {} requests...", prompts.len());
    let progress: shoal_pool::ProgressFn = Arc::new(|done, total, elapsed| {
        eprint!("\r{done}/{total} done ({elapsed:.1}s)");
    });

    let started = std::time::Instant::now();
    let results = pool
        .process_batch(&prompts, &GenerationParams::default(), Some(args.requests), Some(progress))
        .await;
    let elapsed = started.elapsed().as_secs_f64();
    eprintln!();

    let successful = results.iter().filter(|r| r.success).count();
    println!("\nBenchmark results:");
    println!("  requests: {}", results.len());
    println!("  successful: {successful}");
    println!("  failed: {}", results.len() - successful);
    println!("  wall clock: {elapsed:.2}s");
    println!("  req/s: {:.2}", results.len() as f64 / elapsed);
    println!(
        "  success rate: {}",
        status::format_percent(successful as f64 / results.len() as f64)
    );

    let metrics = pool.metrics();
    status::print_status(&metrics.workers, &metrics.requests);
    Ok(())
}
