mod client;
mod error;
mod extract;
mod normalize;
mod output;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::warn;

#[derive(Parser)]
#[command(name = "ghdb_scraper", about = "Exploit-DB Google Hacking Database extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the full GHDB dataset and write raw + clean JSON exports
    Run {
        /// Rows per page request
        #[arg(long, default_value_t = extract::DEFAULT_BATCH_SIZE)]
        batch_size: u64,
        /// Pause between page requests, in seconds
        #[arg(long, default_value_t = extract::DEFAULT_DELAY.as_secs_f64())]
        delay: f64,
        /// Raw export path (full rows, verbatim)
        #[arg(long, default_value = "ghdb_complete.json")]
        raw_out: PathBuf,
        /// Clean export path (metadata + normalized entries)
        #[arg(long, default_value = "ghdb_clean.json")]
        clean_out: PathBuf,
        /// Sample entries to print after the run
        #[arg(short = 'n', long, default_value = "3")]
        samples: usize,
    },
    /// Summarize a previously saved raw export
    Stats {
        /// Raw export to read
        #[arg(default_value = "ghdb_complete.json")]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            batch_size,
            delay,
            raw_out,
            clean_out,
            samples,
        } => {
            let session = client::GhdbClient::new()?;
            let run =
                extract::extract_all(&session, batch_size, Duration::from_secs_f64(delay)).await?;

            if let Some(failure) = &run.failure {
                if run.result.extracted_records == 0 {
                    anyhow::bail!("extraction failed before any rows were fetched: {failure}");
                }
                warn!(
                    "Partial result: {} of {} records fetched ({})",
                    run.result.extracted_records, run.result.total_records, failure
                );
            }

            output::save_raw(&run.result, &raw_out)?;
            output::save_clean(&run.result, &clean_out)?;
            output::print_samples(&run.result, samples);
            output::print_category_breakdown(&run.result);

            println!("\nExtraction summary:");
            println!("  Total records:     {}", run.result.total_records);
            println!("  Extracted records: {}", run.result.extracted_records);
            if run.is_partial() {
                println!("  Status:            PARTIAL (run again to re-fetch)");
            }
            println!("  Raw export:        {}", raw_out.display());
            println!("  Clean export:      {}", clean_out.display());
            Ok(())
        }
        Commands::Stats { input } => {
            let result = output::load_raw(&input)?;
            println!("Total:     {}", result.total_records);
            println!("Extracted: {}", result.extracted_records);
            println!("Timestamp: {}", result.extraction_timestamp);
            output::print_category_breakdown(&result);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
