use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use datastore::{HistoryStore, InMemoryHistoryStore, summarize_growth};
use domain::{TrendObservation, TrendingVideo};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use trending_client::TrendingClient;

#[derive(Parser)]
#[command(name = "yt-trending")]
#[command(about = "YouTube trending analytics CLI", long_about = None)]
struct Cli {
    /// YouTube Data API key (falls back to the YOUTUBE_API_KEY environment variable)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify that the API key can reach the trending chart
    Check,
    /// Fetch and print the current trending chart for a region
    Trending {
        /// Region code, e.g. US, IN, GB, CA
        #[arg(short, long, default_value = "US")]
        region: String,
        /// How many videos to request (upstream accepts 1-50)
        #[arg(short, long, default_value_t = 10)]
        max_results: u32,
    },
    /// Poll the chart repeatedly and report growth from recorded observations
    Watch {
        /// Region code, e.g. US, IN, GB, CA
        #[arg(short, long, default_value = "US")]
        region: String,
        /// How many videos to request (upstream accepts 1-50)
        #[arg(short, long, default_value_t = 10)]
        max_results: u32,
        /// Seconds between polls
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
        /// Number of polls before the growth report
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let api_key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var("YOUTUBE_API_KEY").ok())
        .context("no API key: pass --api-key or set YOUTUBE_API_KEY")?;

    match cli.command {
        Commands::Check => check(TrendingClient::new(api_key)).await,
        Commands::Trending {
            region,
            max_results,
        } => trending(TrendingClient::new(api_key), &region, max_results).await,
        Commands::Watch {
            region,
            max_results,
            interval_secs,
            rounds,
        } => {
            // Every poll must see fresh counters, so memoization is disabled.
            let client = TrendingClient::new(api_key).with_cache_ttl(Duration::ZERO);
            watch(client, &region, max_results, interval_secs, rounds).await
        }
    }
}

async fn check(client: TrendingClient) -> Result<()> {
    client
        .verify_key()
        .await
        .context("API connectivity check failed")?;
    println!("API connected successfully");
    Ok(())
}

async fn trending(client: TrendingClient, region: &str, max_results: u32) -> Result<()> {
    let videos = client
        .trending(region, max_results)
        .await
        .with_context(|| format!("failed to fetch trending videos for {region}"))?;

    if videos.is_empty() {
        println!("No trending videos found for {region}.");
        return Ok(());
    }

    println!("Trending in {region}\n");
    for (rank, video) in videos.iter().enumerate() {
        print_card(rank + 1, video);
    }
    Ok(())
}

async fn watch(
    client: TrendingClient,
    region: &str,
    max_results: u32,
    interval_secs: u64,
    rounds: u32,
) -> Result<()> {
    let store = InMemoryHistoryStore::new();
    // Chart order from the most recent poll, for a stable report
    let mut chart: Vec<TrendingVideo> = Vec::new();

    for round in 1..=rounds {
        let videos = client
            .trending(region, max_results)
            .await
            .with_context(|| format!("poll {round}/{rounds} failed for {region}"))?;

        let observed_at = Utc::now();
        for video in &videos {
            store.record(TrendObservation::from_video(video, region, observed_at));
        }
        println!(
            "[{}] poll {round}/{rounds}: recorded {} observations",
            observed_at.format("%H:%M:%S"),
            videos.len()
        );
        chart = videos;

        if round < rounds {
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        }
    }

    println!("\nGrowth in {region} over {} observations\n", rounds);
    for (rank, video) in chart.iter().enumerate() {
        print_card(rank + 1, video);
        match summarize_growth(&store.history(&video.video_id)) {
            Some(growth) => println!(
                "    Growth: views {:+} | likes {:+} | comments {:+}  ({} to {})\n",
                growth.views_delta,
                growth.likes_delta,
                growth.comments_delta,
                growth.from.format("%H:%M:%S"),
                growth.to.format("%H:%M:%S"),
            ),
            None => println!("    Growth: not enough observations yet\n"),
        }
    }
    Ok(())
}

fn print_card(rank: usize, video: &TrendingVideo) {
    println!("{rank:>2}. {} ({})", video.title, video.video_url);
    println!("    Channel: {}", video.channel_title);
    println!(
        "    Views {} | Likes {} | Comments {}",
        format_count(video.views),
        format_count(video.likes),
        format_count(video.comments)
    );
    println!(
        "    {:.1}h ago \u{2022} {}",
        video.hours_since_published, video.category_name
    );
}

/// Compact counter formatting: 950 -> "950", 1500 -> "1.5K", 2_300_000 -> "2.3M".
fn format_count(count: u64) -> String {
    const BILLION: u64 = 1_000_000_000;
    const MILLION: u64 = 1_000_000;
    const THOUSAND: u64 = 1_000;

    if count >= BILLION {
        format!("{:.1}B", count as f64 / BILLION as f64)
    } else if count >= MILLION {
        format!("{:.1}M", count as f64 / MILLION as f64)
    } else if count >= THOUSAND {
        format!("{:.1}K", count as f64 / THOUSAND as f64)
    } else {
        count.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_count_scales_units() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(950), "950");
        assert_eq!(format_count(1_500), "1.5K");
        assert_eq!(format_count(2_300_000), "2.3M");
        assert_eq!(format_count(1_200_000_000), "1.2B");
    }

    #[test]
    fn format_count_at_unit_boundaries() {
        assert_eq!(format_count(1_000), "1.0K");
        assert_eq!(format_count(1_000_000), "1.0M");
        assert_eq!(format_count(1_000_000_000), "1.0B");
    }
}
