use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use reviewscope_core::reviews::{
    PipelineState, ProgressEvent, ReviewPipeline, ScrapeRequest, ScrapeResult, ScrapeRunner,
    ScrapeSummary, ScrollSpeed,
};
use reviewscope_core::ScraperConfig;

use crate::{
    parse_limit_arg, parse_limits, parse_url, AppError, DisplayFallback, OutputFormat, Result,
};

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Product page address
    pub url: String,
    /// Page cap per rating, e.g. `--limit 5=3`; repeatable
    #[arg(long = "limit", value_name = "RATING=PAGES", value_parser = parse_limit_arg)]
    pub limits: Vec<(u8, u32)>,
    /// Settle time between pages (fast | medium | slow)
    #[arg(long, default_value = "medium")]
    pub scroll_speed: ScrollSpeed,
    /// Run Chromium without a window
    #[arg(long)]
    pub headless: bool,
    /// Keep comment text exactly as rendered
    #[arg(long)]
    pub raw_text: bool,
    /// Print running totals after every rating
    #[arg(long)]
    pub stream: bool,
    /// Where to write the JSON dataset
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Base name for the default output file
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScrapeReport {
    pub output: PathBuf,
    pub state: PipelineState,
    pub summary: ScrapeSummary,
}

impl DisplayFallback for ScrapeReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{} reviews written to {}",
            self.summary.total_reviews,
            self.output.display()
        )];
        for rating in &self.summary.ratings {
            lines.push(format!(
                "  {}★  {} reviews, {}/{} pages ({})",
                rating.rating,
                rating.reviews,
                rating.pages_retrieved,
                rating.pages_requested,
                rating.stop_reason
            ));
        }
        if let Some(average) = self.summary.average_rating {
            lines.push(format!("average rating: {average:.2}"));
        }
        if self.summary.mismatched_ratings > 0 {
            lines.push(format!(
                "reviews whose stars differ from their tab: {}",
                self.summary.mismatched_ratings
            ));
        }
        if let (Some(earliest), Some(latest)) = (self.summary.earliest, self.summary.latest) {
            lines.push(format!(
                "posted between {} and {}",
                earliest.format("%Y-%m-%d"),
                latest.format("%Y-%m-%d")
            ));
        }
        lines.join("\n")
    }
}

pub async fn execute(
    config: ScraperConfig,
    args: &ScrapeArgs,
    format: OutputFormat,
) -> Result<ScrapeReport> {
    let url = parse_url(&args.url)?;
    let limits = parse_limits(&args.limits)?;
    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "{}.json",
            url.export_file_stem(args.name.as_deref(), Local::now().naive_local())
        ))
    });
    let request = ScrapeRequest::new(url, limits)
        .with_scroll_speed(args.scroll_speed)
        .with_headless(args.headless || config.chromium.headless)
        .with_normalize_text(!args.raw_text)
        .with_stream_partial(args.stream);

    let pipeline = Arc::new(ReviewPipeline::with_browser(config)?);
    let mut handle = ScrapeRunner::spawn(pipeline, request)?;

    let mut result: Option<ScrapeResult> = None;
    let mut failure: Option<String> = None;
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                print_event(&event, format);
                match event {
                    ProgressEvent::Data { result: data, .. } => result = Some(data),
                    ProgressEvent::Error { message } => failure = Some(message),
                    _ => {}
                }
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(err) = signal {
                    warn!(error = %err, "could not listen for interrupt");
                }
                info!("interrupt received, cancelling scrape");
                handle.cancel();
                interrupted = true;
            }
        }
    }

    let report = tokio::task::spawn_blocking(move || handle.join())
        .await
        .map_err(|err| AppError::ScrapeFailed(err.to_string()))??;
    if let Some(message) = failure {
        return Err(AppError::ScrapeFailed(message));
    }
    let result = result.ok_or_else(|| {
        AppError::ScrapeFailed(format!("run ended in state {} without data", report.state))
    })?;

    write_dataset(&output, &result)?;
    info!(path = %output.display(), reviews = result.len(), "dataset written");
    Ok(ScrapeReport {
        output,
        state: report.state,
        summary: result.summary,
    })
}

fn write_dataset(path: &Path, result: &ScrapeResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(result)?)?;
    Ok(())
}

/// Events go to stderr so stdout carries only the final report.
fn print_event(event: &ProgressEvent, format: OutputFormat) {
    if format == OutputFormat::Json {
        if let ProgressEvent::Data { .. } = event {
            return;
        }
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{line}");
        }
        return;
    }
    match event {
        ProgressEvent::Progress { message, fraction } => {
            eprintln!("[{:>3.0}%] {message}", fraction * 100.0)
        }
        ProgressEvent::Data { message, .. } => eprintln!("[data] {message}"),
        other => eprintln!("[{}] {}", other.label(), other.message()),
    }
}
