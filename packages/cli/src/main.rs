#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for accident risk point clustering.
//!
//! Reads the fatality workbook, clusters accident locations within a
//! walking-distance radius, and writes one row per hotspot with yearly
//! case counts and a map link. Every flag defaults to the values the
//! analysis has always used, so a bare `risk_map` reproduces the standard
//! run.
//!
//! Uses `indicatif-log-bridge` (via [`risk_map_cli_utils::init_logger`])
//! so that log lines and the clustering progress bar never fight for the
//! terminal.

mod pipeline;

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use risk_map_analytics::AggregateOptions;
use risk_map_analytics_models::{
    CaseIdCollisionPolicy, DEFAULT_FIRST_YEAR, DEFAULT_LAST_YEAR, YearRange,
};
use risk_map_cli_utils::IndicatifProgress;
use risk_map_spatial::{DEFAULT_MIN_SAMPLES, DEFAULT_RADIUS_METERS, DbscanParams};

use crate::pipeline::{DEFAULT_INPUT, DEFAULT_OUTPUT, PipelineConfig};

#[derive(Parser)]
#[command(name = "risk_map", about = "Accident risk point clustering tool")]
struct Cli {
    /// Input workbook with one row per fatality case
    #[arg(long, default_value = DEFAULT_INPUT)]
    input: PathBuf,
    /// Output workbook (overwritten if it exists)
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
    /// Worksheet to read (defaults to the first sheet)
    #[arg(long)]
    sheet: Option<String>,
    /// Clustering radius in meters (great-circle distance)
    #[arg(long, default_value_t = DEFAULT_RADIUS_METERS)]
    radius_meters: f64,
    /// Minimum points within the radius for a core point (1 = no noise)
    #[arg(long, default_value_t = DEFAULT_MIN_SAMPLES)]
    min_samples: usize,
    /// First year (Buddhist Era) reported as its own column
    #[arg(long, default_value_t = DEFAULT_FIRST_YEAR)]
    year_start: i32,
    /// Last year (Buddhist Era, inclusive) reported as its own column
    #[arg(long, default_value_t = DEFAULT_LAST_YEAR)]
    year_end: i32,
    /// What to do when a case id appears with two different years
    /// (`warn` keeps the last-seen year, `fail` aborts)
    #[arg(long, default_value_t = CaseIdCollisionPolicy::Warn)]
    on_case_collision: CaseIdCollisionPolicy,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        Ok(PipelineConfig {
            input: self.input,
            output: self.output,
            sheet: self.sheet,
            dbscan: DbscanParams {
                radius_meters: self.radius_meters,
                min_samples: self.min_samples,
            },
            aggregate: AggregateOptions {
                year_range: YearRange::new(self.year_start, self.year_end)?,
                collision_policy: self.on_case_collision,
            },
            ..PipelineConfig::default()
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = risk_map_cli_utils::init_logger();
    let config = Cli::parse().into_config()?;

    let start = Instant::now();
    let progress = IndicatifProgress::points_bar(&multi, "Clustering accident points");
    let summary = pipeline::run(&config, &progress)?;

    log::info!(
        "Done in {:.1}s: {} rows read, {} dropped, {} records clustered into {} risk points",
        start.elapsed().as_secs_f64(),
        summary.loaded_rows,
        summary.dropped_rows,
        summary.records,
        summary.risk_points
    );

    Ok(())
}
