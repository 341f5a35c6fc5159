pub mod cli;
pub mod config;
pub mod corrections;
pub mod data;
pub mod impact;
pub mod io_utils;
pub mod locations;
pub mod pipeline;
pub mod ranking;
pub mod report;
pub mod speller;
pub mod table;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    cli::{Cli, CleanArgs, Commands, ImpactArgs, MapsArgs, ValidateArgs},
    config::CleanConfig,
    impact::SheetStats,
    pipeline::Pipeline,
    speller::SpellCorrector,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("survey_cleanse", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean(args) => handle_clean(&args),
        Commands::Impact(args) => handle_impact(&args),
        Commands::Validate(args) => handle_validate(&args),
        Commands::Maps(args) => handle_maps(&args),
    }
}

fn handle_clean(args: &CleanArgs) -> Result<()> {
    let mut config = CleanConfig::load_or_default(args.config.as_deref())?;
    if let Some(threshold) = args.threshold {
        config.spelling_threshold = threshold;
    }
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!("Cleaning sheets under '{}'", args.input.display());
    let sheets = io_utils::load_sheets(&args.input, args.delimiter, encoding, &config.skip_sheets)?;
    let corrector = SpellCorrector::load(&args.dictionary)
        .with_context(|| format!("Loading frequency dictionary {:?}", args.dictionary))?;
    info!(
        "Loaded {} sheet(s), dictionary of {} term(s)",
        sheets.len(),
        corrector.dictionary_len()
    );

    let pipeline = Pipeline::new(&config, &args.maps, &corrector);
    let cleaned = pipeline.clean_all(&sheets)?;

    match &args.output {
        Some(dir) => {
            io_utils::write_sheets(dir, &cleaned)?;
            info!("Wrote {} cleaned sheet(s) to {dir:?}", cleaned.len());
        }
        None => info!("No output directory given; cleaned sheets discarded"),
    }
    Ok(())
}

fn handle_impact(args: &ImpactArgs) -> Result<()> {
    let config = CleanConfig::load_or_default(args.config.as_deref())?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let raw = io_utils::load_sheets(&args.raw, args.delimiter, encoding, &config.skip_sheets)
        .context("Loading raw sheets")?;
    let manual = io_utils::load_sheets(&args.manual, args.delimiter, encoding, &config.skip_sheets)
        .context("Loading manually corrected sheets")?;
    let auto = io_utils::load_sheets(&args.auto, args.delimiter, encoding, &config.skip_sheets)
        .context("Loading cleaned sheets")?;

    // Sheets that fail preconditions are dropped from the report, never the
    // whole batch.
    let mut per_sheet: Vec<SheetStats> = Vec::new();
    for (name, raw_sheet) in &raw {
        let (Some(manual_sheet), Some(auto_sheet)) = (manual.get(name), auto.get(name)) else {
            warn!("Sheet '{name}' is missing from a version directory; skipping");
            continue;
        };
        match impact::sheet_stats(raw_sheet, manual_sheet, auto_sheet) {
            Ok(stats) => per_sheet.push(stats),
            Err(err) => warn!("Skipping sheet '{name}': {err}"),
        }
    }
    if per_sheet.is_empty() {
        anyhow::bail!("No sheet could be diffed across the three versions");
    }

    let global = impact::global_stats(per_sheet.iter());
    report::print_report(&global, per_sheet.iter());

    let ranked = ranking::rank(per_sheet.iter());
    let outliers = ranking::outliers(&ranked, args.low, args.high);
    report::print_outliers(&outliers);

    if let Some(path) = &args.chart_data {
        let entries = ranking::chart_entries(&ranked, args.low, args.high);
        let serialized =
            serde_json::to_string_pretty(&entries).context("Serializing chart entries")?;
        fs::write(path, serialized).with_context(|| format!("Writing chart data {path:?}"))?;
        info!("Wrote {} chart entr(ies) to {path:?}", entries.len());
    }
    Ok(())
}

fn handle_validate(args: &ValidateArgs) -> Result<()> {
    let config = CleanConfig::load_or_default(args.config.as_deref())?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let sheets = io_utils::load_sheets(&args.input, args.delimiter, encoding, &config.skip_sheets)?;
    let references = locations::ReferenceSets::load(&args.references)
        .with_context(|| format!("Loading reference sets from {:?}", args.references))?;
    locations::validate_sheets(&sheets, &references, &args.version, &args.output)?;
    info!(
        "Validated {} sheet(s); discrepancy reports under {:?}",
        sheets.len(),
        args.output
    );
    Ok(())
}

fn handle_maps(args: &MapsArgs) -> Result<()> {
    let config = CleanConfig::load_or_default(args.config.as_deref())?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let sheets = io_utils::load_sheets(&args.input, args.delimiter, encoding, &config.skip_sheets)?;
    locations::build_maps(&sheets, &config.location_sheets, &args.maps)?;
    info!("Location maps written to {:?}", args.maps);
    Ok(())
}
