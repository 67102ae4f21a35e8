use chrono::Local;
use clap::Parser;
use log::{info, LevelFilter};
use std::path::PathBuf;
use weather_card::{
    canvas::{Canvas, ImageCanvas},
    config::Config,
    icon::{HttpIconSource, IconCache},
    layout,
    weather::Weather,
};

/// Fetch the weather for every configured location and draw it as a PNG
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the JSON config file [default: config.json next to the
    /// executable]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_module("weather_card", LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;
    let settings = &config.settings;
    let strings = config.languages.resolve(&settings.language);

    let mut icons =
        IconCache::new(HttpIconSource::new(), &settings.icon_cache_dir);
    layout::preload_icons(settings, &mut icons);

    let weather = Weather::new(&settings.timezone);
    let reports: Vec<_> = config
        .locations
        .iter()
        .map(|location| weather.report(location, settings.include_forecast))
        .collect();

    let today = Local::now().date_naive();
    let layout =
        layout::layout(settings, &strings, &reports, today, &mut icons);
    let mut canvas = ImageCanvas::for_geometry(&layout.geometry);
    canvas.apply_all(&layout.instructions);
    canvas.flush(&settings.output)?;

    info!("Done! Saved report to {}", settings.output.display());
    Ok(())
}
