use crate::{locale::LocalizationTable, weather::Location};
use anyhow::Context;
use log::{info, warn};
use serde::Deserialize;
use std::{
    env,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub settings: DisplaySettings,
    #[serde(default)]
    pub languages: LocalizationTable,
}

/// Everything that controls what the image looks like and where it goes.
/// Every field is optional in the config file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Heading, used only if the selected language has an empty title
    pub title: String,
    pub language: String,
    /// Add today's high/low column
    pub include_forecast: bool,
    pub image_width: u32,
    /// Edge length of the weather icon on each row, in pixels
    pub icon_size: u32,
    /// Passed through to the weather API, which uses it to decide when
    /// "today" starts
    pub timezone: String,
    pub output: PathBuf,
    pub icon_cache_dir: PathBuf,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            title: "Väderrapport".into(),
            language: "sv".into(),
            include_forecast: true,
            image_width: 1000,
            icon_size: 64,
            timezone: "Europe/Stockholm".into(),
            output: env::temp_dir().join("weather-report.png"),
            icon_cache_dir: env::temp_dir().join("makin-icons"),
        }
    }
}

impl Config {
    const FILE_NAME: &'static str = "config.json";

    /// `config.json` next to the executable, or in the working directory if
    /// we can't tell where the executable lives
    pub fn default_path() -> PathBuf {
        env::current_exe()
            .ok()
            .and_then(|exe| Some(exe.parent()?.join(Self::FILE_NAME)))
            .unwrap_or_else(|| Self::FILE_NAME.into())
    }

    /// Load config from a JSON file. A missing file isn't an error, we just
    /// use the built-in defaults. A file that exists but can't be parsed is.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            warn!(
                "Config file not found: {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        info!("Loading config from `{}`", path.display());
        let file = File::open(path).with_context(|| {
            format!("Error opening config file {}", path.display())
        })?;
        serde_json::from_reader(BufReader::new(file)).with_context(|| {
            format!("Error parsing config file {}", path.display())
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locations: vec![
                Location::new("Göteborg", 57.7089, 11.9746),
                Location::new("Mölndal", 57.6561, 12.0176),
                Location::new("Rävlanda", 57.68, 12.50),
            ],
            settings: DisplaySettings::default(),
            languages: LocalizationTable::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        let names: Vec<_> =
            config.locations.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Göteborg", "Mölndal", "Rävlanda"]);
        assert_eq!(config.settings, DisplaySettings::default());
        assert_eq!(config.languages, LocalizationTable::default());
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "locations": [
                    {"name": "TestCity", "lat": 1.5, "lon": -2.25},
                    {"lat": 3.0}
                ],
                "settings": {"language": "en", "include_forecast": false},
                "languages": {"en": {"title": "Weather"}}
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.locations,
            [
                Location::new("TestCity", 1.5, -2.25),
                Location::new("Unknown", 3.0, 0.0)
            ]
        );
        assert_eq!(
            config.settings,
            DisplaySettings {
                language: "en".into(),
                include_forecast: false,
                ..Default::default()
            }
        );
        assert_eq!(config.languages.resolve("en").title, "Weather");
    }

    #[test]
    fn test_empty_object() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.locations.is_empty());
        assert_eq!(config.settings.image_width, 1000);
        assert_eq!(config.settings.icon_size, 64);
        assert!(config.settings.include_forecast);
    }

    #[test]
    fn test_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{\"locations\": [").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
