use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, warn};
use serde::Deserialize;

/// UI labels for one language. Any key missing from a configured language
/// falls back to the Swedish default for that key.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LocalizedStrings {
    pub title: String,
    pub city: String,
    pub temp: String,
    pub wind: String,
    pub humidity: String,
    pub high: String,
    pub low: String,
    pub forecast: String,
    pub footer: String,
}

impl Default for LocalizedStrings {
    fn default() -> Self {
        Self {
            title: "Väderrapport".into(),
            city: "Stad".into(),
            temp: "Temp".into(),
            wind: "Vind".into(),
            humidity: "Fukt".into(),
            high: "Hög".into(),
            low: "Låg".into(),
            forecast: "Prognos".into(),
            footer: "Ikoner: Makin-Things | Data: Open-Meteo".into(),
        }
    }
}

/// Language code => labels, as given in the config
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct LocalizationTable(IndexMap<String, LocalizedStrings>);

impl LocalizationTable {
    /// Language used when the requested one isn't configured
    pub const FALLBACK: &'static str = "sv";

    pub fn new(
        languages: impl IntoIterator<Item = (String, LocalizedStrings)>,
    ) -> Self {
        Self(languages.into_iter().collect())
    }

    /// Get labels for a language. Missing languages fall back to the table's
    /// own Swedish entry, then to the built-in Swedish labels.
    pub fn resolve(&self, language: &str) -> LocalizedStrings {
        if let Some(strings) = self.0.get(language) {
            debug!("Using configured labels for `{language}`");
            return strings.clone();
        }
        warn!(
            "Language `{language}` not configured (available: [{}])",
            self.0.keys().join(", ")
        );
        self.0.get(Self::FALLBACK).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english() -> LocalizedStrings {
        LocalizedStrings {
            title: "Weather report".into(),
            city: "City".into(),
            temp: "Temp".into(),
            wind: "Wind".into(),
            humidity: "Humidity".into(),
            high: "High".into(),
            low: "Low".into(),
            forecast: "Forecast".into(),
            footer: "Icons: Makin-Things | Data: Open-Meteo".into(),
        }
    }

    #[test]
    fn test_resolve_configured() {
        let table = LocalizationTable::new([("en".to_owned(), english())]);
        assert_eq!(table.resolve("en"), english());
    }

    #[test]
    fn test_resolve_table_fallback() {
        let swedish = LocalizedStrings {
            title: "Vädret".into(),
            ..Default::default()
        };
        let table = LocalizationTable::new([
            ("en".to_owned(), english()),
            ("sv".to_owned(), swedish.clone()),
        ]);
        assert_eq!(table.resolve("de"), swedish);
    }

    #[test]
    fn test_resolve_builtin_fallback() {
        let table = LocalizationTable::new([("en".to_owned(), english())]);
        assert_eq!(table.resolve("fi"), LocalizedStrings::default());
        assert_eq!(
            LocalizationTable::default().resolve("sv"),
            LocalizedStrings::default()
        );
    }

    #[test]
    fn test_partial_record() {
        let table: LocalizationTable = serde_json::from_str(
            r#"{"en": {"title": "Weather", "city": "City"}, "sv": {}}"#,
        )
        .unwrap();
        let strings = table.resolve("en");
        assert_eq!(strings.title, "Weather");
        assert_eq!(strings.city, "City");
        assert_eq!(strings.wind, "Vind");
        assert_eq!(strings.footer, LocalizedStrings::default().footer);
        assert_eq!(table.resolve("sv"), LocalizedStrings::default());
    }
}
