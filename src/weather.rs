use anyhow::Context;
use log::{error, info};
use serde::Deserialize;
use std::time::Duration;
use ureq::Agent;

/// One configured place on the report. Rows are keyed by position in the
/// config, so duplicates are allowed.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Location {
    #[serde(default = "Location::default_name")]
    pub name: String,
    #[serde(rename = "lat", default)]
    pub latitude: f64,
    #[serde(rename = "lon", default)]
    pub longitude: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    fn default_name() -> String {
        "Unknown".into()
    }
}

/// Conditions right now, as reported by Open-Meteo. Field names match the
/// API so the `current` object deserializes directly. Missing fields get
/// the same defaults the report has always used.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CurrentConditions {
    #[serde(rename = "temperature_2m", default)]
    pub temperature_celsius: f64,
    #[serde(rename = "relative_humidity_2m", default)]
    pub humidity_percent: i64,
    #[serde(rename = "wind_speed_10m", default)]
    pub wind_speed_mps: f64,
    #[serde(rename = "wind_direction_10m", default)]
    pub wind_direction_deg: Option<f64>,
    #[serde(default = "CurrentConditions::default_weather_code")]
    pub weather_code: i64,
}

impl CurrentConditions {
    /// Overcast
    fn default_weather_code() -> i64 {
        3
    }

    /// Formatted temperature
    pub fn temperature(&self) -> String {
        format!("{:.1}°C", self.temperature_celsius)
    }

    /// Formatted wind speed and compass direction
    pub fn wind(&self) -> String {
        format!(
            "{:.1} m/s {}",
            self.wind_speed_mps,
            wind_direction(self.wind_direction_deg)
        )
    }

    /// Formatted relative humidity
    pub fn humidity(&self) -> String {
        format!("{}%", self.humidity_percent)
    }
}

/// Today's high and low
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DailyForecast {
    pub high_celsius: f64,
    pub low_celsius: f64,
}

impl DailyForecast {
    /// Formatted high/low, rounded to whole degrees
    pub fn high_low(&self) -> String {
        format!("{:.0}°/{:.0}°", self.high_celsius, self.low_celsius)
    }
}

/// Everything we know about one location. `current` is `None` when the
/// fetch failed or the response was malformed; the row still gets drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct LocationReport {
    pub location: Location,
    pub current: Option<CurrentConditions>,
    pub forecast: Option<DailyForecast>,
}

impl LocationReport {
    /// A report with no data at all, for when the fetch fails outright
    pub fn empty(location: Location) -> Self {
        Self {
            location,
            current: None,
            forecast: None,
        }
    }
}

/// Map a compass bearing onto one of the 8 principal winds. A missing
/// bearing reads as north.
///
/// The bucket is `floor((deg + 22.5) / 45)`, wrapped with a Euclidean
/// modulo, so each label covers 45° centered on its bearing and negative
/// bearings count counterclockwise from north (-30 is NW).
pub fn wind_direction(degrees: Option<f64>) -> &'static str {
    const LABELS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let Some(degrees) = degrees else {
        return "N";
    };
    // Saturating cast; NaN lands on 0
    let bucket = ((degrees + 22.5) / 45.0).floor() as i64;
    LABELS[bucket.rem_euclid(LABELS.len() as i64) as usize]
}

/// Gotta know weather or not it's gonna rain. Blocking client for the
/// Open-Meteo forecast API.
#[derive(Debug)]
pub struct Weather {
    agent: Agent,
    url: String,
    timezone: String,
}

impl Weather {
    const API_URL: &'static str = "https://api.open-meteo.com/v1/forecast";
    const TIMEOUT: Duration = Duration::from_secs(10);
    const CURRENT_FIELDS: &'static str = "temperature_2m,relative_humidity_2m,\
        weather_code,wind_speed_10m,wind_direction_10m";
    const DAILY_FIELDS: &'static str = "temperature_2m_max,temperature_2m_min";

    pub fn new(timezone: impl Into<String>) -> Self {
        Self::with_url(Self::API_URL, timezone)
    }

    /// Point the client at a different API host
    pub fn with_url(
        url: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Self::TIMEOUT)
            .user_agent(concat!("weather-card/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            url: url.into(),
            timezone: timezone.into(),
        }
    }

    /// Fetch the report for a single location. Any failure is logged and
    /// yields a report with no data, so one bad location never sinks the
    /// whole image.
    pub fn report(
        &self,
        location: &Location,
        include_forecast: bool,
    ) -> LocationReport {
        info!("Fetching weather for {}", location.name);
        match self.fetch(location, include_forecast) {
            Ok(response) => response.into_report(location.clone()),
            Err(err) => {
                error!("Error fetching weather for {}: {err:?}", location.name);
                LocationReport::empty(location.clone())
            }
        }
    }

    fn fetch(
        &self,
        location: &Location,
        include_forecast: bool,
    ) -> anyhow::Result<ForecastResponse> {
        let response = self
            .request(location, include_forecast)
            .call()
            .with_context(|| {
                format!("Error fetching forecast from {}", self.url)
            })?;
        response
            .into_json()
            .context("Error parsing forecast as JSON")
    }

    /// Build the forecast query. Daily highs/lows are only asked for when
    /// the forecast column is shown.
    fn request(
        &self,
        location: &Location,
        include_forecast: bool,
    ) -> ureq::Request {
        let request = self
            .agent
            .get(&self.url)
            .query("latitude", &location.latitude.to_string())
            .query("longitude", &location.longitude.to_string())
            .query("current", Self::CURRENT_FIELDS)
            .query("timezone", &self.timezone);
        if include_forecast {
            request.query("daily", Self::DAILY_FIELDS)
        } else {
            request
        }
    }
}

/// https://open-meteo.com/en/docs
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    current: Option<CurrentConditions>,
    #[serde(default)]
    daily: Option<DailySeries>,
}

/// Daily values come back as parallel arrays, one entry per day starting
/// today. Entries can be null.
#[derive(Debug, Deserialize)]
struct DailySeries {
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
}

impl ForecastResponse {
    pub fn into_report(self, location: Location) -> LocationReport {
        let forecast = self.daily.and_then(|daily| {
            let high = daily.temperature_2m_max.first().copied().flatten()?;
            let low = daily.temperature_2m_min.first().copied().flatten()?;
            Some(DailyForecast {
                high_celsius: high,
                low_celsius: low,
            })
        });
        LocationReport {
            location,
            current: self.current,
            forecast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> LocationReport {
        let response: ForecastResponse = serde_json::from_str(json).unwrap();
        response.into_report(Location::new("TestCity", 57.7, 11.9))
    }

    #[test]
    fn test_wind_direction() {
        let cases = [
            (Some(0.0), "N"),
            (Some(22.4), "N"),
            (Some(22.5), "NE"),
            (Some(90.0), "E"),
            (Some(200.0), "S"),
            (Some(359.0), "N"),
            (Some(360.0), "N"),
            (Some(400.0), "NE"),
            (Some(-10.0), "N"),
            (Some(-22.5), "N"),
            (Some(-23.0), "NW"),
            (Some(-60.0), "NW"),
            (Some(-90.0), "W"),
            (Some(-400.0), "NW"),
            (None, "N"),
        ];
        for (degrees, expected) in cases {
            assert_eq!(wind_direction(degrees), expected, "{degrees:?}");
        }
    }

    #[test]
    fn test_parse_current() {
        let report = parse(
            r#"{
                "latitude": 57.7,
                "current": {
                    "time": "2024-05-24T17:00",
                    "temperature_2m": 5.0,
                    "relative_humidity_2m": 80,
                    "wind_speed_10m": 3.2,
                    "wind_direction_10m": 90,
                    "weather_code": 61
                }
            }"#,
        );
        let current = report.current.unwrap();
        assert_eq!(current.temperature(), "5.0°C");
        assert_eq!(current.wind(), "3.2 m/s E");
        assert_eq!(current.humidity(), "80%");
        assert_eq!(current.weather_code, 61);
        assert_eq!(report.forecast, None);
    }

    #[test]
    fn test_parse_missing_fields() {
        let report = parse(r#"{"current": {}}"#);
        assert_eq!(
            report.current,
            Some(CurrentConditions {
                temperature_celsius: 0.0,
                humidity_percent: 0,
                wind_speed_mps: 0.0,
                wind_direction_deg: None,
                weather_code: 3,
            })
        );
    }

    #[test]
    fn test_parse_daily() {
        let report = parse(
            r#"{
                "daily": {
                    "time": ["2024-05-24", "2024-05-25"],
                    "temperature_2m_max": [18.6, 20.1],
                    "temperature_2m_min": [9.4, 10.0]
                }
            }"#,
        );
        assert_eq!(report.current, None);
        let forecast = report.forecast.unwrap();
        assert_eq!(forecast.high_low(), "19°/9°");
    }

    #[test]
    fn test_parse_daily_incomplete() {
        let report = parse(
            r#"{"daily": {
                "temperature_2m_max": [null],
                "temperature_2m_min": [4.0]
            }}"#,
        );
        assert_eq!(report.forecast, None);
        let report = parse(r#"{"daily": {"temperature_2m_max": [12.0]}}"#);
        assert_eq!(report.forecast, None);
    }

    /// Query parameters the client would send, decoded
    fn query(
        weather: &Weather,
        include_forecast: bool,
    ) -> Vec<(String, String)> {
        let location = Location::new("TestCity", 57.7, -11.25);
        let url = weather
            .request(&location, include_forecast)
            .request_url()
            .unwrap();
        url.query_pairs()
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect()
    }

    #[test]
    fn test_request() {
        let weather =
            Weather::with_url("http://localhost/v1/forecast", "Europe/Oslo");
        let expected = |daily: Option<&str>| {
            let mut pairs = vec![
                ("latitude", "57.7"),
                ("longitude", "-11.25"),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,weather_code,\
                    wind_speed_10m,wind_direction_10m",
                ),
                ("timezone", "Europe/Oslo"),
            ];
            pairs.extend(daily.map(|fields| ("daily", fields)));
            pairs
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .collect::<Vec<_>>()
        };

        assert_eq!(
            query(&weather, true),
            expected(Some("temperature_2m_max,temperature_2m_min"))
        );
        assert_eq!(query(&weather, false), expected(None));

        let request = weather.request(&Location::new("A", 0.0, 0.0), false);
        assert!(request.url().starts_with("http://localhost/v1/forecast?"));
    }
}
