//! Turn weather reports into an ordered list of drawing instructions. This
//! is where all the pixel geometry lives; the canvas just does what it's
//! told, in order.

use crate::{
    config::DisplaySettings,
    icon::{Icon, IconCategory, IconResolver},
    locale::LocalizedStrings,
    util::Color,
    weather::LocationReport,
};
use chrono::NaiveDate;
use embedded_graphics::geometry::Point;
use log::{debug, info};
use std::sync::Arc;

/// Glyph next to the wind text
pub const WIND_ICON: &str = "wind";
/// Glyph next to the humidity text
pub const HUMIDITY_ICON: &str = IconCategory::Rainy1.name();
/// Edge length of the wind/humidity glyphs
pub const SMALL_ICON_SIZE: u32 = 28;

/// Which typeface/size a piece of text uses. The canvas decides what that
/// means in pixels.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FontRole {
    Title,
    Location,
    Data,
    Small,
}

/// How a text position relates to the text. Left anchors the top-left
/// corner, Center anchors the middle of the top edge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Anchor {
    Left,
    Center,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawInstruction {
    FillBackground(Color),
    DrawText {
        position: Point,
        text: String,
        font: FontRole,
        color: Color,
        anchor: Anchor,
    },
    /// Composite an icon with its top-left corner at `position`
    DrawIcon { position: Point, icon: Arc<Icon> },
}

/// X offset of each column. There are two fixed presets, one per forecast
/// mode. Without the forecast column the others spread out.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Columns {
    pub city: i32,
    pub temp: i32,
    pub wind: i32,
    pub humidity: i32,
    pub forecast: Option<i32>,
}

impl Columns {
    pub const WITH_FORECAST: Self = Self {
        city: 30,
        temp: 200,
        wind: 320,
        humidity: 500,
        forecast: Some(680),
    };
    pub const WITHOUT_FORECAST: Self = Self {
        city: 30,
        temp: 320,
        wind: 480,
        humidity: 760,
        forecast: None,
    };

    pub fn new(include_forecast: bool) -> Self {
        if include_forecast {
            Self::WITH_FORECAST
        } else {
            Self::WITHOUT_FORECAST
        }
    }
}

/// Size of the image and where everything goes
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    /// Y of the first row
    pub header_height: i32,
    pub columns: Columns,
}

impl Geometry {
    pub const ROW_HEIGHT: i32 = 90;
    pub const FOOTER_HEIGHT: i32 = 40;
    const BOTTOM_MARGIN: i32 = 20;
    const TITLE_Y: i32 = 25;
    const LABEL_Y: i32 = 85;
    /// Distance from the bottom edge to the top of the footer text
    const FOOTER_Y: i32 = 30;
    /// Row contents are pushed down a bit from the row top
    const TEXT_Y: i32 = 15;
    const SMALL_ICON_Y: i32 = 10;
    /// Location name sits to the right of the weather icon
    const NAME_X: i32 = 80;
    /// Wind/humidity text sits to the right of its glyph
    const SMALL_ICON_TEXT_X: i32 = 35;

    pub fn new(width: u32, include_forecast: bool, rows: usize) -> Self {
        let header_height = if include_forecast { 130 } else { 100 };
        let height = header_height
            + rows as i32 * Self::ROW_HEIGHT
            + Self::FOOTER_HEIGHT
            + Self::BOTTOM_MARGIN;
        Self {
            width,
            height: height as u32,
            header_height,
            columns: Columns::new(include_forecast),
        }
    }

    /// Y of the top of a row
    pub fn row_y(&self, index: usize) -> i32 {
        self.header_height + index as i32 * Self::ROW_HEIGHT
    }
}

/// Output of the layout pass
#[derive(Clone, Debug)]
pub struct Layout {
    pub geometry: Geometry,
    pub instructions: Vec<DrawInstruction>,
}

/// Lay out a full report: background, title, column labels, one row per
/// report in the given order, then the footer. Icons are fetched through
/// `icons`; any icon that can't be resolved is left out, but the text next
/// to it is still drawn.
pub fn layout(
    settings: &DisplaySettings,
    strings: &LocalizedStrings,
    reports: &[LocationReport],
    today: NaiveDate,
    icons: &mut impl IconResolver,
) -> Layout {
    let geometry = Geometry::new(
        settings.image_width,
        settings.include_forecast,
        reports.len(),
    );
    let mut builder = Builder {
        geometry,
        icons,
        instructions: Vec::new(),
    };

    builder
        .instructions
        .push(DrawInstruction::FillBackground(Color::BACKGROUND));
    builder.draw_title(settings, strings, today);
    builder.draw_labels(strings);
    for (index, report) in reports.iter().enumerate() {
        builder.draw_row(settings, index, report);
    }
    builder.draw_footer(strings);

    debug!(
        "Laid out {} rows in {}x{} ({} instructions)",
        reports.len(),
        geometry.width,
        geometry.height,
        builder.instructions.len()
    );
    Layout {
        geometry,
        instructions: builder.instructions,
    }
}

/// Resolve every icon a layout with these settings could ask for, so the
/// downloads all happen up front
pub fn preload_icons(
    settings: &DisplaySettings,
    icons: &mut impl IconResolver,
) {
    info!("Loading icons");
    for category in IconCategory::ALL {
        // The resolver logs and remembers failures
        let _ = icons.resolve(category.name(), settings.icon_size);
    }
    for name in [WIND_ICON, HUMIDITY_ICON] {
        let _ = icons.resolve(name, SMALL_ICON_SIZE);
    }
}

struct Builder<'a, R> {
    geometry: Geometry,
    icons: &'a mut R,
    instructions: Vec<DrawInstruction>,
}

impl<R: IconResolver> Builder<'_, R> {
    fn draw_title(
        &mut self,
        settings: &DisplaySettings,
        strings: &LocalizedStrings,
        today: NaiveDate,
    ) {
        let title = if strings.title.is_empty() {
            &settings.title
        } else {
            &strings.title
        };
        // https://docs.rs/chrono/latest/chrono/format/strftime/index.html
        let text = format!("{title} - {}", today.format("%d %b"));
        self.add_text(
            text,
            (self.geometry.width as i32 / 2, Geometry::TITLE_Y),
            FontRole::Title,
            Color::WHITE,
            Anchor::Center,
        );
    }

    /// Column headings
    fn draw_labels(&mut self, strings: &LocalizedStrings) {
        let columns = self.geometry.columns;
        let y = Geometry::LABEL_Y;
        let mut labels = vec![
            (columns.city, strings.city.clone()),
            (columns.temp, strings.temp.clone()),
            (columns.wind, strings.wind.clone()),
            (columns.humidity, strings.humidity.clone()),
        ];
        if let Some(x) = columns.forecast {
            let label = format!(
                "{} ({}/{})",
                strings.forecast, strings.high, strings.low
            );
            labels.push((x, label));
        }
        for (x, label) in labels {
            self.add_text(
                label,
                (x, y),
                FontRole::Data,
                Color::HEADER,
                Anchor::Left,
            );
        }
    }

    fn draw_row(
        &mut self,
        settings: &DisplaySettings,
        index: usize,
        report: &LocationReport,
    ) {
        let columns = self.geometry.columns;
        let y = self.geometry.row_y(index);
        let text_y = y + Geometry::TEXT_Y;

        if let Some(current) = &report.current {
            let category = IconCategory::classify(current.weather_code);
            self.add_icon(
                category.name(),
                settings.icon_size,
                (columns.city, y),
            );
        }

        self.add_text(
            report.location.name.clone(),
            (columns.city + Geometry::NAME_X, text_y),
            FontRole::Location,
            Color::WHITE,
            Anchor::Left,
        );

        if let Some(current) = &report.current {
            self.add_text(
                current.temperature(),
                (columns.temp, text_y),
                FontRole::Data,
                Color::TEMPERATURE,
                Anchor::Left,
            );
            self.add_labeled_icon(
                WIND_ICON,
                current.wind(),
                columns.wind,
                y,
                Color::WIND,
            );
            self.add_labeled_icon(
                HUMIDITY_ICON,
                current.humidity(),
                columns.humidity,
                y,
                Color::HUMIDITY,
            );
        }

        if let (Some(x), Some(forecast)) =
            (columns.forecast, &report.forecast)
        {
            self.add_text(
                forecast.high_low(),
                (x, text_y),
                FontRole::Data,
                Color::FORECAST,
                Anchor::Left,
            );
        }
    }

    fn draw_footer(&mut self, strings: &LocalizedStrings) {
        let y = self.geometry.height as i32 - Geometry::FOOTER_Y;
        self.add_text(
            strings.footer.clone(),
            (self.geometry.columns.city, y),
            FontRole::Small,
            Color::FOOTER,
            Anchor::Left,
        );
    }

    /// Small glyph followed by its value, e.g. wind or humidity
    fn add_labeled_icon(
        &mut self,
        icon: &str,
        text: String,
        x: i32,
        row_y: i32,
        color: Color,
    ) {
        self.add_icon(
            icon,
            SMALL_ICON_SIZE,
            (x, row_y + Geometry::SMALL_ICON_Y),
        );
        self.add_text(
            text,
            (x + Geometry::SMALL_ICON_TEXT_X, row_y + Geometry::TEXT_Y),
            FontRole::Data,
            color,
            Anchor::Left,
        );
    }

    fn add_text(
        &mut self,
        text: String,
        (x, y): (i32, i32),
        font: FontRole,
        color: Color,
        anchor: Anchor,
    ) {
        self.instructions.push(DrawInstruction::DrawText {
            position: Point::new(x, y),
            text,
            font,
            color,
            anchor,
        });
    }

    /// Add an icon if it can be resolved, otherwise skip it
    fn add_icon(&mut self, name: &str, size: u32, (x, y): (i32, i32)) {
        match self.icons.resolve(name, size) {
            Ok(icon) => self.instructions.push(DrawInstruction::DrawIcon {
                position: Point::new(x, y),
                icon,
            }),
            Err(err) => debug!("Skipping icon: {err}"),
        }
    }
}
