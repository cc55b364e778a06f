use crate::model::{PixelBounds, PixelPoint};
use serde::{Deserialize, Serialize};

pub const PADDING: f64 = 10.0;
pub const LINE_HEIGHT: f64 = 21.0;
pub const SWATCH_SIZE: f64 = 12.0;
pub const SWATCH_GAP: f64 = 5.0;
pub const FONT_SIZE: f64 = 14.0;
// rough advance for the legend font; no text metrics are available headlessly
const CHAR_WIDTH: f64 = FONT_SIZE * 0.55;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenCorner {
    TopLeft,
    TopRight,
    BottomRight,
    #[default]
    BottomLeft,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub label: String,
    pub swatch: String,
    #[serde(default)]
    pub border: Option<String>,
}

/// Static key drawn above every layer, pinned to a screen corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub title: String,
    #[serde(default)]
    pub entries: Vec<LegendEntry>,
    #[serde(default)]
    pub corner: ScreenCorner,
    /// Horizontal and vertical distance from the anchoring corner.
    #[serde(default = "default_margin")]
    pub margin: [f64; 2],
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_frame")]
    pub frame: String,
}

fn default_margin() -> [f64; 2] {
    [10.0, 30.0]
}

fn default_background() -> String {
    "white".to_string()
}

fn default_frame() -> String {
    "#ccc".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendRow {
    pub label: String,
    pub swatch: PixelBounds,
    pub color: String,
    pub border: Option<String>,
    pub text_origin: PixelPoint,
}

/// Screen layout of a [`Legend`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendPanel {
    pub bounds: PixelBounds,
    pub background: String,
    pub frame: String,
    pub title: String,
    pub title_origin: PixelPoint,
    pub font_size: f64,
    pub rows: Vec<LegendRow>,
}

impl Legend {
    pub fn new(title: impl Into<String>) -> Self {
        Legend {
            title: title.into(),
            entries: Vec::new(),
            corner: ScreenCorner::default(),
            margin: default_margin(),
            background: default_background(),
            frame: default_frame(),
        }
    }

    pub fn with_entry(mut self, label: impl Into<String>, swatch: impl Into<String>) -> Self {
        self.entries.push(LegendEntry {
            label: label.into(),
            swatch: swatch.into(),
            border: None,
        });
        self
    }

    pub fn with_bordered_entry(
        mut self,
        label: impl Into<String>,
        swatch: impl Into<String>,
        border: impl Into<String>,
    ) -> Self {
        self.entries.push(LegendEntry {
            label: label.into(),
            swatch: swatch.into(),
            border: Some(border.into()),
        });
        self
    }

    pub fn anchored(mut self, corner: ScreenCorner, margin: [f64; 2]) -> Self {
        self.corner = corner;
        self.margin = margin;
        self
    }

    fn content_width(&self) -> f64 {
        let title = self.title.chars().count() as f64 * CHAR_WIDTH;
        self.entries
            .iter()
            .map(|entry| SWATCH_SIZE + SWATCH_GAP + entry.label.chars().count() as f64 * CHAR_WIDTH)
            .fold(title, f64::max)
    }

    /// Places the panel on a `width` x `height` screen. Only the screen size matters,
    /// so the panel stays put while the map pans and zooms.
    pub fn layout(&self, width: u32, height: u32) -> LegendPanel {
        let panel_width = self.content_width() + 2.0 * PADDING;
        let panel_height = (self.entries.len() + 1) as f64 * LINE_HEIGHT + 2.0 * PADDING;
        let [margin_x, margin_y] = self.margin;

        let left = match self.corner {
            ScreenCorner::TopLeft | ScreenCorner::BottomLeft => margin_x,
            ScreenCorner::TopRight | ScreenCorner::BottomRight => width as f64 - margin_x - panel_width,
        };
        let top = match self.corner {
            ScreenCorner::TopLeft | ScreenCorner::TopRight => margin_y,
            ScreenCorner::BottomLeft | ScreenCorner::BottomRight => {
                height as f64 - margin_y - panel_height
            }
        };

        let text_x = left + PADDING;
        let row_top = |row: usize| top + PADDING + row as f64 * LINE_HEIGHT;
        let rows = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let y = row_top(index + 1);
                let swatch_origin = PixelPoint::new(text_x, y + (LINE_HEIGHT - SWATCH_SIZE) / 2.0);
                LegendRow {
                    label: entry.label.clone(),
                    swatch: PixelBounds::from_origin(swatch_origin, SWATCH_SIZE, SWATCH_SIZE),
                    color: entry.swatch.clone(),
                    border: entry.border.clone(),
                    text_origin: PixelPoint::new(text_x + SWATCH_SIZE + SWATCH_GAP, y + LINE_HEIGHT / 2.0),
                }
            })
            .collect();

        LegendPanel {
            bounds: PixelBounds::from_origin(PixelPoint::new(left, top), panel_width, panel_height),
            background: self.background.clone(),
            frame: self.frame.clone(),
            title: self.title.clone(),
            title_origin: PixelPoint::new(text_x, row_top(0) + LINE_HEIGHT / 2.0),
            font_size: FONT_SIZE,
            rows,
        }
    }
}
