#![allow(non_upper_case_globals)]

use crate::engine::assets::AssetTracker;
use crate::engine::interaction::PopupState;
use crate::engine::stack::LayerStack;
use crate::engine::tiles::{TilePlacement, visible_tiles};
use crate::engine::transforms::{calculate_bounds_from_coordinates, project, project_bounds, project_path};
use crate::error::MapError;
use crate::model::{
    FeatureGeometry, Layer, LayerKey, LayerKind, MapResult, MarkerIcon, PixelBounds, PixelPoint,
    VectorStyle, Viewport,
};
use crate::view::legend::{Legend, LegendPanel};
use serde::Serialize;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

// Headless composition: every layer placed on screen, in paint order

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Point { at: PixelPoint },
    Path { points: Vec<PixelPoint> },
    Polygon { rings: Vec<Vec<PixelPoint>> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PopupPlacement {
    pub origin: PixelPoint,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    Tiles {
        key: LayerKey,
        tiles: Vec<TilePlacement>,
        attribution: String,
    },
    ImageOverlay {
        key: LayerKey,
        url: String,
        bounds: PixelBounds,
        opacity: f64,
    },
    Vector {
        key: LayerKey,
        shapes: Vec<Shape>,
        style: VectorStyle,
    },
    Marker {
        key: LayerKey,
        icon_url: String,
        bounds: PixelBounds,
        popup: Option<PopupPlacement>,
    },
}

impl Placement {
    pub fn key(&self) -> &LayerKey {
        match self {
            Placement::Tiles { key, .. }
            | Placement::ImageOverlay { key, .. }
            | Placement::Vector { key, .. }
            | Placement::Marker { key, .. } => key,
        }
    }
}

/// Everything needed to paint one frame; the legend goes on top of the placements.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Frame {
    pub viewport: Viewport,
    pub placements: Vec<Placement>,
    pub legend: Option<LegendPanel>,
}

impl Frame {
    pub fn placement(&self, key: &LayerKey) -> Option<&Placement> {
        self.placements.iter().find(|placement| placement.key() == key)
    }

    pub fn open_popup(&self) -> Option<&PopupPlacement> {
        self.placements.iter().find_map(|placement| match placement {
            Placement::Marker { popup: Some(popup), .. } => Some(popup),
            _ => None,
        })
    }
}

pub struct ComposeInput<'a> {
    pub stack: &'a LayerStack,
    pub viewport: &'a Viewport,
    pub popup: &'a PopupState,
    pub assets: &'a AssetTracker,
    pub legend: Option<&'a Legend>,
}

pub fn compose(input: &ComposeInput<'_>) -> Frame {
    let placements = input
        .stack
        .list()
        .filter_map(|layer| match place_layer(layer, input) {
            Ok(placement) => placement,
            Err(err) => {
                tracing::warn!("Skipping {} layer {}: {}", layer.kind_name(), layer.key, err);
                None
            }
        })
        .collect();

    Frame {
        viewport: *input.viewport,
        placements,
        legend: input
            .legend
            .map(|legend| legend.layout(input.viewport.width(), input.viewport.height())),
    }
}

fn place_layer(layer: &Layer, input: &ComposeInput<'_>) -> MapResult<Option<Placement>> {
    let viewport = input.viewport;
    let failed = |url: &str| input.assets.is_failed(input.stack, &layer.key, url);
    let key = layer.key.clone();

    match &layer.kind {
        LayerKind::Tile(tile) => {
            let tiles = visible_tiles(tile, viewport)?
                .into_iter()
                .filter(|placement| !failed(&placement.url))
                .collect();
            Ok(Some(Placement::Tiles {
                key,
                tiles,
                attribution: tile.attribution.clone(),
            }))
        }
        LayerKind::ImageOverlay(overlay) => {
            if failed(&overlay.image_url) {
                tracing::debug!("Overlay {} omitted after failed load", layer.key);
                return Ok(None);
            }
            Ok(Some(Placement::ImageOverlay {
                key,
                url: overlay.image_url.clone(),
                bounds: project_bounds(&overlay.bounds()?, viewport)?,
                opacity: overlay.opacity,
            }))
        }
        LayerKind::Vector(vector) => {
            let screen = viewport.screen_bounds();
            let mut shapes = Vec::with_capacity(vector.features.len());
            for feature in &vector.features {
                let shape = project_geometry(&feature.geometry, viewport)?;
                if shape_bounds(&shape).is_some_and(|bounds| bounds.intersects(&screen)) {
                    shapes.push(shape);
                }
            }
            Ok(Some(Placement::Vector {
                key,
                shapes,
                style: vector.style.clone(),
            }))
        }
        LayerKind::Marker(marker) => {
            let mut icon = marker.effective_icon();
            if failed(&icon.url) {
                tracing::debug!("Marker {} falls back to the default pin", layer.key);
                icon = MarkerIcon::default_pin();
            }
            let anchor = project(marker.position, viewport)?;
            let popup = input.popup.is_open(&layer.key).then(|| PopupPlacement {
                origin: icon.popup_origin(anchor),
                content: marker.popup_content.clone(),
            });
            Ok(Some(Placement::Marker {
                key,
                icon_url: icon.url.clone(),
                bounds: icon.screen_bounds(anchor),
                popup,
            }))
        }
    }
}

pub const project_geometry: fn(&FeatureGeometry, &Viewport) -> MapResult<Shape> =
    |geometry, viewport| match geometry {
        FeatureGeometry::Point(point) => Ok(Shape::Point {
            at: project(*point, viewport)?,
        }),
        FeatureGeometry::LineString(points) => Ok(Shape::Path {
            points: project_path(points, viewport)?,
        }),
        FeatureGeometry::Polygon(rings) => Ok(Shape::Polygon {
            rings: rings
                .iter()
                .map(|ring| project_path(ring, viewport))
                .collect::<MapResult<Vec<_>>>()?,
        }),
    };

pub const shape_bounds: fn(&Shape) -> Option<PixelBounds> = |shape| match shape {
    Shape::Point { at } => calculate_bounds_from_coordinates(std::slice::from_ref(at)),
    Shape::Path { points } => calculate_bounds_from_coordinates(points),
    Shape::Polygon { rings } => rings
        .first()
        .and_then(|outer| calculate_bounds_from_coordinates(outer)),
};

// Canvas painting of a composed frame

pub type ImageLookup<'a> = &'a dyn Fn(&str) -> Option<HtmlImageElement>;

const PLACEHOLDER_FILL: &str = "#e5e3df";
const POINT_RADIUS: f64 = 4.0;
const POPUP_LINE_HEIGHT: f64 = 18.0;
const POPUP_PADDING: f64 = 8.0;

pub const paint_frame: fn(&Frame, &CanvasRenderingContext2d, ImageLookup<'_>) -> MapResult<()> =
    |frame, context, images| {
        let viewport = &frame.viewport;
        context.clear_rect(0.0, 0.0, viewport.width() as f64, viewport.height() as f64);

        for placement in &frame.placements {
            match placement {
                Placement::Tiles { tiles, .. } => {
                    for tile in tiles {
                        draw_image_or_placeholder(context, images(tile.url.as_str()), &tile.bounds)?;
                    }
                }
                Placement::ImageOverlay { url, bounds, opacity, .. } => {
                    if let Some(image) = images(url.as_str()) {
                        context.set_global_alpha(*opacity);
                        draw_image(context, &image, bounds)?;
                        context.set_global_alpha(1.0);
                    }
                }
                Placement::Vector { shapes, style, .. } => {
                    for shape in shapes {
                        render_shape(shape, style, context)?;
                    }
                }
                Placement::Marker { icon_url, bounds, .. } => {
                    draw_image_or_placeholder(context, images(icon_url.as_str()), bounds)?;
                }
            }
        }

        // popups sit above every marker
        if let Some(popup) = frame.open_popup() {
            render_popup(popup, context)?;
        }
        if let Some(attribution) = frame.placements.iter().find_map(|placement| match placement {
            Placement::Tiles { attribution, .. } if !attribution.is_empty() => Some(attribution),
            _ => None,
        }) {
            render_attribution(attribution, viewport, context)?;
        }
        if let Some(legend) = &frame.legend {
            render_legend(legend, context)?;
        }
        Ok(())
    };

const draw_image: fn(&CanvasRenderingContext2d, &HtmlImageElement, &PixelBounds) -> MapResult<()> =
    |context, image, bounds| {
        context
            .draw_image_with_html_image_element_and_dw_and_dh(
                image,
                bounds.min_x,
                bounds.min_y,
                bounds.width(),
                bounds.height(),
            )
            .map_err(|_| MapError::Wasm("Failed to draw image".to_string()))
    };

const draw_image_or_placeholder: fn(&CanvasRenderingContext2d, Option<HtmlImageElement>, &PixelBounds) -> MapResult<()> =
    |context, image, bounds| match image {
        Some(image) if image.complete() => draw_image(context, &image, bounds),
        _ => {
            context.set_fill_style_str(PLACEHOLDER_FILL);
            context.fill_rect(bounds.min_x, bounds.min_y, bounds.width(), bounds.height());
            Ok(())
        }
    };

pub const render_shape: fn(&Shape, &VectorStyle, &CanvasRenderingContext2d) -> MapResult<()> =
    |shape, style, context| {
        context.set_stroke_style_str(&style.stroke_color);
        context.set_fill_style_str(&style.stroke_color);
        context.set_line_width(style.weight);

        match shape {
            Shape::Point { at } => {
                context.begin_path();
                context
                    .arc(at.x, at.y, POINT_RADIUS, 0.0, 2.0 * std::f64::consts::PI)
                    .map_err(|_| MapError::Wasm("Failed to draw arc".to_string()))?;
                context.fill();
            }
            Shape::Path { points } => {
                if points.is_empty() {
                    return Ok(());
                }
                context.begin_path();
                draw_path(points, context);
                context.stroke();
            }
            Shape::Polygon { rings } => {
                context.begin_path();
                for ring in rings {
                    draw_path(ring, context);
                    context.close_path();
                }
                context.set_global_alpha(style.fill_opacity);
                context.fill_with_canvas_winding_rule(web_sys::CanvasWindingRule::Evenodd);
                context.set_global_alpha(1.0);
                context.stroke();
            }
        }
        Ok(())
    };

pub const draw_path: fn(&[PixelPoint], &CanvasRenderingContext2d) = |points, context| {
    if let Some((first, rest)) = points.split_first() {
        context.move_to(first.x, first.y);
        for point in rest {
            context.line_to(point.x, point.y);
        }
    }
};

const render_popup: fn(&PopupPlacement, &CanvasRenderingContext2d) -> MapResult<()> =
    |popup, context| {
        let lines: Vec<&str> = popup.content.lines().collect();
        let longest = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
        let width = longest as f64 * 7.5 + 2.0 * POPUP_PADDING;
        let height = lines.len() as f64 * POPUP_LINE_HEIGHT + 2.0 * POPUP_PADDING;
        let left = popup.origin.x - width / 2.0;
        let top = popup.origin.y - height;

        context.set_fill_style_str("white");
        context.fill_rect(left, top, width, height);
        context.set_stroke_style_str("#ccc");
        context.set_line_width(1.0);
        context.stroke_rect(left, top, width, height);

        context.set_fill_style_str("#333");
        context.set_font("13px sans-serif");
        context.set_text_baseline("top");
        for (row, line) in lines.iter().enumerate() {
            context
                .fill_text(line, left + POPUP_PADDING, top + POPUP_PADDING + row as f64 * POPUP_LINE_HEIGHT)
                .map_err(|_| MapError::Wasm("Failed to draw popup text".to_string()))?;
        }
        Ok(())
    };

const render_attribution: fn(&str, &Viewport, &CanvasRenderingContext2d) -> MapResult<()> =
    |attribution, viewport, context| {
        context.set_fill_style_str("rgba(255, 255, 255, 0.8)");
        context.set_font("11px sans-serif");
        context.set_text_baseline("bottom");
        context.set_text_align("right");
        let x = viewport.width() as f64 - 4.0;
        let y = viewport.height() as f64 - 2.0;
        context.fill_rect(x - attribution.chars().count() as f64 * 5.5 - 4.0, y - 14.0, viewport.width() as f64, 16.0);
        context.set_fill_style_str("#333");
        let result = context
            .fill_text(attribution, x, y)
            .map_err(|_| MapError::Wasm("Failed to draw attribution".to_string()));
        context.set_text_align("left");
        result
    };

pub const render_legend: fn(&LegendPanel, &CanvasRenderingContext2d) -> MapResult<()> =
    |legend, context| {
        let bounds = &legend.bounds;
        context.set_fill_style_str(&legend.background);
        context.fill_rect(bounds.min_x, bounds.min_y, bounds.width(), bounds.height());
        context.set_stroke_style_str(&legend.frame);
        context.set_line_width(1.0);
        context.stroke_rect(bounds.min_x, bounds.min_y, bounds.width(), bounds.height());

        let text_error = |_: web_sys::wasm_bindgen::JsValue| MapError::Wasm("Failed to draw legend text".to_string());
        context.set_text_baseline("middle");
        context.set_fill_style_str("black");
        context.set_font(&format!("bold {}px sans-serif", legend.font_size));
        context
            .fill_text(&legend.title, legend.title_origin.x, legend.title_origin.y)
            .map_err(text_error)?;

        context.set_font(&format!("{}px sans-serif", legend.font_size));
        for row in &legend.rows {
            let swatch = &row.swatch;
            context.set_fill_style_str(&row.color);
            context.fill_rect(swatch.min_x, swatch.min_y, swatch.width(), swatch.height());
            if let Some(border) = &row.border {
                context.set_stroke_style_str(border);
                context.stroke_rect(swatch.min_x, swatch.min_y, swatch.width(), swatch.height());
            }
            context.set_fill_style_str("black");
            context
                .fill_text(&row.label, row.text_origin.x, row.text_origin.y)
                .map_err(text_error)?;
        }
        Ok(())
    };
