use crate::engine::geometry::VectorData;
use crate::error::{MapViewError, MapViewResult};
use geo::{Coord, Rect};
use std::fmt;
use std::sync::Arc;

// Attribute mapping carried by every feature
pub type FeatureProperties = geojson::JsonObject;

// Geographic point (longitude, latitude), degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        GeoPoint { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lon >= -180.0 && self.lon <= 180.0
    }
}

// Point in the render projection, meters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPoint {
    pub x: f64,
    pub y: f64,
}

impl RenderPoint {
    pub fn new(x: f64, y: f64) -> Self {
        RenderPoint { x, y }
    }
}

impl From<Coord<f64>> for RenderPoint {
    fn from(coord: Coord<f64>) -> Self {
        RenderPoint::new(coord.x, coord.y)
    }
}

impl From<RenderPoint> for Coord<f64> {
    fn from(point: RenderPoint) -> Self {
        Coord {
            x: point.x,
            y: point.y,
        }
    }
}

// Pixel position relative to the top-left corner of the container
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        PixelPoint { x, y }
    }
}

// Pixel size
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        PixelSize { width, height }
    }

    /// A container only becomes usable once both dimensions are non-zero.
    pub fn is_measurable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Axis-aligned extent in the render projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Extent {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The identity for [`Extent::merge`]: contains nothing.
    pub fn empty() -> Self {
        Extent::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    pub fn from_corners(a: RenderPoint, b: RenderPoint) -> Self {
        Extent::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    pub fn merge(&self, other: &Extent) -> Extent {
        Extent::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    // A single point is a finite, zero-area extent and is not empty.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> RenderPoint {
        RenderPoint::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn lower_left(&self) -> RenderPoint {
        RenderPoint::new(self.min_x, self.min_y)
    }

    pub fn upper_right(&self) -> RenderPoint {
        RenderPoint::new(self.max_x, self.max_y)
    }

    pub fn contains(&self, point: RenderPoint) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }
}

impl From<Rect<f64>> for Extent {
    fn from(rect: Rect<f64>) -> Self {
        Extent::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Geographic `[minLon, minLat, maxLon, maxLat]` emitted by a completed draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn from_corners(a: GeoPoint, b: GeoPoint) -> Self {
        BoundingBox {
            min_lon: a.lon.min(b.lon),
            min_lat: a.lat.min(b.lat),
            max_lon: a.lon.max(b.lon),
            max_lat: a.lat.max(b.lat),
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

// Query-string form used by the backend `bbox` parameter
impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// Named position in the layer registry. Holds at most one live layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerSlot {
    Base,
    DataOverlay,
    TiledOverlay,
    DrawScratch,
}

impl LayerSlot {
    pub const ALL: [LayerSlot; 4] = [
        LayerSlot::Base,
        LayerSlot::DataOverlay,
        LayerSlot::TiledOverlay,
        LayerSlot::DrawScratch,
    ];

    // Render order, bottom to top
    pub fn z_index(&self) -> i32 {
        match self {
            LayerSlot::Base => 0,
            LayerSlot::DataOverlay => 10,
            LayerSlot::TiledOverlay => 20,
            LayerSlot::DrawScratch => 30,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LayerSlot::Base => "base",
            LayerSlot::DataOverlay => "data-overlay",
            LayerSlot::TiledOverlay => "tiled-overlay",
            LayerSlot::DrawScratch => "draw-scratch",
        }
    }
}

impl fmt::Display for LayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TileFormat {
    #[default]
    Mvt,
}

/// Tiled vector dataset location. Opaque beyond its URL and encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileSource {
    pub url: String,
    pub format: TileFormat,
}

impl TileSource {
    pub fn new(url: impl Into<String>) -> Self {
        TileSource {
            url: url.into(),
            format: TileFormat::Mvt,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.url.trim().is_empty()
    }
}

// Data source enumeration
#[derive(Clone, Debug, PartialEq)]
pub enum LayerSource {
    Raster { url_template: String },
    Scratch,
    Vector(Arc<VectorData>),
    Tiles(TileSource),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    pub fill: Option<String>,
    pub stroke: String,
    pub stroke_width: f64,
}

// Layer styling configuration
#[derive(Clone, Debug, PartialEq)]
pub enum LayerStyle {
    /// Raster layers carry no vector style.
    Unstyled,
    Fixed(Style),
    /// Fill keyed on the `landuse_type` property.
    ByLanduse,
}

/// Everything needed to mount a layer; the registry assigns its id.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerSpec {
    pub slot: LayerSlot,
    pub source: LayerSource,
    pub style: LayerStyle,
}

impl LayerSpec {
    pub fn new(slot: LayerSlot, source: LayerSource, style: LayerStyle) -> Self {
        LayerSpec {
            slot,
            source,
            style,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub slot: LayerSlot,
    pub source: LayerSource,
    pub style: LayerStyle,
}

impl Layer {
    pub fn style_for(&self, properties: &FeatureProperties) -> Option<Style> {
        match &self.style {
            LayerStyle::Unstyled => None,
            LayerStyle::Fixed(style) => Some(style.clone()),
            LayerStyle::ByLanduse => Some(crate::engine::style::landuse_style(properties)),
        }
    }

    pub fn tile_source(&self) -> Option<&TileSource> {
        match &self.source {
            LayerSource::Tiles(source) => Some(source),
            _ => None,
        }
    }

    pub fn vector_data(&self) -> Option<&Arc<VectorData>> {
        match &self.source {
            LayerSource::Vector(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Crosshair,
    Grabbing,
}

impl Cursor {
    pub fn css(&self) -> &'static str {
        match self {
            Cursor::Default => "",
            Cursor::Crosshair => "crosshair",
            Cursor::Grabbing => "grabbing",
        }
    }
}

/// Opaque token whose change (not its content) asks for drawing to be armed.
/// Zero means drawing was never requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DrawTrigger(pub u64);

impl DrawTrigger {
    pub fn is_requested(&self) -> bool {
        self.0 != 0
    }

    pub fn next(&self) -> DrawTrigger {
        DrawTrigger(self.0.wrapping_add(1).max(1))
    }

    /// Token from a JS number such as `Date.now()`. Only non-negative
    /// integers up to 2^53 are exact in a JS number; anything else would be
    /// truncated into a token that can collide with another one.
    pub fn from_js_number(value: f64) -> MapViewResult<DrawTrigger> {
        const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
        if !(0.0..=MAX_SAFE_INTEGER).contains(&value) || value.fract() != 0.0 {
            return Err(MapViewError::Config(format!("invalid draw trigger: {}", value)));
        }
        Ok(DrawTrigger(value as u64))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PopupField {
    pub label: &'static str,
    pub value: String,
}

/// Open popup: anchor in render projection plus formatted attribute rows.
#[derive(Clone, Debug, PartialEq)]
pub struct PopupState {
    pub anchor: RenderPoint,
    pub fields: Vec<PopupField>,
}

impl PopupState {
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.label == label)
            .map(|field| field.value.as_str())
    }

    /// First row is the title, the rest are `label: value` lines.
    pub fn to_html(&self) -> String {
        let mut html = String::from("<div style=\"font-size:12px\">");
        for (index, field) in self.fields.iter().enumerate() {
            if index == 0 {
                html.push_str(&format!("<b>{}</b>", escape_html(&field.value)));
            } else {
                html.push_str(&format!(
                    "<br/>{}: {}",
                    escape_html(field.label),
                    escape_html(&field.value)
                ));
            }
        }
        html.push_str("</div>");
        html
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
