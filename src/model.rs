use serde::{Deserialize, Serialize};

use crate::{
    color::Color,
    error::{HeroshotError, HeroshotResult},
    metadata::{BusinessProfile, Metadata},
};

/// Output raster size in pixels; also the coordinate space layers are
/// resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// Layer placement as percentages (0–100) of the canvas, so layouts survive
/// canvas resizes without touching the model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LayerRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Axis-centered rect of the given size.
    pub fn centered(width: f64, height: f64) -> Self {
        let width = width.clamp(1.0, 100.0);
        let height = height.clamp(1.0, 100.0);
        Self {
            x: (100.0 - width) / 2.0,
            y: (100.0 - height) / 2.0,
            width,
            height,
        }
    }

    /// Pixel-space rectangle `(x, y, w, h)` for a canvas.
    pub fn to_pixels(&self, canvas: Canvas) -> (f64, f64, f64, f64) {
        (
            self.x / 100.0 * f64::from(canvas.width),
            self.y / 100.0 * f64::from(canvas.height),
            self.width / 100.0 * f64::from(canvas.width),
            self.height / 100.0 * f64::from(canvas.height),
        )
    }

    pub fn is_within_canvas(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 100.0 + 1e-9
            && self.y + self.height <= 100.0 + 1e-9
    }

    pub fn is_axis_centered(&self) -> bool {
        (self.x - (100.0 - self.width) / 2.0).abs() < 1e-6
            && (self.y - (100.0 - self.height) / 2.0).abs() < 1e-6
    }

    fn validate(&self, layer_id: &str) -> HeroshotResult<()> {
        for (field, v) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ] {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(HeroshotError::validation(format!(
                    "layer '{layer_id}' rect {field} must be a percentage in 0..=100, got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    /// 0–100; mapped to 0.0–1.0 alpha at render time.
    pub opacity: u8,
    pub rect: LayerRect,
    #[serde(flatten)]
    pub kind: LayerKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    Background(BackgroundLayer),
    CentralObject(CentralObjectLayer),
    TextOverlay(TextOverlayLayer),
    Logo(LogoLayer),
}

impl LayerKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            LayerKind::Background(_) => "background",
            LayerKind::CentralObject(_) => "central_object",
            LayerKind::TextOverlay(_) => "text_overlay",
            LayerKind::Logo(_) => "logo",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackgroundLayer {
    pub source: BackgroundSource,
}

/// A background always spans the full canvas regardless of its layer rect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum BackgroundSource {
    AiGenerated {
        image_url: String,
        prompt: String,
        provider: String,
    },
    UserUpload {
        image_url: String,
    },
    Color {
        color: Color,
    },
}

impl BackgroundSource {
    pub fn image_url(&self) -> Option<&str> {
        match self {
            BackgroundSource::AiGenerated { image_url, .. }
            | BackgroundSource::UserUpload { image_url } => Some(image_url),
            BackgroundSource::Color { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CentralObjectLayer {
    /// Feeds layout labeling and alt-text generation.
    pub entity_name: String,
    pub image_url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextOverlayLayer {
    pub text: String,
    pub placement: TextPlacement,
    pub font_family: String,
    /// Pixel size at the canvas's native resolution.
    pub font_size: f32,
    pub font_weight: u16,
    pub text_color: Color,
    /// Optional pill/band fill painted behind the text.
    pub background_color: Option<Color>,
    pub text_align: TextAlign,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPlacement {
    Top,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogoLayer {
    pub image_url: String,
    /// Snapping target; overrides the rect's x/y at render time while the
    /// rect still bounds the logo's size.
    pub corner: CornerPosition,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CornerPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// The full editable document: canvas size, z-ordered layers, metadata.
///
/// Layer array order is z-order, ascending (index 0 draws first).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub canvas: Canvas,
    pub layers: Vec<Layer>,
    pub metadata: Metadata,
}

/// Upstream context for synthesizing an initial composition.
#[derive(Clone, Debug, Default)]
pub struct HeroContext {
    pub headline: String,
    pub entity_name: String,
    pub business: BusinessProfile,
    pub background_image_url: Option<String>,
    pub central_object_image_url: Option<String>,
    pub year: i32,
}

impl Composition {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            canvas: Canvas { width, height },
            layers: Vec::new(),
            metadata: Metadata::default(),
        }
    }

    /// Synthesize a starter composition from upstream context: background,
    /// optional central subject, bottom headline band, corner logo.
    pub fn from_context(width: u32, height: u32, ctx: &HeroContext) -> Self {
        let mut comp = Self::blank(width, height);

        let background_source = match &ctx.background_image_url {
            Some(url) => BackgroundSource::UserUpload {
                image_url: url.clone(),
            },
            None => BackgroundSource::Color {
                color: ctx
                    .business
                    .brand_colors
                    .first()
                    .copied()
                    .unwrap_or(Color::rgb(0x1f, 0x29, 0x37)),
            },
        };
        comp.layers.push(Layer {
            id: "background".to_string(),
            name: "Background".to_string(),
            visible: true,
            locked: false,
            opacity: 100,
            rect: LayerRect::new(0.0, 0.0, 100.0, 100.0),
            kind: LayerKind::Background(BackgroundLayer {
                source: background_source,
            }),
        });

        if let Some(url) = &ctx.central_object_image_url {
            comp.layers.push(Layer {
                id: "central-object".to_string(),
                name: if ctx.entity_name.is_empty() {
                    "Subject".to_string()
                } else {
                    ctx.entity_name.clone()
                },
                visible: true,
                locked: false,
                opacity: 100,
                rect: LayerRect::centered(50.0, 60.0),
                kind: LayerKind::CentralObject(CentralObjectLayer {
                    entity_name: ctx.entity_name.clone(),
                    image_url: url.clone(),
                }),
            });
        }

        if !ctx.headline.trim().is_empty() {
            comp.layers.push(Layer {
                id: "headline".to_string(),
                name: "Headline".to_string(),
                visible: true,
                locked: false,
                opacity: 100,
                rect: LayerRect::new(5.0, 78.0, 90.0, 18.0),
                kind: LayerKind::TextOverlay(TextOverlayLayer {
                    text: ctx.headline.clone(),
                    placement: TextPlacement::Bottom,
                    font_family: "Inter".to_string(),
                    font_size: 48.0,
                    font_weight: 700,
                    text_color: Color::WHITE,
                    background_color: Some(Color {
                        r: 0,
                        g: 0,
                        b: 0,
                        a: 153,
                    }),
                    text_align: TextAlign::Center,
                }),
            });
        }

        if !ctx.business.logo_url.is_empty() {
            comp.layers.push(Layer {
                id: "logo".to_string(),
                name: "Logo".to_string(),
                visible: true,
                locked: false,
                opacity: 100,
                rect: LayerRect::new(0.0, 0.0, 12.0, 12.0),
                kind: LayerKind::Logo(LogoLayer {
                    image_url: ctx.business.logo_url.clone(),
                    corner: CornerPosition::TopRight,
                }),
            });
        }

        comp.metadata
            .autofill(&ctx.headline, &ctx.entity_name, &ctx.business, ctx.year);
        comp
    }

    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn background(&self) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|l| matches!(l.kind, LayerKind::Background(_)))
    }

    pub fn central_object(&self) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|l| matches!(l.kind, LayerKind::CentralObject(_)))
    }

    /// Structural checks, distinct from the rule engine: positive canvas,
    /// unique ids, opacity and rect ranges.
    pub fn validate(&self) -> HeroshotResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(HeroshotError::validation("canvas width/height must be > 0"));
        }

        for (i, layer) in self.layers.iter().enumerate() {
            if layer.id.trim().is_empty() {
                return Err(HeroshotError::validation(format!(
                    "layer at index {i} has an empty id"
                )));
            }
            if self.layers.iter().filter(|l| l.id == layer.id).count() > 1 {
                return Err(HeroshotError::validation(format!(
                    "duplicate layer id '{}'",
                    layer.id
                )));
            }
            if layer.opacity > 100 {
                return Err(HeroshotError::validation(format!(
                    "layer '{}' opacity must be 0..=100, got {}",
                    layer.id, layer.opacity
                )));
            }
            layer.rect.validate(&layer.id)?;
        }

        Ok(())
    }
}
