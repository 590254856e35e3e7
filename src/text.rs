use std::sync::Arc;

use crate::{
    error::{HeroshotError, HeroshotResult},
    model::TextAlign,
};

/// RGBA8 brush color carried through Parley glyph runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// A shaped, line-broken text layout plus the font bytes that back it.
///
/// The same bytes are handed to the raster backend for glyph outlines, so
/// layout and drawing can never disagree about the face.
#[derive(Clone)]
pub struct ShapedText {
    pub layout: Arc<parley::Layout<TextBrushRgba8>>,
    pub font_bytes: Arc<Vec<u8>>,
}

impl std::fmt::Debug for ShapedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapedText")
            .field("lines", &self.layout.lines().count())
            .field("font_bytes", &self.font_bytes.len())
            .finish()
    }
}

/// Stateful helper for resolving fonts and building Parley text layouts.
///
/// Font bytes are looked up in the system font database by family + weight
/// with a fallback to any available face; a machine with no fonts at all
/// surfaces a resource error and the compositor skips the layer.
pub struct TextLayoutEngine {
    fontdb: usvg::fontdb::Database,
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        Self {
            fontdb,
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Resolve font bytes for a family/weight pair from the system database.
    pub fn resolve_font(&self, family: &str, weight: u16) -> HeroshotResult<Vec<u8>> {
        let families = [
            usvg::fontdb::Family::Name(family),
            usvg::fontdb::Family::SansSerif,
        ];
        let query = usvg::fontdb::Query {
            families: &families,
            weight: usvg::fontdb::Weight(weight),
            stretch: usvg::fontdb::Stretch::Normal,
            style: usvg::fontdb::Style::Normal,
        };

        let id = self
            .fontdb
            .query(&query)
            .or_else(|| self.fontdb.faces().next().map(|f| f.id))
            .ok_or_else(|| {
                HeroshotError::render(format!("no font face available for family \"{family}\""))
            })?;

        self.fontdb
            .with_face_data(id, |data, _index| data.to_vec())
            .ok_or_else(|| HeroshotError::render("font face data unavailable"))
    }

    /// Shape and line-break text to fit `max_width_px`, honoring alignment.
    pub fn layout(
        &mut self,
        text: &str,
        font_bytes: Vec<u8>,
        size_px: f32,
        brush: TextBrushRgba8,
        max_width_px: f32,
        align: TextAlign,
    ) -> HeroshotResult<ShapedText> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(HeroshotError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        if !max_width_px.is_finite() || max_width_px <= 0.0 {
            return Err(HeroshotError::validation(
                "text max_width_px must be finite and > 0",
            ));
        }

        let font_bytes = Arc::new(font_bytes);
        let families = self.font_ctx.collection.register_fonts(
            parley::fontique::Blob::from(font_bytes.as_ref().clone()),
            None,
        );
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            HeroshotError::render("no font families registered from font bytes")
        })?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| HeroshotError::render("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(Some(max_width_px));
        layout.align(
            Some(max_width_px),
            match align {
                TextAlign::Left => parley::Alignment::Left,
                TextAlign::Center => parley::Alignment::Center,
                TextAlign::Right => parley::Alignment::Right,
            },
            parley::AlignmentOptions::default(),
        );

        Ok(ShapedText {
            layout: Arc::new(layout),
            font_bytes,
        })
    }
}
