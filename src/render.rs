use std::collections::HashMap;

use vello_cpu::kurbo::{Affine, Rect};

use crate::{
    assets::{AssetCache, PreparedImage, PreparedSource},
    color::Color,
    error::{HeroshotError, HeroshotResult},
    model::{
        BackgroundSource, Canvas, Composition, CornerPosition, Layer, LayerKind, LogoLayer,
        TextOverlayLayer, TextPlacement,
    },
    svg_raster::rasterize_svg_to_premul_rgba8,
    text::{TextBrushRgba8, TextLayoutEngine},
};

/// One rendered composite: **premultiplied** RGBA8 at canvas size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl Frame {
    /// The RGBA8 value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics when `x >= width` or `y >= height`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) out of bounds for {}x{} frame",
            self.width,
            self.height
        );
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}

/// Turns a [`Composition`] into pixels.
///
/// Layers composite bottom-to-top in array order. A layer whose source cannot
/// be resolved is skipped with a warning so the caller always gets a partial
/// preview instead of no preview.
pub struct Compositor {
    text: TextLayoutEngine,
    paint_cache: HashMap<String, vello_cpu::Image>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            text: TextLayoutEngine::new(),
            paint_cache: HashMap::new(),
        }
    }

    pub fn render(&mut self, comp: &Composition, assets: &mut AssetCache) -> HeroshotResult<Frame> {
        comp.validate()?;

        let width_u16: u16 = comp
            .canvas
            .width
            .try_into()
            .map_err(|_| HeroshotError::render("canvas width exceeds u16"))?;
        let height_u16: u16 = comp
            .canvas
            .height
            .try_into()
            .map_err(|_| HeroshotError::render("canvas height exceeds u16"))?;

        let mut ctx = vello_cpu::RenderContext::new(width_u16, height_u16);

        for layer in &comp.layers {
            if !layer.visible || layer.opacity == 0 {
                continue;
            }
            if let Err(e) = self.draw_layer(&mut ctx, comp.canvas, layer, assets) {
                tracing::warn!(layer = %layer.id, error = %e, "skipping unrenderable layer");
            }
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(width_u16, height_u16);
        ctx.render_to_pixmap(&mut pixmap);

        Ok(Frame {
            width: comp.canvas.width,
            height: comp.canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn draw_layer(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        canvas: Canvas,
        layer: &Layer,
        assets: &mut AssetCache,
    ) -> HeroshotResult<()> {
        ctx.set_paint_transform(Affine::IDENTITY);
        let alpha = f32::from(layer.opacity) / 100.0;
        if alpha < 1.0 {
            ctx.push_opacity_layer(alpha);
        }

        let result = match &layer.kind {
            LayerKind::Background(bg) => self.draw_background(ctx, canvas, &bg.source, assets),
            LayerKind::CentralObject(obj) => {
                let (dx, dy, dw, dh) = layer.rect.to_pixels(canvas);
                self.draw_image_fit(ctx, &obj.image_url, (dx, dy, dw, dh), assets)
            }
            LayerKind::TextOverlay(text) => self.draw_text_band(ctx, canvas, layer, text),
            LayerKind::Logo(logo) => self.draw_logo(ctx, canvas, layer, logo, assets),
        };

        if alpha < 1.0 {
            ctx.pop_layer();
        }
        result
    }

    /// Backgrounds span the whole canvas: color fills it, images cover it
    /// (crop-to-fill), both ignoring the layer rect.
    fn draw_background(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        canvas: Canvas,
        source: &BackgroundSource,
        assets: &mut AssetCache,
    ) -> HeroshotResult<()> {
        let (cw, ch) = (f64::from(canvas.width), f64::from(canvas.height));
        match source {
            BackgroundSource::Color { color } => {
                fill_rect(ctx, *color, Rect::new(0.0, 0.0, cw, ch));
                Ok(())
            }
            BackgroundSource::AiGenerated { image_url, .. }
            | BackgroundSource::UserUpload { image_url } => {
                self.draw_image_scaled(ctx, image_url, (0.0, 0.0, cw, ch), FitMode::Cover, assets)
            }
        }
    }

    /// Fit-within the dest rect, preserving aspect ratio, centered.
    fn draw_image_fit(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        url: &str,
        dest: (f64, f64, f64, f64),
        assets: &mut AssetCache,
    ) -> HeroshotResult<()> {
        self.draw_image_scaled(ctx, url, dest, FitMode::Contain, assets)
    }

    fn draw_image_scaled(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        url: &str,
        (dx, dy, dw, dh): (f64, f64, f64, f64),
        fit: FitMode,
        assets: &mut AssetCache,
    ) -> HeroshotResult<()> {
        if dw <= 0.0 || dh <= 0.0 {
            return Err(HeroshotError::render("image dest rect is degenerate"));
        }

        match assets.get_or_load(url)? {
            PreparedSource::Raster(img) => {
                let (iw, ih) = (f64::from(img.width), f64::from(img.height));
                if iw <= 0.0 || ih <= 0.0 {
                    return Err(HeroshotError::render("image has zero dimensions"));
                }
                let scale = match fit {
                    FitMode::Cover => (dw / iw).max(dh / ih),
                    FitMode::Contain => (dw / iw).min(dh / ih),
                };
                let (sw, sh) = (iw * scale, ih * scale);
                let (ox, oy) = (dx + (dw - sw) / 2.0, dy + (dh - sh) / 2.0);

                let paint = self.raster_paint_for(url, &img)?;
                ctx.set_transform(Affine::translate((ox, oy)) * Affine::scale(scale));
                ctx.set_paint(paint);
                ctx.fill_rect(&Rect::new(0.0, 0.0, iw, ih));
                Ok(())
            }
            PreparedSource::Svg(tree) => {
                let size = tree.size();
                let (iw, ih) = (f64::from(size.width()), f64::from(size.height()));
                if iw <= 0.0 || ih <= 0.0 {
                    return Err(HeroshotError::render("svg has zero dimensions"));
                }
                let scale = match fit {
                    FitMode::Cover => (dw / iw).max(dh / ih),
                    FitMode::Contain => (dw / iw).min(dh / ih),
                };
                let (sw, sh) = ((iw * scale).ceil().max(1.0), (ih * scale).ceil().max(1.0));
                let (ox, oy) = (dx + (dw - sw) / 2.0, dy + (dh - sh) / 2.0);

                // Rasterized at the drawn size; cached per url+size.
                let key = format!("{url}@{}x{}", sw as u32, sh as u32);
                let paint = match self.paint_cache.get(&key) {
                    Some(paint) => paint.clone(),
                    None => {
                        let rgba = rasterize_svg_to_premul_rgba8(&tree, sw as u32, sh as u32)?;
                        let paint = premul_bytes_to_paint(&rgba, sw as u32, sh as u32)?;
                        self.paint_cache.insert(key, paint.clone());
                        paint
                    }
                };
                ctx.set_transform(Affine::translate((ox, oy)));
                ctx.set_paint(paint);
                ctx.fill_rect(&Rect::new(0.0, 0.0, sw, sh));
                Ok(())
            }
        }
    }

    /// Text lays out in a horizontal band anchored to its placement; the
    /// layer rect supplies the band's height and horizontal inset. Long text
    /// wraps inside the band instead of overflowing the canvas.
    fn draw_text_band(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        canvas: Canvas,
        layer: &Layer,
        text: &TextOverlayLayer,
    ) -> HeroshotResult<()> {
        if text.text.trim().is_empty() {
            return Ok(());
        }

        let (bx, _, bw, bh) = layer.rect.to_pixels(canvas);
        let margin = f64::from(canvas.height) * 0.04;
        let by = match text.placement {
            TextPlacement::Top => margin,
            TextPlacement::Bottom => f64::from(canvas.height) - bh - margin,
        };

        let pad_x = bw * 0.05;
        let max_width = (bw - 2.0 * pad_x) as f32;
        let font_bytes = self
            .text
            .resolve_font(&text.font_family, text.font_weight)?;
        let brush = TextBrushRgba8 {
            r: text.text_color.r,
            g: text.text_color.g,
            b: text.text_color.b,
            a: text.text_color.a,
        };
        let shaped = self.text.layout(
            &text.text,
            font_bytes,
            text.font_size,
            brush,
            max_width,
            text.text_align,
        )?;

        if let Some(bg) = text.background_color {
            fill_rect(ctx, bg, Rect::new(bx, by, bx + bw, by + bh));
        }

        let text_height = f64::from(shaped.layout.height());
        let ty = by + (bh - text_height).max(0.0) / 2.0;
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(shaped.font_bytes.as_ref().clone()),
            0,
        );

        ctx.set_transform(Affine::translate((bx + pad_x, ty)));
        for line in shaped.layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));

                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        Ok(())
    }

    /// The corner overrides the rect's x/y; the rect still bounds the size.
    fn draw_logo(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        canvas: Canvas,
        layer: &Layer,
        logo: &LogoLayer,
        assets: &mut AssetCache,
    ) -> HeroshotResult<()> {
        let (_, _, dw, dh) = layer.rect.to_pixels(canvas);
        let (cw, ch) = (f64::from(canvas.width), f64::from(canvas.height));
        let margin = cw.min(ch) * 0.03;

        let (dx, dy) = match logo.corner {
            CornerPosition::TopLeft => (margin, margin),
            CornerPosition::TopRight => (cw - dw - margin, margin),
            CornerPosition::BottomLeft => (margin, ch - dh - margin),
            CornerPosition::BottomRight => (cw - dw - margin, ch - dh - margin),
        };

        self.draw_image_fit(ctx, &logo.image_url, (dx, dy, dw, dh), assets)
    }

    fn raster_paint_for(
        &mut self,
        url: &str,
        img: &PreparedImage,
    ) -> HeroshotResult<vello_cpu::Image> {
        if let Some(paint) = self.paint_cache.get(url) {
            return Ok(paint.clone());
        }
        let paint = premul_bytes_to_paint(img.rgba8_premul.as_slice(), img.width, img.height)?;
        self.paint_cache.insert(url.to_string(), paint.clone());
        Ok(paint)
    }
}

#[derive(Clone, Copy, Debug)]
enum FitMode {
    /// Scale to fully cover the dest rect, cropping overflow.
    Cover,
    /// Scale to fit entirely inside the dest rect.
    Contain,
}

fn fill_rect(ctx: &mut vello_cpu::RenderContext, color: Color, rect: Rect) {
    ctx.set_transform(Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        color.r, color.g, color.b, color.a,
    ));
    ctx.fill_rect(&rect);
}

fn premul_bytes_to_paint(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> HeroshotResult<vello_cpu::Image> {
    let w: u16 = width
        .try_into()
        .map_err(|_| HeroshotError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| HeroshotError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(HeroshotError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryFetcher;
    use crate::model::{BackgroundLayer, LayerRect};

    fn cache() -> AssetCache {
        AssetCache::new(Box::new(MemoryFetcher::new()))
    }

    fn color_background(color: Color) -> Layer {
        Layer {
            id: "bg".to_string(),
            name: "Background".to_string(),
            visible: true,
            locked: false,
            opacity: 100,
            rect: LayerRect::new(0.0, 0.0, 100.0, 100.0),
            kind: LayerKind::Background(BackgroundLayer {
                source: BackgroundSource::Color { color },
            }),
        }
    }

    #[test]
    fn zero_layers_render_transparent_canvas() {
        let comp = Composition::blank(32, 16);
        let frame = Compositor::new().render(&comp, &mut cache()).unwrap();
        assert_eq!((frame.width, frame.height), (32, 16));
        assert!(frame.premultiplied);
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn color_background_fills_entire_canvas() {
        let mut comp = Composition::blank(16, 16);
        comp.add_layer(color_background(Color::rgb(0x1f, 0x29, 0x37)))
            .unwrap();
        let frame = Compositor::new().render(&comp, &mut cache()).unwrap();
        for (x, y) in [(0, 0), (15, 0), (8, 8), (15, 15)] {
            let px = frame.pixel(x, y);
            assert_eq!(px, [0x1f, 0x29, 0x37, 0xff], "pixel at ({x},{y})");
        }
    }

    #[test]
    fn invisible_layers_are_skipped() {
        let mut comp = Composition::blank(8, 8);
        let mut bg = color_background(Color::rgb(255, 0, 0));
        bg.visible = false;
        comp.add_layer(bg).unwrap();
        let frame = Compositor::new().render(&comp, &mut cache()).unwrap();
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn missing_image_source_does_not_abort_render() {
        let mut comp = Composition::blank(8, 8);
        comp.add_layer(color_background(Color::rgb(0, 0, 255)))
            .unwrap();
        comp.add_layer(Layer {
            id: "obj".to_string(),
            name: "Object".to_string(),
            visible: true,
            locked: false,
            opacity: 100,
            rect: LayerRect::centered(50.0, 50.0),
            kind: LayerKind::CentralObject(crate::model::CentralObjectLayer {
                entity_name: "Widget".to_string(),
                image_url: "not-registered.png".to_string(),
            }),
        })
        .unwrap();

        let frame = Compositor::new().render(&comp, &mut cache()).unwrap();
        // The background still composites.
        assert_eq!(frame.pixel(4, 4), [0, 0, 255, 255]);
    }

    #[test]
    fn layer_opacity_blends_toward_backdrop() {
        let mut comp = Composition::blank(8, 8);
        comp.add_layer(color_background(Color::BLACK)).unwrap();
        let mut overlay = color_background(Color::WHITE);
        overlay.id = "overlay".to_string();
        overlay.opacity = 50;
        comp.add_layer(overlay).unwrap();

        let frame = Compositor::new().render(&comp, &mut cache()).unwrap();
        let px = frame.pixel(4, 4);
        assert!(px[0] > 100 && px[0] < 155, "expected ~50% gray, got {px:?}");
        assert_eq!(px[3], 255);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn pixel_rejects_out_of_bounds_coordinates() {
        let comp = Composition::blank(4, 4);
        let frame = Compositor::new().render(&comp, &mut cache()).unwrap();
        // x within the buffer but past the row width must not wrap.
        frame.pixel(4, 0);
    }

    #[test]
    fn oversized_canvas_is_a_render_error() {
        let comp = Composition::blank(70_000, 10);
        let err = Compositor::new().render(&comp, &mut cache()).unwrap_err();
        assert!(err.to_string().contains("render error"));
    }
}
