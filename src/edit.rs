//! Named mutation operations over a [`Composition`].
//!
//! Every operation checks its preconditions before touching the composition,
//! so a returned error means nothing changed. The central-object invariant
//! (axis-centered, fully inside the canvas) is enforced here at the mutation
//! boundary by clamping, not left to the UI.

use crate::{
    error::{HeroshotError, HeroshotResult},
    metadata::Metadata,
    model::{Composition, CornerPosition, Layer, LayerKind, LayerRect},
};

impl Composition {
    pub fn add_layer(&mut self, mut layer: Layer) -> HeroshotResult<()> {
        if self.layer(&layer.id).is_some() {
            return Err(HeroshotError::constraint(format!(
                "layer id '{}' already exists",
                layer.id
            )));
        }
        if layer.opacity > 100 {
            return Err(HeroshotError::constraint(format!(
                "layer '{}' opacity must be 0..=100",
                layer.id
            )));
        }
        layer.rect = constrain_rect(&layer.kind, layer.rect);
        self.layers.push(layer);
        Ok(())
    }

    pub fn remove_layer(&mut self, id: &str) -> HeroshotResult<Layer> {
        let idx = self
            .layer_index(id)
            .ok_or_else(|| missing_layer(id))?;
        Ok(self.layers.remove(idx))
    }

    /// Clone a layer directly above the original, with a derived unique id.
    ///
    /// Background and central-object layers are singletons by convention and
    /// cannot be duplicated.
    pub fn duplicate_layer(&mut self, id: &str) -> HeroshotResult<String> {
        let idx = self
            .layer_index(id)
            .ok_or_else(|| missing_layer(id))?;
        match self.layers[idx].kind {
            LayerKind::Background(_) | LayerKind::CentralObject(_) => {
                return Err(HeroshotError::constraint(format!(
                    "layer '{id}' ({}) cannot be duplicated",
                    self.layers[idx].kind.type_name()
                )));
            }
            LayerKind::TextOverlay(_) | LayerKind::Logo(_) => {}
        }

        let mut copy = self.layers[idx].clone();
        let mut n = 1;
        copy.id = loop {
            let candidate = format!("{id}-copy-{n}");
            if self.layer(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };
        copy.name = format!("{} copy", copy.name);
        let new_id = copy.id.clone();
        self.layers.insert(idx + 1, copy);
        Ok(new_id)
    }

    /// Move the layer at `from` to index `to`, shifting the others. This is
    /// the only way z-order changes.
    pub fn reorder_layer(&mut self, from: usize, to: usize) -> HeroshotResult<()> {
        if from >= self.layers.len() || to >= self.layers.len() {
            return Err(HeroshotError::constraint(format!(
                "reorder indices ({from} -> {to}) out of bounds for {} layers",
                self.layers.len()
            )));
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        Ok(())
    }

    /// Reposition/resize a layer. Rects are clamped into the canvas; the
    /// central object is additionally re-centered. Locked layers reject the
    /// edit.
    pub fn update_layer_rect(&mut self, id: &str, rect: LayerRect) -> HeroshotResult<()> {
        for (field, v) in [
            ("x", rect.x),
            ("y", rect.y),
            ("width", rect.width),
            ("height", rect.height),
        ] {
            if !v.is_finite() {
                return Err(HeroshotError::constraint(format!(
                    "rect {field} must be finite"
                )));
            }
        }
        let layer = self.layer_mut(id).ok_or_else(|| missing_layer(id))?;
        if layer.locked {
            return Err(HeroshotError::constraint(format!(
                "layer '{id}' is locked"
            )));
        }
        layer.rect = constrain_rect(&layer.kind, rect);
        Ok(())
    }

    pub fn set_layer_opacity(&mut self, id: &str, opacity: u8) -> HeroshotResult<()> {
        if opacity > 100 {
            return Err(HeroshotError::constraint(format!(
                "opacity must be 0..=100, got {opacity}"
            )));
        }
        let layer = self.layer_mut(id).ok_or_else(|| missing_layer(id))?;
        layer.opacity = opacity;
        Ok(())
    }

    pub fn set_layer_visible(&mut self, id: &str, visible: bool) -> HeroshotResult<()> {
        let layer = self.layer_mut(id).ok_or_else(|| missing_layer(id))?;
        layer.visible = visible;
        Ok(())
    }

    pub fn set_layer_locked(&mut self, id: &str, locked: bool) -> HeroshotResult<()> {
        let layer = self.layer_mut(id).ok_or_else(|| missing_layer(id))?;
        layer.locked = locked;
        Ok(())
    }

    pub fn set_text(&mut self, id: &str, text: &str) -> HeroshotResult<()> {
        let layer = self.layer_mut(id).ok_or_else(|| missing_layer(id))?;
        match &mut layer.kind {
            LayerKind::TextOverlay(t) => {
                t.text = text.to_string();
                Ok(())
            }
            other => Err(HeroshotError::constraint(format!(
                "layer '{id}' is {}, not text_overlay",
                other.type_name()
            ))),
        }
    }

    /// Splice a freshly generated/uploaded image into the background layer.
    pub fn set_background_image(&mut self, image_url: &str) -> HeroshotResult<()> {
        use crate::model::BackgroundSource;
        let layer = self
            .layers
            .iter_mut()
            .find(|l| matches!(l.kind, LayerKind::Background(_)))
            .ok_or_else(|| HeroshotError::constraint("composition has no background layer"))?;
        let LayerKind::Background(bg) = &mut layer.kind else {
            unreachable!("filtered to background above");
        };
        bg.source = BackgroundSource::UserUpload {
            image_url: image_url.to_string(),
        };
        Ok(())
    }

    pub fn set_logo_corner(&mut self, id: &str, corner: CornerPosition) -> HeroshotResult<()> {
        let layer = self.layer_mut(id).ok_or_else(|| missing_layer(id))?;
        match &mut layer.kind {
            LayerKind::Logo(logo) => {
                logo.corner = corner;
                Ok(())
            }
            other => Err(HeroshotError::constraint(format!(
                "layer '{id}' is {}, not logo",
                other.type_name()
            ))),
        }
    }

    pub fn update_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    /// Resize the canvas. Percent geometry is resolution-independent, so this
    /// only re-clamps rects and re-centers the central object.
    pub fn resize_canvas(&mut self, width: u32, height: u32) -> HeroshotResult<()> {
        if width == 0 || height == 0 {
            return Err(HeroshotError::constraint(
                "canvas width/height must be > 0",
            ));
        }
        self.canvas.width = width;
        self.canvas.height = height;
        for layer in &mut self.layers {
            layer.rect = constrain_rect(&layer.kind, layer.rect);
        }
        Ok(())
    }
}

/// Clamp a rect into `[0,100]×[0,100]`; central-object rects are forced to
/// stay axis-centered as well.
fn constrain_rect(kind: &LayerKind, rect: LayerRect) -> LayerRect {
    match kind {
        LayerKind::CentralObject(_) => LayerRect::centered(rect.width, rect.height),
        _ => {
            let width = rect.width.clamp(0.1, 100.0);
            let height = rect.height.clamp(0.1, 100.0);
            LayerRect {
                x: rect.x.clamp(0.0, 100.0 - width),
                y: rect.y.clamp(0.0, 100.0 - height),
                width,
                height,
            }
        }
    }
}

fn missing_layer(id: &str) -> HeroshotError {
    HeroshotError::constraint(format!("no layer with id '{id}'"))
}
