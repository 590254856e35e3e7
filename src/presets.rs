use crate::{error::HeroshotResult, model::Composition};

/// Named canvas size a caller can apply to a composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasPreset {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const CANVAS_PRESETS: &[CanvasPreset] = &[
    CanvasPreset {
        name: "og-image",
        width: 1200,
        height: 630,
    },
    CanvasPreset {
        name: "twitter-card",
        width: 1200,
        height: 600,
    },
    CanvasPreset {
        name: "full-hd",
        width: 1920,
        height: 1080,
    },
    CanvasPreset {
        name: "square",
        width: 1080,
        height: 1080,
    },
    CanvasPreset {
        name: "blog-hero",
        width: 1600,
        height: 900,
    },
];

pub fn preset_by_name(name: &str) -> Option<CanvasPreset> {
    CANVAS_PRESETS.iter().copied().find(|p| p.name == name)
}

impl Composition {
    /// Resize to a preset; layer rects are re-clamped so none ends up with an
    /// out-of-bounds percentage position.
    pub fn apply_preset(&mut self, preset: CanvasPreset) -> HeroshotResult<()> {
        self.resize_canvas(preset.width, preset.height)
    }
}
