use crate::{
    assets::AssetCache,
    error::{HeroshotError, HeroshotResult},
    export::{ExportFormat, encode_frame},
    jpeg_meta::embed_jpeg_metadata,
    metadata::{Metadata, strip_image_extension},
    model::Composition,
    render::Compositor,
    validate,
};

/// Everything a caller needs to hand the exported image to its destination.
#[derive(Clone, Debug)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    /// Semantic stem from metadata plus the format's extension.
    pub file_name: String,
    pub mime_type: &'static str,
    /// Snapshot of the metadata the export was produced with. For formats
    /// without embedded metadata support this is the caller's only copy.
    pub metadata: Metadata,
    /// schema.org `ImageObject` JSON-LD for the surrounding page.
    pub schema_org: serde_json::Value,
}

/// Render, encode, and (for JPEG) embed metadata.
///
/// Export is refused while any validation rule of severity error fails;
/// warnings do not block. A failed export changes nothing: the composition
/// is taken by reference and the caller's state is untouched.
pub fn export(
    comp: &Composition,
    compositor: &mut Compositor,
    assets: &mut AssetCache,
    format: ExportFormat,
    quality: Option<u8>,
) -> HeroshotResult<ExportOutput> {
    let report = validate::evaluate(comp);
    if !report.can_export() {
        let failing: Vec<String> = report
            .errors()
            .iter()
            .map(|r| r.rule_id.clone())
            .collect();
        return Err(HeroshotError::validation(format!(
            "export blocked by failing rules: {}",
            failing.join(", ")
        )));
    }

    let frame = compositor.render(comp, assets)?;
    let mut bytes = encode_frame(&frame, format, quality)?;
    if format.supports_embedded_metadata() {
        bytes = embed_jpeg_metadata(&bytes, &comp.metadata)?;
    }

    tracing::info!(
        format = %format,
        size = bytes.len(),
        width = frame.width,
        height = frame.height,
        "exported composition"
    );

    Ok(ExportOutput {
        bytes,
        file_name: export_file_name(&comp.metadata, format),
        mime_type: format.mime_type(),
        metadata: comp.metadata.clone(),
        schema_org: comp.metadata.schema_org_json(),
    })
}

fn export_file_name(meta: &Metadata, format: ExportFormat) -> String {
    let stem = strip_image_extension(meta.file_name.trim());
    let stem = if stem.is_empty() { "hero-image" } else { stem };
    format!("{stem}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::MemoryFetcher,
        color::Color,
        model::{BackgroundLayer, BackgroundSource, Layer, LayerKind, LayerRect},
    };

    fn exportable_comp() -> Composition {
        let mut comp = Composition::blank(64, 48);
        comp.add_layer(Layer {
            id: "bg".to_string(),
            name: "Background".to_string(),
            visible: true,
            locked: false,
            opacity: 100,
            rect: LayerRect::new(0.0, 0.0, 100.0, 100.0),
            kind: LayerKind::Background(BackgroundLayer {
                source: BackgroundSource::Color {
                    color: Color::rgb(0x1f, 0x29, 0x37),
                },
            }),
        })
        .unwrap();
        comp.metadata.alt_text =
            "Dark blue-gray hero background for the product roundup".to_string();
        comp.metadata.file_name = "coffee-makers-2024".to_string();
        comp
    }

    fn ctx() -> (Compositor, AssetCache) {
        (
            Compositor::new(),
            AssetCache::new(Box::new(MemoryFetcher::new())),
        )
    }

    #[test]
    fn export_blocked_until_errors_fixed() {
        let (mut compositor, mut assets) = ctx();
        let mut comp = exportable_comp();
        comp.metadata.alt_text.clear();

        let err = export(&comp, &mut compositor, &mut assets, ExportFormat::Png, None)
            .unwrap_err();
        assert!(err.to_string().contains("alt-text-present"));
    }

    #[test]
    fn png_export_has_name_and_mime() {
        let (mut compositor, mut assets) = ctx();
        let out = export(
            &exportable_comp(),
            &mut compositor,
            &mut assets,
            ExportFormat::Png,
            None,
        )
        .unwrap();
        assert_eq!(out.file_name, "coffee-makers-2024.png");
        assert_eq!(out.mime_type, "image/png");
        assert_eq!(out.schema_org["@type"], "ImageObject");
        let img = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (64, 48));
    }

    #[test]
    fn jpeg_export_embeds_iptc() {
        let (mut compositor, mut assets) = ctx();
        let mut comp = exportable_comp();
        comp.metadata.iptc.creator = "Acme Studio".to_string();

        let out = export(&comp, &mut compositor, &mut assets, ExportFormat::Jpeg, None).unwrap();
        assert_eq!(out.file_name, "coffee-makers-2024.jpg");
        assert!(out.bytes.windows(4).any(|w| w == b"8BIM"));
    }

    #[test]
    fn empty_file_name_falls_back() {
        let meta = Metadata::default();
        assert_eq!(export_file_name(&meta, ExportFormat::Webp), "hero-image.webp");
    }
}
