use heroshot::{
    AssetCache, Color, Composition, Compositor, ExportFormat, MemoryFetcher, pipeline,
};
use heroshot::model::{BackgroundLayer, BackgroundSource, Layer, LayerKind, LayerRect};

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn publishable_comp() -> Composition {
    let mut comp = Composition::blank(80, 60);
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

    comp.metadata.alt_text = "Dark hero background for the coffee maker roundup".to_string();
    comp.metadata.file_name = "coffee-makers-2024".to_string();
    comp.metadata.iptc.creator = "Acme Studio".to_string();
    comp.metadata.iptc.headline = "Best Coffee Makers 2024".to_string();
    comp.metadata.iptc.copyright = "Copyright 2024 Acme Studio".to_string();
    comp.metadata.iptc.caption = "Roundup of this year's best coffee makers".to_string();
    comp.metadata.iptc.keywords = vec!["coffee".to_string(), "makers".to_string(), "2024".to_string()];
    comp.metadata.exif.artist = "Acme Studio".to_string();
    comp.metadata.exif.copyright = "Copyright 2024 Acme Studio".to_string();
    comp.metadata.exif.image_description = comp.metadata.alt_text.clone();
    comp.metadata.schema_org.name = "Best Coffee Makers 2024".to_string();
    comp.metadata.schema_org.author = "Acme Studio".to_string();
    comp
}

#[test]
fn jpeg_export_carries_exif_and_iptc_segments() {
    let mut compositor = Compositor::new();
    let mut assets = AssetCache::new(Box::new(MemoryFetcher::new()));
    let comp = publishable_comp();

    let out =
        pipeline::export(&comp, &mut compositor, &mut assets, ExportFormat::Jpeg, None).unwrap();

    assert!(contains(&out.bytes, b"Exif\0\0"));
    assert!(contains(&out.bytes, b"Photoshop 3.0\0"));
    assert!(contains(&out.bytes, b"8BIM"));
    assert!(contains(&out.bytes, b"Acme Studio"));
    assert!(contains(&out.bytes, b"Copyright 2024 Acme Studio"));
    assert!(contains(&out.bytes, b"coffee"));

    // Still a decodable JPEG after splicing.
    let img = image::load_from_memory(&out.bytes).unwrap();
    assert_eq!((img.width(), img.height()), (80, 60));
}

#[test]
fn non_jpeg_formats_return_metadata_out_of_band() {
    let mut compositor = Compositor::new();
    let mut assets = AssetCache::new(Box::new(MemoryFetcher::new()));
    let comp = publishable_comp();

    for format in [ExportFormat::Png, ExportFormat::Webp] {
        let out = pipeline::export(&comp, &mut compositor, &mut assets, format, None).unwrap();
        assert!(!contains(&out.bytes, b"8BIM"));
        assert_eq!(out.metadata.iptc.creator, "Acme Studio");
        assert_eq!(out.schema_org["@type"], "ImageObject");
        assert_eq!(out.schema_org["name"], "Best Coffee Makers 2024");
    }
}

#[test]
fn export_file_name_follows_metadata_and_format() {
    let mut compositor = Compositor::new();
    let mut assets = AssetCache::new(Box::new(MemoryFetcher::new()));
    let comp = publishable_comp();

    let jpeg =
        pipeline::export(&comp, &mut compositor, &mut assets, ExportFormat::Jpeg, None).unwrap();
    assert_eq!(jpeg.file_name, "coffee-makers-2024.jpg");
    assert_eq!(jpeg.mime_type, "image/jpeg");

    let avif =
        pipeline::export(&comp, &mut compositor, &mut assets, ExportFormat::Avif, None).unwrap();
    assert_eq!(avif.file_name, "coffee-makers-2024.avif");
    assert_eq!(avif.mime_type, "image/avif");
}
