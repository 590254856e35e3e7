use std::io::Cursor;

use heroshot::{
    AssetCache, Color, Composition, Compositor, ExportFormat, MemoryFetcher, pipeline,
};
use heroshot::model::{
    BackgroundLayer, BackgroundSource, CornerPosition, Layer, LayerKind, LayerRect, LogoLayer,
};

fn png_bytes(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn bg_layer(color: Color) -> Layer {
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

fn logo_layer(id: &str, url: &str) -> Layer {
    Layer {
        id: id.to_string(),
        name: id.to_string(),
        visible: true,
        locked: false,
        opacity: 100,
        rect: LayerRect::new(0.0, 0.0, 50.0, 50.0),
        kind: LayerKind::Logo(LogoLayer {
            image_url: url.to_string(),
            corner: CornerPosition::TopLeft,
        }),
    }
}

fn exportable(width: u32, height: u32) -> Composition {
    let mut comp = Composition::blank(width, height);
    comp.add_layer(bg_layer(Color::rgb(0x10, 0x40, 0xc0))).unwrap();
    comp.metadata.alt_text = "Blue hero background for the seasonal campaign page".to_string();
    comp.metadata.file_name = "seasonal-campaign-hero".to_string();
    comp
}

#[test]
fn export_every_format_with_expected_container() {
    let mut compositor = Compositor::new();
    let mut assets = AssetCache::new(Box::new(MemoryFetcher::new()));
    let comp = exportable(96, 64);

    for format in ExportFormat::ALL {
        let out = pipeline::export(&comp, &mut compositor, &mut assets, format, None).unwrap();
        assert!(!out.bytes.is_empty(), "{format} produced no bytes");
        assert_eq!(out.file_name, format!("seasonal-campaign-hero.{}", format.extension()));

        match format {
            ExportFormat::Avif => {
                // ISO-BMFF ftyp box; image's decoder can't read AVIF back.
                assert_eq!(&out.bytes[4..12], b"ftypavif");
            }
            ExportFormat::Webp => {
                assert_eq!(&out.bytes[0..4], b"RIFF");
                assert_eq!(&out.bytes[8..12], b"WEBP");
                let img = image::load_from_memory(&out.bytes).unwrap();
                assert_eq!((img.width(), img.height()), (96, 64));
            }
            ExportFormat::Jpeg | ExportFormat::Png => {
                let img = image::load_from_memory(&out.bytes).unwrap();
                assert_eq!((img.width(), img.height()), (96, 64));
            }
        }
    }
}

#[test]
fn jpeg_quality_changes_output_size() {
    let mut compositor = Compositor::new();
    let mut fetcher = MemoryFetcher::new();
    // Noisy-ish content so quantization has something to discard.
    let img = image::RgbaImage::from_fn(64, 64, |x, y| {
        image::Rgba([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 3 % 256) as u8, 255])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    fetcher.insert("noise.png", buf);
    let mut assets = AssetCache::new(Box::new(fetcher));

    let mut comp = exportable(128, 128);
    comp.add_layer(logo_layer("noise", "noise.png")).unwrap();

    let hi = pipeline::export(&comp, &mut compositor, &mut assets, ExportFormat::Jpeg, Some(85))
        .unwrap();
    let lo = pipeline::export(&comp, &mut compositor, &mut assets, ExportFormat::Jpeg, Some(40))
        .unwrap();
    assert!(lo.bytes.len() <= hi.bytes.len());
}

#[test]
fn reorder_changes_occlusion() {
    let mut compositor = Compositor::new();
    let mut fetcher = MemoryFetcher::new();
    fetcher.insert("red.png", png_bytes(50, 50, [255, 0, 0, 255]));
    fetcher.insert("green.png", png_bytes(50, 50, [0, 255, 0, 255]));
    let mut assets = AssetCache::new(Box::new(fetcher));

    let mut comp = Composition::blank(100, 100);
    comp.add_layer(bg_layer(Color::rgb(0, 0, 0))).unwrap();
    comp.add_layer(logo_layer("red", "red.png")).unwrap();
    comp.add_layer(logo_layer("green", "green.png")).unwrap();

    // Both logos snap to the same corner; the later layer draws on top.
    let frame = compositor.render(&comp, &mut assets).unwrap();
    let px = frame.pixel(25, 25);
    assert!(px[1] > 200 && px[0] < 50, "expected green on top, got {px:?}");

    comp.reorder_layer(1, 2).unwrap();
    let frame = compositor.render(&comp, &mut assets).unwrap();
    let px = frame.pixel(25, 25);
    assert!(px[0] > 200 && px[1] < 50, "expected red on top, got {px:?}");
}

#[test]
fn composition_without_layers_still_exports_png() {
    let mut compositor = Compositor::new();
    let mut assets = AssetCache::new(Box::new(MemoryFetcher::new()));

    let mut comp = Composition::blank(32, 32);
    comp.metadata.alt_text = "Intentionally empty placeholder hero canvas".to_string();

    let out =
        pipeline::export(&comp, &mut compositor, &mut assets, ExportFormat::Png, None).unwrap();
    let img = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
    assert_eq!(img.get_pixel(16, 16)[3], 0, "empty canvas should be transparent");
}

#[test]
fn missing_image_source_skips_layer_but_exports() {
    let mut compositor = Compositor::new();
    let mut assets = AssetCache::new(Box::new(MemoryFetcher::new()));

    let mut comp = exportable(40, 40);
    comp.add_layer(logo_layer("logo", "not-registered.png")).unwrap();

    let out =
        pipeline::export(&comp, &mut compositor, &mut assets, ExportFormat::Png, None).unwrap();
    let img = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
    // Background still renders.
    assert!(img.get_pixel(20, 20)[2] > 150);
}
