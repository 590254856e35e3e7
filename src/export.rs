use std::io::Cursor;

use anyhow::Context as _;
use image::ImageEncoder as _;
use serde::{Deserialize, Serialize};

use crate::{
    error::{HeroshotError, HeroshotResult},
    render::Frame,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Avif,
    Webp,
    Jpeg,
    Png,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Avif,
        ExportFormat::Webp,
        ExportFormat::Jpeg,
        ExportFormat::Png,
    ];

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Avif => "image/avif",
            ExportFormat::Webp => "image/webp",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Avif => "avif",
            ExportFormat::Webp => "webp",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Png => "png",
        }
    }

    /// Quality used when the caller does not pass one. PNG is lossless and
    /// ignores quality entirely.
    pub fn default_quality(self) -> u8 {
        match self {
            ExportFormat::Avif => 60,
            ExportFormat::Webp => 80,
            ExportFormat::Jpeg => 85,
            ExportFormat::Png => 100,
        }
    }

    /// Whether this container carries IPTC/EXIF segments we can write.
    pub fn supports_embedded_metadata(self) -> bool {
        matches!(self, ExportFormat::Jpeg)
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = HeroshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "avif" => Ok(ExportFormat::Avif),
            "webp" => Ok(ExportFormat::Webp),
            "jpeg" | "jpg" => Ok(ExportFormat::Jpeg),
            "png" => Ok(ExportFormat::Png),
            other => Err(HeroshotError::validation(format!(
                "unknown export format \"{other}\" (expected avif, webp, jpeg, or png)"
            ))),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encode a rendered frame. Quality is clamped to 1..=100.
///
/// The frame is premultiplied; encoders want straight alpha, and JPEG has no
/// alpha at all so it is flattened over white first. WebP output is lossless
/// (the `image` crate's encoder does not do lossy), so the quality knob is
/// accepted for API symmetry but has no effect there.
pub fn encode_frame(
    frame: &Frame,
    format: ExportFormat,
    quality: Option<u8>,
) -> HeroshotResult<Vec<u8>> {
    let quality = quality
        .unwrap_or_else(|| format.default_quality())
        .clamp(1, 100);

    let straight = unpremultiply(&frame.data);
    let mut out = Vec::new();

    match format {
        ExportFormat::Jpeg => {
            let rgb = flatten_over_white(&straight);
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut Cursor::new(&mut out), quality)
                .write_image(
                    &rgb,
                    frame.width,
                    frame.height,
                    image::ExtendedColorType::Rgb8,
                )
                .context("encode jpeg")?;
        }
        ExportFormat::Png => {
            image::codecs::png::PngEncoder::new(Cursor::new(&mut out))
                .write_image(
                    &straight,
                    frame.width,
                    frame.height,
                    image::ExtendedColorType::Rgba8,
                )
                .context("encode png")?;
        }
        ExportFormat::Webp => {
            image::codecs::webp::WebPEncoder::new_lossless(Cursor::new(&mut out))
                .encode(
                    &straight,
                    frame.width,
                    frame.height,
                    image::ExtendedColorType::Rgba8,
                )
                .context("encode webp")?;
        }
        ExportFormat::Avif => {
            image::codecs::avif::AvifEncoder::new_with_speed_quality(
                Cursor::new(&mut out),
                6,
                quality,
            )
            .write_image(
                &straight,
                frame.width,
                frame.height,
                image::ExtendedColorType::Rgba8,
            )
            .context("encode avif")?;
        }
    }

    if out.is_empty() {
        return Err(HeroshotError::encode(format!(
            "{format} encoder produced no bytes"
        )));
    }
    Ok(out)
}

fn unpremultiply(premul: &[u8]) -> Vec<u8> {
    let mut straight = premul.to_vec();
    for px in straight.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
    straight
}

fn flatten_over_white(straight_rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(straight_rgba.len() / 4 * 3);
    for px in straight_rgba.chunks_exact(4) {
        let a = px[3] as u16;
        let inv = 255 - a;
        rgb.push(((px[0] as u16 * a + 255 * inv + 127) / 255) as u8);
        rgb.push(((px[1] as u16 * a + 255 * inv + 127) / 255) as u8);
        rgb.push(((px[2] as u16 * a + 255 * inv + 127) / 255) as u8);
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(w: u32, h: u32, px: [u8; 4]) -> Frame {
        Frame {
            width: w,
            height: h,
            data: px.repeat((w * h) as usize),
            premultiplied: true,
        }
    }

    #[test]
    fn format_parsing_and_names() {
        assert_eq!("jpg".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert_eq!("AVIF".parse::<ExportFormat>().unwrap(), ExportFormat::Avif);
        assert!("tiff".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Webp.mime_type(), "image/webp");
        assert_eq!(ExportFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn png_roundtrips_dimensions() {
        let frame = solid_frame(8, 5, [10, 20, 30, 255]);
        let bytes = encode_frame(&frame, ExportFormat::Png, None).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (8, 5));
    }

    #[test]
    fn jpeg_flattens_transparency_over_white() {
        let frame = solid_frame(4, 4, [0, 0, 0, 0]);
        let bytes = encode_frame(&frame, ExportFormat::Jpeg, Some(90)).unwrap();
        let img = image::load_from_memory(&bytes).unwrap().to_rgb8();
        let px = img.get_pixel(0, 0);
        assert!(px[0] > 250 && px[1] > 250 && px[2] > 250);
    }

    #[test]
    fn lower_jpeg_quality_is_not_larger() {
        // Gradient content so quality actually matters.
        let mut data = Vec::new();
        for y in 0..64u32 {
            for x in 0..64u32 {
                data.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255]);
            }
        }
        let frame = Frame {
            width: 64,
            height: 64,
            data,
            premultiplied: true,
        };
        let hi = encode_frame(&frame, ExportFormat::Jpeg, Some(85)).unwrap();
        let lo = encode_frame(&frame, ExportFormat::Jpeg, Some(40)).unwrap();
        assert!(lo.len() <= hi.len());
    }

    #[test]
    fn unpremultiply_recovers_straight_alpha() {
        // 50% alpha mid-gray, premultiplied.
        let premul = [64u8, 64, 64, 128];
        let straight = unpremultiply(&premul);
        assert_eq!(straight[3], 128);
        assert!((straight[0] as i16 - 127).abs() <= 1);
    }
}
