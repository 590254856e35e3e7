//! Embeds IPTC-IIM and EXIF metadata into an already-encoded JPEG.
//!
//! The writer splices an APP1 (EXIF/TIFF) and an APP13 (Photoshop 3.0 /
//! 8BIM resource 0x0404) segment after the JFIF preamble. Only the string
//! fields the rule engine cares about are written; geometry, orientation and
//! camera fields are the encoder's business, not ours.

use crate::{
    error::{HeroshotError, HeroshotResult},
    metadata::Metadata,
};

const MARKER_SOI: u8 = 0xD8;
const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
const MARKER_APP13: u8 = 0xED;

// Per-segment payload ceiling: u16 length minus the length field itself.
const MAX_SEGMENT_PAYLOAD: usize = 65_533;

/// Return a copy of `jpeg` with EXIF and IPTC segments inserted.
///
/// Fields that are empty are simply not written; when every field is empty
/// the input is returned unchanged.
pub fn embed_jpeg_metadata(jpeg: &[u8], meta: &Metadata) -> HeroshotResult<Vec<u8>> {
    if jpeg.len() < 2 || jpeg[0] != 0xFF || jpeg[1] != MARKER_SOI {
        return Err(HeroshotError::encode("not a JPEG: missing SOI marker"));
    }

    let exif = build_exif_app1(meta)?;
    let iptc = build_iptc_app13(meta)?;
    if exif.is_none() && iptc.is_none() {
        return Ok(jpeg.to_vec());
    }

    // Keep any JFIF APP0 segments first; applications expect them directly
    // after SOI.
    let insert_at = insertion_offset(jpeg);

    let mut out = Vec::with_capacity(
        jpeg.len()
            + exif.as_ref().map_or(0, Vec::len)
            + iptc.as_ref().map_or(0, Vec::len),
    );
    out.extend_from_slice(&jpeg[..insert_at]);
    if let Some(seg) = exif {
        out.extend_from_slice(&seg);
    }
    if let Some(seg) = iptc {
        out.extend_from_slice(&seg);
    }
    out.extend_from_slice(&jpeg[insert_at..]);
    Ok(out)
}

fn insertion_offset(jpeg: &[u8]) -> usize {
    let mut pos = 2;
    while pos + 4 <= jpeg.len() && jpeg[pos] == 0xFF && jpeg[pos + 1] == MARKER_APP0 {
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        pos += 2 + len;
    }
    pos.min(jpeg.len())
}

fn segment(marker: u8, payload: &[u8]) -> HeroshotResult<Vec<u8>> {
    if payload.len() > MAX_SEGMENT_PAYLOAD {
        return Err(HeroshotError::encode(format!(
            "metadata segment too large: {} bytes (max {MAX_SEGMENT_PAYLOAD})",
            payload.len()
        )));
    }
    let mut seg = Vec::with_capacity(payload.len() + 4);
    seg.push(0xFF);
    seg.push(marker);
    seg.extend_from_slice(&((payload.len() as u16 + 2).to_be_bytes()));
    seg.extend_from_slice(payload);
    Ok(seg)
}

// --- EXIF (APP1, little-endian TIFF with a single IFD0) ---

const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
const TAG_ARTIST: u16 = 0x013B;
const TAG_COPYRIGHT: u16 = 0x8298;
const TIFF_TYPE_ASCII: u16 = 2;

fn build_exif_app1(meta: &Metadata) -> HeroshotResult<Option<Vec<u8>>> {
    // Entries must be sorted by tag per TIFF 6.0.
    let mut fields: Vec<(u16, &str)> = Vec::new();
    if !meta.exif.image_description.trim().is_empty() {
        fields.push((TAG_IMAGE_DESCRIPTION, meta.exif.image_description.trim()));
    }
    if !meta.exif.artist.trim().is_empty() {
        fields.push((TAG_ARTIST, meta.exif.artist.trim()));
    }
    if !meta.exif.copyright.trim().is_empty() {
        fields.push((TAG_COPYRIGHT, meta.exif.copyright.trim()));
    }
    if fields.is_empty() {
        return Ok(None);
    }
    fields.sort_by_key(|(tag, _)| *tag);

    let mut payload = Vec::new();
    payload.extend_from_slice(b"Exif\0\0");

    // TIFF header. Offsets below are relative to this position.
    let tiff_start = payload.len();
    payload.extend_from_slice(b"II");
    payload.extend_from_slice(&42u16.to_le_bytes());
    payload.extend_from_slice(&8u32.to_le_bytes()); // IFD0 directly after header

    payload.extend_from_slice(&(fields.len() as u16).to_le_bytes());

    // Entry area plus the 4-byte next-IFD pointer determine where out-of-line
    // string values land.
    let mut value_offset = 8 + 2 + fields.len() * 12 + 4;
    let mut values: Vec<u8> = Vec::new();

    for (tag, text) in &fields {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0); // ASCII values are NUL-terminated
        let count = bytes.len() as u32;

        payload.extend_from_slice(&tag.to_le_bytes());
        payload.extend_from_slice(&TIFF_TYPE_ASCII.to_le_bytes());
        payload.extend_from_slice(&count.to_le_bytes());

        if bytes.len() <= 4 {
            bytes.resize(4, 0);
            payload.extend_from_slice(&bytes);
        } else {
            payload.extend_from_slice(&(value_offset as u32).to_le_bytes());
            value_offset += bytes.len();
            values.extend_from_slice(&bytes);
        }
    }

    payload.extend_from_slice(&0u32.to_le_bytes()); // no next IFD
    payload.extend_from_slice(&values);

    debug_assert_eq!(payload.len() - tiff_start, value_offset);
    segment(MARKER_APP1, &payload).map(Some)
}

// --- IPTC-IIM (APP13, Photoshop image resource 0x0404) ---

const IIM_RECORD_APPLICATION: u8 = 2;
const DATASET_RECORD_VERSION: u8 = 0;
const DATASET_KEYWORDS: u8 = 25;
const DATASET_BYLINE: u8 = 80;
const DATASET_HEADLINE: u8 = 105;
const DATASET_COPYRIGHT: u8 = 116;
const DATASET_CAPTION: u8 = 120;

fn build_iptc_app13(meta: &Metadata) -> HeroshotResult<Option<Vec<u8>>> {
    let mut iim = Vec::new();

    let mut push_dataset = |id: u8, data: &[u8]| {
        iim.push(0x1C);
        iim.push(IIM_RECORD_APPLICATION);
        iim.push(id);
        iim.extend_from_slice(&(data.len() as u16).to_be_bytes());
        iim.extend_from_slice(data);
    };

    let mut wrote_any = false;
    let mut push_text = |id: u8, text: &str| {
        let text = text.trim();
        if !text.is_empty() {
            push_dataset(id, text.as_bytes());
            wrote_any = true;
        }
    };

    push_text(DATASET_BYLINE, &meta.iptc.creator);
    push_text(DATASET_HEADLINE, &meta.iptc.headline);
    push_text(DATASET_COPYRIGHT, &meta.iptc.copyright);
    push_text(DATASET_CAPTION, &meta.iptc.caption);
    for keyword in &meta.iptc.keywords {
        push_text(DATASET_KEYWORDS, keyword);
    }
    if !wrote_any {
        return Ok(None);
    }

    // Prepend the IIM record-version marker readers expect first.
    let mut full = Vec::with_capacity(iim.len() + 7);
    full.push(0x1C);
    full.push(IIM_RECORD_APPLICATION);
    full.push(DATASET_RECORD_VERSION);
    full.extend_from_slice(&2u16.to_be_bytes());
    full.extend_from_slice(&4u16.to_be_bytes()); // IIM version 4
    full.extend_from_slice(&iim);

    let mut payload = Vec::new();
    payload.extend_from_slice(b"Photoshop 3.0\0");
    payload.extend_from_slice(b"8BIM");
    payload.extend_from_slice(&0x0404u16.to_be_bytes());
    payload.extend_from_slice(&[0, 0]); // empty, even-padded pascal name
    payload.extend_from_slice(&(full.len() as u32).to_be_bytes());
    payload.extend_from_slice(&full);
    if full.len() % 2 == 1 {
        payload.push(0); // resource data is even-padded
    }

    segment(MARKER_APP13, &payload).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_jpeg() -> Vec<u8> {
        use image::ImageEncoder as _;
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut std::io::Cursor::new(&mut out),
            90,
        )
        .write_image(&[128u8; 4 * 4 * 3], 4, 4, image::ExtendedColorType::Rgb8)
        .unwrap();
        out
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn full_meta() -> Metadata {
        let mut meta = Metadata::default();
        meta.iptc.creator = "Acme Studio".to_string();
        meta.iptc.headline = "Best Coffee Makers 2024".to_string();
        meta.iptc.copyright = "Copyright 2024 Acme Studio".to_string();
        meta.iptc.caption = "Hero image for the coffee maker roundup".to_string();
        meta.iptc.keywords = vec!["coffee".to_string(), "makers".to_string()];
        meta.exif.artist = "Acme Studio".to_string();
        meta.exif.copyright = "Copyright 2024 Acme Studio".to_string();
        meta.exif.image_description = "Hero image for the coffee maker roundup".to_string();
        meta
    }

    #[test]
    fn embeds_both_segments_and_stays_decodable() {
        let jpeg = tiny_jpeg();
        let out = embed_jpeg_metadata(&jpeg, &full_meta()).unwrap();

        assert!(out.len() > jpeg.len());
        assert!(contains(&out, b"Exif\0\0"));
        assert!(contains(&out, b"Photoshop 3.0\0"));
        assert!(contains(&out, b"8BIM"));
        assert!(contains(&out, b"Acme Studio"));
        assert!(contains(&out, b"coffee"));

        let img = image::load_from_memory(&out).unwrap();
        assert_eq!((img.width(), img.height()), (4, 4));
    }

    #[test]
    fn empty_metadata_is_a_noop() {
        let jpeg = tiny_jpeg();
        let out = embed_jpeg_metadata(&jpeg, &Metadata::default()).unwrap();
        assert_eq!(out, jpeg);
    }

    #[test]
    fn rejects_non_jpeg_input() {
        assert!(embed_jpeg_metadata(b"\x89PNG", &full_meta()).is_err());
    }

    #[test]
    fn segments_come_after_any_app0() {
        let jpeg = tiny_jpeg();
        let out = embed_jpeg_metadata(&jpeg, &full_meta()).unwrap();

        // SOI survives, and if the encoder wrote a JFIF APP0 it still
        // precedes our APP1.
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        let exif_pos = out
            .windows(6)
            .position(|w| w == b"Exif\0\0")
            .unwrap();
        if let Some(app0) = out.windows(2).position(|w| w == [0xFF, 0xE0]) {
            assert!(app0 < exif_pos);
        }
    }

    #[test]
    fn exif_ifd_entries_are_tag_sorted() {
        let seg = build_exif_app1(&full_meta()).unwrap().unwrap();
        // Skip marker(2) + len(2) + "Exif\0\0"(6) + TIFF header(8).
        let ifd = &seg[4 + 6 + 8..];
        let count = u16::from_le_bytes([ifd[0], ifd[1]]) as usize;
        assert_eq!(count, 3);
        let tags: Vec<u16> = (0..count)
            .map(|i| u16::from_le_bytes([ifd[2 + i * 12], ifd[3 + i * 12]]))
            .collect();
        let mut sorted = tags.clone();
        sorted.sort_unstable();
        assert_eq!(tags, sorted);
    }
}
