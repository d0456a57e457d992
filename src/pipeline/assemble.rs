//! Document Assembler: successful payloads → one PDF, one page per asset.
//!
//! Every placed asset gets its own page of the configured size with the image
//! centred and scaled to fit (see [`crate::pipeline::layout`]). Payloads that
//! cannot be decoded, or decode to a zero-sized image, are skipped without a
//! blank page.
//!
//! ## Image encoding
//!
//! Baseline JPEGs with one or three components are embedded as-is with
//! `DCTDecode`; the PDF viewer decodes them natively, so no quality is lost
//! and the file stays small. Everything else (PNG, GIF, WebP, re-encoded
//! surfaces with transparency) is decoded, stored as `FlateDecode` RGB and,
//! when it has an alpha channel, given a grey `SMask`.
//!
//! This is CPU-bound; call it from `spawn_blocking`.

use crate::asset::{Asset, Payload};
use crate::error::ExtractError;
use crate::pipeline::layout::{PageLayout, Placement, PT_PER_MM};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::Write;
use tracing::{debug, info, warn};

/// Assembled PDF plus bookkeeping.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub bytes: Vec<u8>,
    /// Pages written, one per placed asset.
    pub pages: usize,
    /// Ordinals of payloads that could not be placed.
    pub skipped: Vec<usize>,
}

/// Lay out `entries` (already in ordinal order) on pages of `layout`.
///
/// Fails with `no-placeable-assets` if not a single entry could be placed.
pub fn assemble_document(
    entries: &[(&Asset, &Payload)],
    layout: PageLayout,
    title: &str,
) -> Result<AssembledDocument, ExtractError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    let mut skipped: Vec<usize> = Vec::new();

    for (asset, payload) in entries {
        let (image, placement) = match prepare_image(payload, &layout) {
            Ok(prepared) => prepared,
            Err(reason) => {
                warn!("Image {}: not placed ({})", asset.ordinal, reason);
                skipped.push(asset.ordinal);
                continue;
            }
        };

        let page_id = add_page(&mut doc, pages_id, &layout, placement, image)?;
        kids.push(page_id.into());
        debug!(
            "Page {}: {} at {:.1}×{:.1} mm",
            kids.len(),
            asset.filename,
            placement.width,
            placement.height
        );
    }

    if kids.is_empty() {
        return Err(ExtractError::NoPlaceableAssets {
            attempted: entries.len(),
        });
    }

    let pages = kids.len();
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages as i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => text_string(title),
        "Producer" => text_string(concat!("gallery2pdf ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Info", info_id);

    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ExtractError::DocumentWriteFailed(e.to_string()))?;

    info!(
        "PDF: {} pages, {} skipped, {} bytes",
        pages,
        skipped.len(),
        bytes.len()
    );
    Ok(AssembledDocument {
        bytes,
        pages,
        skipped,
    })
}

// ── Image XObjects ───────────────────────────────────────────────────────

/// Image streams ready to be added to the document.
struct PreparedImage {
    stream: Stream,
    smask: Option<Stream>,
}

/// Decode `payload` and fit it on the page; `Err` carries the skip reason.
fn prepare_image(
    payload: &Payload,
    layout: &PageLayout,
) -> Result<(PreparedImage, Placement), String> {
    let format = image::guess_format(&payload.bytes).ok();
    let decoded = image::load_from_memory(&payload.bytes).map_err(|e| e.to_string())?;
    let (width, height) = (decoded.width(), decoded.height());
    let placement = layout
        .place(width as f64, height as f64)
        .ok_or_else(|| format!("degenerate size {width}×{height}"))?;

    if format == Some(ImageFormat::Jpeg) {
        if let Some(color_space) = jpeg_components(&payload.bytes).and_then(device_space) {
            let dict = image_dict(width, height, color_space, "DCTDecode");
            let image = PreparedImage {
                stream: Stream::new(dict, payload.bytes.clone()).with_compression(false),
                smask: None,
            };
            return Ok((image, placement));
        }
    }

    Ok((flate_image(&decoded)?, placement))
}

fn flate_image(img: &DynamicImage) -> Result<PreparedImage, String> {
    let (width, height) = (img.width(), img.height());

    let (rgb, alpha) = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for px in rgba.pixels() {
            rgb.extend_from_slice(&px.0[..3]);
            alpha.push(px.0[3]);
        }
        // Fully opaque alpha needs no mask.
        let alpha = if alpha.iter().all(|&a| a == u8::MAX) {
            None
        } else {
            Some(alpha)
        };
        (rgb, alpha)
    } else {
        (img.to_rgb8().into_raw(), None)
    };

    let stream = Stream::new(
        image_dict(width, height, "DeviceRGB", "FlateDecode"),
        deflate(&rgb)?,
    )
    .with_compression(false);

    let smask = match alpha {
        Some(alpha) => Some(
            Stream::new(
                image_dict(width, height, "DeviceGray", "FlateDecode"),
                deflate(&alpha)?,
            )
            .with_compression(false),
        ),
        None => None,
    };

    Ok(PreparedImage { stream, smask })
}

fn image_dict(width: u32, height: u32, color_space: &str, filter: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => filter,
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| e.to_string())?;
    encoder.finish().map_err(|e| e.to_string())
}

fn device_space(components: u8) -> Option<&'static str> {
    match components {
        1 => Some("DeviceGray"),
        3 => Some("DeviceRGB"),
        _ => None,
    }
}

/// Component count from the first SOF segment of a JPEG stream.
///
/// Only baseline and progressive Huffman frames (SOF0–SOF2) qualify for
/// pass-through; arithmetic or lossless frames are re-encoded.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    let mut i = 2;
    while i + 9 < bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        if marker == 0xFF {
            i += 1;
            continue;
        }
        let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        match marker {
            0xC0..=0xC2 => return Some(bytes[i + 9]),
            0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => return None,
            0xDA => return None,
            _ => i += 2 + len,
        }
    }
    None
}

// ── Pages ────────────────────────────────────────────────────────────────

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    layout: &PageLayout,
    placement: Placement,
    image: PreparedImage,
) -> Result<ObjectId, ExtractError> {
    let PreparedImage { mut stream, smask } = image;
    if let Some(smask) = smask {
        let smask_id = doc.add_object(smask);
        stream.dict.set("SMask", smask_id);
    }
    let image_id = doc.add_object(stream);

    let content = Content {
        operations: placement_ops(layout, placement),
    };
    let encoded = content
        .encode()
        .map_err(|e| ExtractError::DocumentWriteFailed(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), layout.width_pt().into(), layout.height_pt().into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });
    Ok(page_id)
}

/// `q w 0 0 h x y cm /Im0 Do Q` in points, y measured from the bottom edge.
fn placement_ops(layout: &PageLayout, p: Placement) -> Vec<Operation> {
    let x = p.x * PT_PER_MM;
    let y = (layout.height_mm - p.y - p.height) * PT_PER_MM;
    let w = p.width * PT_PER_MM;
    let h = p.height * PT_PER_MM;
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![w.into(), 0.into(), 0.into(), h.into(), x.into(), y.into()],
        ),
        Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        Object::string_literal(s)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in s.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}
