//! Re-encoding: decoded surface → payload bytes.
//!
//! The fallback channel only yields pixels, so they have to be encoded again
//! before packaging. [`FallbackEncoding::PreserveOriginal`] writes PNG, GIF
//! and WebP sources back in their own format (WebP lossless) and keeps any
//! other transparent surface as PNG. JPEG and unrecognised sources, and every
//! surface under [`FallbackEncoding::Jpeg`], become a high-quality JPEG.

use crate::asset::{Payload, PayloadSource};
use crate::config::FallbackEncoding;
use crate::pipeline::render::Surface;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Container format the surface will be written as.
pub fn target_format(surface: &Surface, encoding: FallbackEncoding) -> ImageFormat {
    match encoding {
        FallbackEncoding::Jpeg => ImageFormat::Jpeg,
        FallbackEncoding::PreserveOriginal => match surface.source_format {
            Some(f @ (ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP)) => f,
            _ if surface.has_alpha() => ImageFormat::Png,
            _ => ImageFormat::Jpeg,
        },
    }
}

/// Encode `surface` as a [`PayloadSource::Reencoded`] payload.
pub fn reencode(
    surface: &Surface,
    encoding: FallbackEncoding,
    jpeg_quality: u8,
) -> Result<Payload, image::ImageError> {
    let format = target_format(surface, encoding);
    let mut buf = Vec::new();

    match format {
        ImageFormat::Png => {
            surface
                .image
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        ImageFormat::Gif => {
            let rgba = DynamicImage::ImageRgba8(surface.image.to_rgba8());
            rgba.write_to(&mut Cursor::new(&mut buf), ImageFormat::Gif)?;
        }
        ImageFormat::WebP => {
            // The lossless encoder takes 8-bit RGB or RGBA only.
            let img = if surface.has_alpha() {
                DynamicImage::ImageRgba8(surface.image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(surface.image.to_rgb8())
            };
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP)?;
        }
        _ => {
            // JPEG has no alpha channel; flatten first.
            let rgb = surface.image.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality).encode_image(&rgb)?;
        }
    }

    debug!(
        "Re-encoded {}×{} surface → {} bytes {:?}",
        surface.width(),
        surface.height(),
        buf.len(),
        format
    );
    Ok(Payload::new(buf, format.to_mime_type(), PayloadSource::Reencoded))
}
