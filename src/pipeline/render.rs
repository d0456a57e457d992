//! Off-screen surface: load an asset as a plain image resource and decode it.
//!
//! This is the second retrieval channel. The resource is requested the way an
//! `<img crossorigin="anonymous">` load would be: no Origin, no Referer, no
//! credentials, an image `Accept` header. The bytes are then decoded into a
//! pixel surface that [`crate::pipeline::encode`] turns back into a payload.
//!
//! ## Why spawn_blocking?
//!
//! Decoding a multi-megapixel JPEG or PNG is CPU-bound and can take tens of
//! milliseconds. Running it on the blocking pool keeps the retrieval fan-out
//! responsive while other assets are still in flight.

use crate::error::RetrievalError;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use reqwest::header::ACCEPT;
use tracing::debug;
use url::Url;

/// Accept header of a browser image load.
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Decoded pixels of one asset.
#[derive(Debug, Clone)]
pub struct Surface {
    pub image: DynamicImage,
    /// Container format the pixels were decoded from, when recognisable.
    pub source_format: Option<ImageFormat>,
}

impl Surface {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }
}

/// Renders an asset into an off-screen surface.
///
/// `Err` with [`crate::error::FailureKind::Network`] means the resource never
/// loaded; [`crate::error::FailureKind::DecodeError`] means it loaded but no
/// pixels could be read back.
#[async_trait]
pub trait SurfaceRenderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<Surface, RetrievalError>;
}

/// [`SurfaceRenderer`] backed by an anonymous HTTP image load.
#[derive(Debug, Clone)]
pub struct HttpSurfaceRenderer {
    client: reqwest::Client,
}

impl HttpSurfaceRenderer {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SurfaceRenderer for HttpSurfaceRenderer {
    async fn render(&self, url: &Url) -> Result<Surface, RetrievalError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, IMAGE_ACCEPT)
            .send()
            .await
            .map_err(|e| RetrievalError::network(format!("image load failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::network(format!("image load failed: HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RetrievalError::network(format!("image load interrupted: {e}")))?;

        let surface = tokio::task::spawn_blocking(move || decode_surface(&bytes))
            .await
            .map_err(|e| RetrievalError::decode(format!("decode task panicked: {e}")))??;

        debug!(
            "Rendered {} off-screen ({}×{})",
            url,
            surface.width(),
            surface.height()
        );
        Ok(surface)
    }
}

/// Decode raw bytes into a surface.
///
/// A surface with no pixels cannot be exported and is reported like a
/// tainted one.
pub fn decode_surface(bytes: &[u8]) -> Result<Surface, RetrievalError> {
    let source_format = image::guess_format(bytes).ok();
    let image = image::load_from_memory(bytes)
        .map_err(|e| RetrievalError::decode(format!("surface not readable: {e}")))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(RetrievalError::decode("surface has no pixels"));
    }
    Ok(Surface {
        image,
        source_format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 128, 255, 200])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn decodes_png_with_format() {
        let surface = decode_surface(&png_bytes(6, 4)).unwrap();
        assert_eq!((surface.width(), surface.height()), (6, 4));
        assert_eq!(surface.source_format, Some(ImageFormat::Png));
        assert!(surface.has_alpha());
    }

    #[test]
    fn garbage_is_decode_error() {
        let err = decode_surface(b"<html>denied</html>").unwrap_err();
        assert_eq!(err.kind, FailureKind::DecodeError);
    }
}
