//! Page geometry for the Document Assembler.
//!
//! Placement math happens in millimetres with a top-left origin. The
//! assembler converts to PDF points and flips the y axis when it writes the
//! content stream.

use crate::config::PageSize;

/// PDF points per millimetre.
pub const PT_PER_MM: f64 = 72.0 / 25.4;

/// Fixed page bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width_mm: f64,
    pub height_mm: f64,
}

/// Where an asset lands on its page. Origin is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageLayout {
    pub fn new(width_mm: f64, height_mm: f64) -> Self {
        Self {
            width_mm,
            height_mm,
        }
    }

    pub fn width_pt(&self) -> f64 {
        self.width_mm * PT_PER_MM
    }

    pub fn height_pt(&self) -> f64 {
        self.height_mm * PT_PER_MM
    }

    /// Fit a `width × height` pixel asset on the page, centred, aspect kept.
    ///
    /// `scale = min(page_w / w, page_h / h)`, so the rectangle touches the
    /// page on at least one axis and never exceeds it. Returns `None` for a
    /// zero or non-finite dimension.
    pub fn place(&self, width: f64, height: f64) -> Option<Placement> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return None;
        }
        let scale = (self.width_mm / width).min(self.height_mm / height);
        let w = width * scale;
        let h = height * scale;
        Some(Placement {
            x: (self.width_mm - w) / 2.0,
            y: (self.height_mm - h) / 2.0,
            width: w,
            height: h,
        })
    }
}

impl From<PageSize> for PageLayout {
    fn from(size: PageSize) -> Self {
        let (w, h) = size.dimensions_mm();
        Self::new(w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn a4() -> PageLayout {
        PageSize::A4.into()
    }

    #[test]
    fn landscape_on_a4() {
        let p = a4().place(4000.0, 2000.0).unwrap();
        assert!((p.width - 210.0).abs() < EPS);
        assert!((p.height - 105.0).abs() < EPS);
        assert!(p.x.abs() < EPS);
        assert!((p.y - 96.0).abs() < EPS);
    }

    #[test]
    fn portrait_is_height_bound() {
        let p = a4().place(1000.0, 3000.0).unwrap();
        assert!((p.height - 297.0).abs() < EPS);
        assert!((p.width - 99.0).abs() < EPS);
        assert!((p.x - 55.5).abs() < EPS);
        assert!(p.y.abs() < EPS);
    }

    #[test]
    fn aspect_preserved_and_within_bounds() {
        let page = a4();
        for (w, h) in [(1.0, 1.0), (123.0, 4567.0), (9999.0, 17.0), (210.0, 297.0)] {
            let p = page.place(w, h).unwrap();
            assert!(((p.width / p.height) - (w / h)).abs() < 1e-9);
            assert!(p.x >= -EPS && p.y >= -EPS);
            assert!(p.x + p.width <= page.width_mm + EPS);
            assert!(p.y + p.height <= page.height_mm + EPS);
        }
    }

    #[test]
    fn degenerate_dimensions_rejected() {
        let page = a4();
        assert!(page.place(0.0, 100.0).is_none());
        assert!(page.place(100.0, 0.0).is_none());
        assert!(page.place(f64::NAN, 100.0).is_none());
        assert!(page.place(100.0, f64::INFINITY).is_none());
    }

    #[test]
    fn points_conversion() {
        assert!((a4().width_pt() - 595.2755905511812).abs() < 1e-6);
    }
}
