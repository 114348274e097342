use crate::color::{pick_logo_color, synthesize_color};
use crate::geometry::QrGeometry;
use crate::luma;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

pub struct OverlayConfig {
    /// Mini-square side as a fraction of the module side.
    pub square_frac: f64,
    /// Neighbor-search radius in modules for logo color matching.
    pub radius: u32,
    /// Luminance cut for logo dark/light classification.
    pub threshold_logo: u8,
    /// Alpha applied to every painted module.
    pub alpha: u8,
}

/// Whether module (row, col) is dark, sampled at the module's center pixel.
pub fn module_is_dark(qr: &RgbaImage, geo: &QrGeometry, row: u32, col: u32) -> bool {
    let (left, top, right, bottom) = geo.content_box;
    let n = geo.n_modules as f64;
    let module_w = (right - left + 1) as f64 / n;
    let module_h = (bottom - top + 1) as f64 / n;

    let cx = (left as f64 + (col as f64 + 0.5) * module_w).round() as i64;
    let cy = (top as f64 + (row as f64 + 0.5) * module_h).round() as i64;
    let cx = cx.clamp(0, qr.width() as i64 - 1) as u32;
    let cy = cy.clamp(0, qr.height() as i64 - 1) as u32;

    let [r, g, b, _] = qr.get_pixel(cx, cy).0;
    let gray = luma::bt601(r, g, b).round() as u8;

    if geo.dark_is_lt {
        gray < geo.thresh
    } else {
        gray > geo.thresh
    }
}

/// True if (row, col) lies inside one of the three 7x7 finder squares.
/// The bottom-right corner holds no finder per the QR spec.
pub fn in_finder(n: u32, row: u32, col: u32) -> bool {
    let near_left = col <= 6;
    let near_top = row <= 6;
    let near_right = col + 7 >= n && col < n;
    let near_bottom = row + 7 >= n && row < n;
    (near_top && near_left) || (near_top && near_right) || (near_bottom && near_left)
}

/// Paint every content module into a fresh transparent canvas sized to the
/// logo. Finder modules get their full pixel-aligned cell; everything else
/// gets a centered mini-square. Each cell is touched at most once.
pub fn build_overlay(
    qr: &RgbaImage,
    logo: &RgbaImage,
    geo: &QrGeometry,
    cfg: &OverlayConfig,
) -> RgbaImage {
    let n = geo.n_modules;
    let qz = geo.qz_modules;
    let total = n + 2 * qz;
    let (lw, lh) = logo.dimensions();

    // Resolve every module's color up front; no module depends on another,
    // so the resolution pass runs in parallel and painting stays serial.
    let colors: Vec<Rgba<u8>> = (0..n * n)
        .into_par_iter()
        .map(|i| {
            let row = i / n;
            let col = i % n;

            // Desired darkness comes from the QR, the color from the logo.
            let want_dark = module_is_dark(qr, geo, row, col);
            let rgb = match pick_logo_color(
                logo,
                total,
                qz,
                row,
                col,
                want_dark,
                cfg.threshold_logo,
                cfg.radius,
            ) {
                Some(px) => [px[0], px[1], px[2]],
                None => synthesize_color(logo, total, qz, row, col, want_dark),
            };
            Rgba([rgb[0], rgb[1], rgb[2], cfg.alpha])
        })
        .collect();

    let mut overlay = RgbaImage::from_pixel(lw, lh, Rgba([0, 0, 0, 0]));
    let f = 1.0 / total as f64;
    let side = ((lw as f64 * f).min(lh as f64 * f) * cfg.square_frac)
        .round()
        .max(1.0) as i64;

    for row in 0..n {
        for col in 0..n {
            let pix = colors[(row * n + col) as usize];
            let ctot = (col + qz) as f64;
            let rtot = (row + qz) as f64;

            if in_finder(n, row, col) {
                // Full cell, edges snapped by proportional rounding.
                let x0 = (ctot * f * lw as f64).round() as i64;
                let y0 = (rtot * f * lh as f64).round() as i64;
                let x1 = ((ctot + 1.0) * f * lw as f64).round() as i64 - 1;
                let y1 = ((rtot + 1.0) * f * lh as f64).round() as i64 - 1;
                fill_rect(&mut overlay, x0, y0, x1, y1, pix);
            } else {
                let cx = ((ctot + 0.5) * f * lw as f64).round() as i64;
                let cy = ((rtot + 0.5) * f * lh as f64).round() as i64;
                let half = side / 2;
                let x0 = (cx - half).clamp(0, lw as i64 - 1);
                let y0 = (cy - half).clamp(0, lh as i64 - 1);
                let x1 = (x0 + side - 1).clamp(0, lw as i64 - 1);
                let y1 = (y0 + side - 1).clamp(0, lh as i64 - 1);
                fill_rect(&mut overlay, x0, y0, x1, y1, pix);
            }
        }
    }

    overlay
}

fn fill_rect(img: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, pix: Rgba<u8>) {
    let (w, h) = img.dimensions();
    let x0 = x0.clamp(0, w as i64 - 1);
    let y0 = y0.clamp(0, h as i64 - 1);
    let x1 = x1.clamp(0, w as i64 - 1);
    let y1 = y1.clamp(0, h as i64 - 1);
    for y in y0..=y1 {
        for x in x0..=x1 {
            img.put_pixel(x as u32, y as u32, pix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{self, tests::render_grid};

    #[test]
    fn finder_classification_at_25_modules() {
        assert!(in_finder(25, 0, 0));
        assert!(in_finder(25, 0, 24));
        assert!(in_finder(25, 24, 0));
        assert!(!in_finder(25, 24, 24));
        assert!(!in_finder(25, 12, 12));
        // Finder squares are exactly 7 modules wide.
        assert!(in_finder(25, 6, 6));
        assert!(!in_finder(25, 7, 7));
        assert!(in_finder(25, 6, 18));
        assert!(!in_finder(25, 6, 17));
    }

    #[test]
    fn sampler_on_uniform_bitmaps() {
        let white = RgbaImage::from_pixel(90, 90, Rgba([255, 255, 255, 255]));
        let black = RgbaImage::from_pixel(90, 90, Rgba([0, 0, 0, 255]));
        let geo = geometry::from_exact_dims(&white, 9, 0).unwrap();

        for row in 0..9 {
            for col in 0..9 {
                assert!(!module_is_dark(&white, &geo, row, col));
                assert!(module_is_dark(&black, &geo, row, col));
            }
        }
    }

    /// A 21-module pattern with real finder squares and checkerboard data.
    fn version1_dark(r: u32, c: u32) -> bool {
        let finder = |r: u32, c: u32| {
            // 7x7: dark border, light ring, dark 3x3 core.
            let ring = r.min(c).min(6 - r).min(6 - c);
            ring != 1
        };
        if r <= 6 && c <= 6 {
            return finder(r, c);
        }
        if r <= 6 && c >= 14 {
            return finder(r, c - 14);
        }
        if r >= 14 && c <= 6 {
            return finder(r - 14, c);
        }
        (r + c) % 2 == 0
    }

    #[test]
    fn solid_blue_logo_end_to_end() {
        // 21 modules, 4-module quiet zone, 10 px/module: 290x290.
        let qr = render_grid(21, 4, 10, version1_dark);
        let logo = RgbaImage::from_pixel(290, 290, Rgba([0, 0, 255, 255]));

        let geo = geometry::from_exact_dims(&qr, 21, 4).unwrap();
        let cfg = OverlayConfig {
            square_frac: 0.25,
            radius: 2,
            threshold_logo: 145,
            alpha: 255,
        };
        let overlay = build_overlay(&qr, &logo, &geo, &cfg);

        assert_eq!(overlay.dimensions(), (290, 290));
        // Blue classifies dark at 145, so dark modules take the logo color
        // verbatim; light modules have no light pixel to find anywhere and
        // fall through to the synthesizer, which whitens blue.
        let whitened = Rgba([102, 102, 255, 255]);
        for row in 0..21 {
            for col in 0..21 {
                let cx = (col + 4) * 10 + 5;
                let cy = (row + 4) * 10 + 5;
                let px = *overlay.get_pixel(cx, cy);
                if version1_dark(row, col) {
                    assert_eq!(px, Rgba([0, 0, 255, 255]), "module ({row},{col})");
                } else {
                    assert_eq!(px, whitened, "module ({row},{col})");
                }
            }
        }

        // The quiet zone is never painted.
        assert_eq!(overlay.get_pixel(5, 5).0[3], 0);
        assert_eq!(overlay.get_pixel(284, 284).0[3], 0);

        // Finder modules cover their whole cell; data modules only the
        // centered mini-square.
        assert_eq!(*overlay.get_pixel(40, 40), Rgba([0, 0, 255, 255]));
        let (r, c) = (8, 8); // data module, dark in the checkerboard
        assert!(version1_dark(r, c));
        let (x0, y0) = ((c + 4) * 10, (r + 4) * 10);
        assert_eq!(overlay.get_pixel(x0, y0).0[3], 0, "cell corner stays clear");
        assert_eq!(*overlay.get_pixel(x0 + 5, y0 + 5), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn custom_alpha_is_applied_to_every_module() {
        let qr = render_grid(21, 4, 10, version1_dark);
        let logo = RgbaImage::from_pixel(290, 290, Rgba([0, 0, 255, 255]));
        let geo = geometry::from_exact_dims(&qr, 21, 4).unwrap();
        let cfg = OverlayConfig {
            square_frac: 0.25,
            radius: 2,
            threshold_logo: 145,
            alpha: 128,
        };
        let overlay = build_overlay(&qr, &logo, &geo, &cfg);
        assert_eq!(overlay.get_pixel(45, 45).0[3], 128);
        assert_eq!(overlay.get_pixel(5, 5).0[3], 0);
    }
}
