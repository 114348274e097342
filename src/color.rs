use crate::luma;
use image::RgbaImage;

/// Pixels with alpha below this are treated as absent.
pub const MIN_ALPHA: u8 = 10;

/// Blend strength for synthesized fallback colors.
const SYNTH_STRENGTH: f64 = 0.40;

/// Logo pixel at the center of a total-grid module cell, clamped in bounds.
fn center_xy(logo: &RgbaImage, total: u32, row: u32, col: u32) -> (u32, u32) {
    let f = 1.0 / total as f64;
    let (lw, lh) = logo.dimensions();
    let cx = ((col as f64 + 0.5) * f * lw as f64).round() as i64;
    let cy = ((row as f64 + 0.5) * f * lh as f64).round() as i64;
    (
        cx.clamp(0, lw as i64 - 1) as u32,
        cy.clamp(0, lh as i64 - 1) as u32,
    )
}

fn is_dark_rgba(px: [u8; 4], thr: u8) -> bool {
    let [r, g, b, a] = px;
    if a < MIN_ALPHA {
        return false; // transparent = light
    }
    luma::bt709(r, g, b) < thr as f64
}

/// Find a logo pixel of the desired darkness for module (row, col).
///
/// Samples the module's own center first, then the centers of neighboring
/// modules within `radius`, closest first. Ties at equal distance resolve by
/// the row-major enumeration order, which keeps the search deterministic.
/// Neighbors must be opaque even when hunting a light pixel; only the center
/// sample treats transparency as light.
pub fn pick_logo_color(
    logo: &RgbaImage,
    total: u32,
    qz: u32,
    row: u32,
    col: u32,
    want_dark: bool,
    thr: u8,
    radius: u32,
) -> Option<[u8; 4]> {
    // content coords -> total-grid coords
    let r_tot = row + qz;
    let c_tot = col + qz;

    let (cx, cy) = center_xy(logo, total, r_tot, c_tot);
    let px = logo.get_pixel(cx, cy).0;
    if is_dark_rgba(px, thr) == want_dark {
        return Some(px);
    }

    let rad = radius as i64;
    let mut offsets: Vec<(i64, i64, i64)> = Vec::new();
    for dr in -rad..=rad {
        for dc in -rad..=rad {
            if dr == 0 && dc == 0 {
                continue;
            }
            offsets.push((dr, dc, dr * dr + dc * dc));
        }
    }
    // Stable sort: equal distances keep generation order.
    offsets.sort_by_key(|&(_, _, d2)| d2);

    for (dr, dc, _) in offsets {
        let nr = r_tot as i64 + dr;
        let nc = c_tot as i64 + dc;
        if nr < 0 || nc < 0 || nr >= total as i64 || nc >= total as i64 {
            continue;
        }
        let (nx, ny) = center_xy(logo, total, nr as u32, nc as u32);
        let np = logo.get_pixel(nx, ny).0;
        if (luma::bt709(np[0], np[1], np[2]) < thr as f64) == want_dark && np[3] >= MIN_ALPHA {
            return Some(np);
        }
    }

    None
}

/// Derive a plausible color when the picker found nothing.
///
/// Starts from the logo pixel under the module (or the nearest opaque pixel
/// in a 7x7 window, or black), then nudges it toward black or white.
pub fn synthesize_color(
    logo: &RgbaImage,
    total: u32,
    qz: u32,
    row: u32,
    col: u32,
    toward_dark: bool,
) -> [u8; 3] {
    let (lw, lh) = logo.dimensions();
    let (cx, cy) = center_xy(logo, total, row + qz, col + qz);

    let mut base = logo.get_pixel(cx, cy).0;
    if base[3] < MIN_ALPHA {
        let mut found = None;
        'search: for dy in -3i64..=3 {
            for dx in -3i64..=3 {
                let x = (cx as i64 + dx).clamp(0, lw as i64 - 1) as u32;
                let y = (cy as i64 + dy).clamp(0, lh as i64 - 1) as u32;
                let p = logo.get_pixel(x, y).0;
                if p[3] >= MIN_ALPHA {
                    found = Some(p);
                    break 'search;
                }
            }
        }
        base = found.unwrap_or([0, 0, 0, 255]);
    }

    adjust_toward([base[0], base[1], base[2]], toward_dark, SYNTH_STRENGTH)
}

/// Move each channel `strength` of the remaining distance to black or white.
fn adjust_toward(rgb: [u8; 3], toward_dark: bool, strength: f64) -> [u8; 3] {
    let mut out = [0u8; 3];
    for (o, &c) in out.iter_mut().zip(rgb.iter()) {
        let c = c as f64;
        let v = if toward_dark {
            c * (1.0 - strength)
        } else {
            c + (255.0 - c) * strength
        };
        *o = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}
