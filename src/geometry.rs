use crate::luma;
use image::RgbaImage;
use ndarray::Array2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("no modules detected in QR image (all flat)")]
    NoModulesDetected,
    #[error("no dark modules detected in QR image")]
    NoDarkModulesDetected,
    #[error("unable to estimate module size from middle row")]
    ModuleSizeUnavailable,
    #[error("detected non-positive module count")]
    InvalidModuleCount,
}

/// Where the QR module grid sits inside the source bitmap.
///
/// Built once by [`from_exact_dims`] or [`detect`] and never mutated after.
#[derive(Debug, Clone)]
pub struct QrGeometry {
    /// Side length of the content grid in modules, quiet zone excluded.
    pub n_modules: u32,
    /// Quiet-zone width in modules, per side.
    pub qz_modules: u32,
    /// (left, top, right, bottom) of the dark content, inclusive pixel coords.
    pub content_box: (u32, u32, u32, u32),
    /// Module side length in source pixels.
    pub module_px: f64,
    /// Luminance cut used to binarize the QR image.
    pub thresh: u8,
    /// Polarity: true means dark modules have luminance below `thresh`.
    pub dark_is_lt: bool,
}

/// Flatten alpha over white and convert to BT.601 luminance.
///
/// Compositing over white first makes transparent regions read as light
/// rather than black, which matters for QR renders with transparent
/// backgrounds.
pub fn to_gray(img: &RgbaImage) -> Array2<u8> {
    let (w, h) = img.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        let [r, g, b, a] = img.get_pixel(x as u32, y as u32).0;
        let af = a as f64 / 255.0;
        let flat = |c: u8| (c as f64 * af + 255.0 * (1.0 - af)).round() as u8;
        luma::bt601(flat(r), flat(g), flat(b)).round() as u8
    })
}

/// Classic Otsu on a 256-bin luminance histogram.
///
/// The returned value is a cut: pixels with luminance below it form the
/// background class. Ties keep the earliest maximum.
pub fn otsu_threshold(hist: &[u64; 256]) -> u8 {
    let total: u64 = hist.iter().sum();
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(v, &c)| v as f64 * c as f64)
        .sum();

    let mut w_b: u64 = 0;
    let mut sum_b = 0.0;
    let mut max_var = -1.0;
    let mut thresh = 128u8;

    for t in 1..=255usize {
        let v = t - 1;
        w_b += hist[v];
        sum_b += v as f64 * hist[v] as f64;
        if w_b == 0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0 {
            break;
        }
        let m_b = sum_b / w_b as f64;
        let m_f = (sum_total - sum_b) / w_f as f64;
        let var_between = w_b as f64 * w_f as f64 * (m_b - m_f) * (m_b - m_f);
        if var_between > max_var {
            max_var = var_between;
            thresh = t as u8;
        }
    }

    thresh
}

/// Geometry from caller-supplied module and quiet-zone counts.
///
/// Only meaningful for square, upright renders; the threshold and polarity
/// defaults suit pure black-on-white output.
pub fn from_exact_dims(qr: &RgbaImage, n: u32, qz: u32) -> Result<QrGeometry, GeometryError> {
    let (w, h) = qr.dimensions();
    if w != h {
        return Err(GeometryError::InvalidInput(
            "QR image must be square when using --modules/--quiet override",
        ));
    }
    if n == 0 {
        return Err(GeometryError::InvalidModuleCount);
    }

    let total = n + 2 * qz;
    let module_px = w as f64 / total as f64;
    let left = (qz as f64 * module_px).round() as u32;
    let right = ((qz + n) as f64 * module_px).round() as u32 - 1;

    Ok(QrGeometry {
        n_modules: n,
        qz_modules: qz,
        content_box: (left, left, right, right),
        module_px,
        thresh: 128,
        dark_is_lt: true,
    })
}

/// Infer the module grid from the bitmap itself.
pub fn detect(qr: &RgbaImage, qr_threshold: Option<u8>) -> Result<QrGeometry, GeometryError> {
    let (w, h) = qr.dimensions();
    let (w, h) = (w as usize, h as usize);
    let gray = to_gray(qr);

    let t = qr_threshold.unwrap_or_else(|| otsu_threshold(&histogram(&gray)));

    // Try both polarities and keep whichever marks more pixels as dark.
    let lt = gray.mapv(|g| g < t);
    let gt = gray.mapv(|g| g > t);
    let c_lt = lt.iter().filter(|&&v| v).count();
    let c_gt = gt.iter().filter(|&&v| v).count();
    if c_lt == 0 && c_gt == 0 {
        return Err(GeometryError::NoModulesDetected);
    }
    let use_lt = c_lt >= c_gt && c_lt > 0;
    let mut mask = if use_lt { lt } else { gt };

    let mut bbox = bounding_box(&mask);
    if bbox.is_none() {
        // Should be unreachable given the counts above; widen once and retry.
        mask = if use_lt {
            gray.mapv(|g| g < t.saturating_add(10))
        } else {
            gray.mapv(|g| g > t.saturating_sub(10))
        };
        bbox = bounding_box(&mask);
    }
    let (left, top, right, bottom) = bbox.ok_or(GeometryError::NoDarkModulesDetected)?;

    // Module size from the dark run lengths on the middle row. The shorter
    // half of the runs excludes merged runs spanning adjacent dark modules.
    let mid_y = (top + bottom) / 2;
    let mut runs: Vec<usize> = Vec::new();
    let mut cur = mask[[mid_y, left]];
    let mut cnt = 1usize;
    for x in (left + 1)..=right {
        let v = mask[[mid_y, x]];
        if v == cur {
            cnt += 1;
        } else {
            if cur {
                runs.push(cnt);
            }
            cur = v;
            cnt = 1;
        }
    }
    if cur {
        runs.push(cnt);
    }
    if runs.is_empty() {
        return Err(GeometryError::ModuleSizeUnavailable);
    }
    runs.sort_unstable();
    let lower = &runs[..(runs.len() / 2).max(1)];
    let module_px = median_sorted(lower);

    // The height-derived estimate can disagree by one after rounding; the
    // width-derived count is authoritative either way.
    let content_w = (right - left + 1) as f64;
    let n = (content_w / module_px).round() as i64;
    if n <= 0 {
        return Err(GeometryError::InvalidModuleCount);
    }

    let qz_px = left.min(top).min(w - 1 - right).min(h - 1 - bottom);
    let qz_modules = (qz_px as f64 / module_px).round().max(0.0) as u32;

    Ok(QrGeometry {
        n_modules: n as u32,
        qz_modules,
        content_box: (left as u32, top as u32, right as u32, bottom as u32),
        module_px,
        thresh: t,
        dark_is_lt: use_lt,
    })
}

fn histogram(gray: &Array2<u8>) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for &g in gray.iter() {
        hist[g as usize] += 1;
    }
    hist
}

fn bounding_box(mask: &Array2<bool>) -> Option<(usize, usize, usize, usize)> {
    let mut bbox: Option<(usize, usize, usize, usize)> = None;
    for ((y, x), &set) in mask.indexed_iter() {
        if !set {
            continue;
        }
        match &mut bbox {
            None => bbox = Some((x, y, x, y)),
            Some((l, t, r, b)) => {
                *l = (*l).min(x);
                *t = (*t).min(y);
                *r = (*r).max(x);
                *b = (*b).max(y);
            }
        }
    }
    bbox
}

fn median_sorted(xs: &[usize]) -> f64 {
    let m = xs.len() / 2;
    if xs.len() % 2 == 1 {
        xs[m] as f64
    } else {
        (xs[m - 1] + xs[m]) as f64 / 2.0
    }
}
