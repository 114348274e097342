use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "overlay-qr")]
#[command(about = "Generate a logo-colored mini-square QR overlay (transparent background)")]
pub struct Args {
    /// Path to QR code image (upright, generated)
    #[arg(long)]
    pub qr: PathBuf,

    /// Path to logo image
    #[arg(long)]
    pub logo: PathBuf,

    /// Output PNG path (transparent)
    #[arg(long, default_value = "qr_overlay.png")]
    pub out: PathBuf,

    /// Override module count (content only); active only together with --quiet
    #[arg(long)]
    pub modules: Option<u32>,

    /// Override quiet-zone size (modules, per side); default: auto-detect
    #[arg(long)]
    pub quiet: Option<u32>,

    /// Mini-square size as fraction of module side (0.05..0.95)
    #[arg(long = "square_frac", default_value = "0.25")]
    pub square_frac: f64,

    /// Search radius (modules) for color fallback, nearest center wins
    #[arg(long, default_value = "2")]
    pub radius: u32,

    /// Luminance threshold for logo dark/light (0..255)
    #[arg(long = "threshold_logo", default_value = "145")]
    pub threshold_logo: u8,

    /// Optional fixed QR threshold; default uses Otsu
    #[arg(long = "threshold_qr")]
    pub threshold_qr: Option<u8>,

    /// Alpha for overlay squares (0..255)
    #[arg(long, default_value = "255")]
    pub alpha: u8,

    /// If set, DO NOT skip finder patterns
    #[arg(long = "no_skip_finders")]
    pub no_skip_finders: bool,
}
