mod args;
mod color;
mod geometry;
mod luma;
mod overlay;

use anyhow::Result;
use args::Args;
use clap::Parser;
use overlay::OverlayConfig;

fn main() -> Result<()> {
    let args = Args::parse();

    if !(0.05..=0.95).contains(&args.square_frac) {
        return Err(anyhow::anyhow!(
            "--square_frac should be between 0.05 and 0.95"
        ));
    }

    println!("Loading QR image: {}", args.qr.display());
    let qr = image::open(&args.qr)?.to_rgba8();

    println!("Loading logo image: {}", args.logo.display());
    let logo = image::open(&args.logo)?.to_rgba8();

    let geo = match (args.modules, args.quiet) {
        (Some(n), Some(qz)) => geometry::from_exact_dims(&qr, n, qz)?,
        _ => geometry::detect(&qr, args.threshold_qr)?,
    };

    if args.no_skip_finders {
        // Accepted for compatibility; finder modules are always drawn
        // full-size regardless.
        println!("Note: --no_skip_finders currently has no effect.");
    }

    let cfg = OverlayConfig {
        square_frac: args.square_frac,
        radius: args.radius,
        threshold_logo: args.threshold_logo,
        alpha: args.alpha,
    };
    let out = overlay::build_overlay(&qr, &logo, &geo, &cfg);
    out.save(&args.out)?;

    println!("Saved overlay: {}", args.out.display());
    println!(
        "Detected: n={} modules, qz={} quiet",
        geo.n_modules, geo.qz_modules
    );
    if args.modules.is_some() {
        println!("Using override n={}", geo.n_modules);
    }
    if args.quiet.is_some() {
        println!("Using override qz={}", geo.qz_modules);
    }

    Ok(())
}
