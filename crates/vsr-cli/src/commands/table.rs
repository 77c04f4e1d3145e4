//! Table command.
//!
//! Lists negotiated sizes for common resolutions at each scale.

use crate::TableArgs;
use anyhow::Result;
use vsr_core::{SUPPORTED_SCALES, Size, negotiate, snap_scale};

const COMMON: [(&str, Size); 8] = [
    ("min", Size::new(160, 90)),
    ("360p", Size::new(640, 360)),
    ("480p", Size::new(854, 480)),
    ("540p", Size::new(960, 540)),
    ("720p", Size::new(1280, 720)),
    ("1080p", Size::new(1920, 1080)),
    ("1440p", Size::new(2560, 1440)),
    ("2160p", Size::new(3840, 2160)),
];

pub fn run(args: TableArgs) -> Result<()> {
    let scales = if args.scales.is_empty() {
        SUPPORTED_SCALES.to_vec()
    } else {
        args.scales
            .iter()
            .map(|raw| super::scale_arg(raw).map(snap_scale))
            .collect::<Result<Vec<_>>>()?
    };

    let mut rows: Vec<(String, Size)> = COMMON
        .iter()
        .map(|(name, size)| ((*name).to_string(), *size))
        .collect();
    rows.extend(args.extra.iter().map(|size| (size.to_string(), *size)));

    println!(
        "{:<10} {:>7}  {:>11}  {:>11}  {:>8}  flags",
        "frame", "scale", "input", "output", "accepted"
    );
    for &scale in &scales {
        for (name, size) in &rows {
            let n = negotiate(*size, scale);
            let mut flags = String::new();
            if n.was_promoted() {
                flags.push('P');
            }
            if !n.uniform {
                flags.push('!');
            }
            println!(
                "{:<10} {:>6.3}x  {:>11}  {:>11}  {:>7.3}x  {}",
                name,
                scale,
                n.input.to_string(),
                n.output.to_string(),
                n.scale,
                flags
            );
        }
    }
    println!();
    println!("P = promoted to a larger scale, ! = non-uniform output");

    Ok(())
}
