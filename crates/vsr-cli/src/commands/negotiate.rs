//! Negotiate command.
//!
//! Prints the kernel input and output sizes chosen for one frame.

use crate::NegotiateArgs;
use anyhow::Result;
use vsr_core::{bounds_for_scale, negotiate, snap_scale};

pub fn run(args: NegotiateArgs, verbose: bool) -> Result<()> {
    let requested = super::scale_arg(&args.scale)?;
    let snapped = snap_scale(requested);
    let n = negotiate(args.size, snapped);

    println!("Frame:      {}", args.size);
    println!("Requested:  {requested:.4}x (snapped to {snapped:.4}x)");
    println!("Input:      {}", n.input);
    println!("Output:     {}", n.output);
    println!("Scale:      {:.4}x", n.scale);

    if n.was_promoted() {
        println!("  promoted from {:.4}x for an exact output size", n.requested);
    }
    if !n.uniform {
        println!("  warning: output is not an exact multiple on both axes");
    }

    if verbose {
        let bounds = bounds_for_scale(n.scale);
        println!("Bounds:     {} .. {}", bounds.min, bounds.max);
        let ratio = |w: u32, h: u32| w as f64 / h.max(1) as f64;
        println!(
            "Aspect:     {:.4} -> {:.4}",
            ratio(args.size.width, args.size.height),
            ratio(n.input.width, n.input.height)
        );
    }

    Ok(())
}
