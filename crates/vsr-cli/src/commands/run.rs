//! Run command.
//!
//! Feeds synthetic gradient frames through the CPU backend and reports
//! timing, kernel reloads and device memory use.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::RunArgs;
use anyhow::{Context, Result};
use tracing::{debug, info};
use vsr_compute::{CpuAccelerator, CpuTexture, FrameTexture, ReferenceKernel, format_bytes};
use vsr_effect::{EffectConfig, SuperResolution};

pub fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let scale = super::scale_arg(&args.scale)?;
    let accel = Arc::new(match args.budget_mb {
        Some(mb) => CpuAccelerator::with_budget(mb * 1024 * 1024),
        None => CpuAccelerator::new(),
    });

    let config = EffectConfig::from_env()
        .with_strength(args.strength)
        .with_scale(scale);
    let mut effect = SuperResolution::new(Arc::clone(&accel), ReferenceKernel::new(), config)
        .context("Failed to create effect")?;

    let sizes = [args.size, args.alternate.unwrap_or(args.size)];
    let mut total = Duration::ZERO;
    let mut slowest = Duration::ZERO;

    for i in 0..args.frames {
        let size = sizes[(i % 2) as usize];
        let frame = CpuTexture::gradient(size.width, size.height, i);

        let start = Instant::now();
        let output = effect
            .process(&frame)
            .with_context(|| format!("Frame {i} failed"))?;
        let elapsed = start.elapsed();
        total += elapsed;
        slowest = slowest.max(elapsed);

        if verbose {
            let (w, h) = output.dimensions();
            debug!(frame = i, input = %size, output = %format!("{w}x{h}"), ?elapsed, "frame done");
        }
    }

    if let Some(n) = effect.negotiation() {
        println!("Negotiated: {n}");
    }
    println!("Frames:     {}", effect.frames_processed());
    println!("Loads:      {}", effect.loads());
    if args.frames > 0 {
        let avg = total / args.frames;
        let fps = args.frames as f64 / total.as_secs_f64().max(f64::EPSILON);
        println!("Average:    {avg:.2?} ({fps:.1} fps)");
        println!("Slowest:    {slowest:.2?}");
    }

    let mem = accel.memory();
    println!("Buffers:    {}", format_bytes(effect.buffers().total_bytes()));
    println!("Peak:       {}", format_bytes(mem.peak));
    if mem.limit > 0 {
        println!("Budget:     {}", format_bytes(mem.limit));
    }

    effect.destroy();
    info!(remaining = %format_bytes(accel.memory().current), "effect destroyed");
    Ok(())
}
