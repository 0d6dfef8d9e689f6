use quadreg_cli::QuadTracker;
use quadreg_core::{GrayImage, Quad};
use quadreg_solver::SolverConfig;
use std::time::Instant;

fn pattern(x: usize, y: usize) -> u8 {
    let v = 0.5
        + 0.22 * (x as f64 * 0.045).sin()
        + 0.22 * (y as f64 * 0.06).cos()
        + 0.06 * ((x + 2 * y) as f64 * 0.023).sin();
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn synth_image(width: usize, height: usize, dx: i64, dy: i64) -> GrayImage<u8> {
    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let sx = (x as i64 - dx).max(0) as usize;
            let sy = (y as i64 - dy).max(0) as usize;
            img.set_pixel(x, y, pattern(sx, sy));
        }
    }
    img
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Dense Quad Registration Demo");
    println!("============================\n");

    let width = 320;
    let height = 240;
    let quad = Quad::rect(80.0f32, 60.0, 128, 96);
    let reference = synth_image(width, height, 0, 0);
    println!("Synthetic reference frame: {}x{}", width, height);

    // Demo 1: preset comparison on a fixed shift
    println!("\nDemo 1: Preset comparison");
    println!("-------------------------");

    let shift = (4i64, 3i64);
    let target = synth_image(width, height, shift.0, shift.1);
    let expected = quad.translated(shift.0 as f32, shift.1 as f32);

    let presets = vec![
        ("Default", SolverConfig::new(128, 96)),
        ("Fast", SolverConfig::fast_preset(128, 96)),
        ("Precise", SolverConfig::precise_preset(128, 96)),
    ];

    for (name, config) in presets {
        let mut tracker = QuadTracker::with_config(config)?;
        tracker.set_reference(&reference, &quad)?;

        let start = Instant::now();
        let refined = tracker.track(&target, &quad)?;
        let elapsed = start.elapsed();

        println!(
            "  {}: {:.2?}, corner error {:.4} px",
            name,
            elapsed,
            refined.max_corner_distance(&expected)
        );
    }

    // Demo 2: tracking a drifting target across frames
    println!("\nDemo 2: Frame-to-frame tracking");
    println!("-------------------------------");

    let mut tracker = QuadTracker::new(&quad)?;
    tracker.set_reference(&reference, &quad)?;

    let mut estimate = quad;
    for frame in 1..=5 {
        let dx = frame as i64 * 2;
        let dy = frame as i64;
        let target = synth_image(width, height, dx, dy);

        estimate = tracker.track(&target, &estimate)?;
        let expected = quad.translated(dx as f32, dy as f32);
        println!(
            "  frame {}: shift ({}, {}), corner error {:.4} px",
            frame,
            dx,
            dy,
            estimate.max_corner_distance(&expected)
        );
    }

    // Demo 3: configuration serialization (if serde is enabled)
    #[cfg(feature = "serde")]
    {
        println!("\nDemo 3: Configuration serialization");
        println!("-----------------------------------");

        let config = SolverConfig::precise_preset(128, 96)
            .with_metadata("Demo", "Precise preset for the tracking demo");
        let json = config.to_json()?;
        println!("  JSON size: {} bytes", json.len());
        let back = SolverConfig::from_json(&json)?;
        println!("  Round-tripped: {}", back.summary());
    }

    #[cfg(not(feature = "serde"))]
    println!("\nDemo 3 skipped: enable with --features=serde");

    println!("\nDemo completed");
    Ok(())
}
