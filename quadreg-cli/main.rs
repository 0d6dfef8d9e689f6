use image::{ImageReader, Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use log::info;
use quadreg_annot::{parse_annot_file, write_annot_file};
use quadreg_cli::{from_luma8, QuadTracker};
use quadreg_core::Quad;
use std::time::Instant;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        eprintln!(
            "Usage: {} <ref_image> <ref_annot> <target_image> <target_init_annot>",
            args.first().map(String::as_str).unwrap_or("quadreg")
        );
        std::process::exit(1);
    }

    // Load grayscale images
    let reference = ImageReader::open(&args[1])
        .expect("Reference image not found")
        .decode()
        .expect("Reference decode failed")
        .to_luma8();
    let target_luma = ImageReader::open(&args[3])
        .expect("Target image not found")
        .decode()
        .expect("Target decode failed")
        .to_luma8();

    let reference_quad: Quad<f32> =
        parse_annot_file(&args[2]).expect("Failed to parse reference annotation");
    let initial_quad: Quad<f32> =
        parse_annot_file(&args[4]).expect("Failed to parse target annotation");

    let ref_img = from_luma8(&reference);
    let target_img = from_luma8(&target_luma);

    let mut tracker = QuadTracker::new(&reference_quad).expect("Failed to initialize tracker");
    tracker
        .set_reference(&ref_img, &reference_quad)
        .expect("Failed to capture reference template");
    if let Some(cfg) = tracker.config() {
        info!("{}", cfg.summary());
    }

    // Time the refinement
    let t0 = Instant::now();
    let refined = tracker
        .track(&target_img, &initial_quad)
        .expect("Registration failed");
    let elapsed = t0.elapsed();

    println!("Time taken: {:.2?}", elapsed);
    println!("Refined corners:");
    for (label, p) in ["A", "B", "C", "D"].iter().zip(&refined.pts) {
        println!("  {}: ({:.3}, {:.3})", label, p[0], p[1]);
    }

    let annot_out = format!("{}.refined", args[4]);
    write_annot_file(&annot_out, &refined).expect("Failed to write refined annotation");
    println!("Saved refined annotation as {}", annot_out);

    // Draw initial (blue) and refined (red) quads on the target frame
    let mut output: RgbaImage = image::DynamicImage::ImageLuma8(target_luma).into_rgba8();
    draw_quad(&mut output, &initial_quad, Rgba([0, 0, 255, 255]));
    draw_quad(&mut output, &refined, Rgba([255, 0, 0, 255]));

    let overlay_out = format!("{}.overlay.png", args[3]);
    output
        .save(&overlay_out)
        .expect("Failed to save overlay image");
    println!("Saved overlay image as {}", overlay_out);
}

fn draw_quad(img: &mut RgbaImage, quad: &Quad<f32>, color: Rgba<u8>) {
    for i in 0..4 {
        let p = quad.pts[i];
        let q = quad.pts[(i + 1) % 4];
        draw_line_segment_mut(img, (p[0], p[1]), (q[0], q[1]), color);
    }
}
