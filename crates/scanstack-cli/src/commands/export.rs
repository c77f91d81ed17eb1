use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use image::{GrayImage, Luma};
use indicatif::{ProgressBar, ProgressStyle};
use scanstack_core::resolver::FrameSelection;
use scanstack_core::stack::ImageStack;

#[derive(Args)]
pub struct ExportArgs {
    /// Directory holding the acquisition files
    pub dir: PathBuf,

    /// Shared filename prefix of the acquisition
    pub stem: String,

    /// File extension to match
    #[arg(long, default_value = "tif")]
    pub extension: String,

    /// First frame to export
    #[arg(long, default_value = "0")]
    pub start: i64,

    /// One past the last frame (defaults to the end of the stack)
    #[arg(long)]
    pub stop: Option<i64>,

    /// Step between exported frames
    #[arg(long, default_value = "1")]
    pub step: i64,

    /// Channel to export
    #[arg(long, default_value = "0")]
    pub channel: usize,

    /// Plane to export
    #[arg(long, default_value = "0")]
    pub plane: usize,

    /// Output directory for the exported PNGs
    #[arg(long, default_value = "frames")]
    pub output: PathBuf,
}

pub fn run(args: &ExportArgs) -> Result<()> {
    let mut stack = ImageStack::open(&args.dir, &args.stem, &args.extension)?;
    stack.set_channel(args.channel);
    stack.set_plane(args.plane);

    let selection = FrameSelection::range(args.start, args.stop, args.step);
    let data = stack.read(&selection)?;
    let (height, width, count) = data.dim();

    std::fs::create_dir_all(&args.output)?;
    let pb = ProgressBar::new(count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Writing frames");

    // Stretch the signed samples over the 8-bit display range once for the
    // whole batch, so exported frames stay comparable.
    let (mut lo, mut hi) = (i16::MAX, i16::MIN);
    for &v in data.iter() {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    let span = (hi as f32 - lo as f32).max(1.0);

    for slot in 0..count {
        let mut img = GrayImage::new(width as u32, height as u32);
        for row in 0..height {
            for col in 0..width {
                let v = (data[[row, col, slot]] as f32 - lo as f32) / span;
                img.put_pixel(col as u32, row as u32, Luma([(v * 255.0) as u8]));
            }
        }
        img.save(args.output.join(format!("frame_{slot:05}.png")))?;
        pb.set_position(slot as u64 + 1);
    }
    pb.finish_with_message(format!("Wrote {count} frames to {}", args.output.display()));

    Ok(())
}
