use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use scanstack_core::stack::{ImageStack, StackOptions};

#[derive(Args)]
pub struct InfoArgs {
    /// Directory holding the acquisition files
    pub dir: PathBuf,

    /// Shared filename prefix of the acquisition
    pub stem: String,

    /// File extension to match
    #[arg(long, default_value = "tif")]
    pub extension: String,

    /// Calibration TOML file
    #[arg(long)]
    pub calibration: Option<PathBuf>,

    /// Excitation wavelength for the laser power lookup (nm)
    #[arg(long, default_value = "910")]
    pub wavelength: u32,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let options = StackOptions {
        calibration: args.calibration.clone(),
        ..StackOptions::default()
    };
    let stack = ImageStack::open_with(&args.dir, &args.stem, &args.extension, options)?;

    let (height, width) = stack.resolution();
    println!("Files:       {}", stack.files().len());
    println!("Resolution:  {}x{}", width, height);
    println!("Frames:      {}", stack.num_frames());
    if stack.declared_frames() != stack.num_frames() {
        println!("Declared:    {}", stack.declared_frames());
    }
    println!("Planes:      {}", stack.num_planes());
    println!("Channels:    {}", stack.num_channels());

    if let Some(zoom) = stack.zoom() {
        println!("Zoom:        {zoom} x");
        println!("FOV:         {:.1} um", stack.fov_size_um());
        println!("Pixel size:  {:.3} um", stack.pixel_size_um());
    }
    if let Some(rate) = stack.frame_rate() {
        println!("Frame rate:  {rate} Hz");
    }
    if let Some(step) = stack.z_step_um() {
        println!("Z step:      {step} um");
    }
    if let Some(position) = stack.position_um() {
        println!("Position:    {position:?} um");
    }
    if let Some(gains) = stack.channel_gains() {
        println!("Gains:       {gains:?}");
    }
    if let Some(percent) = stack.laser_power_percent() {
        println!(
            "Laser power: {percent}% ({:.4} W at {} nm)",
            stack.laser_power_watts(args.wavelength),
            args.wavelength
        );
    }
    if let Some(timestamp) = stack.timestamp() {
        println!("Started:     {timestamp}");
    }
    if let Some(stem) = stack.file_stem() {
        println!("Logged as:   {stem}");
    }

    Ok(())
}
