//! Free-text acquisition header parsing.
//!
//! ScanImage embeds its acquisition metadata as a `key = value` text block in
//! the first frame of every file it writes. Each recognized field is matched
//! independently against that text; a field the header does not carry parses
//! as `None` without affecting any other field.

use once_cell::sync::Lazy;
use regex::Regex;

/// Typed view of a ScanImage acquisition header.
///
/// Parsed once from the first file of a stack and immutable afterward.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AcquisitionHeader {
    /// `stackNumSlices` — number of Z slices in a stack acquisition.
    pub stack_num_slices: Option<u32>,
    /// `scanZoomFactor` — optical zoom of the scan.
    pub scan_zoom_factor: Option<f64>,
    /// `scanFrameRate` — frame rate in Hz.
    pub scan_frame_rate: Option<f64>,
    /// `channelsSave` — identifiers of the channels written to disk.
    pub channels_save: Option<Vec<u32>>,
    /// `fastZNumVolumes` — volume count of a fast-Z acquisition.
    pub fast_z_num_volumes: Option<u64>,
    /// `acqNumFrames` — frame count the acquisition was configured for.
    pub frames_acquired: Option<u64>,
    /// `stackZStepSize` — Z step between planes, micrometers.
    pub stack_z_step_size: Option<f64>,
    /// `stackZStartPos` — Z position of the first plane.
    pub stack_z_start_pos: Option<f64>,
    /// `stackZEndPos` — Z position of the last plane.
    pub stack_z_end_pos: Option<f64>,
    /// `loggingFramesPerFile` — frames written per file before rolling over.
    pub frames_per_file: Option<u64>,
    /// `beamPowers` — beam power as a percentage.
    pub beam_powers: Option<f64>,
    /// `loggingFileStem` — file stem the acquisition was logged under.
    pub file_stem: Option<String>,
    /// `triggerClockTimeFirst` — wall-clock time of the first trigger.
    pub trigger_clock_time_first: Option<String>,
    /// `motorPosition` — stage position vector, micrometers.
    pub motor_position: Option<Vec<f64>>,
    /// `pmtGain` — per-channel detector gains.
    pub channel_gains: Option<Vec<f64>>,
    /// `linesPerFrame` — scan lines per frame (image height).
    pub lines_per_frame: Option<u32>,
    /// `pixelsPerLine` — pixels per scan line (image width).
    pub pixels_per_line: Option<u32>,
}

struct FieldPatterns {
    stack_num_slices: Regex,
    scan_zoom_factor: Regex,
    scan_frame_rate: Regex,
    channels_save: Regex,
    fast_z_num_volumes: Regex,
    frames_acquired: Regex,
    stack_z_step_size: Regex,
    stack_z_start_pos: Regex,
    stack_z_end_pos: Regex,
    frames_per_file: Regex,
    beam_powers: Regex,
    file_stem: Regex,
    trigger_clock_time_first: Regex,
    motor_position: Regex,
    channel_gains: Regex,
    lines_per_frame: Regex,
    pixels_per_line: Regex,
}

static PATTERNS: Lazy<FieldPatterns> = Lazy::new(|| FieldPatterns {
    stack_num_slices: int_field("stackNumSlices"),
    scan_zoom_factor: float_field("scanZoomFactor"),
    scan_frame_rate: float_field("scanFrameRate"),
    // Bare integer or a bracketed semicolon list, depending on how many
    // channels were saved.
    channels_save: Regex::new(r"channelsSave = (\[[^\]]*\]|\d+)").expect("valid regex"),
    fast_z_num_volumes: int_field("fastZNumVolumes"),
    frames_acquired: int_field("acqNumFrames"),
    stack_z_step_size: float_field("stackZStepSize"),
    stack_z_start_pos: float_field("stackZStartPos"),
    stack_z_end_pos: float_field("stackZEndPos"),
    frames_per_file: int_field("loggingFramesPerFile"),
    beam_powers: float_field("beamPowers"),
    file_stem: string_field("loggingFileStem"),
    trigger_clock_time_first: string_field("triggerClockTimeFirst"),
    motor_position: vector_field("motorPosition"),
    channel_gains: vector_field("pmtGain"),
    lines_per_frame: int_field("linesPerFrame"),
    pixels_per_line: int_field("pixelsPerLine"),
});

fn int_field(key: &str) -> Regex {
    Regex::new(&format!(r"{key} = (\d+)")).expect("valid regex")
}

fn float_field(key: &str) -> Regex {
    // The fractional part is optional: some headers log whole numbers bare.
    Regex::new(&format!(r"{key} = (-?\d+(?:\.\d+)?)")).expect("valid regex")
}

fn string_field(key: &str) -> Regex {
    Regex::new(&format!(r"{key} = '([^']*)'")).expect("valid regex")
}

fn vector_field(key: &str) -> Regex {
    Regex::new(&format!(r"{key} = \[([^\]]*)\]")).expect("valid regex")
}

/// Extract every recognized field from a raw header text.
///
/// Never fails: a field whose pattern does not match is `None`.
pub fn parse_header(text: &str) -> AcquisitionHeader {
    let p = &*PATTERNS;
    AcquisitionHeader {
        stack_num_slices: field(&p.stack_num_slices, text),
        scan_zoom_factor: field(&p.scan_zoom_factor, text),
        scan_frame_rate: field(&p.scan_frame_rate, text),
        channels_save: capture(&p.channels_save, text).and_then(channel_list),
        fast_z_num_volumes: field(&p.fast_z_num_volumes, text),
        frames_acquired: field(&p.frames_acquired, text),
        stack_z_step_size: field(&p.stack_z_step_size, text),
        stack_z_start_pos: field(&p.stack_z_start_pos, text),
        stack_z_end_pos: field(&p.stack_z_end_pos, text),
        frames_per_file: field(&p.frames_per_file, text),
        beam_powers: field(&p.beam_powers, text),
        file_stem: capture(&p.file_stem, text).map(str::to_string),
        trigger_clock_time_first: capture(&p.trigger_clock_time_first, text).map(str::to_string),
        motor_position: vector(&p.motor_position, text),
        channel_gains: vector(&p.channel_gains, text),
        lines_per_frame: field(&p.lines_per_frame, text),
        pixels_per_line: field(&p.pixels_per_line, text),
    }
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .map(|c| c.get(1).expect("pattern has one capture group").as_str())
}

fn field<T: std::str::FromStr>(re: &Regex, text: &str) -> Option<T> {
    capture(re, text).and_then(|raw| raw.parse().ok())
}

fn vector(re: &Regex, text: &str) -> Option<Vec<f64>> {
    capture(re, text)?
        .split_whitespace()
        .map(|v| v.parse().ok())
        .collect()
}

/// Normalize the two textual forms of the saved-channel field — a bare
/// integer (`2`) or a bracketed semicolon list (`[1;2;3]`) — to one
/// canonical list.
fn channel_list(raw: &str) -> Option<Vec<u32>> {
    match raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        Some(inner) => inner.split(';').map(|v| v.trim().parse().ok()).collect(),
        None => raw.trim().parse().ok().map(|channel| vec![channel]),
    }
}
