use scanstack_core::header::{parse_header, AcquisitionHeader};

const FULL_HEADER: &str = "\
scanimage.SI4.acqNumFrames = 100\n\
scanimage.SI4.beamPowers = 15.5\n\
scanimage.SI4.channelsSave = [1;2]\n\
scanimage.SI4.fastZNumVolumes = 40\n\
scanimage.SI4.linesPerFrame = 512\n\
scanimage.SI4.loggingFileStem = 'O03_20200218_005'\n\
scanimage.SI4.loggingFramesPerFile = 50\n\
scanimage.SI4.motorPosition = [123.4 -56.25 -180]\n\
scanimage.SI4.pixelsPerLine = 512\n\
scanimage.SI4.pmtGain = [0.8 0.85]\n\
scanimage.SI4.scanFrameRate = 15.21\n\
scanimage.SI4.scanZoomFactor = 2\n\
scanimage.SI4.stackNumSlices = 4\n\
scanimage.SI4.stackZEndPos = -200\n\
scanimage.SI4.stackZStartPos = -180.0\n\
scanimage.SI4.stackZStepSize = 5.0\n\
scanimage.SI4.triggerClockTimeFirst = '18-02-2020 13:11:05.372'\n";

#[test]
fn test_parse_full_header() {
    let header = parse_header(FULL_HEADER);
    assert_eq!(header.frames_acquired, Some(100));
    assert_eq!(header.beam_powers, Some(15.5));
    assert_eq!(header.channels_save, Some(vec![1, 2]));
    assert_eq!(header.fast_z_num_volumes, Some(40));
    assert_eq!(header.lines_per_frame, Some(512));
    assert_eq!(header.file_stem.as_deref(), Some("O03_20200218_005"));
    assert_eq!(header.frames_per_file, Some(50));
    assert_eq!(header.motor_position, Some(vec![123.4, -56.25, -180.0]));
    assert_eq!(header.pixels_per_line, Some(512));
    assert_eq!(header.channel_gains, Some(vec![0.8, 0.85]));
    assert_eq!(header.scan_frame_rate, Some(15.21));
    assert_eq!(header.stack_num_slices, Some(4));
    assert_eq!(header.stack_z_end_pos, Some(-200.0));
    assert_eq!(header.stack_z_start_pos, Some(-180.0));
    assert_eq!(header.stack_z_step_size, Some(5.0));
    assert_eq!(
        header.trigger_clock_time_first.as_deref(),
        Some("18-02-2020 13:11:05.372")
    );
}

#[test]
fn test_float_without_fractional_part() {
    let header = parse_header(FULL_HEADER);
    assert_eq!(header.scan_zoom_factor, Some(2.0));
}

#[test]
fn test_missing_fields_parse_as_none() {
    let text = "scanimage.SI4.stackNumSlices = 4\nscanimage.SI4.scanZoomFactor = 1.5\n";
    let header = parse_header(text);
    assert_eq!(header.stack_num_slices, Some(4));
    assert_eq!(header.scan_zoom_factor, Some(1.5));
    assert_eq!(header.channels_save, None);
    assert_eq!(header.frames_acquired, None);
    assert_eq!(header.motor_position, None);
    assert_eq!(header.file_stem, None);
}

#[test]
fn test_empty_header_is_all_absent() {
    assert_eq!(parse_header(""), AcquisitionHeader::default());
}

#[test]
fn test_channels_save_bare_integer() {
    let header = parse_header("scanimage.SI4.channelsSave = 2\n");
    assert_eq!(header.channels_save, Some(vec![2]));
}

#[test]
fn test_channels_save_bracketed_list() {
    let header = parse_header("scanimage.SI4.channelsSave = [1;2;3]\n");
    assert_eq!(header.channels_save, Some(vec![1, 2, 3]));
}

#[test]
fn test_channels_save_list_with_spaces() {
    let header = parse_header("scanimage.SI4.channelsSave = [1; 2; 4]\n");
    assert_eq!(header.channels_save, Some(vec![1, 2, 4]));
}

#[test]
fn test_garbled_field_is_absent_without_blocking_others() {
    let text = "scanimage.SI4.stackNumSlices = many\nscanimage.SI4.acqNumFrames = 250\n";
    let header = parse_header(text);
    assert_eq!(header.stack_num_slices, None);
    assert_eq!(header.frames_acquired, Some(250));
}

#[test]
fn test_motor_position_four_axes() {
    let header = parse_header("scanimage.SI4.motorPosition = [1.5 -2 3.25 400]\n");
    assert_eq!(header.motor_position, Some(vec![1.5, -2.0, 3.25, 400.0]));
}

#[test]
fn test_quoted_string_keeps_inner_text_only() {
    let header = parse_header("scanimage.SI4.loggingFileStem = 'M12_run_003'\n");
    assert_eq!(header.file_stem.as_deref(), Some("M12_run_003"));
}
