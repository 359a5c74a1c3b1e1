use pretty_assertions::assert_eq;
use tempfile::tempdir;
use trailpak::converter::{MidiExportOptions, indexed_to_png_bytes, sequence_to_midi_bytes};
use trailpak::formats::pcx::rle::{decode_scanline, encode_scanline};
use trailpak::formats::pcx::{ENCODING_RLE, HEADER_PALETTE_SIZE, PcxHeader, VERSION};
use trailpak::prelude::*;

const ROW_SIZE: usize = 26;
const ROW_LENGTH_FIELD: usize = 18;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn sixteen_color_image() -> (PixelBuffer, Palette, Vec<u8>) {
    let pixels = PixelBuffer {
        width: 4,
        height: 4,
        bytes_per_scanline: 0,
        indices: (0..16).collect(),
    };
    let palette = Palette {
        colors: (0..16u8).map(|i| Rgb::new(i * 16, 255 - i * 16, i)).collect(),
    };
    let bytes = encode_image(ImageVariant::Colors16, &pixels, &palette).unwrap();
    (pixels, palette, bytes)
}

/// 4x4 16-color image, 8 bits x 1 plane, each scan line one solid run
fn solid_run_image(rows: [u8; 4]) -> Vec<u8> {
    let mut header_palette = [0u8; HEADER_PALETTE_SIZE];
    for (i, rgb) in header_palette.chunks_exact_mut(3).enumerate() {
        rgb.fill(i as u8 * 17);
    }
    let header = PcxHeader {
        version: VERSION,
        encoding: ENCODING_RLE,
        bits_per_pixel: 8,
        x_min: 0,
        y_min: 0,
        x_max: 3,
        y_max: 3,
        h_dpi: 0,
        v_dpi: 0,
        header_palette,
        planes: 1,
        bytes_per_line: 4,
        palette_type: 1,
    };
    let mut data = header.to_bytes().to_vec();
    for value in rows {
        data.extend_from_slice(&[0xC4, value]);
    }
    data
}

fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn container(tag: &[u8; 4], kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let mut body = kind.to_vec();
    for child in children {
        body.extend_from_slice(child);
    }
    chunk(tag, &body)
}

/// One-song XMIDI file around an event stream
fn xmi(events: &[u8]) -> Vec<u8> {
    let mut data = container(b"FORM", b"XDIR", &[chunk(b"INFO", &1u16.to_le_bytes())]);
    let song = container(b"FORM", b"XMID", &[chunk(b"EVNT", events)]);
    data.extend(container(b"CAT ", b"XMID", &[song]));
    data
}

fn single_song(data: &[u8]) -> MusicSequence {
    let asset = transcode(data, &XmiOptions::default()).unwrap();
    assert_eq!(asset.songs.len(), 1);
    asset.songs[0].sequence().unwrap().clone()
}

#[test]
fn test_two_entry_archive_with_truncated_row() {
    init_tracing();
    let image = solid_run_image([1, 5, 9, 15]);
    assert_eq!(image.len(), 128 + 8);
    let mut data = GxlWriter::new()
        .with_label("TEST")
        .with_file("WAGON.16", image)
        .with_file("LOST.PC8", vec![0; 8])
        .to_bytes()
        .unwrap();
    let length_at = trailpak::gxl::HEADER_SIZE + ROW_SIZE + ROW_LENGTH_FIELD;
    data[length_at..length_at + 4].copy_from_slice(&100_000u32.to_le_bytes());

    let table = parse_archive(&data).unwrap();
    assert_eq!(table.entries.len(), 2);
    assert_eq!(table.diagnostics.len(), 1);

    let report = convert_archive(&data, &ConversionOptions::full()).unwrap();
    assert_eq!(report.outcomes.len(), 2);

    let image = report.outcomes[0]
        .result
        .asset()
        .and_then(ConvertedAsset::as_image)
        .unwrap();
    assert_eq!((image.width(), image.height()), (4, 4));
    assert_eq!(
        image.pixels.indices,
        vec![
            1, 1, 1, 1, //
            5, 5, 5, 5, //
            9, 9, 9, 9, //
            15, 15, 15, 15,
        ]
    );
    assert_eq!(image.palette.get(15), Some(Rgb::new(255, 255, 255)));

    assert!(matches!(
        report.outcomes[1].result.skip_reason(),
        Some(SkipReason::Diagnostic(DiagnosticKind::TruncatedEntry {
            length: 100_000,
            ..
        }))
    ));
    assert_eq!(report.outcomes[1].checksum, None);
}

#[test]
fn test_planar_image_in_archive() {
    let (pixels, _, image) = sixteen_color_image();
    let data = GxlWriter::new().with_file("MAP.16", image).to_bytes().unwrap();
    let report = convert_archive(&data, &ConversionOptions::full()).unwrap();
    let decoded = report.outcomes[0]
        .result
        .asset()
        .and_then(ConvertedAsset::as_image)
        .unwrap();
    assert_eq!(decoded.pixels.indices, pixels.indices);
}

#[test]
fn test_archive_roundtrip_through_disk() {
    init_tracing();
    let (_, _, image) = sixteen_color_image();
    let dir = tempdir().unwrap();
    let path = dir.path().join("TEST.GXL");
    GxlWriter::new()
        .with_file("A.16", image.clone())
        .with_file("B.TXT", b"trail".to_vec())
        .write(&path)
        .unwrap();

    let reader = GxlReader::open(&path).unwrap();
    assert_eq!(reader.list(), vec!["A.16".to_string(), "B.TXT".to_string()]);
    assert_eq!(reader.read_file_bytes("a.16").unwrap(), image.as_slice());

    let report = convert_archive_file(&path, &ConversionOptions::full()).unwrap();
    assert_eq!(report.success_count(), 1);
    assert!(report.integrity.is_clean());
}

#[test]
fn test_parallel_and_sequential_agree() {
    let (_, _, image) = sixteen_color_image();
    let mut writer = GxlWriter::new();
    for i in 0..12 {
        writer = writer.with_file(format!("IMG{i}.16"), image.clone());
    }
    writer = writer.with_file("SONG.XMI", xmi(&[0x90, 0x3C, 0x40, 0x10, 0xFF, 0x2F, 0x00]));
    let data = writer.to_bytes().unwrap();

    let parallel = convert_archive(&data, &ConversionOptions::full()).unwrap();
    let sequential =
        convert_archive(&data, &ConversionOptions::full().with_parallel(false)).unwrap();

    let summarize_outcomes = |report: &ConversionReport| {
        report
            .outcomes
            .iter()
            .map(|o| (o.index, o.name.clone(), o.checksum.clone(), o.result.asset().cloned()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summarize_outcomes(&parallel), summarize_outcomes(&sequential));
    assert_eq!(parallel.success_count(), 13);
}

#[test]
fn test_delay_sum_example() {
    let sequence = single_song(&xmi(&[
        0xC1, 0x71, 0xC2, 0x71, 0x0A, 0xC3, 0x72, 0x7F, 0x22, 0xC4, 0x00, 0xFF, 0x2F, 0x00,
    ]));
    let ticks: Vec<u64> = sequence.events.iter().map(|e| e.tick).collect();
    assert_eq!(ticks, vec![0, 0, 10, 171]);
    assert_eq!(sequence.events[3].delay_ticks, 161);
}

#[test]
fn test_note_off_synthesized_after_duration() {
    let sequence = single_song(&xmi(&[
        0x64, // delay 100
        0x90, 0x3C, 0x40, 0x83, 0x60, // note on, duration 480
        0x7F, 0x49, // delay 200
        0xB0, 0x07, 0x64, // volume at 300
        0x7F, 0x7F, 0x2E, // delay 300
        0xC0, 0x05, // program change at 600
        0xFF, 0x2F, 0x00,
    ]));

    let timeline: Vec<(u64, &str)> = sequence
        .events
        .iter()
        .map(|e| {
            let kind = match e.event {
                MusicEvent::NoteOn { .. } => "on",
                MusicEvent::NoteOff { .. } => "off",
                MusicEvent::ControllerChange { .. } => "cc",
                MusicEvent::ProgramChange { .. } => "program",
                _ => "other",
            };
            (e.tick, kind)
        })
        .collect();
    assert_eq!(
        timeline,
        vec![(100, "on"), (300, "cc"), (580, "off"), (600, "program")]
    );
    assert_eq!(sequence.note_count(), 1);
}

#[test]
fn test_rle_scanline_roundtrip() {
    let mut line = vec![7u8];
    line.extend([9, 9]);
    line.extend(std::iter::repeat_n(0xC5, 63));
    line.push(1);

    let encoded = encode_scanline(&line);
    let mut decoded = vec![0u8; line.len()];
    let end = decode_scanline(&encoded, 0, &mut decoded, 0).unwrap();
    assert_eq!(end, encoded.len());
    assert_eq!(decoded, line);
}

#[test]
fn test_palette_bound_enforced() {
    let pixels = PixelBuffer {
        width: 4,
        height: 1,
        bytes_per_scanline: 0,
        indices: vec![0, 1, 0x20, 2],
    };
    let palette = Palette {
        colors: vec![Rgb::default(); 0x21],
    };
    let bytes = encode_image(ImageVariant::Colors256, &pixels, &palette).unwrap();

    // The header palette of a 16-color image cannot address index 0x20
    assert_eq!(
        decode_image(&bytes, ImageVariant::Colors16),
        Err(ImageDecodeError::PaletteIndexOutOfRange {
            x: 2,
            y: 0,
            index: 0x20,
            palette_len: 16,
        })
    );
}

#[test]
fn test_decode_encode_is_idempotent() {
    let (_, _, bytes) = sixteen_color_image();
    let first = decode_image(&bytes, ImageVariant::Colors16).unwrap();
    let reencoded = encode_image(first.variant, &first.pixels, &first.palette).unwrap();
    let second = decode_image(&reencoded, ImageVariant::Colors16).unwrap();
    assert_eq!(first.pixels.indices, second.pixels.indices);
    assert_eq!(first.palette, second.palette);
}

#[test]
fn test_exports() {
    let (_, _, bytes) = sixteen_color_image();
    let image = decode_image(&bytes, ImageVariant::Colors16).unwrap();
    let png = indexed_to_png_bytes(&image).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

    let sequence = single_song(&xmi(&[0x90, 0x3C, 0x40, 0x10, 0xFF, 0x2F, 0x00]));
    let midi = sequence_to_midi_bytes(&sequence, &MidiExportOptions::default()).unwrap();
    assert_eq!(&midi[..4], b"MThd");
    assert_eq!(&midi[midi.len() - 3..], &[0xFF, 0x2F, 0x00]);
}

#[test]
fn test_options_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("options.json");
    std::fs::write(&path, r#"{ "decode_images": false, "parallel": false }"#).unwrap();

    let options = ConversionOptions::load(&path).unwrap();
    assert!(!options.decode_images);
    assert!(options.decode_music);

    let (_, _, image) = sixteen_color_image();
    let data = GxlWriter::new().with_file("A.16", image).to_bytes().unwrap();
    let report = convert_archive(&data, &options).unwrap();
    assert_eq!(
        report.outcomes[0].result.skip_reason(),
        Some(SkipReason::Disabled)
    );
}

#[test]
fn test_hidden_bytes_reported() {
    let (_, _, image) = sixteen_color_image();
    let mut data = GxlWriter::new().with_file("A.16", image).to_bytes().unwrap();
    data.extend_from_slice(b"\x89PNG\r\n\x1a\n");
    data.extend_from_slice(&[0; 24]);

    let table = parse_archive(&data).unwrap();
    let report = analyze_with_data(&table, &data);
    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.unaccounted_bytes, 32);
    assert_eq!(report.potential_hidden_files().count(), 1);

    let summary = summarize(&table, &data);
    assert_eq!(summary.integrity, report);
}
