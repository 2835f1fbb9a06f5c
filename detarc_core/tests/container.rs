/// Container round trips: transcoded arrays written through `ContainerSink`
/// and read back with `Reader`, including partial reads that only decode the
/// chunks covering the requested range.
use std::fs;
use std::io::Cursor;

use detarc_core::delta::reconstruct;
use detarc_core::format::HEADER_SIZE;
use detarc_core::wib::{synthetic_frames, WIB_FRAME_SIZE};
use detarc_core::{
    Compression, ContainerSink, Filter, FilterSpec, LinearFrameFormat, OutputArray, OutputMode, Reader,
    TranscodeConfig, TranscodeError, Transcoder, WibFrameFormat,
};
use detarc_filters::resolve_filter;

// ── helpers ───────────────────────────────────────────────────────────────

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("detarc_test_{}_{}.dtarc", name, std::process::id()))
}

fn matrix(frame_chunk: usize, channel_chunk: usize, delta: bool) -> OutputMode {
    OutputMode::Matrix {
        frame_chunk,
        channel_chunk,
        delta,
    }
}

fn transcode_to(path: &std::path::Path, raw: &[u8], config: TranscodeConfig) -> OutputArray {
    let t = Transcoder::new(&WibFrameFormat, config).unwrap();
    let out = t.transcode(&mut Cursor::new(raw.to_vec())).unwrap();
    let mut sink = ContainerSink::new(path, resolve_filter);
    t.run(&mut Cursor::new(raw.to_vec()), &mut sink).unwrap();
    out.array
}

/// Resolver for a build that ships no filters at all.
fn no_filters(spec: &FilterSpec) -> anyhow::Result<Box<dyn Filter>> {
    anyhow::bail!("filter {} is not available", spec.id())
}

/// Compressor that fails on every chunk, as a full disk would.
struct FailingCompressor;

impl Filter for FailingCompressor {
    fn spec(&self) -> FilterSpec {
        FilterSpec::Lz4
    }

    fn name(&self) -> &'static str {
        "failing"
    }

    fn encode(&self, _raw: &[u8], _element_size: usize) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("no space left on device")
    }

    fn decode(&self, _encoded: &[u8], _element_size: usize) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("no space left on device")
    }
}

fn failing_compressor(spec: &FilterSpec) -> anyhow::Result<Box<dyn Filter>> {
    match spec {
        FilterSpec::Shuffle => resolve_filter(spec),
        _ => Ok(Box::new(FailingCompressor)),
    }
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn matrix_dataset_round_trips() {
    let raw = synthetic_frames(300, 1);
    let path = temp_path("matrix_roundtrip");
    // 300 × 256 with 128 × 48 chunks leaves trimmed edge chunks on both axes.
    let expected = transcode_to(&path, &raw, TranscodeConfig::new(matrix(128, 48, false)));

    let mut r = Reader::open(&path, resolve_filter).unwrap();
    assert_eq!(r.descriptor.name, "wib_data");
    assert_eq!(
        r.descriptor.filters,
        vec![FilterSpec::Shuffle, FilterSpec::Deflate { level: 3 }]
    );
    assert_eq!(r.shape(), &[300, 256]);
    assert_eq!(r.grid().grid_shape(), &[3, 6]);
    assert_eq!(r.descriptor.attrs.processed_frames, 300);
    assert_eq!(r.descriptor.attrs.frame_size, WIB_FRAME_SIZE as u64);
    assert_eq!(r.raw_size(), 300 * 256 * 2);
    assert!(r.ratio() > 1.0, "slowly varying samples should compress: {}", r.ratio());

    assert_eq!(r.read_array().unwrap(), expected);
}

#[test]
fn frame_range_reads_match_full_array() {
    let raw = synthetic_frames(200, 2);
    let path = temp_path("frame_range");
    let expected = transcode_to(&path, &raw, TranscodeConfig::new(matrix(64, 16, false)));
    let expected = expected.as_matrix().unwrap();

    let mut r = Reader::open(&path, resolve_filter).unwrap();
    // Straddles the boundary between chunk rows 0 and 1.
    let part = r.read_frames(60, 10).unwrap();
    assert_eq!(part, expected.slice(ndarray::s![60..70, ..]));

    // Clamped at the end of the dataset.
    let tail = r.read_frames(190, 50).unwrap();
    assert_eq!(tail.dim(), (10, 256));
    assert_eq!(tail, expected.slice(ndarray::s![190..200, ..]));

    assert!(r.read_frames(200, 1).is_err());
    assert!(r.read_bytes(0, 1).is_err(), "matrix datasets have no byte view");
}

#[test]
fn delta_dataset_reconstructs_true_samples() {
    let raw = synthetic_frames(100, 3);
    let plain_path = temp_path("delta_plain");
    let delta_path = temp_path("delta_on");
    let plain = transcode_to(&plain_path, &raw, TranscodeConfig::new(matrix(512, 16, false)));
    transcode_to(&delta_path, &raw, TranscodeConfig::new(matrix(512, 16, true)));

    let mut r = Reader::open(&delta_path, resolve_filter).unwrap();
    assert!(r.descriptor.attrs.delta);
    let mut samples = r.read_frames(0, 100).unwrap();
    reconstruct(&mut samples);
    assert_eq!(&samples, plain.as_matrix().unwrap());

    let delta_size = fs::metadata(&delta_path).unwrap().len();
    let plain_size = fs::metadata(&plain_path).unwrap().len();
    assert!(
        delta_size < plain_size,
        "drifting samples should shrink under delta: plain {plain_size}, delta {delta_size}"
    );
}

#[test]
fn fragment_dataset_round_trips_with_byte_ranges() {
    let format = LinearFrameFormat::packed(512);
    let raw: Vec<u8> = (0..8192u32).map(|i| (i / 3 % 256) as u8).collect();
    let path = temp_path("fragment");

    let t = Transcoder::new(&format, TranscodeConfig::new(OutputMode::Fragment { chunk_len: 1000 }))
        .unwrap();
    let mut sink = ContainerSink::new(&path, resolve_filter);
    let report = t.run(&mut Cursor::new(raw.clone()), &mut sink).unwrap();
    assert_eq!(report.persisted_size, fs::metadata(&path).unwrap().len());

    let mut r = Reader::open(&path, resolve_filter).unwrap();
    assert_eq!(r.descriptor.filters, vec![FilterSpec::Deflate { level: 3 }]);
    assert_eq!(r.chunk_count(), 9);
    assert_eq!(r.read_array().unwrap(), OutputArray::Fragment(raw.clone()));
    assert_eq!(r.read_bytes(990, 20).unwrap(), &raw[990..1010]);
    assert_eq!(r.read_bytes(8000, 500).unwrap(), &raw[8000..]);
    assert!(r.read_bytes(0, 0).unwrap().is_empty());
    assert!(r.read_frames(0, 1).is_err());
}

#[test]
fn reported_ratio_matches_artifact_size() {
    let raw = synthetic_frames(128, 4);
    let path = temp_path("ratio");
    let t = Transcoder::new(&WibFrameFormat, TranscodeConfig::new(matrix(512, 16, false))).unwrap();
    let mut sink = ContainerSink::new(&path, resolve_filter);
    let report = t.run(&mut Cursor::new(raw), &mut sink).unwrap();

    let on_disk = fs::metadata(&path).unwrap().len();
    assert_eq!(report.persisted_size, on_disk);
    assert_eq!(report.uncompressed_size, 128 * WIB_FRAME_SIZE as u64);
    assert_eq!(report.ratio(), report.uncompressed_size as f64 / on_disk as f64);
}

#[test]
fn alternative_compressors_round_trip() {
    let raw = synthetic_frames(50, 5);
    for (name, compression, filter) in [
        ("zstd", Compression::Zstd(5), FilterSpec::Zstd { level: 5 }),
        ("lz4", Compression::Lz4, FilterSpec::Lz4),
    ] {
        let path = temp_path(name);
        let mut config = TranscodeConfig::new(matrix(32, 32, true));
        config.compression = compression;
        let expected = transcode_to(&path, &raw, config);

        let mut r = Reader::open(&path, resolve_filter).unwrap();
        assert_eq!(r.descriptor.filters, vec![FilterSpec::Shuffle, filter]);
        assert_eq!(r.filter_names(), vec!["shuffle", name]);
        assert_eq!(r.read_array().unwrap(), expected, "{name}");
    }
}

#[test]
fn corrupted_chunk_fails_checksum() {
    let raw = synthetic_frames(40, 6);
    let path = temp_path("corrupt");
    transcode_to(&path, &raw, TranscodeConfig::new(matrix(512, 16, false)));

    let mut bytes = fs::read(&path).unwrap();
    bytes[HEADER_SIZE as usize + 4] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let mut r = Reader::open(&path, resolve_filter).unwrap();
    let err = r.read_chunk(0).unwrap_err().to_string();
    assert!(err.contains("checksum mismatch"), "got: {err}");
    assert!(r.read_chunk(1).is_ok(), "other chunks stay readable");
}

#[test]
fn misaligned_input_creates_no_artifact() {
    let mut raw = synthetic_frames(3, 7);
    raw.truncate(raw.len() - 1);
    let path = temp_path("misaligned");
    let _ = fs::remove_file(&path);

    let t = Transcoder::new(&WibFrameFormat, TranscodeConfig::new(matrix(512, 16, false))).unwrap();
    let mut sink = ContainerSink::new(&path, resolve_filter);
    let err = t.run(&mut Cursor::new(raw), &mut sink).unwrap_err();
    assert!(err.is_format_error());
    assert!(!path.exists());
}

#[test]
fn unwritable_destination_is_a_sink_error() {
    let raw = synthetic_frames(2, 8);
    let path = std::env::temp_dir()
        .join("detarc_missing_dir_for_test")
        .join("out.dtarc");
    let t = Transcoder::new(&WibFrameFormat, TranscodeConfig::new(matrix(512, 16, false))).unwrap();
    let mut sink = ContainerSink::new(&path, resolve_filter);
    let err = t.run(&mut Cursor::new(raw), &mut sink).unwrap_err();
    assert!(matches!(err, TranscodeError::Sink(_)), "{err}");
}

#[test]
fn zero_frames_still_produce_a_readable_dataset() {
    let raw = synthetic_frames(4, 9);
    let path = temp_path("zero_frames");
    transcode_to(
        &path,
        &raw,
        TranscodeConfig::new(matrix(512, 16, false)).with_max_frames(0),
    );

    let mut r = Reader::open(&path, resolve_filter).unwrap();
    assert_eq!(r.shape(), &[0, 256]);
    assert_eq!(r.chunk_count(), 0);
    assert_eq!(r.descriptor.attrs.available_frames, 4);
    assert_eq!(r.read_array().unwrap().shape(), vec![0, 256]);
}

#[test]
fn non_container_file_is_rejected() {
    let path = temp_path("not_a_container");
    fs::write(&path, vec![0u8; 200]).unwrap();
    let err = Reader::open(&path, resolve_filter).err().unwrap().to_string();
    assert!(err.contains("not a DTARC1 file"), "got: {err}");
}

#[test]
fn existing_output_survives_a_failure_before_creation() {
    let raw = synthetic_frames(3, 10);
    let path = temp_path("survives");
    fs::write(&path, b"previous archive").unwrap();

    let t = Transcoder::new(&WibFrameFormat, TranscodeConfig::new(matrix(512, 16, false))).unwrap();
    let mut sink = ContainerSink::new(&path, no_filters);
    let err = t.run(&mut Cursor::new(raw), &mut sink).unwrap_err();
    assert!(matches!(err, TranscodeError::Sink(_)), "{err}");
    assert_eq!(fs::read(&path).unwrap(), b"previous archive");
    fs::remove_file(&path).unwrap();
}

#[test]
fn failure_after_creation_leaves_no_partial_file() {
    let raw = synthetic_frames(3, 11);
    let path = temp_path("partial");
    let _ = fs::remove_file(&path);

    let t = Transcoder::new(&WibFrameFormat, TranscodeConfig::new(matrix(512, 16, false))).unwrap();
    let mut sink = ContainerSink::new(&path, failing_compressor);
    let err = t.run(&mut Cursor::new(raw), &mut sink).unwrap_err();
    assert!(err.to_string().contains("no space left"), "{err}");
    assert!(!path.exists());
}
