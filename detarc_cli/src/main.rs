use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use detarc_core::delta::reconstruct;
use detarc_core::transcoder::DEFAULT_DATASET_NAME;
use detarc_core::wib::{synthetic_frames, WIB_FRAME_SIZE};
use detarc_core::{
    Compression, ContainerSink, DType, FrameFormat, LinearFrameFormat, OutputMode, Reader,
    TranscodeConfig, Transcoder, WibFrameFormat,
};
use detarc_filters::resolve_filter;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "detarc",
    about = "Transcode raw detector frame files into chunked, compressed DTARC1 arrays",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode frames into a (frames × channels) sample matrix
    Matrix {
        #[command(flatten)]
        io: TranscodeArgs,
        /// Chunk size in frame dimension
        #[arg(short = 'f', long, default_value_t = 512)]
        frame_chunk: usize,
        /// Chunk size in channel dimension
        #[arg(short = 'c', long, default_value_t = 16)]
        channel_chunk: usize,
        /// Do frame-to-frame difference
        #[arg(short, long)]
        diff: bool,
    },
    /// Store frame bytes verbatim as a flat byte array
    Fragment {
        #[command(flatten)]
        io: TranscodeArgs,
        /// Chunk size in bytes
        #[arg(short = 'c', long, default_value_t = 512)]
        chunk_size: usize,
    },
    /// Print header, descriptor and chunk index statistics
    Inspect {
        /// DTARC1 file to inspect
        file: PathBuf,
        /// Print per-chunk details
        #[arg(long)]
        chunks: bool,
    },
    /// Read a range of frames (matrix) or bytes (fragment)
    ///
    /// Only the chunks covering the range are decoded.
    Read {
        /// DTARC1 file
        file: PathBuf,
        /// First frame (or byte) to read
        #[arg(short, long, default_value_t = 0)]
        start: usize,
        /// Number of frames (or bytes) to read
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Undo frame-to-frame differencing before printing
        #[arg(long)]
        undelta: bool,
    },
    /// Write a synthetic raw WIB file for trying the pipeline
    Synth {
        /// Destination raw file
        #[arg(short, long)]
        output: PathBuf,
        /// Number of frames to generate
        #[arg(short = 'n', long, default_value_t = 10_000)]
        frames: usize,
        /// Fixed random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Args)]
struct TranscodeArgs {
    /// Input raw frame file
    #[arg(short, long)]
    input: PathBuf,
    /// Output DTARC1 file (truncated if it exists)
    #[arg(short, long)]
    output: PathBuf,
    /// Maximum number of frames to write (default: all)
    #[arg(short = 'n', long)]
    max_n_frames: Option<u64>,
    /// Name of the dataset inside the container
    #[arg(long, default_value = DEFAULT_DATASET_NAME)]
    dataset: String,
    /// Compressor applied to every chunk
    #[arg(long, value_enum, default_value_t = CompressionKind::Deflate)]
    compression: CompressionKind,
    /// Compression level (deflate 0–9, default 3; zstd 1–22, default 3)
    #[arg(long)]
    level: Option<i32>,
    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Args)]
struct FormatArgs {
    /// Frame layout of the input
    #[arg(long = "format", value_enum, default_value_t = FormatKind::Wib)]
    kind: FormatKind,
    /// Bytes per frame (linear format only)
    #[arg(long)]
    frame_size: Option<usize>,
    /// Channels per frame (linear format only)
    #[arg(long)]
    channels: Option<usize>,
    /// Header bytes before the first sample (linear format only)
    #[arg(long, default_value_t = 0)]
    header_bytes: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatKind {
    Wib,
    Linear,
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionKind {
    Deflate,
    Zstd,
    Lz4,
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn frame_format(args: &FormatArgs) -> anyhow::Result<Box<dyn FrameFormat>> {
    match args.kind {
        FormatKind::Wib => {
            if args.frame_size.is_some() || args.channels.is_some() {
                anyhow::bail!("--frame-size and --channels only apply to --format linear");
            }
            Ok(Box::new(WibFrameFormat))
        }
        FormatKind::Linear => {
            let channels = args
                .channels
                .context("--format linear needs --channels")?;
            let frame_size = args
                .frame_size
                .unwrap_or(args.header_bytes + channels * 2);
            let format = LinearFrameFormat::new(args.header_bytes, channels, frame_size)
                .with_context(|| {
                    format!(
                        "{} header bytes + {} channels do not fit in {}-byte frames",
                        args.header_bytes, channels, frame_size
                    )
                })?;
            Ok(Box::new(format))
        }
    }
}

fn compression(kind: CompressionKind, level: Option<i32>) -> anyhow::Result<Compression> {
    match kind {
        CompressionKind::Deflate => {
            let level = level.unwrap_or(3);
            if !(0..=9).contains(&level) {
                anyhow::bail!("deflate level {} out of range 0–9", level);
            }
            Ok(Compression::Deflate(level as u32))
        }
        CompressionKind::Zstd => Ok(Compression::Zstd(level.unwrap_or(3))),
        CompressionKind::Lz4 => {
            if level.is_some() {
                anyhow::bail!("lz4 takes no compression level");
            }
            Ok(Compression::Lz4)
        }
    }
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_transcode(io: TranscodeArgs, mode: OutputMode) -> anyhow::Result<()> {
    let format = frame_format(&io.format)?;
    let config = TranscodeConfig {
        dataset_name: io.dataset,
        max_frames: io.max_n_frames,
        mode,
        compression: compression(io.compression, io.level)?,
    };
    let transcoder = Transcoder::new(format.as_ref(), config)?;

    let file = File::open(&io.input)
        .with_context(|| format!("opening input file {:?}", io.input))?;
    let mut source = BufReader::new(file);
    let mut sink = ContainerSink::new(&io.output, resolve_filter);

    let t0 = Instant::now();
    let report = transcoder
        .run(&mut source, &mut sink)
        .with_context(|| format!("transcoding {:?} into {:?}", io.input, io.output))?;
    let elapsed = t0.elapsed();

    println!(
        "There are {} frames in the file. Running on {}",
        report.available_frames, report.processed_frames
    );
    println!("  mode        : {}", mode.name());
    println!("  format      : {}", format.name());
    println!("  uncompressed: {}", human_bytes(report.uncompressed_size));
    println!("  compressed  : {}", human_bytes(report.persisted_size));
    println!("  ratio       : {:.3}", report.ratio());
    println!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_chunks: bool) -> anyhow::Result<()> {
    let reader = Reader::open(&file, resolve_filter)
        .with_context(|| format!("opening {:?}", file))?;
    let file_size = std::fs::metadata(&file)?.len();
    let attrs = &reader.descriptor.attrs;

    println!("=== DTARC1 File: {:?} ===", file);
    println!();
    println!("  format version : {}", reader.header.version);
    println!("  dataset        : {}", reader.descriptor.name);
    println!("  dtype          : {}", reader.dtype().name());
    println!("  shape          : {:?}", reader.shape());
    println!("  chunk shape    : {:?}", reader.header.chunk_shape);
    println!("  chunk count    : {}", reader.chunk_count());
    println!("  filters        : {}", reader.filter_names().join(" → "));
    println!("  raw size       : {}", human_bytes(reader.raw_size()));
    println!("  stored chunks  : {}", human_bytes(reader.stored_size()));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!("  chunk ratio    : {:.2}x", reader.ratio());
    println!("  flags          : 0x{:016x}", reader.header.flags);
    println!();
    println!("  frame format   : {}", attrs.frame_format);
    println!("  frame size     : {} B", attrs.frame_size);
    println!("  channels       : {}", attrs.n_channels);
    println!("  mode           : {}", attrs.mode);
    println!("  delta          : {}", attrs.delta);
    println!(
        "  frames         : {} of {} available",
        attrs.processed_frames, attrs.available_frames
    );

    if show_chunks {
        println!();
        println!(
            "  {:>8}  {:>14}  {:>12}  {:>12}  {:>16}  region",
            "chunk", "file offset", "stored", "raw", "checksum"
        );
        println!("  {}", "-".repeat(80));
        for (i, e) in reader.entries().iter().enumerate() {
            println!(
                "  {:>8}  {:>14}  {:>12}  {:>12}  {:016x}  {:?}",
                i,
                e.offset,
                human_bytes(e.encoded_len as u64),
                human_bytes(e.raw_len as u64),
                e.checksum,
                reader.grid().region(i)
            );
        }
    }

    Ok(())
}

fn run_read(file: PathBuf, start: usize, count: usize, undelta: bool) -> anyhow::Result<()> {
    let mut reader = Reader::open(&file, resolve_filter)
        .with_context(|| format!("opening {:?}", file))?;

    let t0 = Instant::now();
    match reader.dtype() {
        DType::I16 => {
            let delta = reader.descriptor.attrs.delta;
            if undelta && !delta {
                log::warn!("dataset was not delta encoded; --undelta has no effect");
            }
            let (rows, skip) = if undelta && delta {
                let n_frames = reader.shape().first().copied().unwrap_or(0);
                if start >= n_frames && count > 0 {
                    anyhow::bail!("frame {} is beyond the {} stored frames", start, n_frames);
                }
                // True values need every preceding row.
                let mut rows = reader.read_frames(0, start.saturating_add(count))?;
                reconstruct(&mut rows);
                (rows, start)
            } else {
                (reader.read_frames(start, count)?, 0)
            };
            eprintln!(
                "decoded {} frames in {:.3}ms",
                rows.nrows(),
                t0.elapsed().as_secs_f64() * 1000.0
            );
            for (i, row) in rows.rows().into_iter().enumerate().skip(skip) {
                let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("{:>8}: {}", start + i - skip, values.join(" "));
            }
        }
        DType::U8 => {
            if undelta {
                anyhow::bail!("--undelta only applies to matrix datasets");
            }
            let bytes = reader.read_bytes(start, count)?;
            eprintln!(
                "decoded {} in {:.3}ms",
                human_bytes(bytes.len() as u64),
                t0.elapsed().as_secs_f64() * 1000.0
            );
            for (i, chunk) in bytes.chunks(16).enumerate() {
                print!("  {:08x}  ", start + i * 16);
                for b in chunk {
                    print!("{:02x} ", b);
                }
                println!();
            }
        }
    }
    Ok(())
}

fn run_synth(output: PathBuf, frames: usize, seed: u64) -> anyhow::Result<()> {
    let bytes = synthetic_frames(frames, seed);
    std::fs::write(&output, &bytes)
        .with_context(|| format!("writing {:?}", output))?;
    eprintln!(
        "  wrote {} WIB frames ({}, {} B each) to {:?}",
        frames,
        human_bytes(bytes.len() as u64),
        WIB_FRAME_SIZE,
        output
    );
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Matrix {
            io,
            frame_chunk,
            channel_chunk,
            diff,
        } => run_transcode(
            io,
            OutputMode::Matrix {
                frame_chunk,
                channel_chunk,
                delta: diff,
            },
        ),
        Commands::Fragment { io, chunk_size } => {
            run_transcode(io, OutputMode::Fragment { chunk_len: chunk_size })
        }
        Commands::Inspect { file, chunks } => run_inspect(file, chunks),
        Commands::Read {
            file,
            start,
            count,
            undelta,
        } => run_read(file, start, count, undelta),
        Commands::Synth {
            output,
            frames,
            seed,
        } => run_synth(output, frames, seed),
    }
}
