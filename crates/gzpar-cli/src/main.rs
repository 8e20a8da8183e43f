use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use gzpar_core::{Direction, FramingMode, Pipeline, PipelineConfig, ProgressSink, RunReport};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Process exit code for a completed run.
const EXIT_SUCCESS: i32 = 1;
/// Process exit code for a failed run or an invalid invocation.
const EXIT_FAILURE: i32 = 0;

#[derive(Parser)]
#[command(
    name = "gzpar",
    version,
    about = "Parallel block gzip compressor",
    long_about = "Compress and decompress files as independent gzip blocks processed in parallel.\n\
                  Exits with status 1 on success and 0 on failure."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into .gz or .agz blocks.
    Compress {
        #[command(flatten)]
        run: RunArgs,

        /// Raw bytes per block (supports suffixes K/M/G, e.g. 64K, 1M).
        #[arg(long, default_value = "1M", value_parser = parse_size)]
        block_size: usize,

        /// Deflate level, 0 (store) to 9 (best).
        #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,

        /// Write .agz blocks as soon as they are ready instead of in index order.
        #[arg(long, default_value_t = false)]
        unordered_tagged: bool,
    },
    /// Restore a file produced by `compress`.
    Decompress {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Source file.
    input: PathBuf,

    /// Destination file (defaults to <input>.<format> or <input stem>.file).
    output: Option<PathBuf>,

    /// Block framing on the compressed side.
    #[arg(long, value_enum, default_value_t = FormatArg::Agz)]
    format: FormatArg,

    /// Number of worker threads (defaults to CPU count).
    #[arg(long, default_value_t = num_cpus::get())]
    workers: usize,

    /// Also append log lines to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not print the progress line.
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Concatenated gzip members, readable by standard gzip tools.
    Gz,
    /// Index-tagged blocks.
    Agz,
}

impl From<FormatArg> for FramingMode {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Gz => FramingMode::Sequential,
            FormatArg::Agz => FramingMode::IndexTagged,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            let code = match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_FAILURE,
            };
            std::process::exit(code);
        }
    };

    let code = match run(cli) {
        Ok(true) => EXIT_SUCCESS,
        Ok(false) => EXIT_FAILURE,
        Err(error) => {
            eprintln!("error: {error:#}");
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let (direction, args, config) = match cli.command {
        Commands::Compress {
            run,
            block_size,
            level,
            unordered_tagged,
        } => {
            let mut config = PipelineConfig::new(Direction::Compress, &run.input)
                .with_block_size(block_size)
                .with_compression_level(level);
            if unordered_tagged {
                config = config.with_unordered_tagged_output();
            }
            (Direction::Compress, run, config)
        }
        Commands::Decompress { run } => {
            let config = PipelineConfig::new(Direction::Decompress, &run.input);
            (Direction::Decompress, run, config)
        }
    };

    init_logging(args.log_file.as_deref())?;

    let mode = FramingMode::from(args.format);
    let mut config = config
        .with_format(mode.name())
        .with_workers(args.workers);
    if let Some(output) = &args.output {
        config = config.with_destination(output);
    }

    let mut pipeline = Pipeline::new(config)
        .with_context(|| format!("cannot {direction} {}", args.input.display()))?;
    if !args.quiet {
        pipeline = pipeline.with_progress(Arc::new(ConsoleProgress::default()));
    }

    let report = pipeline.run();
    if !args.quiet {
        eprintln!();
    }

    if report.is_success() {
        print_summary(&pipeline, &report);
    } else {
        eprintln!(
            "{direction} failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
        eprintln!(
            "  partial output left at {} ({})",
            pipeline.destination().display(),
            format_bytes(report.output_bytes)
        );
    }
    Ok(report.is_success())
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(io::stderr.and(Mutex::new(file)))
                .init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

/// Redraws a single progress line on stderr whenever the percentage moves.
#[derive(Debug, Default)]
struct ConsoleProgress {
    last_basis_points: AtomicU64,
}

impl ProgressSink for ConsoleProgress {
    fn report(&self, bytes_done: u64, bytes_total: u64, block_index: u32) {
        let basis_points = if bytes_total > 0 {
            bytes_done.min(bytes_total).saturating_mul(10_000) / bytes_total
        } else {
            10_000
        };
        let previous = self.last_basis_points.swap(basis_points, Ordering::AcqRel);
        if previous == basis_points && basis_points != 0 {
            return;
        }

        let line = format!(
            "\r\x1b[2K[{:6.2}%] block {} | data {} / {}",
            basis_points as f64 / 100.0,
            block_index,
            format_bytes(bytes_done),
            format_bytes(bytes_total),
        );
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

fn print_summary(pipeline: &Pipeline, report: &RunReport) {
    let elapsed_secs = report.elapsed.as_secs_f64().max(1e-6);
    let read_avg_bps = report.input_bytes as f64 / elapsed_secs;
    let write_avg_bps = report.output_bytes as f64 / elapsed_secs;
    let ratio = if report.input_bytes > 0 {
        report.output_bytes as f64 / report.input_bytes as f64
    } else {
        1.0
    };

    println!("{} complete", report.direction);
    println!("  source: {}", pipeline.source().display());
    println!("  output: {}", pipeline.destination().display());
    println!("  format: {}", report.mode.name());
    println!("  elapsed: {}", format_duration(report.elapsed));
    println!("  input bytes: {}", format_bytes(report.input_bytes));
    println!("  output bytes: {}", format_bytes(report.output_bytes));
    println!("  output/input ratio: {ratio:.3}x");
    println!("  read throughput: {}/s", format_rate(read_avg_bps));
    println!("  write throughput: {}/s", format_rate(write_avg_bps));
    println!(
        "  blocks: {} read | {} written",
        report.blocks_read, report.blocks_written
    );
    println!(
        "  queues: read peak {} of {} | write peak {} (reorder peak {})",
        report.read_queue.peak_resident,
        report.read_queue.capacity,
        report.write_queue.peak_resident,
        report.write_queue.peak_pending,
    );

    let workers = &report.workers.workers;
    let max_tasks = workers.iter().map(|worker| worker.tasks_completed).max().unwrap_or(0);
    let min_tasks = workers.iter().map(|worker| worker.tasks_completed).min().unwrap_or(0);
    println!(
        "  workers: {} | task balance min/max {min_tasks}/{max_tasks} | total tasks {}",
        workers.len(),
        report.workers.tasks_completed,
    );
    for worker in workers {
        println!(
            "    w{:02} tasks {:>6} | busy {:>8} | util {:>6.2}%",
            worker.worker_id,
            worker.tasks_completed,
            format_duration(worker.busy),
            worker.utilization * 100.0,
        );
    }
}

fn parse_size(value: &str) -> Result<usize, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("size cannot be empty".to_string());
    }

    let split_at = trimmed
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (num_part, suffix_part) = trimmed.split_at(split_at);
    if num_part.is_empty() {
        return Err(format!("invalid size: {value}"));
    }

    let base: usize = num_part
        .parse()
        .map_err(|_| format!("invalid size number: {value}"))?;

    let multiplier = match suffix_part.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1usize,
        "k" | "kb" => 1024usize,
        "m" | "mb" => 1024usize * 1024usize,
        "g" | "gb" => 1024usize * 1024usize * 1024usize,
        other => {
            return Err(format!("invalid size suffix '{other}' in '{value}'"));
        }
    };

    let size = base
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: {value}"))?;
    if size == 0 {
        return Err("block size must be positive".to_string());
    }
    Ok(size)
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

fn format_rate(bytes_per_second: f64) -> String {
    if !bytes_per_second.is_finite() || bytes_per_second <= 0.0 {
        return "0 B".to_string();
    }
    format_bytes(bytes_per_second as u64)
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let millis = duration.subsec_millis();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else if minutes > 0 {
        format!("{minutes:02}:{seconds:02}")
    } else {
        format!("{seconds}.{millis:03}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_suffixes() {
        assert_eq!(parse_size("64K"), Ok(64 * 1024));
        assert_eq!(parse_size(" 1m "), Ok(1024 * 1024));
        assert_eq!(parse_size("2GB"), Ok(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("4096"), Ok(4096));
        assert!(parse_size("").is_err());
        assert!(parse_size("0").is_err());
        assert!(parse_size("12X").is_err());
        assert!(parse_size("M").is_err());
    }

    #[test]
    fn formats_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_duration(Duration::from_millis(2_500)), "2.500s");
        assert_eq!(format_duration(Duration::from_secs(3_725)), "01:02:05");
        assert_eq!(format_rate(f64::NAN), "0 B");
    }

    #[test]
    fn cli_accepts_documented_flags() {
        let cli = Cli::try_parse_from([
            "gzpar",
            "compress",
            "data.bin",
            "data.bin.gz",
            "--format",
            "gz",
            "--workers",
            "3",
            "--block-size",
            "256K",
            "--level",
            "9",
            "--unordered-tagged",
        ])
        .expect("valid invocation");

        match cli.command {
            Commands::Compress {
                run,
                block_size,
                level,
                unordered_tagged,
            } => {
                assert_eq!(run.input, PathBuf::from("data.bin"));
                assert_eq!(run.output, Some(PathBuf::from("data.bin.gz")));
                assert!(matches!(run.format, FormatArg::Gz));
                assert_eq!(run.workers, 3);
                assert_eq!(block_size, 256 * 1024);
                assert_eq!(level, 9);
                assert!(unordered_tagged);
            }
            Commands::Decompress { .. } => panic!("expected compress"),
        }
    }

    #[test]
    fn cli_rejects_unknown_format_and_level() {
        assert!(Cli::try_parse_from(["gzpar", "decompress", "a", "--format", "zip"]).is_err());
        assert!(Cli::try_parse_from(["gzpar", "compress", "a", "--level", "10"]).is_err());
        assert!(Cli::try_parse_from(["gzpar", "compress"]).is_err());
    }
}
