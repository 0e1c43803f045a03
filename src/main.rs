use std::ffi::OsString;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{CommandFactory, Parser};
use log::{error, info, warn};
use thiserror::Error;

use mzdetect::detection::{
    run, Algorithm, ConfigError, DetectionError, DetectionParameters, RunSummary, WaveletParams,
    DEFAULT_SCALE_LEVEL,
};
use mzdetect::io::{open_scan_source, open_sink, OutputFormat, ScanSource, SinkError, SourceError};

/// Detect masses in every scan of a raw data file.
#[derive(Debug, Parser)]
#[command(name = "mzdetect", version, after_help = "Legacy spellings -nl, -sl, -ws and -help are also accepted.")]
struct Cli {
    /// Name or path of the input raw data file, mzXML or xy, optionally gzipped
    #[arg(short = 'i', long = "inputFile", value_name = "PATH")]
    input_file: PathBuf,

    /// Name or path of the output file. The format is taken from the extension unless --format is given
    #[arg(short = 'o', long = "outputFile", value_name = "PATH")]
    output_file: PathBuf,

    /// Use the centroid mass detector
    #[arg(short = 'c', long = "centroid", conflicts_with = "wavelet")]
    centroid: bool,

    /// Use the wavelet mass detector [default]
    #[arg(short = 'w', long = "wavelet")]
    wavelet: bool,

    /// Intensities at or below this value are interpreted as noise
    #[arg(long = "noiseLevel", visible_alias = "nl", value_name = "INTENSITY")]
    noise_level: f64,

    /// Number of wavelet scales a feature must persist across. Wavelet detector only
    #[arg(long = "scaleLevel", visible_alias = "sl", default_value_t = DEFAULT_SCALE_LEVEL)]
    scale_level: u32,

    /// Size of the wavelet window as a percentage of the scan's m/z range. Wavelet detector only
    #[arg(long = "windowSize", visible_alias = "ws", default_value_t = 10.0, value_name = "PERCENT")]
    window_size: f64,

    /// Number of detection threads, defaults to the number of available cores
    #[arg(long = "threads", value_name = "N")]
    threads: Option<NonZeroUsize>,

    /// Output format, overriding inference from the output file's extension
    #[arg(long = "format", value_name = "mgf|tsv")]
    format: Option<OutputFormat>,
}

impl Cli {
    fn parameters(&self) -> Result<DetectionParameters, ConfigError> {
        if self.centroid {
            DetectionParameters::centroid(self.noise_level)
        } else {
            let params =
                WaveletParams::from_window_percent(self.noise_level, self.scale_level, self.window_size)?;
            Ok(DetectionParameters::new(Algorithm::Wavelet(params)))
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid detection parameters: {0}")]
    Config(#[from] ConfigError),
    #[error("unable to load input file {0}")]
    InputNotAFile(PathBuf),
    #[error("failed to read scans: {0}")]
    Source(#[from] SourceError),
    #[error("failed to write mass lists: {0}")]
    Sink(#[from] SinkError),
    #[error("detection failed: {0}")]
    Detection(#[from] DetectionError),
}

/// Rewrite the single dash multi-letter options the tool has always accepted
/// into the double dash forms clap understands.
fn normalize_legacy_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-nl") => OsString::from("--nl"),
            Some("-sl") => OsString::from("--sl"),
            Some("-ws") => OsString::from("--ws"),
            Some("-help") => OsString::from("--help"),
            _ => arg,
        })
        .collect()
}

fn check_input(path: &Path) -> Result<(), CliError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(CliError::InputNotAFile(path.to_path_buf())),
    }
}

fn remove_partial_output(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(
            "Failed to remove incomplete output {}: {e}",
            path.display()
        );
    } else {
        info!("Removed incomplete output {}", path.display());
    }
}

fn execute(cli: &Cli) -> Result<RunSummary, CliError> {
    let params = cli.parameters()?;
    check_input(&cli.input_file)?;

    let source = open_scan_source(&cli.input_file)?;
    info!(
        "Reading {} scans from {} with the {} detector",
        source.format_name(),
        cli.input_file.display(),
        params.algorithm.name()
    );
    let mut sink = open_sink(&cli.output_file, cli.format)?;

    match run(source, &params, &mut sink, cli.threads.map(NonZeroUsize::get)) {
        Ok(summary) => Ok(summary),
        Err(e) => {
            remove_partial_output(&cli.output_file);
            Err(e.into())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = normalize_legacy_args(std::env::args_os());
    if args.len() <= 1 {
        let _ = Cli::command().print_help();
        return ExitCode::FAILURE;
    }

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let start = Instant::now();
    match execute(&cli) {
        Ok(summary) => {
            info!(
                "Wrote {} peaks for {} of {} scans to {} in {:0.2} seconds",
                summary.peaks_written,
                summary.scans_written,
                summary.scans_read,
                cli.output_file.display(),
                start.elapsed().as_secs_f64()
            );
            if summary.scans_skipped > 0 {
                warn!("{} invalid scans were skipped", summary.scans_skipped);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let args = std::iter::once("mzdetect")
            .chain(args.iter().copied())
            .map(OsString::from);
        Cli::try_parse_from(normalize_legacy_args(args))
    }

    #[test]
    fn test_legacy_spellings() {
        let cli = parse(&[
            "-i", "in.mzXML", "-o", "out.CDF", "-nl", "250", "-sl", "4", "-ws", "5",
        ])
        .unwrap();
        assert_eq!(cli.input_file, PathBuf::from("in.mzXML"));
        assert_eq!(cli.noise_level, 250.0);
        assert!(!cli.centroid);
        let params = cli.parameters().unwrap();
        assert_eq!(
            params.algorithm,
            Algorithm::Wavelet(WaveletParams::new(250.0, 4, 0.05).unwrap())
        );

        let cli = parse(&[
            "--inputFile", "in.xy", "--outputFile", "out.tsv", "--noiseLevel", "10", "-c",
            "--threads", "2", "--format", "tsv",
        ])
        .unwrap();
        assert!(cli.centroid);
        assert_eq!(cli.threads.map(NonZeroUsize::get), Some(2));
        assert_eq!(cli.format, Some(OutputFormat::TSV));
        assert_eq!(
            cli.parameters().unwrap(),
            DetectionParameters::centroid(10.0).unwrap()
        );

        let err = parse(&["-help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["-i", "a.mzXML", "-o", "b.mgf", "--nl", "100"]).unwrap();
        assert_eq!(cli.parameters().unwrap(), DetectionParameters::default());
    }

    #[test]
    fn test_centroid_without_noise_level() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("out.mgf");
        let output_arg = output.to_string_lossy().into_owned();
        let err = parse(&["-i", "./test/data/small.mzXML", "-o", &output_arg, "-c"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn test_conflicting_detectors() {
        let err = parse(&["-i", "a", "-o", "b", "--nl", "1", "-c", "-w"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test_log::test]
    fn test_bad_parameters_create_nothing() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("out.mgf");
        let output_arg = output.to_string_lossy().into_owned();

        let cli = parse(&["-i", "./test/data/small.mzXML", "-o", &output_arg, "--nl", "5", "--ws", "0"])
            .unwrap();
        assert!(matches!(execute(&cli), Err(CliError::Config(_))));
        assert!(!output.exists());

        let cli = parse(&["-i", "./test/data/missing.mzXML", "-o", &output_arg, "--nl", "5"]).unwrap();
        assert!(matches!(execute(&cli), Err(CliError::InputNotAFile(_))));
        assert!(!output.exists());

        let cli = parse(&["-i", "./test/data", "-o", &output_arg, "--nl", "5"]).unwrap();
        assert!(matches!(execute(&cli), Err(CliError::InputNotAFile(_))));
        assert!(!output.exists());
        Ok(())
    }

    #[test_log::test]
    fn test_execute_fixture() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("small.tsv");
        let output_arg = output.to_string_lossy().into_owned();
        let cli = parse(&["-i", "./test/data/small.mzXML", "-o", &output_arg, "-c", "--nl", "0"])
            .unwrap();
        let summary = execute(&cli).unwrap();
        assert_eq!(summary.scans_read, 3);
        assert_eq!(summary.scans_written, 3);
        assert_eq!(summary.scans_skipped, 0);
        assert!(summary.peaks_written > 0);

        let text = fs::read_to_string(&output)?;
        assert!(text.starts_with("scan\tretention_time\tmz\tintensity\n"));
        assert_eq!(text.lines().count(), summary.peaks_written + 1);
        Ok(())
    }
}
