//! Command-line interface for the datakit tools.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::config::Config;
use crate::image_proc::{self, io as image_io, PixelOrder};
use crate::intervals::find_intervals;
use crate::timestamps::{action_indicators, action_spans, ActionColumns, Table};
use crate::{plot, renamer, utils};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "datakit")]
#[command(about = "Interval, image, time table and file renaming helpers", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find foreground intervals in a numeric CSV column
    Intervals {
        /// Input CSV file
        input: PathBuf,
        /// Column holding the sequence
        #[arg(long)]
        column: String,
        /// Background value (overrides the config)
        #[arg(long)]
        discard: Option<f64>,
        /// Maximum number of intervals (overrides the config)
        #[arg(long)]
        max_intervals: Option<usize>,
        /// Write a PNG of the sequence with the intervals shaded
        #[arg(long)]
        plot: Option<PathBuf>,
        /// Write `{prefix}_data.txt` and `{prefix}_intervals.txt`
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Bounding boxes from the row/column projections of images
    Boxes {
        /// Input images
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Maximum row intervals (overrides the config)
        #[arg(long)]
        max_h: Option<usize>,
        /// Maximum column intervals (overrides the config)
        #[arg(long)]
        max_v: Option<usize>,
        /// Save every box as a PNG crop in this directory
        #[arg(long)]
        crops: Option<PathBuf>,
    },

    /// Plot the row and column projections of an image (PNG)
    Project {
        /// Input image
        image: PathBuf,
        /// Output PNG file
        output: PathBuf,
    },

    /// Split an image into a grid of crops
    Grid {
        /// Input image
        image: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        #[arg(long, default_value_t = 2)]
        rows: usize,
        #[arg(long, default_value_t = 2)]
        cols: usize,
    },

    /// Keep pixels whose channels all lie in the given ranges
    Filter {
        /// Input image
        image: PathBuf,
        /// Output image
        output: PathBuf,
        /// One inclusive `lo:hi` range per channel
        #[arg(short, long = "range", value_parser = parse_range, required = true)]
        ranges: Vec<RangeInclusive<u8>>,
    },

    /// Save RGB, HSV, LAB and gray versions of an image
    Transforms {
        /// Input image
        image: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        /// Treat the input as BGR
        #[arg(long)]
        bgr: bool,
        /// Also save a mosaic with this many columns
        #[arg(long)]
        tile: Option<usize>,
    },

    /// Convert time string columns of a CSV to seconds
    Times {
        /// Input CSV file
        input: PathBuf,
        /// Output CSV file
        output: PathBuf,
        /// Columns to convert
        #[arg(required = true)]
        columns: Vec<String>,
        /// chrono format (overrides the config)
        #[arg(long)]
        format: Option<String>,
    },

    /// Build per-sample action indicators from an action table
    Actions {
        /// CSV with action, start_time and end_time columns (seconds)
        actions: PathBuf,
        /// CSV holding the sample times
        times: PathBuf,
        /// Output CSV file
        output: PathBuf,
        /// Column of `times` holding the sample times
        #[arg(long, default_value = "time")]
        time_column: String,
    },

    /// Rename files after the closest moment of a CSV log
    Rename {
        /// Report without moving or copying
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_range(s: &str) -> std::result::Result<RangeInclusive<u8>, String> {
    let (lo, hi) = s
        .split_once(':')
        .ok_or_else(|| format!("expected lo:hi, got {s:?}"))?;
    let lo: u8 = lo.trim().parse().map_err(|e| format!("{lo:?}: {e}"))?;
    let hi: u8 = hi.trim().parse().map_err(|e| format!("{hi:?}: {e}"))?;
    Ok(lo..=hi)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Parse arguments, set up logging and run the selected command.
///
/// # Errors
/// Any failure of the selected command.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match Config::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                Config::default()
            }
        },
        None => Config::default(),
    };

    let start = Instant::now();
    match cli.command {
        Commands::Intervals { input, column, discard, max_intervals, plot, prefix } => {
            cmd_intervals(&input, &column, discard, max_intervals, plot, prefix, &config)?;
        }
        Commands::Boxes { images, max_h, max_v, crops } => {
            cmd_boxes(&images, max_h, max_v, crops, &config)?;
        }
        Commands::Project { image, output } => cmd_project(&image, &output)?,
        Commands::Grid { image, out_dir, rows, cols } => cmd_grid(&image, &out_dir, rows, cols)?,
        Commands::Filter { image, output, ranges } => cmd_filter(&image, &output, &ranges)?,
        Commands::Transforms { image, out_dir, bgr, tile } => {
            cmd_transforms(&image, &out_dir, bgr, tile)?;
        }
        Commands::Times { input, output, columns, format } => {
            let format = format.unwrap_or(config.time.format);
            cmd_times(&input, &output, &columns, &format)?;
        }
        Commands::Actions { actions, times, output, time_column } => {
            cmd_actions(&actions, &times, &output, &time_column)?;
        }
        Commands::Rename { dry_run } => cmd_rename(dry_run, config)?,
    }
    info!("done in {:.2?}", start.elapsed());
    Ok(())
}

fn cmd_intervals(
    input: &Path,
    column: &str,
    discard: Option<f64>,
    max_intervals: Option<usize>,
    plot_path: Option<PathBuf>,
    prefix: Option<String>,
    config: &Config,
) -> Result<()> {
    let table = Table::read(input).with_context(|| format!("reading {}", input.display()))?;
    let values = table.numeric_column(column)?;
    let intervals = find_intervals(
        &values,
        discard.unwrap_or(config.intervals.discard),
        max_intervals.unwrap_or(config.intervals.max_intervals),
    )?;
    for iv in &intervals {
        println!("{iv}");
    }
    if let Some(path) = plot_path {
        plot::plot_sequence(&path, &values, &intervals)?;
        info!("plot written to {}", path.display());
    }
    if let Some(prefix) = prefix {
        utils::write_sequence_and_intervals(&prefix, &values, &intervals)?;
    }
    Ok(())
}

fn cmd_boxes(
    images: &[PathBuf],
    max_h: Option<usize>,
    max_v: Option<usize>,
    crops: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let results = utils::projection_boxes_for_files(
        images,
        config.intervals.discard,
        max_h.unwrap_or(config.intervals.max_h),
        max_v.unwrap_or(config.intervals.max_v),
    );
    let mut failed = 0;
    for (path, boxes) in results {
        match boxes {
            Ok(boxes) => {
                println!("{}", path.display());
                for bbox in &boxes {
                    println!("  {bbox}");
                }
                if let Some(dir) = &crops {
                    // projection boxes are inclusive, crops exclude br
                    let widened: Vec<_> = boxes
                        .iter()
                        .map(|b| crate::BoundingBox::new((b.tl.x, b.tl.y), (b.br.x + 1, b.br.y + 1)))
                        .collect();
                    let written = utils::save_crops(&path, &widened, dir)?;
                    info!("{} crops written to {}", written.len(), dir.display());
                }
            }
            Err(e) => {
                warn!("{}: {e}", path.display());
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} images failed", images.len());
    }
    Ok(())
}

fn cmd_project(image: &Path, output: &Path) -> Result<()> {
    let img = image_io::load(image)?;
    plot::plot_projection(output, &img.projection())?;
    Ok(())
}

fn cmd_grid(image: &Path, out_dir: &Path, rows: usize, cols: usize) -> Result<()> {
    let img = image_io::load(image)?;
    std::fs::create_dir_all(out_dir)?;
    let stem = file_stem(image);
    for cell in img.split_grid(rows, cols)? {
        let path = out_dir.join(format!("{stem}_{}.png", cell.label()));
        image_io::save(&cell.image, &path)?;
    }
    Ok(())
}

fn cmd_filter(image: &Path, output: &Path, ranges: &[RangeInclusive<u8>]) -> Result<()> {
    let img = image_io::load(image)?;
    image_io::save(&img.filter_channels(ranges)?, output)?;
    Ok(())
}

fn cmd_transforms(image: &Path, out_dir: &Path, bgr: bool, tile: Option<usize>) -> Result<()> {
    let img = image_io::load(image)?;
    let order = if bgr { PixelOrder::Bgr } else { PixelOrder::Rgb };
    let transforms = img.basic_transforms(order)?;
    std::fs::create_dir_all(out_dir)?;
    let stem = file_stem(image);
    for (name, transformed) in &transforms {
        let path = out_dir.join(format!("{stem}_{}.png", name.replace(' ', "_")));
        image_io::save(transformed, &path)?;
    }
    if let Some(ncols) = tile {
        let cells: Vec<_> = transforms.into_iter().map(|(_, img)| img).collect();
        let mosaic = image_proc::tile(&cells, ncols)?;
        image_io::save(&mosaic, out_dir.join(format!("{stem}_mosaic.png")))?;
    }
    Ok(())
}

fn cmd_times(input: &Path, output: &Path, columns: &[String], format: &str) -> Result<()> {
    let mut table = Table::read(input)?;
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
    table.convert_time_columns(&columns, format)?;
    table.write(output)?;
    Ok(())
}

fn cmd_actions(actions: &Path, times: &Path, output: &Path, time_column: &str) -> Result<()> {
    let spans = action_spans(&Table::read(actions)?, &ActionColumns::default())?;
    let times = Table::read(times)?.numeric_column(time_column)?;
    let indicators = action_indicators(&times, &spans);
    indicators.to_table(time_column).write(output)?;
    info!(
        "{} actions over {} samples",
        indicators.actions.len(),
        indicators.times.len()
    );
    Ok(())
}

fn cmd_rename(dry_run: bool, config: Config) -> Result<()> {
    let Some(mut renamer_config) = config.renamer else {
        bail!("the rename command needs a `renamer` section in the config file");
    };
    renamer_config.dry_run |= dry_run;
    if renamer_config.dry_run {
        println!("DRY RUN: No files will be moved");
    }
    let report = renamer::run(&renamer_config)?;
    for outcome in &report.outcomes {
        match outcome {
            renamer::Outcome::Renamed { source, destination, diff } => {
                println!("{} -> {} ({diff:+.3} s)", source.display(), destination.display());
            }
            renamer::Outcome::Skipped { source, closest, diff } => {
                println!("{} skipped, closest {closest} ({diff:+.3} s)", source.display());
            }
        }
    }
    println!("{} renamed, {} skipped", report.renamed(), report.skipped());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_parse() {
        assert_eq!(parse_range("10:200").unwrap(), 10..=200);
        assert_eq!(parse_range(" 0 : 255 ").unwrap(), 0..=255);
        assert!(parse_range("10-200").is_err());
        assert!(parse_range("10:300").is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "datakit", "-vv", "boxes", "a.png", "b.png", "--max-v", "4",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Boxes { images, max_v, max_h, .. } => {
                assert_eq!(images.len(), 2);
                assert_eq!(max_v, Some(4));
                assert_eq!(max_h, None);
            }
            _ => panic!("wrong subcommand"),
        }

        let cli = Cli::try_parse_from([
            "datakit", "filter", "in.png", "out.png", "-r", "0:10", "-r", "5:6",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Filter { ref ranges, .. } if ranges.len() == 2));
    }

    #[test]
    fn intervals_command_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("seq.csv");
        std::fs::write(&input, "v\n0\n0\n5\n5\n0\n0\n7\n7\n7\n0\n0\n").unwrap();
        let prefix = dir.path().join("out").to_string_lossy().into_owned();
        cmd_intervals(&input, "v", None, Some(1), None, Some(prefix.clone()), &Config::default())
            .unwrap();
        let ivs = std::fs::read_to_string(format!("{prefix}_intervals.txt")).unwrap();
        assert_eq!(ivs, "2,8\n");
    }
}
