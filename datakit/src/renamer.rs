//! Rename recorded files after the log row closest to their modification
//! time.
//!
//! A CSV log holds one row per recording with the target name and a
//! wall-clock moment (local time). Every input file is matched to the log
//! moment closest to its modification time and, when the two are less than
//! `threshold_secs` apart, moved or copied to `dest_dir/<name><ext>`.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timestamps::{Table, TimeError};

/// Errors that can occur while renaming files.
#[derive(Debug, Error)]
pub enum RenameError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log error: {0}")]
    Log(#[from] TimeError),

    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("no parsable moment in {0}")]
    NoMoments(PathBuf),

    #[error("{file} is equally close to several log rows: {candidates:?}")]
    AmbiguousMatch {
        file: PathBuf,
        candidates: Vec<String>,
    },

    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),
}

/// Result type for renaming operations.
pub type Result<T> = std::result::Result<T, RenameError>;

/// What to do with a matched file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// Rename, or copy then delete across file systems.
    #[default]
    Move,
    /// Copy, keeping the modification time.
    #[serde(alias = "copy2")]
    Copy,
}

/// Configuration of a renaming run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenamerConfig {
    /// Directory holding the files to rename
    pub input_dir: PathBuf,

    /// Extensions to pick up, case-insensitive; empty takes every file
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory receiving the renamed files
    pub dest_dir: PathBuf,

    /// CSV log with names and moments
    pub log_csv: PathBuf,

    /// Log column holding the new names
    #[serde(default = "default_name_column")]
    pub name_column: String,

    /// Log column holding the moments
    #[serde(default = "default_time_column")]
    pub time_column: String,

    /// chrono format of the moments
    #[serde(default = "default_time_format")]
    pub time_format: String,

    /// Largest accepted distance between file and log moment, exclusive
    #[serde(default = "default_threshold_secs")]
    pub threshold_secs: f64,

    /// Move or copy
    #[serde(default)]
    pub action: FileAction,

    /// Report what would happen without touching any file
    #[serde(default)]
    pub dry_run: bool,
}

fn default_extensions() -> Vec<String> {
    vec![".mov".to_string()]
}

fn default_name_column() -> String {
    "name".to_string()
}

fn default_time_column() -> String {
    "time".to_string()
}

fn default_time_format() -> String {
    "%Y-%m-%d %H-%M-%S".to_string()
}

fn default_threshold_secs() -> f64 {
    5.0
}

impl RenamerConfig {
    /// Configuration with default columns, format, threshold and action.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        log_csv: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            extensions: default_extensions(),
            dest_dir: dest_dir.into(),
            log_csv: log_csv.into(),
            name_column: default_name_column(),
            time_column: default_time_column(),
            time_format: default_time_format(),
            threshold_secs: default_threshold_secs(),
            action: FileAction::default(),
            dry_run: false,
        }
    }
}

/// One log row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// New file name, without extension.
    pub name: String,
    /// Seconds since the Unix epoch, `None` when the cell did not parse.
    pub moment: Option<f64>,
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Moved or copied to `destination`.
    Renamed {
        /// Input file
        source: PathBuf,
        /// New path
        destination: PathBuf,
        /// Log moment minus file moment, in seconds
        diff: f64,
    },
    /// Left in place, the closest log row was too far away.
    Skipped {
        /// Input file
        source: PathBuf,
        /// Name of the closest log row
        closest: String,
        /// Log moment minus file moment, in seconds
        diff: f64,
    },
}

/// Outcomes of a run, in input file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenameReport {
    /// One outcome per input file.
    pub outcomes: Vec<Outcome>,
}

impl RenameReport {
    /// Number of files moved or copied.
    #[must_use]
    pub fn renamed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Renamed { .. }))
            .count()
    }

    /// Number of files left in place.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.renamed()
    }
}

#[allow(clippy::cast_precision_loss)]
fn epoch_seconds<Tz: chrono::TimeZone>(moment: &DateTime<Tz>) -> f64 {
    moment.timestamp_millis() as f64 / 1000.0
}

/// Parse a local wall-clock moment into epoch seconds.
///
/// Returns `None` if the value does not match `format` or does not exist in
/// the local time zone.
pub fn parse_local_moment(value: &str, format: &str) -> Option<f64> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), format).ok()?;
    let local = naive.and_local_timezone(Local).earliest()?;
    Some(epoch_seconds(&local))
}

/// Read names and moments from the log.
///
/// # Errors
/// [`RenameError::Log`] if the file cannot be read or lacks a column.
pub fn read_log(
    path: &Path,
    name_column: &str,
    time_column: &str,
    format: &str,
) -> Result<Vec<LogEntry>> {
    let table = Table::read(path)?;
    let name_idx = table.column(name_column)?;
    let time_idx = table.column(time_column)?;
    let entries = table
        .rows
        .iter()
        .map(|row| {
            let moment = parse_local_moment(&row[time_idx], format);
            if moment.is_none() {
                debug!("unparsable moment {:?} for {}", row[time_idx], row[name_idx]);
            }
            LogEntry {
                name: row[name_idx].clone(),
                moment,
            }
        })
        .collect();
    Ok(entries)
}

/// Files of `dir` whose extension is one of `extensions`, sorted by path.
///
/// # Errors
/// [`RenameError::DirectoryNotFound`] if `dir` is not a directory.
pub fn list_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RenameError::DirectoryNotFound(dir.to_path_buf()));
    }
    let wanted = |path: &Path| {
        extensions.is_empty()
            || path.extension().is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|e| ext.eq_ignore_ascii_case(e.trim_start_matches('.')))
            })
    };
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && wanted(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Index of the entry closest to `moment` and the signed difference
/// `entry - moment`.
///
/// # Errors
/// [`RenameError::NoMoments`] when no entry has a moment,
/// [`RenameError::AmbiguousMatch`] when several are equally close.
pub fn find_closest(file: &Path, moment: f64, entries: &[LogEntry]) -> Result<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    let mut ties: Vec<usize> = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        let Some(m) = entry.moment else { continue };
        let diff = m - moment;
        match best {
            Some((_, d)) if diff.abs() > d.abs() => {}
            Some((_, d)) if (diff.abs() - d.abs()).abs() < f64::EPSILON => ties.push(idx),
            _ => {
                best = Some((idx, diff));
                ties = vec![idx];
            }
        }
    }
    let best = best.ok_or_else(|| RenameError::NoMoments(file.to_path_buf()))?;
    if ties.len() > 1 {
        return Err(RenameError::AmbiguousMatch {
            file: file.to_path_buf(),
            candidates: ties.iter().map(|&i| entries[i].name.clone()).collect(),
        });
    }
    Ok(best)
}

fn modified(path: &Path) -> Result<SystemTime> {
    Ok(fs::metadata(path)?.modified()?)
}

fn move_file(source: &Path, destination: &Path) -> Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
            Err(e.into())
        }
        Err(e) => {
            // most likely across file systems
            warn!(
                "rename {} failed ({e}), copying instead",
                source.display()
            );
            copy_file(source, destination)?;
            fs::remove_file(source)?;
            Ok(())
        }
    }
}

fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    let mtime = modified(source)?;
    fs::copy(source, destination)?;
    File::options()
        .write(true)
        .open(destination)?
        .set_modified(mtime)?;
    Ok(())
}

/// Match, then move or copy every input file.
///
/// Stops at the first error; files handled before it stay handled.
///
/// # Errors
/// Any [`RenameError`]; see [`read_log`], [`list_files`] and
/// [`find_closest`]. [`RenameError::DestinationExists`] rather than
/// overwriting a file.
pub fn run(config: &RenamerConfig) -> Result<RenameReport> {
    let entries = read_log(
        &config.log_csv,
        &config.name_column,
        &config.time_column,
        &config.time_format,
    )?;
    let files = list_files(&config.input_dir, &config.extensions)?;
    info!(
        "{:?} {} files from {} to {}",
        config.action,
        files.len(),
        config.input_dir.display(),
        config.dest_dir.display()
    );
    if !config.dry_run {
        fs::create_dir_all(&config.dest_dir)?;
    }

    let mut report = RenameReport::default();
    for source in files {
        let moment = epoch_seconds(&DateTime::<Local>::from(modified(&source)?));
        let (idx, diff) = find_closest(&source, moment, &entries)?;
        let name = &entries[idx].name;

        if diff.abs() >= config.threshold_secs {
            info!(
                "skipped {}: closest is {name} at {diff:+.3} s, threshold {} s",
                source.display(),
                config.threshold_secs
            );
            report.outcomes.push(Outcome::Skipped {
                source,
                closest: name.clone(),
                diff,
            });
            continue;
        }

        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let destination = config.dest_dir.join(format!("{name}{ext}"));
        if destination.exists() {
            return Err(RenameError::DestinationExists(destination));
        }
        if !config.dry_run {
            match config.action {
                FileAction::Move => move_file(&source, &destination)?,
                FileAction::Copy => copy_file(&source, &destination)?,
            }
        }
        info!(
            "{:?} {} to {} ({diff:+.3} s)",
            config.action,
            source.display(),
            destination.display()
        );
        report.outcomes.push(Outcome::Renamed {
            source,
            destination,
            diff,
        });
    }
    info!("total: {} files renamed", report.renamed());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    const FORMAT: &str = "%Y-%m-%d %H-%M-%S";

    fn base() -> DateTime<Local> {
        NaiveDate::from_ymd_opt(2023, 3, 27)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_local_timezone(Local)
            .earliest()
            .unwrap()
    }

    fn touch(path: &Path, at: DateTime<Local>) {
        fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::from(at))
            .unwrap();
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: RenamerConfig,
    }

    /// Log rows at base, +60 s, +120 s and one broken row; files at +1 s
    /// (a.mov), +62 s (b.MOV), +300 s (c.mov) plus an ignored d.txt.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        fs::create_dir(&input).unwrap();
        let log = dir.path().join("log.csv");
        let t0 = base();
        let mut csv = String::from("name,time\n");
        for (name, offset) in [("T01", 0), ("T02", 60), ("T03", 120)] {
            let at = t0 + Duration::seconds(offset);
            csv.push_str(&format!("{name},{}\n", at.format(FORMAT)));
        }
        csv.push_str("T04,not a time\n");
        fs::write(&log, csv).unwrap();

        touch(&input.join("a.mov"), t0 + Duration::seconds(1));
        touch(&input.join("b.MOV"), t0 + Duration::seconds(62));
        touch(&input.join("c.mov"), t0 + Duration::seconds(300));
        touch(&input.join("d.txt"), t0);

        let config = RenamerConfig::new(input, dir.path().join("out"), log);
        Fixture { _dir: dir, config }
    }

    #[test]
    fn moves_close_files_and_skips_far_ones() {
        let fx = fixture();
        let report = run(&fx.config).unwrap();
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.renamed(), 2);
        assert_eq!(report.skipped(), 1);

        let out = &fx.config.dest_dir;
        assert!(out.join("T01.mov").exists());
        assert!(out.join("T02.MOV").exists());
        assert!(!fx.config.input_dir.join("a.mov").exists());
        assert!(fx.config.input_dir.join("c.mov").exists());
        match &report.outcomes[2] {
            Outcome::Skipped { closest, diff, .. } => {
                assert_eq!(closest, "T03");
                assert::close(*diff, -180.0, 1e-6);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn copy_keeps_source_and_mtime() {
        let mut fx = fixture();
        fx.config.action = FileAction::Copy;
        run(&fx.config).unwrap();
        let source = fx.config.input_dir.join("a.mov");
        let copy = fx.config.dest_dir.join("T01.mov");
        assert!(source.exists());
        assert_eq!(modified(&source).unwrap(), modified(&copy).unwrap());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let mut fx = fixture();
        fx.config.dry_run = true;
        let report = run(&fx.config).unwrap();
        assert_eq!(report.renamed(), 2);
        assert!(!fx.config.dest_dir.exists());
        assert!(fx.config.input_dir.join("a.mov").exists());
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut fx = fixture();
        fx.config.threshold_secs = 1.0;
        let report = run(&fx.config).unwrap();
        assert_eq!(report.renamed(), 0);
    }

    #[test]
    fn existing_destination_is_an_error() {
        let fx = fixture();
        fs::create_dir_all(&fx.config.dest_dir).unwrap();
        fs::write(fx.config.dest_dir.join("T01.mov"), b"taken").unwrap();
        assert!(matches!(
            run(&fx.config),
            Err(RenameError::DestinationExists(_))
        ));
    }

    #[test]
    fn failed_move_reports_the_rename_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.mov");
        let destination = dir.path().join("T01.mov");
        match move_file(&missing, &destination) {
            Err(RenameError::Io(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
            other => panic!("expected an IO error, got {other:?}"),
        }
        assert!(!destination.exists());

        let source = dir.path().join("a.mov");
        fs::write(&source, b"clip").unwrap();
        move_file(&source, &destination).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read(&destination).unwrap(), b"clip");
    }

    #[test]
    fn closest_match_and_ties() {
        let entries = vec![
            LogEntry { name: "a".into(), moment: Some(10.0) },
            LogEntry { name: "broken".into(), moment: None },
            LogEntry { name: "b".into(), moment: Some(20.0) },
        ];
        let file = Path::new("x.mov");
        assert_eq!(find_closest(file, 12.0, &entries).unwrap(), (0, -2.0));
        assert_eq!(find_closest(file, 19.0, &entries).unwrap(), (2, 1.0));
        match find_closest(file, 15.0, &entries) {
            Err(RenameError::AmbiguousMatch { candidates, .. }) => {
                assert_eq!(candidates, vec!["a", "b"]);
            }
            other => panic!("expected a tie, got {other:?}"),
        }
        assert!(matches!(
            find_closest(file, 1.0, &entries[1..2]),
            Err(RenameError::NoMoments(_))
        ));
    }

    #[test]
    fn listing_filters_extensions() {
        let fx = fixture();
        let all = list_files(&fx.config.input_dir, &[]).unwrap();
        assert_eq!(all.len(), 4);
        let movies = list_files(&fx.config.input_dir, &["MOV".to_string()]).unwrap();
        let names: Vec<_> = movies
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mov", "b.MOV", "c.mov"]);
        assert!(matches!(
            list_files(Path::new("/definitely/not/here"), &[]),
            Err(RenameError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn config_accepts_copy2() {
        let yaml = "input_dir: in\ndest_dir: out\nlog_csv: log.csv\naction: copy2\n";
        let config: RenamerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.action, FileAction::Copy);
        assert_eq!(config.time_format, FORMAT);
        assert::close(config.threshold_secs, 5.0, 1e-12);
    }
}
