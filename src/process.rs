//! Sorting pipeline
//!
//! Handles the core logic of:
//! - Scanning the input directory
//! - Extracting capture times
//! - Grouping files by calendar day
//! - Copying them into the output tree without overwriting anything
//!
//! [`Processor::run`] returns a lazy [`Run`]: an iterator of
//! [`ProgressEvent`]s that does one file's worth of work per step. One bad
//! file never stops the batch; it becomes a [`CopyOutcome::Failed`].

use crate::config::Config;
use crate::copy::safe_copy;
use crate::error::{Error, Result};
use crate::extensions::ExtensionRegistry;
use crate::group::{DateBuckets, Placement, sort_by_time};
use crate::time::{MediaRecord, extract};
use crate::walk::walk;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::vec;
use tracing::{Level, debug, error, info, span};

/// Result of one copy attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The file was written to `destination`
    Copied {
        source: PathBuf,
        destination: PathBuf,
        uncertain: bool,
    },
    /// Nothing was written for `source`
    Failed { source: PathBuf, reason: String },
}

impl CopyOutcome {
    pub fn source(&self) -> &Path {
        match self {
            CopyOutcome::Copied { source, .. } | CopyOutcome::Failed { source, .. } => source,
        }
    }

    pub fn is_copied(&self) -> bool {
        matches!(self, CopyOutcome::Copied { .. })
    }
}

/// One step of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Number of media files found; always the first event
    Total(usize),
    /// Metadata of a file was read
    Extracted(PathBuf),
    /// A file was copied or given up on
    Outcome(CopyOutcome),
}

/// Processing statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_files: usize,
    pub copied: usize,
    pub failed: usize,
    /// Copied files dated from file system times
    pub uncertain: usize,
    /// Copied files without any capture time
    pub undated: usize,
}

impl ProcessingStats {
    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Copied: {}, Uncertain: {}, Undated: {}, Failed: {}",
            self.total_files, self.copied, self.uncertain, self.undated, self.failed
        )
    }
}

/// Main processor for sorting media files
#[derive(Debug)]
pub struct Processor {
    config: Config,
    registry: ExtensionRegistry,
}

impl Processor {
    /// Create a processor, checking the input and output directories
    pub fn new(config: Config, registry: ExtensionRegistry) -> Result<Self> {
        validate_roots(&config.input_dir, &config.output_dir)?;
        Ok(Self { config, registry })
    }

    /// Scan the input directory and start a run
    ///
    /// Scanning errors end the run before anything is copied.
    pub fn run(&self) -> Result<Run<'_>> {
        let _span = span!(Level::INFO, "processor_run").entered();

        info!(input = ?self.config.input_dir, "Scanning input directory...");
        let files = walk(&self.config.input_dir, &self.registry)?;
        info!(count = files.len(), "Found media files");

        Ok(Run {
            processor: self,
            stats: ProcessingStats {
                total_files: files.len(),
                ..ProcessingStats::default()
            },
            stage: Stage::Pending(files),
        })
    }
}

enum Stage {
    Pending(Vec<PathBuf>),
    Extracting {
        files: vec::IntoIter<PathBuf>,
        records: Vec<MediaRecord>,
    },
    Copying(vec::IntoIter<Placement>),
    Done,
}

/// A single pass over the input directory
///
/// Yields [`ProgressEvent::Total`] first, then one event per file while
/// metadata is read, then one [`ProgressEvent::Outcome`] per copy. Files
/// whose metadata cannot be read produce a failed outcome during the first
/// phase. Not restartable.
pub struct Run<'a> {
    processor: &'a Processor,
    stats: ProcessingStats,
    stage: Stage,
}

impl Run<'_> {
    /// Counts so far
    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    fn start_copying(&mut self, mut records: Vec<MediaRecord>) {
        if self.processor.config.sort_by_time {
            sort_by_time(&mut records);
        }

        let buckets = DateBuckets::group(records);
        debug!(
            dated = buckets.dated_len(),
            undated = buckets.leftover().len(),
            "Grouped files by date"
        );
        info!("Copying files...");
        self.stage = Stage::Copying(buckets.into_placements().into_iter());
    }

    fn copy(&mut self, placement: Placement) -> CopyOutcome {
        let source = placement.record.path().to_path_buf();
        let dest_dir = self.processor.config.output_dir.join(&placement.folder);

        match safe_copy(&source, &dest_dir, placement.tag_uncertain) {
            Ok(destination) => {
                info!(
                    source = ?source,
                    destination = ?destination,
                    capture_time = ?placement.record.capture_time(),
                    uncertain = placement.record.is_uncertain(),
                    "Copied file"
                );
                self.stats.copied += 1;
                if placement.record.capture_time().is_none() {
                    self.stats.undated += 1;
                } else if placement.tag_uncertain {
                    self.stats.uncertain += 1;
                }
                CopyOutcome::Copied {
                    source,
                    destination,
                    uncertain: placement.tag_uncertain,
                }
            }
            Err(e) => self.fail(source, e),
        }
    }

    fn fail(&mut self, source: PathBuf, e: Error) -> CopyOutcome {
        error!(path = ?source, error = %e, "Failed to process file");
        self.stats.failed += 1;
        CopyOutcome::Failed {
            source,
            reason: e.to_string(),
        }
    }
}

impl Iterator for Run<'_> {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            match &mut self.stage {
                Stage::Pending(files) => {
                    let files = mem::take(files);
                    let total = files.len();
                    self.stage = Stage::Extracting {
                        records: Vec::with_capacity(total),
                        files: files.into_iter(),
                    };
                    return Some(ProgressEvent::Total(total));
                }
                Stage::Extracting { files, records } => {
                    let Some(path) = files.next() else {
                        let records = mem::take(records);
                        self.start_copying(records);
                        continue;
                    };

                    let config = &self.processor.config;
                    match extract(&path, &self.processor.registry, config.only_keep_time) {
                        Ok(record) => {
                            records.push(record);
                            return Some(ProgressEvent::Extracted(path));
                        }
                        Err(e) => return Some(ProgressEvent::Outcome(self.fail(path, e))),
                    }
                }
                Stage::Copying(placements) => match placements.next() {
                    Some(placement) => return Some(ProgressEvent::Outcome(self.copy(placement))),
                    None => {
                        info!("{}", self.stats.summary());
                        self.stage = Stage::Done;
                    }
                },
                Stage::Done => return None,
            }
        }
    }
}

/// The input must be an existing directory, the output an existing
/// directory outside of it
fn validate_roots(input: &Path, output: &Path) -> Result<()> {
    let input = existing_dir(input)?;
    let output = existing_dir(output)?;

    if output.starts_with(&input) {
        return Err(Error::InvalidRoot {
            path: output,
            message: format!("output directory is inside the input directory {}", input.display()),
        });
    }

    Ok(())
}

fn existing_dir(path: &Path) -> Result<PathBuf> {
    let invalid = |message: &str| Error::InvalidRoot {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let canonical = fs::canonicalize(path).map_err(|_| invalid("does not exist"))?;
    if !canonical.is_dir() {
        return Err(invalid("not a directory"));
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::exif::test_support::jpeg_with_time;
    use chrono::{Local, NaiveDate, TimeZone};
    use filetime::FileTime;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let input = dir.path().join("camera");
            let output = dir.path().join("sorted");
            fs::create_dir_all(&input).unwrap();
            fs::create_dir_all(&output).unwrap();
            Self {
                _dir: dir,
                input,
                output,
            }
        }

        fn write(&self, rel: &str, bytes: &[u8]) -> PathBuf {
            let path = self.input.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, bytes).unwrap();
            path
        }

        /// Pin a file's modification time to local midnight of the given day
        fn set_mtime(&self, path: &Path, y: i32, m: u32, d: u32) {
            let naive = NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
            let local = Local.from_local_datetime(&naive).earliest().unwrap();
            filetime::set_file_mtime(path, FileTime::from_unix_time(local.timestamp(), 0)).unwrap();
        }

        fn processor(&self) -> Processor {
            let config = Config {
                input_dir: self.input.clone(),
                output_dir: self.output.clone(),
                ..Config::default()
            };
            let registry = ExtensionRegistry::from_config(&config).unwrap();
            Processor::new(config, registry).unwrap()
        }

        fn day(&self) -> PathBuf {
            self.output.join("Year 2023").join("January").join("Day 5")
        }

        /// Scenario tree: a.jpg with EXIF, b.mp4 dated by the file system,
        /// c.txt ignored
        fn scenario(&self) {
            self.write("a.jpg", &jpeg_with_time("2023:01:05 10:00:00"));
            let video = self.write("clips/b.mp4", b"not really a video");
            self.set_mtime(&video, 2023, 1, 5);
            self.write("c.txt", b"notes");
        }
    }

    fn outcomes(events: &[ProgressEvent]) -> Vec<&CopyOutcome> {
        events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Outcome(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let fx = Fixture::new();
        fx.scenario();

        let processor = fx.processor();
        let events: Vec<_> = processor.run().unwrap().collect();

        assert_eq!(events[0], ProgressEvent::Total(2));
        let outcomes = outcomes(&events);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.is_copied()));

        assert!(fx.day().join("a.jpg").is_file());
        assert!(fx.day().join("b_uncertain_metadata.mp4").is_file());
        assert!(!fx.day().join("c.txt").exists());
        assert_eq!(fs::read_dir(fx.day()).unwrap().count(), 2);
    }

    #[test]
    fn test_rerun_never_overwrites() {
        let fx = Fixture::new();
        fx.scenario();
        fs::create_dir_all(fx.day()).unwrap();
        fs::write(fx.day().join("a.jpg"), b"already here").unwrap();

        let processor = fx.processor();
        let events: Vec<_> = processor.run().unwrap().collect();
        let outcomes = outcomes(&events);

        assert!(outcomes.iter().all(|o| o.is_copied()));
        assert_eq!(fs::read(fx.day().join("a.jpg")).unwrap(), b"already here");
        assert!(fx.day().join("a[1].jpg").is_file());
        assert!(outcomes.contains(&&CopyOutcome::Copied {
            source: fx.input.join("a.jpg"),
            destination: fx.day().join("a[1].jpg"),
            uncertain: false,
        }));
    }

    #[test]
    fn test_stats_summary() {
        let fx = Fixture::new();
        fx.scenario();

        let processor = fx.processor();
        let mut run = processor.run().unwrap();
        run.by_ref().for_each(drop);

        let stats = run.stats();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.copied, 2);
        assert_eq!(stats.uncertain, 1);
        assert_eq!(stats.failed, 0);
        assert!(stats.summary().contains("Copied: 2"));
        assert!(run.next().is_none());
    }

    #[test]
    fn test_failed_file_does_not_stop_the_batch() {
        let fx = Fixture::new();
        fx.scenario();
        fs::create_dir_all(fx.day()).unwrap();
        fs::write(fx.day().join("a.jpg"), b"taken").unwrap();
        for i in 1..crate::copy::MAX_PROBES {
            fs::write(fx.day().join(format!("a[{}].jpg", i)), b"taken").unwrap();
        }

        let processor = fx.processor();
        let mut run = processor.run().unwrap();
        let events: Vec<_> = run.by_ref().collect();
        let outcomes = outcomes(&events);

        assert_eq!(outcomes.len(), 2);
        let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_copied()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source(), fx.input.join("a.jpg"));
        assert!(fx.day().join("b_uncertain_metadata.mp4").is_file());
        assert_eq!(run.stats().failed, 1);
        assert_eq!(run.stats().copied, 1);
    }

    #[test]
    fn test_vanished_file_is_reported_as_failure() {
        let fx = Fixture::new();
        fx.scenario();
        let extra = fx.write("gone.jpg", b"soon deleted");

        let processor = fx.processor();
        let mut run = processor.run().unwrap();
        assert_eq!(run.next(), Some(ProgressEvent::Total(3)));
        fs::remove_file(&extra).unwrap();

        let events: Vec<_> = run.collect();
        let outcomes = outcomes(&events);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.is_copied()).count(), 2);
        assert!(outcomes.iter().any(|o| matches!(
            o,
            CopyOutcome::Failed { source, .. } if *source == extra
        )));
    }

    #[test]
    fn test_events_are_lazy() {
        let fx = Fixture::new();
        fx.scenario();

        let processor = fx.processor();
        let mut run = processor.run().unwrap();
        assert_eq!(run.next(), Some(ProgressEvent::Total(2)));
        assert!(matches!(run.next(), Some(ProgressEvent::Extracted(_))));
        assert!(!fx.output.join("Year 2023").exists());
    }

    #[test]
    fn test_sort_by_time_orders_copies() {
        let fx = Fixture::new();
        // Walk order visits sub/z.jpg first
        fx.write("z.jpg", &jpeg_with_time("2023:01:05 07:00:00"));
        fx.write("sub/z.jpg", &jpeg_with_time("2023:01:05 08:00:00"));

        let config = Config {
            input_dir: fx.input.clone(),
            output_dir: fx.output.clone(),
            sort_by_time: true,
            ..Config::default()
        };
        let registry = ExtensionRegistry::from_config(&config).unwrap();
        let processor = Processor::new(config, registry).unwrap();
        processor.run().unwrap().for_each(drop);

        assert_eq!(
            fs::read(fx.day().join("z.jpg")).unwrap(),
            jpeg_with_time("2023:01:05 07:00:00")
        );
        assert_eq!(
            fs::read(fx.day().join("z[1].jpg")).unwrap(),
            jpeg_with_time("2023:01:05 08:00:00")
        );
    }

    #[test]
    fn test_empty_input() {
        let fx = Fixture::new();
        let processor = fx.processor();
        let events: Vec<_> = processor.run().unwrap().collect();
        assert_eq!(events, vec![ProgressEvent::Total(0)]);
    }

    #[test]
    fn test_invalid_roots() {
        let fx = Fixture::new();
        let registry = ExtensionRegistry::default();

        let missing = Config {
            input_dir: fx.input.join("nope"),
            output_dir: fx.output.clone(),
            ..Config::default()
        };
        assert!(matches!(
            Processor::new(missing, registry.clone()),
            Err(Error::InvalidRoot { .. })
        ));

        let file_as_output = Config {
            input_dir: fx.input.clone(),
            output_dir: fx.write("file.jpg", b"x"),
            ..Config::default()
        };
        assert!(matches!(
            Processor::new(file_as_output, registry.clone()),
            Err(Error::InvalidRoot { .. })
        ));

        let nested = fx.input.join("out");
        fs::create_dir_all(&nested).unwrap();
        let inside = Config {
            input_dir: fx.input.clone(),
            output_dir: nested,
            ..Config::default()
        };
        assert!(matches!(
            Processor::new(inside, registry),
            Err(Error::InvalidRoot { .. })
        ));
    }
}
