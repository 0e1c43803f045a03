//! Apply one detection strategy across every scan of a source and stream the
//! resulting mass lists to a writer.
//!
//! With the `parallelism` feature, scans are read on a dedicated thread, detected on a
//! `rayon` pool, and reassembled into source order by a [`Collator`] on the calling
//! thread. Without it, or when a single thread is requested, the same contract is met
//! by a plain loop. Either way, mass lists are written in ascending scan index order
//! once the source is exhausted.
use std::collections::BTreeMap;
use std::time::Instant;

use log::{debug, info, warn};
use thiserror::Error;

use crate::io::{MassListWriter, ScanSource, SinkError, SourceError};
use crate::peaks::MassList;
use crate::scan::ScanValidationError;

use super::params::DetectionParameters;

#[cfg(feature = "parallelism")]
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::sync_channel,
};
#[cfg(feature = "parallelism")]
use std::thread;

#[cfg(feature = "parallelism")]
use rayon::prelude::*;

#[cfg(feature = "parallelism")]
use crate::utils::Collator;

const PROGRESS_INTERVAL: usize = 10_000;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Scan {index} cannot be processed: {reason}")]
    InvalidScan {
        index: u32,
        reason: ScanValidationError,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Counts describing a completed run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Scans pulled from the source
    pub scans_read: usize,
    /// Mass lists handed to the writer, including empty ones
    pub scans_written: usize,
    /// Scans rejected as invalid and not written
    pub scans_skipped: usize,
    /// Total peaks across all written mass lists
    pub peaks_written: usize,
}

/// Holds detection results until the source is exhausted, then writes them in
/// ascending scan index order and keeps the tally
struct SummarizingSink<'a, W: MassListWriter + ?Sized> {
    sink: &'a mut W,
    summary: RunSummary,
    pending: BTreeMap<u32, Vec<MassList>>,
    received: usize,
    last_index: Option<u32>,
    started: Instant,
}

impl<'a, W: MassListWriter + ?Sized> SummarizingSink<'a, W> {
    fn new(sink: &'a mut W) -> Self {
        Self {
            sink,
            summary: RunSummary::default(),
            pending: BTreeMap::new(),
            received: 0,
            last_index: None,
            started: Instant::now(),
        }
    }

    fn check_order(&mut self, index: u32) {
        if let Some(last) = self.last_index {
            if index <= last {
                debug!("Scan {index} arrived after scan {last} and will be written before it");
            }
        }
        self.last_index = Some(index);
    }

    fn accept(&mut self, result: Result<MassList, DetectionError>) -> Result<(), DetectionError> {
        match result {
            Ok(masses) => {
                self.check_order(masses.scan_index);
                self.pending.entry(masses.scan_index).or_default().push(masses);
            }
            Err(DetectionError::InvalidScan { index, reason }) => {
                self.check_order(index);
                warn!("Skipping scan {index}: {reason}");
                self.summary.scans_skipped += 1;
            }
            Err(e) => return Err(e),
        }
        self.received += 1;
        if self.received % PROGRESS_INTERVAL == 0 {
            info!(
                "Processed {} scans ({:0.2?} elapsed)",
                self.received,
                self.started.elapsed()
            );
        }
        Ok(())
    }

    /// Write every buffered mass list, lowest scan index first. Mass lists sharing a
    /// scan index keep their arrival order.
    fn flush_pending(&mut self) -> Result<(), DetectionError> {
        let pending = std::mem::take(&mut self.pending);
        for masses in pending.into_values().flatten() {
            self.summary.peaks_written += self.sink.write(&masses)?;
            self.summary.scans_written += 1;
        }
        Ok(())
    }

    /// Flush on success and close the writer exactly once, whatever the outcome
    fn finish(mut self, outcome: Result<(), DetectionError>) -> Result<RunSummary, DetectionError> {
        let outcome = outcome.and_then(|()| self.flush_pending());
        match outcome {
            Ok(()) => {
                self.sink.close()?;
                let summary = self.summary;
                info!(
                    "Wrote {} mass lists with {} peaks, skipped {} of {} scans in {:0.2?}",
                    summary.scans_written,
                    summary.peaks_written,
                    summary.scans_skipped,
                    summary.scans_read,
                    self.started.elapsed()
                );
                Ok(summary)
            }
            Err(e) => {
                let unwritten: usize = self.pending.values().map(Vec::len).sum();
                if unwritten > 0 {
                    debug!("Discarding {unwritten} unwritten mass lists");
                }
                if let Err(close_err) = self.sink.close() {
                    warn!("Failed to close output after an aborted run: {close_err}");
                }
                Err(e)
            }
        }
    }
}

/// Detect masses in every scan of `source` one at a time and write the results to
/// `sink` in ascending scan index order.
///
/// Invalid scans are logged, counted and skipped. The first source or sink failure
/// ends the run. `sink` is closed before returning in every case.
pub fn run_sequential<S: ScanSource, W: MassListWriter + ?Sized>(
    source: S,
    params: &DetectionParameters,
    sink: &mut W,
) -> Result<RunSummary, DetectionError> {
    debug!("Running {} detection sequentially", params.algorithm.name());
    let mut writer = SummarizingSink::new(sink);
    let outcome = drive_sequential(source, params, &mut writer);
    writer.finish(outcome)
}

fn drive_sequential<S: ScanSource, W: MassListWriter + ?Sized>(
    source: S,
    params: &DetectionParameters,
    writer: &mut SummarizingSink<'_, W>,
) -> Result<(), DetectionError> {
    for scan in source {
        let scan = scan?;
        writer.summary.scans_read += 1;
        writer.accept(params.detect(&scan))?;
    }
    Ok(())
}

/// Detect masses in every scan of `source` and write them to `sink` in ascending scan
/// index order.
///
/// `threads` bounds the number of detection workers, defaulting to the number of
/// available cores. With one worker, or without the `parallelism` feature, this is
/// [`run_sequential`].
///
/// Invalid scans are logged, counted and skipped. A source or sink failure stops
/// dispatching new scans, lets in-flight work drain, and is returned once every
/// worker has exited. `sink` is closed before returning in every case.
pub fn run<S: ScanSource, W: MassListWriter + ?Sized>(
    source: S,
    params: &DetectionParameters,
    sink: &mut W,
    threads: Option<usize>,
) -> Result<RunSummary, DetectionError> {
    let threads = threads.unwrap_or_else(thread_count_hint);
    #[cfg(feature = "parallelism")]
    {
        if threads > 1 {
            return run_parallel(source, params, sink, threads);
        }
    }
    #[cfg(not(feature = "parallelism"))]
    {
        if threads > 1 {
            debug!("Parallel detection is not enabled, ignoring the request for {threads} threads");
        }
    }
    run_sequential(source, params, sink)
}

fn thread_count_hint() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(feature = "parallelism")]
fn run_parallel<S: ScanSource, W: MassListWriter + ?Sized>(
    source: S,
    params: &DetectionParameters,
    sink: &mut W,
    threads: usize,
) -> Result<RunSummary, DetectionError> {
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool,
        Err(e) => {
            warn!("Failed to build a pool of {threads} detection threads, running sequentially: {e}");
            return run_sequential(source, params, sink);
        }
    };
    debug!(
        "Running {} detection on {threads} threads",
        params.algorithm.name()
    );

    let params = *params;
    let capacity = threads * 4;
    let stop = AtomicBool::new(false);
    let mut writer = SummarizingSink::new(sink);

    let (sink_outcome, read_outcome) = thread::scope(|scope| {
        let (work_tx, work_rx) = sync_channel(capacity);
        let (result_tx, result_rx) = sync_channel(capacity);
        let stop = &stop;
        let pool = &pool;

        let reader = scope.spawn(move || -> Result<usize, SourceError> {
            let mut n = 0usize;
            for scan in source {
                if stop.load(Ordering::Acquire) {
                    debug!("Stopping scan dispatch after {n} scans");
                    break;
                }
                let scan = match scan {
                    Ok(scan) => scan,
                    Err(e) => {
                        stop.store(true, Ordering::Release);
                        return Err(e);
                    }
                };
                if work_tx.send((n, scan)).is_err() {
                    break;
                }
                n += 1;
            }
            Ok(n)
        });

        scope.spawn(move || {
            pool.install(|| {
                work_rx
                    .into_iter()
                    .par_bridge()
                    .for_each_with(result_tx, |sender, (key, scan)| {
                        if stop.load(Ordering::Acquire) {
                            return;
                        }
                        // The receiver is gone only when the run was aborted
                        let _ = sender.send((key, params.detect(&scan)));
                    });
            });
        });

        let mut collator = Collator::default();
        let mut sink_outcome = Ok(());
        'collate: while !collator.is_exhausted() {
            collator.receive_from(&result_rx, capacity);
            while let Some((_, result)) = collator.try_next() {
                if let Err(e) = writer.accept(result) {
                    stop.store(true, Ordering::Release);
                    sink_outcome = Err(e);
                    break 'collate;
                }
            }
        }
        if collator.pending() > 0 {
            debug!("Abandoning {} unwritten results", collator.pending());
        }
        drop(result_rx);

        let read_outcome = match reader.join() {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (sink_outcome, read_outcome)
    });

    let outcome = match (sink_outcome, read_outcome) {
        (Err(e), _) => Err(e),
        (Ok(()), Err(e)) => Err(DetectionError::Source(e)),
        (Ok(()), Ok(n)) => {
            writer.summary.scans_read = n;
            Ok(())
        }
    };
    writer.finish(outcome)
}

#[cfg(test)]
mod test {
    use std::io;

    use super::*;
    use crate::io::{MemoryMassListWriter, MemoryScanSource};
    use crate::peaks::DataPoint;
    use crate::scan::Scan;

    fn profile_scan(index: u32, n: usize) -> Scan {
        let points = (0..n)
            .map(|i| {
                let offset = i as f64 - (n / 2) as f64;
                let intensity = 1.0 + 500.0 * (-(offset * offset) / 50.0).exp();
                DataPoint::new(300.0 + i as f64 * 0.01, intensity)
            })
            .collect();
        Scan::new(index, index as f64 * 0.5, points)
    }

    struct FailingWriter {
        accepted: usize,
        fail_after: usize,
        closed: usize,
    }

    impl MassListWriter for FailingWriter {
        fn write(&mut self, masses: &MassList) -> Result<usize, SinkError> {
            if self.accepted == self.fail_after {
                return Err(SinkError::WriteFailed(io::Error::new(
                    io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.accepted += 1;
            Ok(masses.len())
        }

        fn flush(&mut self) -> Result<(), SinkError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), SinkError> {
            self.closed += 1;
            Ok(())
        }
    }

    struct BrokenSource {
        scans: Vec<Scan>,
    }

    impl Iterator for BrokenSource {
        type Item = Result<Scan, SourceError>;

        fn next(&mut self) -> Option<Self::Item> {
            if self.scans.is_empty() {
                Some(Err(SourceError::parse_failure("scan", "truncated peaks")))
            } else {
                Some(Ok(self.scans.remove(0)))
            }
        }
    }

    impl ScanSource for BrokenSource {}

    #[test_log::test]
    fn test_writes_in_scan_index_order() {
        // The largest scan comes first so parallel workers finish out of order
        let scans = vec![profile_scan(5, 20_000), profile_scan(1, 50), profile_scan(3, 50)];
        let params = DetectionParameters::wavelet(10.0, 2, 0.1).unwrap();
        for threads in [Some(1), Some(3)] {
            let mut writer = MemoryMassListWriter::default();
            let summary = run(
                MemoryScanSource::new(scans.clone()),
                &params,
                &mut writer,
                threads,
            )
            .unwrap();
            let order: Vec<u32> = writer.mass_lists.iter().map(|m| m.scan_index).collect();
            assert_eq!(order, vec![1, 3, 5]);
            assert_eq!(summary.scans_read, 3);
            assert_eq!(summary.scans_written, 3);
            assert!(writer.closed);
        }
    }

    #[test_log::test]
    fn test_parallel_matches_sequential() {
        let scans: Vec<Scan> = (1..=40).map(|i| profile_scan(i, 100 + i as usize * 7)).collect();
        let params = DetectionParameters::centroid(50.0).unwrap();

        let mut sequential = MemoryMassListWriter::default();
        let expected =
            run_sequential(MemoryScanSource::new(scans.clone()), &params, &mut sequential).unwrap();

        let mut parallel = MemoryMassListWriter::default();
        let summary = run(MemoryScanSource::new(scans), &params, &mut parallel, Some(4)).unwrap();

        assert_eq!(summary, expected);
        assert_eq!(parallel.mass_lists, sequential.mass_lists);
        assert_eq!(summary.peaks_written, 40);
    }

    #[test_log::test]
    fn test_reversed_source_written_ascending() {
        let scans: Vec<Scan> = (1..=40).rev().map(|i| profile_scan(i, 100)).collect();
        let params = DetectionParameters::centroid(50.0).unwrap();
        for threads in [Some(1), Some(4)] {
            let mut writer = MemoryMassListWriter::default();
            let summary = run(
                MemoryScanSource::new(scans.clone()),
                &params,
                &mut writer,
                threads,
            )
            .unwrap();
            assert_eq!(summary.scans_written, 40);
            let order: Vec<u32> = writer.mass_lists.iter().map(|m| m.scan_index).collect();
            assert_eq!(order, (1..=40).collect::<Vec<u32>>());
        }
    }

    #[test_log::test]
    fn test_invalid_scans_are_skipped() {
        let unsorted = Scan::from_arrays(2, 1.0, &[200.0, 100.0], &[50.0, 60.0]);
        let scans = vec![profile_scan(1, 100), unsorted, profile_scan(3, 100)];
        let params = DetectionParameters::centroid(10.0).unwrap();
        for threads in [Some(1), Some(2)] {
            let mut writer = MemoryMassListWriter::default();
            let summary = run(
                MemoryScanSource::new(scans.clone()),
                &params,
                &mut writer,
                threads,
            )
            .unwrap();
            assert_eq!(summary.scans_read, 3);
            assert_eq!(summary.scans_written, 2);
            assert_eq!(summary.scans_skipped, 1);
            let order: Vec<u32> = writer.mass_lists.iter().map(|m| m.scan_index).collect();
            assert_eq!(order, vec![1, 3]);
        }
    }

    #[test_log::test]
    fn test_sink_failure_is_fatal() {
        let scans: Vec<Scan> = (1..=50).map(|i| profile_scan(i, 100)).collect();
        let params = DetectionParameters::centroid(10.0).unwrap();
        for threads in [Some(1), Some(4)] {
            let mut writer = FailingWriter {
                accepted: 0,
                fail_after: 3,
                closed: 0,
            };
            let result = run(MemoryScanSource::new(scans.clone()), &params, &mut writer, threads);
            assert!(matches!(result, Err(DetectionError::Sink(SinkError::WriteFailed(_)))));
            assert_eq!(writer.accepted, 3);
            assert_eq!(writer.closed, 1);
        }
    }

    #[test_log::test]
    fn test_source_failure_is_fatal() {
        let params = DetectionParameters::centroid(10.0).unwrap();
        for threads in [Some(1), Some(2)] {
            let source = BrokenSource {
                scans: vec![profile_scan(1, 100), profile_scan(2, 100)],
            };
            let mut writer = MemoryMassListWriter::default();
            let result = run(source, &params, &mut writer, threads);
            assert!(matches!(
                result,
                Err(DetectionError::Source(SourceError::ParseFailure { .. }))
            ));
            assert!(writer.closed);
        }
    }

    #[test]
    fn test_empty_source() {
        let params = DetectionParameters::default();
        let mut writer = MemoryMassListWriter::default();
        let summary = run(MemoryScanSource::default(), &params, &mut writer, None).unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(writer.closed);
    }
}
