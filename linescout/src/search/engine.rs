use crossbeam::channel::{unbounded, Sender};
use rayon::ThreadPoolBuilder;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::matcher::PatternMatcher;
use super::processor::FileProcessor;
use crate::config::ScanConfig;
use crate::errors::{ScanError, ScanResult};
use crate::filters::{DirExclusionFilter, FileTypeFilter};
use crate::metrics::ScanMetrics;
use crate::queue::{file_queue, FileQueueConsumer};
use crate::results::{FileResult, SearchOutput};
use crate::walker::Globber;

/// Builds the walker described by `config`.
pub fn globber_for(config: &ScanConfig) -> ScanResult<Globber> {
    let file_filter = FileTypeFilter::new(config.file_extensions.clone(), &config.ignore_files)?;
    let dir_filter = DirExclusionFilter::new(&config.exclude_dirs)?;
    Ok(Globber::new(
        config.roots.clone(),
        Arc::new(file_filter),
        Arc::new(dir_filter),
    )
    .recurse_subdirs(config.recurse_subdirs))
}

/// Searches every file under the configured roots.
///
/// The calling thread walks the roots while `thread_count` workers scan the
/// files it queues. A walk that fails is returned as an error once the
/// workers have drained the queue; partial results are discarded.
pub fn search(config: &ScanConfig) -> ScanResult<SearchOutput> {
    info!("Starting search with patterns: {:?}", config.patterns);

    let metrics = ScanMetrics::new();
    let matcher = PatternMatcher::with_metrics(&config.patterns, config.ignore_case, metrics.clone())?;
    let globber = globber_for(config)?;

    if matcher.is_empty() {
        globber.validate_roots()?;
        debug!("No search patterns provided, returning empty result");
        return Ok(SearchOutput::new());
    }

    let processor = FileProcessor::new(matcher);
    let thread_count = config.thread_count.get();
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .thread_name(|i| format!("linescout-worker-{i}"))
        .build()
        .map_err(|e| ScanError::worker_pool(e.to_string()))?;

    let (producer, consumer) = file_queue(config.queue_capacity.get());
    let queue_stats = producer.stats();
    let (result_tx, result_rx) = unbounded();
    let files_scanned = AtomicUsize::new(0);

    debug!(
        "Scanning with {} workers, queue capacity {}",
        thread_count,
        producer.capacity()
    );

    let walk = pool.in_place_scope(|scope| {
        for _ in 0..thread_count {
            let consumer = consumer.clone();
            let result_tx = result_tx.clone();
            let processor = &processor;
            let files_scanned = &files_scanned;
            scope.spawn(move |_| scan_worker(&consumer, processor, &result_tx, files_scanned));
        }
        // Only workers hold consumers now, so losing them all unblocks the walker.
        drop(consumer);
        globber.run(producer)
    });
    drop(result_tx);

    debug!(
        "Queue handled {} paths, {} backpressure waits",
        queue_stats.popped(),
        queue_stats.backpressure_count()
    );
    let walk = walk?;

    let mut result = SearchOutput::new();
    for file_result in result_rx.try_iter() {
        result.add_file_result(file_result);
    }
    result.sort_by_path();
    result.files_scanned = files_scanned.load(Ordering::Relaxed);
    result.walk = walk;

    metrics.log_stats();
    info!(
        "Search complete. Found {} matches in {} files ({} scanned)",
        result.total_matches, result.files_with_matches, result.files_scanned
    );

    Ok(result)
}

fn scan_worker(
    consumer: &FileQueueConsumer,
    processor: &FileProcessor,
    results: &Sender<FileResult>,
    files_scanned: &AtomicUsize,
) {
    for path in consumer.iter() {
        match processor.process_file(&path) {
            Ok(file_result) => {
                files_scanned.fetch_add(1, Ordering::Relaxed);
                if !file_result.matches.is_empty() && results.send(file_result).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                processor.metrics().record_read_failure();
            }
        }
    }
}
