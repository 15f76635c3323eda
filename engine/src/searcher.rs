use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::matcher::{self, Match};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Search capability: one query in, the matching lines of the whole corpus
/// out. Inter-document result order is unspecified.
#[async_trait]
pub trait Search: Send + Sync {
    async fn search(&self, query: &str, cancel: &CancellationToken) -> Vec<Match>;
}

/// Document retrieval capability: byte-exact passthrough of a single
/// document, re-read from disk on every call.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, name: &str) -> Result<String>;
}

/// Substring search across the regular files of one directory.
///
/// The file set is fixed at construction. A document deleted from disk
/// afterwards yields a scan failure for that document on the next search,
/// never an error for the caller.
pub struct DirSearcher {
    root_dir: PathBuf,
    file_set: Vec<String>,
    max_concurrent: usize,
    #[cfg(test)]
    scan_gauge: Arc<ScanGauge>,
}

impl DirSearcher {
    /// Validate the configuration and enumerate the file set.
    ///
    /// Fails if the job count is not positive or the root directory cannot
    /// be listed. Both are fatal startup errors.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let file_set = enumerate_files(&config.root_dir)?;
        debug!(
            "enumerated {} documents under {}",
            file_set.len(),
            config.root_dir.display()
        );
        Ok(Self {
            root_dir: config.root_dir,
            file_set,
            max_concurrent: config.max_concurrent,
            #[cfg(test)]
            scan_gauge: Arc::default(),
        })
    }

    /// Names of the searchable documents, in directory listing order.
    pub fn file_set(&self) -> &[String] {
        &self.file_set
    }

    /// Scan every document in the file set for `query`, running at most
    /// `max_concurrent` file scans at a time.
    ///
    /// Cancellation is checked only while waiting for a permit: firing the
    /// token stops further dispatch, but workers that already hold a permit
    /// run to completion and their matches are kept. The call returns once
    /// every dispatched worker has finished.
    pub async fn search(&self, query: &str, cancel: &CancellationToken) -> Vec<Match> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let query = query.to_string();
        let mut tasks = Vec::with_capacity(self.file_set.len());

        for name in &self.file_set {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("search cancelled, halting dispatch");
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // The semaphore is never closed while dispatching.
                    Err(_) => break,
                },
            };

            let name = name.clone();
            let path = self.root_dir.join(&name);
            let query = query.clone();
            #[cfg(test)]
            let gauge = self.scan_gauge.clone();
            tasks.push(tokio::spawn(async move {
                let found = {
                    #[cfg(test)]
                    let _active = ScanGauge::enter(&gauge);
                    scan_document(&path, &name, &query).await
                };
                drop(permit);
                found
            }));
        }

        let dispatched = tasks.len();
        let mut matches = Vec::new();
        for task in tasks {
            match task.await {
                Ok(found) => matches.extend(found),
                Err(err) => warn!("search worker panicked: {err}"),
            }
        }

        debug!(
            "search for {query:?} produced {} matches from {dispatched} documents",
            matches.len()
        );
        matches
    }

    /// Return the full content of a named document.
    ///
    /// Only names from the enumerated file set resolve; anything else is
    /// `DocumentNotFound`, including files that appeared on disk after
    /// startup.
    pub async fn get_document(&self, name: &str) -> Result<String> {
        if !self.file_set.iter().any(|doc| doc == name) {
            return Err(EngineError::DocumentNotFound(name.to_string()));
        }
        tokio::fs::read_to_string(self.root_dir.join(name))
            .await
            .map_err(|err| {
                warn!("failed to read document {name}: {err}");
                EngineError::DocumentNotFound(name.to_string())
            })
    }
}

#[async_trait]
impl Search for DirSearcher {
    async fn search(&self, query: &str, cancel: &CancellationToken) -> Vec<Match> {
        DirSearcher::search(self, query, cancel).await
    }
}

#[async_trait]
impl DocumentStore for DirSearcher {
    async fn get_document(&self, name: &str) -> Result<String> {
        DirSearcher::get_document(self, name).await
    }
}

/// Scan one document and stamp every match with its name. A document that
/// cannot be read contributes zero matches; one unreadable file must not
/// fail the surrounding search.
async fn scan_document(path: &Path, name: &str, query: &str) -> Vec<Match> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) => {
            warn!("failed to read document {name}: {err}");
            return Vec::new();
        }
    };
    let mut found = matcher::match_lines(&content, query);
    for m in &mut found {
        m.document = name.to_string();
    }
    found
}

/// Test-only high-water mark of concurrently running file scans. One gauge
/// per searcher, entered while a worker scans and left before it releases
/// its permit, so the peak is comparable against `max_concurrent`.
#[cfg(test)]
#[derive(Default)]
struct ScanGauge {
    active: std::sync::atomic::AtomicUsize,
    peak: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScanGauge {
    fn enter(gauge: &Arc<Self>) -> ActiveScan {
        use std::sync::atomic::Ordering;
        let active = gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(active, Ordering::SeqCst);
        ActiveScan(gauge.clone())
    }

    fn peak(&self) -> usize {
        self.peak.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
struct ActiveScan(Arc<ScanGauge>);

#[cfg(test)]
impl Drop for ActiveScan {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// List the immediate regular files of `root`. Subdirectories are excluded
/// and there is no recursion; order is whatever the filesystem reports.
fn enumerate_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn corpus() -> Result<TempDir> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("first.txt"), "hello\nworld\n")?;
        std::fs::write(dir.path().join("second.txt"), "nothing here\nHELLO again\n")?;
        std::fs::write(dir.path().join("third.txt"), "unrelated\n")?;
        std::fs::create_dir(dir.path().join("nested"))?;
        std::fs::write(dir.path().join("nested/fourth.txt"), "hello below\n")?;
        Ok(dir)
    }

    fn searcher(dir: &TempDir, max_concurrent: usize) -> Result<DirSearcher> {
        Ok(DirSearcher::new(EngineConfig {
            root_dir: dir.path().to_path_buf(),
            max_concurrent,
        })?)
    }

    fn sorted(mut matches: Vec<Match>) -> Vec<Match> {
        matches.sort_by(|a, b| (&a.document, a.line_num).cmp(&(&b.document, b.line_num)));
        matches
    }

    #[test]
    fn test_enumeration_excludes_subdirectories() -> Result<()> {
        let dir = corpus()?;
        let searcher = searcher(&dir, 4)?;
        let mut names = searcher.file_set().to_vec();
        names.sort();
        assert_eq!(names, vec!["first.txt", "second.txt", "third.txt"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_across_documents() -> Result<()> {
        let dir = corpus()?;
        let searcher = searcher(&dir, 4)?;
        let matches = sorted(searcher.search("hello", &CancellationToken::new()).await);
        assert_eq!(
            matches,
            vec![
                Match {
                    line: "hello".to_string(),
                    line_num: 1,
                    document: "first.txt".to_string(),
                },
                Match {
                    line: "HELLO again".to_string(),
                    line_num: 2,
                    document: "second.txt".to_string(),
                },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_search_empty_directory() -> Result<()> {
        let dir = TempDir::new()?;
        let searcher = searcher(&dir, 4)?;
        let matches = searcher.search("anything", &CancellationToken::new()).await;
        assert_eq!(matches, vec![]);
        Ok(())
    }

    #[tokio::test]
    async fn test_precancelled_search_spawns_no_workers() -> Result<()> {
        let dir = corpus()?;
        let searcher = searcher(&dir, 4)?;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let matches = searcher.search("hello", &cancel).await;
        assert_eq!(matches, vec![]);
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_file_skipped_not_fatal() -> Result<()> {
        let dir = corpus()?;
        let searcher = searcher(&dir, 4)?;
        std::fs::remove_file(dir.path().join("first.txt"))?;
        let matches = searcher.search("hello", &CancellationToken::new()).await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].document, "second.txt");
        Ok(())
    }

    #[tokio::test]
    async fn test_single_permit_still_scans_every_file() -> Result<()> {
        let dir = TempDir::new()?;
        for i in 0..8 {
            std::fs::write(dir.path().join(format!("{i}.txt")), format!("match {i}\n"))?;
        }
        let searcher = searcher(&dir, 1)?;
        let matches = searcher.search("match", &CancellationToken::new()).await;
        assert_eq!(matches.len(), 8);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_mid_dispatch_keeps_granted_workers() -> Result<()> {
        let dir = TempDir::new()?;
        for i in 0..4 {
            std::fs::write(dir.path().join(format!("{i}.txt")), format!("match {i}\n"))?;
        }
        let searcher = searcher(&dir, 1)?;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        // On the current-thread test runtime this task is queued ahead of
        // every worker, so it fires exactly when the dispatch loop suspends
        // waiting for the second permit: after one file was dispatched,
        // before any other could be.
        tokio::spawn(async move {
            trigger.cancel();
        });

        let matches = searcher.search("match", &cancel).await;

        // The granted worker ran to completion and its matches were kept;
        // dispatch stopped short of the remaining files.
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].document, searcher.file_set()[0]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scans_never_exceed_limit() -> Result<()> {
        let dir = TempDir::new()?;
        for i in 0..16 {
            std::fs::write(dir.path().join(format!("{i}.txt")), format!("match {i}\n"))?;
        }
        let searcher = searcher(&dir, 2)?;
        let matches = searcher.search("match", &CancellationToken::new()).await;
        assert_eq!(matches.len(), 16);
        assert!(searcher.scan_gauge.peak() <= 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_searches_are_idempotent() -> Result<()> {
        let dir = corpus()?;
        let searcher = searcher(&dir, 2)?;
        let first = sorted(searcher.search("hello", &CancellationToken::new()).await);
        let second = sorted(searcher.search("hello", &CancellationToken::new()).await);
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn test_line_order_within_document() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("doc.txt"), "kek\nother\nkek\nkek\n")?;
        let searcher = searcher(&dir, 4)?;
        let matches = searcher.search("kek", &CancellationToken::new()).await;
        let line_nums: Vec<usize> = matches.iter().map(|m| m.line_num).collect();
        assert_eq!(line_nums, vec![1, 3, 4]);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_document_roundtrip() -> Result<()> {
        let dir = corpus()?;
        let searcher = searcher(&dir, 4)?;
        let content = searcher.get_document("first.txt").await?;
        assert_eq!(content, "hello\nworld\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_get_document_unknown_name() -> Result<()> {
        let dir = corpus()?;
        let searcher = searcher(&dir, 4)?;
        let err = searcher.get_document("missing.txt").await;
        assert!(matches!(err, Err(EngineError::DocumentNotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_document_rejects_names_outside_file_set() -> Result<()> {
        let dir = corpus()?;
        let searcher = searcher(&dir, 4)?;
        // Exists on disk but was never enumerated.
        let err = searcher.get_document("nested/fourth.txt").await;
        assert!(matches!(err, Err(EngineError::DocumentNotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_document_deleted_after_enumeration() -> Result<()> {
        let dir = corpus()?;
        let searcher = searcher(&dir, 4)?;
        std::fs::remove_file(dir.path().join("third.txt"))?;
        let err = searcher.get_document("third.txt").await;
        assert!(matches!(err, Err(EngineError::DocumentNotFound(_))));
        Ok(())
    }
}
