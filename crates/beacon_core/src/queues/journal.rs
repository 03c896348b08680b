use super::QueueSettings;
use crate::destination::{DebugSink, DestinationQueue};
use crate::error::QueueError;
use crate::render::Payload;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File-backed destination queue.
///
/// Payloads are appended as JSON lines to `<dir>/<escaped-id>.jsonl`
/// and mirrored in memory. After a flush or an overflow the file is
/// rewritten (write-then-rename) to hold exactly the remaining entries, so
/// pending payloads survive process restarts.
pub struct JournalQueue {
    path: PathBuf,
    pending: Mutex<VecDeque<Payload>>,
    settings: QueueSettings,
}

impl JournalQueue {
    pub(crate) async fn open(dir: &Path, settings: QueueSettings) -> Result<Self, QueueError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.jsonl", file_stem(&settings.destination.id)));

        let mut pending = VecDeque::new();
        if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Payload>(line) {
                    Ok(payload) => {
                        settings.enqueue_bounded(&mut pending, payload);
                    }
                    Err(e) => warn!(
                        journal = %path.display(),
                        line = line_no + 1,
                        "Skipping corrupt journal entry: {}",
                        e
                    ),
                }
            }
            debug!(journal = %path.display(), entries = pending.len(), "Recovered journal");
        }

        Ok(Self {
            path,
            pending: Mutex::new(pending),
            settings,
        })
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn rewrite(&self, pending: &VecDeque<Payload>) -> Result<(), QueueError> {
        let mut content = String::new();
        for payload in pending {
            content.push_str(&serde_json::to_string(payload)?);
            content.push('\n');
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DestinationQueue for JournalQueue {
    async fn push(&self, payload: Payload) -> Result<(), QueueError> {
        let mut line = serde_json::to_string(&payload)?;
        line.push('\n');

        let mut pending = self.pending.lock().await;
        // Disk first: a failed append leaves the in-memory queue untouched.
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        let dropped = self.settings.enqueue_bounded(&mut pending, payload);
        if dropped > 0 {
            // The payload is already durable; a failed compaction only leaves
            // the dropped entries on disk until the next rewrite.
            if let Err(e) = self.rewrite(&pending).await {
                warn!(journal = %self.path.display(), dropped, "Journal compaction failed: {}", e);
            }
        }
        Ok(())
    }

    async fn flush(&self, sink: Option<Arc<dyn DebugSink>>) -> Result<(), QueueError> {
        let mut pending = self.pending.lock().await;
        let result = self.settings.drain(&mut pending, sink).await;
        match result {
            Ok(0) => Ok(()),
            Ok(_) => self.rewrite(&pending).await,
            Err(e) => {
                // Batches delivered before the failure are gone from memory;
                // the journal has to follow.
                self.rewrite(&pending).await?;
                Err(e)
            }
        }
    }

    async fn wait_ready(&self) -> Result<(), QueueError> {
        match self.path.parent() {
            Some(dir) if tokio::fs::try_exists(dir).await? => Ok(()),
            _ => Err(QueueError::NotReady(format!(
                "journal directory for {} is missing",
                self.path.display()
            ))),
        }
    }

    async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Maps a destination id to a file stem, one-to-one.
///
/// ASCII letters, digits and `-` are kept; every other byte, `_` included,
/// becomes `_xx` (lowercase hex), so distinct ids never share a journal.
fn file_stem(destination_id: &str) -> String {
    let mut stem = String::with_capacity(destination_id.len());
    for byte in destination_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{:02x}", byte));
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_source::RemoteConfig;
    use crate::destination::{Destination, QueueFactory};
    use crate::queues::StandardQueueFactory;
    use serde_json::json;
    use tempfile::TempDir;

    fn payload(n: u64) -> Payload {
        let mut p = Payload::new();
        p.insert("n".to_string(), json!(n));
        p
    }

    async fn open(dir: &Path, batch_size: usize, max_queue_length: usize) -> Arc<dyn DestinationQueue> {
        StandardQueueFactory::journal(dir)
            .open(
                &Destination::new("eu/primary", "https://eu.example"),
                &RemoteConfig { batch_size, max_queue_length },
                None,
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_file_stem_escapes_ids() {
        assert_eq!(file_stem("eu/primary"), "eu_2fprimary");
        assert_eq!(file_stem("eu_primary"), "eu_5fprimary");
        assert_eq!(file_stem("us-east-1"), "us-east-1");
        assert_eq!(file_stem("zürich"), "z_c3_bcrich");
        assert_ne!(file_stem("a_2f"), file_stem("a/"));
    }

    #[tokio::test]
    async fn test_pending_payloads_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let queue = open(dir.path(), 10, 100).await;
        queue.push(payload(1)).await.unwrap();
        queue.push(payload(2)).await.unwrap();
        drop(queue);

        let reopened = open(dir.path(), 10, 100).await;
        assert_eq!(reopened.len().await, 2);
        assert!(reopened.wait_ready().await.is_ok());
    }

    #[tokio::test]
    async fn test_flush_truncates_journal() {
        let dir = TempDir::new().unwrap();
        let queue = open(dir.path(), 1, 100).await;
        queue.push(payload(1)).await.unwrap();
        queue.push(payload(2)).await.unwrap();
        queue.flush(None).await.unwrap();
        assert_eq!(queue.len().await, 0);

        let content = tokio::fs::read_to_string(dir.path().join("eu_2fprimary.jsonl")).await.unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn test_overflow_rewrites_journal() {
        let dir = TempDir::new().unwrap();
        let queue = open(dir.path(), 10, 2).await;
        for n in 0..4 {
            queue.push(payload(n)).await.unwrap();
        }

        let content = tokio::fs::read_to_string(dir.path().join("eu_2fprimary.jsonl")).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![r#"{"n":2}"#, r#"{"n":3}"#]);
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("eu_2fprimary.jsonl"), "{\"n\":1}\nnot json\n{\"n\":2}\n")
            .await
            .unwrap();

        let queue = open(dir.path(), 10, 100).await;
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn test_ids_that_clean_up_alike_keep_separate_journals() {
        let dir = TempDir::new().unwrap();
        let factory = StandardQueueFactory::journal(dir.path());
        let remote = RemoteConfig { batch_size: 10, max_queue_length: 100 };
        let ids = ["eu/primary", "eu_primary"];

        for (n, id) in ids.iter().enumerate() {
            let queue = factory
                .open(&Destination::new(*id, "https://eu.example"), &remote, None)
                .await
                .unwrap();
            queue.push(payload(n as u64)).await.unwrap();
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
        files.sort();
        assert_eq!(files, vec!["eu_2fprimary.jsonl", "eu_5fprimary.jsonl"]);

        for id in ids {
            let reopened = factory
                .open(&Destination::new(id, "https://eu.example"), &remote, None)
                .await
                .unwrap();
            assert_eq!(reopened.len().await, 1, "pending entries for {}", id);
        }
    }

    #[tokio::test]
    async fn test_failed_append_leaves_queue_unchanged() {
        let dir = TempDir::new().unwrap();
        let queue = open(dir.path(), 10, 100).await;
        queue.push(payload(1)).await.unwrap();

        // A directory where the journal file should be makes every append fail.
        let path = dir.path().join("eu_2fprimary.jsonl");
        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();

        assert!(queue.push(payload(2)).await.is_err());
        assert_eq!(queue.len().await, 1);
    }
}
