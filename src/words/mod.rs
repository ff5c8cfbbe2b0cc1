pub mod transform;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 1024;

/// Lazy token stream consumed by the scan driver. The channel closes on
/// exhaustion; the source is not restartable.
pub struct WordSource {
    rx: mpsc::Receiver<String>,
}

impl WordSource {
    /// Streams a wordlist file line by line. The file is opened eagerly so
    /// a missing path fails before the scan starts; feeding happens in a
    /// background task.
    pub async fn from_file(path: &str) -> Result<Self, String> {
        let handle = File::open(path)
            .await
            .map_err(|e| format!("failed to open wordlist '{path}': {e}"))?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let buf = BufReader::new(handle);
            let mut lines = buf.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let word = line.trim();
                if word.is_empty() || word.starts_with('#') {
                    continue;
                }
                if tx.send(word.to_string()).await.is_err() {
                    break;
                }
            }
        });
        Ok(Self { rx })
    }

    /// In-memory source, used for single-token scans and tests.
    pub fn from_vec(words: Vec<String>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY.max(1));
        tokio::spawn(async move {
            for word in words {
                if tx.send(word).await.is_err() {
                    break;
                }
            }
        });
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vec_source_drains_in_order_then_closes() {
        let mut source = WordSource::from_vec(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(source.next().await.as_deref(), Some("a"));
        assert_eq!(source.next().await.as_deref(), Some("b"));
        assert!(source.next().await.is_none());
    }

    #[tokio::test]
    async fn file_source_skips_blanks_and_comments() {
        let dir = std::env::temp_dir().join("pathspray-words-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("list.txt");
        std::fs::write(&path, "admin\n\n# comment\nlogin\n").unwrap();

        let mut source = WordSource::from_file(path.to_str().unwrap()).await.unwrap();
        let mut out = Vec::new();
        while let Some(word) = source.next().await {
            out.push(word);
        }
        assert_eq!(out, vec!["admin".to_string(), "login".to_string()]);
    }

    #[tokio::test]
    async fn missing_file_errors_eagerly() {
        assert!(WordSource::from_file("/definitely/not/here.txt")
            .await
            .is_err());
    }
}
