//! Daemon log file reading.

use std::future::Future;
use std::io::{SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::types::ProcessError;

fn io_err(path: &Path, source: std::io::Error) -> ProcessError {
    ProcessError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The last `n` lines of the file.
pub async fn tail_lines(path: &Path, n: usize) -> Result<Vec<String>, ProcessError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| io_err(path, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}

/// Copy bytes appended to `path` into `out` until `stop` resolves.
///
/// Starts at the current end of the file. If the file shrinks it was
/// rotated or truncated, and reading restarts from the beginning.
pub async fn follow_file<W, S>(
    path: &Path,
    poll: Duration,
    out: &mut W,
    stop: S,
) -> Result<(), ProcessError>
where
    W: Write,
    S: Future<Output = ()>,
{
    let mut offset = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(io_err(path, e)),
    };
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => return Ok(()),
            _ = tokio::time::sleep(poll) => {}
        }

        let len = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(io_err(path, e)),
        };
        if len < offset {
            offset = 0;
        }
        if len == offset {
            continue;
        }

        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| io_err(path, e))?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| io_err(path, e))?;
        let mut buf = Vec::with_capacity((len - offset) as usize);
        file.read_to_end(&mut buf)
            .await
            .map_err(|e| io_err(path, e))?;

        offset += buf.len() as u64;
        out.write_all(&buf)
            .and_then(|_| out.flush())
            .map_err(|e| io_err(path, e))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_tail_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("courtwatch.log");
        std::fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();

        assert_eq!(tail_lines(&path, 2).await.unwrap(), vec!["three", "four"]);
        assert_eq!(tail_lines(&path, 10).await.unwrap().len(), 4);
        assert!(tail_lines(&path, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tail_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = tail_lines(&dir.path().join("nope.log"), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Io { .. }));
    }

    #[tokio::test]
    async fn test_follow_picks_up_appended_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("courtwatch.log");
        std::fs::write(&path, "old line\n").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&writer_path)
                .unwrap();
            file.write_all(b"new line\n").unwrap();
        });

        let mut out = Vec::new();
        follow_file(
            &path,
            Duration::from_millis(10),
            &mut out,
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap();
        writer.await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "new line\n");
    }
}
