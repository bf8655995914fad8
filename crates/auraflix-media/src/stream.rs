//! Range-aware streaming of stored assets.
//!
//! [`RangeStreamer::prepare`] turns a file, its size and an optional `Range`
//! header into a [`StreamResult`]: status, headers and a lazy
//! [`ChunkStream`] covering exactly the selected window. Nothing is read
//! until the body is polled, and at most one chunk is held at a time.

use std::fmt;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;

use crate::error::{Error, Result};
use crate::range::{parse_range_header, RangeWindow};
use crate::types::DEFAULT_CHUNK_SIZE;

/// Called once when the last byte of a window has been emitted.
pub type CompletionHook = Box<dyn FnOnce() + Send + 'static>;

/// Prepares range responses for stored files.
#[derive(Debug, Clone, Copy)]
pub struct RangeStreamer {
    chunk_size: usize,
}

impl Default for RangeStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

/// Status, headers and body for serving one asset.
pub struct StreamResult {
    /// 200 for the whole file, 206 for a range.
    pub status: u16,
    /// Response headers, lower-case names.
    pub headers: Vec<(&'static str, String)>,
    /// The window's bytes.
    pub body: ChunkStream,
    window: Option<RangeWindow>,
}

impl StreamResult {
    /// The served window, `None` for an empty file.
    pub fn window(&self) -> Option<RangeWindow> {
        self.window
    }

    /// Look up a header by lower-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Split into status, headers and body.
    pub fn into_parts(self) -> (u16, Vec<(&'static str, String)>, ChunkStream) {
        (self.status, self.headers, self.body)
    }

    /// Attach a hook fired when the whole window has been emitted.
    pub fn on_complete(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.body = self.body.on_complete(hook);
        self
    }
}

impl fmt::Debug for StreamResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResult")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl RangeStreamer {
    /// Create a streamer emitting chunks of at most `chunk_size` bytes.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Build the response for `path`, whose size is `size`.
    ///
    /// The range header is validated before the file is opened, so a
    /// malformed or unsatisfiable range never touches storage.
    pub async fn prepare(
        &self,
        path: &Path,
        size: u64,
        range_header: Option<&str>,
        content_type: &str,
    ) -> Result<StreamResult> {
        let (status, window) = match range_header {
            Some(value) => {
                let window = parse_range_header(value)?.resolve(size)?;
                (206, Some(window))
            }
            None => (200, RangeWindow::full(size)),
        };

        let body = match window {
            Some(window) => {
                let mut file = File::open(path).await.map_err(|e| open_error(path, e))?;
                if window.start() > 0 {
                    file.seek(SeekFrom::Start(window.start()))
                        .await
                        .map_err(|e| Error::storage(path, e))?;
                }
                ChunkStream::new(file.take(window.len()), window.len(), self.chunk_size)
            }
            None => ChunkStream::empty(),
        };

        let length = window.map(|w| w.len()).unwrap_or(0);
        let mut headers = vec![
            ("content-type", content_type.to_string()),
            ("content-length", length.to_string()),
            ("accept-ranges", "bytes".to_string()),
        ];
        if status == 206 {
            if let Some(window) = window {
                headers.push(("content-range", window.content_range()));
            }
        }

        tracing::debug!(
            path = %path.display(),
            status,
            bytes = length,
            "Prepared media stream"
        );

        Ok(StreamResult {
            status,
            headers,
            body,
            window,
        })
    }
}

fn open_error(path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::not_found("file", path.display())
    } else {
        Error::storage(path, e)
    }
}

/// Lazy, single-pass stream over one window of a file.
///
/// Yields chunks no larger than the configured chunk size and exactly the
/// window's length in total. A file that ends early yields one
/// [`io::ErrorKind::UnexpectedEof`] error and then ends.
pub struct ChunkStream {
    inner: Option<ReaderStream<Take<File>>>,
    remaining: u64,
    on_complete: Option<CompletionHook>,
}

impl ChunkStream {
    fn new(reader: Take<File>, len: u64, chunk_size: usize) -> Self {
        Self {
            inner: Some(ReaderStream::with_capacity(reader, chunk_size)),
            remaining: len,
            on_complete: None,
        }
    }

    fn empty() -> Self {
        Self {
            inner: None,
            remaining: 0,
            on_complete: None,
        }
    }

    /// Set the completion hook.
    pub fn on_complete(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Bytes not yet emitted.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn complete(&mut self) {
        if let Some(hook) = self.on_complete.take() {
            hook();
        }
    }
}

impl Stream for ChunkStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let Some(inner) = this.inner.as_mut() else {
            if this.remaining == 0 {
                this.complete();
            }
            return Poll::Ready(None);
        };

        match ready!(Pin::new(inner).poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.remaining = this.remaining.saturating_sub(chunk.len() as u64);
                if this.remaining == 0 {
                    this.inner = None;
                    this.complete();
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                this.inner = None;
                this.on_complete = None;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.inner = None;
                if this.remaining > 0 {
                    this.on_complete = None;
                    let missing = this.remaining;
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("file ended {missing} bytes before the end of the range"),
                    ))));
                }
                this.complete();
                Poll::Ready(None)
            }
        }
    }
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("remaining", &self.remaining)
            .field("done", &self.inner.is_none())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn write_sample(len: usize) -> (tempfile::TempDir, std::path::PathBuf, Vec<u8>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let data = sample(len);
        std::fs::write(&path, &data).unwrap();
        (dir, path, data)
    }

    async fn collect(mut body: ChunkStream, max_chunk: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            assert!(chunk.len() <= max_chunk);
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn full_file_is_200() {
        let (_dir, path, data) = write_sample(1000);
        let streamer = RangeStreamer::new(64);

        let result = streamer
            .prepare(&path, 1000, None, "video/mp4")
            .await
            .unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(result.header("content-length"), Some("1000"));
        assert_eq!(result.header("content-type"), Some("video/mp4"));
        assert_eq!(result.header("accept-ranges"), Some("bytes"));
        assert_eq!(result.header("content-range"), None);

        assert_eq!(collect(result.body, 64).await.unwrap(), data);
    }

    #[tokio::test]
    async fn open_range_is_206() {
        let (_dir, path, data) = write_sample(1000);
        let streamer = RangeStreamer::new(64);

        let result = streamer
            .prepare(&path, 1000, Some("bytes=0-"), "video/mp4")
            .await
            .unwrap();
        assert_eq!(result.status, 206);
        assert_eq!(result.header("content-range"), Some("bytes 0-999/1000"));
        assert_eq!(result.header("content-length"), Some("1000"));
        assert_eq!(collect(result.body, 64).await.unwrap(), data);
    }

    #[tokio::test]
    async fn windows_match_source_bytes() {
        let (_dir, path, data) = write_sample(5000);
        let streamer = RangeStreamer::new(100);

        for (header, start, end) in [
            ("bytes=0-0", 0usize, 0usize),
            ("bytes=10-209", 10, 209),
            ("bytes=4900-", 4900, 4999),
            ("bytes=-250", 4750, 4999),
            ("bytes=4990-9000", 4990, 4999),
        ] {
            let result = streamer
                .prepare(&path, 5000, Some(header), "video/mp4")
                .await
                .unwrap();
            let window = result.window().unwrap();
            assert_eq!(window.start() as usize, start, "{header}");
            assert_eq!(window.end() as usize, end, "{header}");
            let body = collect(result.body, 100).await.unwrap();
            assert_eq!(body, &data[start..=end], "{header}");
        }
    }

    #[tokio::test]
    async fn bad_ranges_do_not_open_file() {
        let streamer = RangeStreamer::new(64);
        let missing = Path::new("/nonexistent/clip.mp4");

        assert_matches!(
            streamer
                .prepare(missing, 100, Some("bytes=abc-def"), "video/mp4")
                .await,
            Err(Error::MalformedRange(_))
        );
        assert_matches!(
            streamer
                .prepare(missing, 100, Some("bytes=100-110"), "video/mp4")
                .await,
            Err(Error::RangeNotSatisfiable { size: 100 })
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let streamer = RangeStreamer::new(64);
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            streamer
                .prepare(&dir.path().join("gone.mp4"), 10, None, "video/mp4")
                .await,
            Err(Error::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn hook_fires_once_after_last_byte() {
        let (_dir, path, _) = write_sample(300);
        let streamer = RangeStreamer::new(100);
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = count.clone();

        let result = streamer
            .prepare(&path, 300, Some("bytes=50-"), "video/mp4")
            .await
            .unwrap()
            .on_complete(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            });

        let mut body = result.body;
        assert_eq!(body.remaining(), 250);
        let mut seen = 0;
        while let Some(chunk) = body.next().await {
            seen += chunk.unwrap().len();
            assert_eq!(body.remaining(), 250 - seen as u64);
            if seen < 250 {
                assert_eq!(count.load(Ordering::SeqCst), 0);
            }
        }
        assert_eq!(seen, 250);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(body.next().await.is_none());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_stream_never_fires_hook() {
        let (_dir, path, _) = write_sample(300);
        let streamer = RangeStreamer::new(100);
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = count.clone();

        let result = streamer
            .prepare(&path, 300, None, "video/mp4")
            .await
            .unwrap()
            .on_complete(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            });

        let mut body = result.body;
        let first = body.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 100);
        drop(body);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn truncated_file_yields_unexpected_eof() {
        let (_dir, path, _) = write_sample(100);
        let streamer = RangeStreamer::new(64);
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = count.clone();

        // Claim the file is larger than it is.
        let result = streamer
            .prepare(&path, 200, None, "video/mp4")
            .await
            .unwrap()
            .on_complete(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            });

        let err = collect(result.body, 64).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_file() {
        let (_dir, path, _) = write_sample(0);
        let streamer = RangeStreamer::default();
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = count.clone();

        let result = streamer
            .prepare(&path, 0, None, "video/mp4")
            .await
            .unwrap()
            .on_complete(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            });
        assert_eq!(result.status, 200);
        assert_eq!(result.header("content-length"), Some("0"));
        assert!(result.window().is_none());
        assert!(collect(result.body, 1).await.unwrap().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert_matches!(
            streamer
                .prepare(&path, 0, Some("bytes=0-"), "video/mp4")
                .await,
            Err(Error::RangeNotSatisfiable { size: 0 })
        );
    }
}
