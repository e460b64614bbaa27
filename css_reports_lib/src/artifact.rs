//! Temporary report files and their handoff to the caller.
//!
//! A [`ReportArtifact`] owns its file through a [`TempPath`], so the file is
//! removed whenever the artifact (or the stream it is turned into) is
//! dropped: after a completed delivery, on an error, or when the task
//! serving it is cancelled.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tempfile::TempPath;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::io::ReaderStream;

use crate::filter::{filter_lines, FilterStats, RowFilter};

const FILE_PREFIX: &str = "css-report-";
const FILE_SUFFIX: &str = ".csv";

/// A filtered report written to local storage.
#[derive(Debug)]
pub struct ReportArtifact {
    path: TempPath,
    stats: FilterStats,
}

impl ReportArtifact {
    /// Filters `reader` into a new temporary file under `dir`.
    ///
    /// If filtering fails part way the partial file is removed before the
    /// error is returned.
    pub async fn create<R>(dir: &Path, reader: R, filter: &RowFilter) -> io::Result<Self>
    where
        R: AsyncBufRead + Unpin,
    {
        let (file, path) = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(FILE_SUFFIX)
            .tempfile_in(dir)?
            .into_parts();
        let mut writer = BufWriter::new(tokio::fs::File::from_std(file));
        let stats = filter_lines(reader, &mut writer, filter).await?;
        writer.into_inner().sync_all().await?;
        Ok(Self { path, stats })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    /// Copies the report into `writer`, then deletes the file.
    pub async fn deliver<W>(self, writer: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let copied = tokio::io::copy(&mut file, writer).await?;
        writer.flush().await?;
        drop(file);
        self.path.close()?;
        Ok(copied)
    }

    /// Opens the report as a byte stream that deletes the file when dropped.
    pub async fn into_stream(self) -> io::Result<ArtifactStream> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(ArtifactStream {
            inner: ReaderStream::new(file),
            _path: self.path,
        })
    }
}

/// Chunked body of a report artifact.
///
/// `inner` is declared first so the file handle closes before the path is
/// removed.
pub struct ArtifactStream {
    inner: ReaderStream<tokio::fs::File>,
    _path: TempPath,
}

impl Stream for ArtifactStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
