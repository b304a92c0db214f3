use std::io;
use std::path::{Path, PathBuf};

use compio::io::compat::AsyncStream;
use compio::net::TcpStream;
use futures::{future, stream};
use futures::io::{AsyncBufRead, BufReader, Cursor};
use futures::{AsyncBufReadExt, Stream, TryStreamExt};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::ext::BestEffortPathExt;

/// Splits a line-oriented byte source into raw frames, skipping blank lines.
///
/// Lines are not decoded here: only real read failures end the stream, while
/// a line that is not UTF-8 reaches the session as a malformed frame.
pub fn line_frames<R>(reader: R) -> impl Stream<Item = io::Result<Vec<u8>>>
where
    R: AsyncBufRead,
{
    stream::try_unfold(Box::pin(reader), |mut reader| async move {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(None);
        }
        if line.ends_with(b"\n") {
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
        }
        Ok::<_, io::Error>(Some((line, reader)))
    })
    .try_filter(|line| future::ready(!line.trim_ascii().is_empty()))
}

/// Frames of a stream recorded to disk, one message per line.
pub async fn read_recording(
    path: &Path,
) -> Result<impl Stream<Item = io::Result<Vec<u8>>>, TransportError> {
    debug!("Reading recorded stream from {}", path.best_effort_path_display());
    let bytes = compio::fs::read(path).await.context(ReadRecordingSnafu {
        path: path.to_path_buf(),
    })?;
    debug!("Read {} bytes of recorded frames", bytes.len());

    Ok(line_frames(Cursor::new(bytes)))
}

/// Connects to a producer that writes one message per line over TCP.
pub async fn connect(endpoint: &str) -> Result<impl Stream<Item = io::Result<Vec<u8>>>, TransportError> {
    let stream = TcpStream::connect(endpoint)
        .await
        .context(ConnectSnafu { endpoint })?;
    info!("Connected to producer at {}", endpoint);

    Ok(line_frames(BufReader::new(AsyncStream::new(stream))))
}

#[derive(Debug, Snafu)]
pub enum TransportError {
    #[snafu(display("Failed to read recorded stream {}", path.best_effort_path_display()))]
    ReadRecordingError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to connect to producer at {}", endpoint))]
    ConnectError { endpoint: String, source: io::Error },
}
