//! Line-oriented extraction of raw frames from a response body.
//!
//! A v2 response body is a JSON array with one frame per line: the first
//! line opens with `[`, every following line continues with `,` and the
//! stream ends at a line opening with `]`. The reader hands out one frame's
//! bytes at a time and never buffers more than that.

use bytes::Bytes;
use futures::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Kind, KustoError, Op, Result};
use crate::models::v2::OneApiError;

const FRAME_TYPE_PEEK_WINDOW: usize = 256;

pub(crate) struct FrameReader<R> {
    reader: R,
    buf: Vec<u8>,
    started: bool,
    finished: bool,
    cancel: CancellationToken,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub(crate) fn new(reader: R, cancel: CancellationToken) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            started: false,
            finished: false,
            cancel,
        }
    }

    /// The raw bytes of the next frame, or `None` once the closing `]` has
    /// been seen.
    ///
    /// A body that does not open with `[` is a server error envelope and
    /// fails with a single fatal error carrying the whole payload.
    pub(crate) async fn next_frame(&mut self) -> Result<Option<&[u8]>> {
        let skip = loop {
            if self.finished {
                return Ok(None);
            }
            self.buf.clear();
            let read = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                read = self.reader.read_until(b'\n', &mut self.buf) => read?,
            };
            if read == 0 {
                if !self.started {
                    return Err(self.into_envelope_error().await);
                }
                return Err(KustoError::new(
                    Op::Query,
                    Kind::Internal,
                    "the response stream ended without completing the dataset",
                )
                .into());
            }
            while matches!(self.buf.last(), Some(b'\n') | Some(b'\r')) {
                self.buf.pop();
            }
            if self.buf.is_empty() {
                continue;
            }

            if !self.started {
                if self.buf[0] != b'[' {
                    return Err(self.into_envelope_error().await);
                }
                self.started = true;
                match self.buf.get(1) {
                    None => continue,
                    Some(b']') => {
                        self.finished = true;
                        return Ok(None);
                    }
                    Some(_) => break 1,
                }
            }

            match self.buf[0] {
                b',' => break 1,
                b']' => {
                    self.finished = true;
                    return Ok(None);
                }
                other => {
                    return Err(KustoError::new(
                        Op::Query,
                        Kind::Internal,
                        format!("malformed frame separator {:?}", other as char),
                    )
                    .into())
                }
            }
        };

        Ok(Some(&self.buf[skip..]))
    }

    async fn into_envelope_error(&mut self) -> Error {
        let mut body = std::mem::take(&mut self.buf);
        let _ = self.reader.read_to_end(&mut body).await;
        self.finished = true;
        envelope_error(Bytes::from(body))
    }
}

/// Converts a non-stream response body into a fatal error, decoding the
/// server error envelope when there is one.
pub(crate) fn envelope_error(body: Bytes) -> Error {
    let err = KustoError::new(
        Op::Query,
        Kind::HttpError,
        format!(
            "the response is not a frame stream: {}",
            String::from_utf8_lossy(&body)
        ),
    );
    match serde_json::from_slice::<OneApiError>(&body) {
        Ok(payload) => err.with_payload(payload).into(),
        Err(_) => err.into(),
    }
}

/// Locates the value of the `"FrameType"` key with a bounded byte scan,
/// without parsing the frame.
pub(crate) fn peek_frame_type(frame: &[u8]) -> Option<&str> {
    const KEY: &[u8] = b"\"FrameType\"";
    let window = &frame[..frame.len().min(FRAME_TYPE_PEEK_WINDOW)];
    let key_end = window.windows(KEY.len()).position(|w| w == KEY)? + KEY.len();

    let mut rest = &frame[key_end..];
    let colon = rest.iter().position(|b| !b.is_ascii_whitespace())?;
    if rest[colon] != b':' {
        return None;
    }
    rest = &rest[colon + 1..];
    let quote = rest.iter().position(|b| !b.is_ascii_whitespace())?;
    if rest[quote] != b'"' {
        return None;
    }
    rest = &rest[quote + 1..];
    let end = rest.iter().position(|&b| b == b'"')?;
    std::str::from_utf8(&rest[..end]).ok()
}
