use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use whisk_core::{ActionError, InvocationRecord, ResultRecord};

/// Whether the channel serves many invocations or exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// One record per line until end of input.
    Loop,
    /// Read one record (empty input counts as `{}`), then report end of input.
    SingleShot,
}

/// What the input side produced.
#[derive(Debug)]
pub enum Next {
    Invocation(InvocationRecord),
    /// A line that is not an invocation record; still owed one result.
    Malformed(ActionError),
    End,
}

/// Newline-delimited invocation input paired with a separate result sink.
///
/// The sink must not be the stream human-readable output goes to: stdout and
/// stderr are flushed before each result is written, so diagnostic prints
/// never interleave with a result record.
pub struct InvocationChannel<R, W> {
    reader: R,
    writer: W,
    mode: ChannelMode,
    done: bool,
    line: Vec<u8>,
}

impl<R, W> InvocationChannel<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, mode: ChannelMode) -> Self {
        Self {
            reader,
            writer,
            mode,
            done: false,
            line: Vec::new(),
        }
    }

    /// Block until the next invocation arrives or the input ends.
    pub async fn next_invocation(&mut self) -> Result<Next, ActionError> {
        if self.done {
            return Ok(Next::End);
        }

        loop {
            self.line.clear();
            let n = self.reader.read_until(b'\n', &mut self.line).await?;

            if n == 0 {
                self.done = true;
                return Ok(match self.mode {
                    ChannelMode::Loop => Next::End,
                    ChannelMode::SingleShot => Next::Invocation(InvocationRecord::parse("{}")?),
                });
            }

            if self.line.trim_ascii().is_empty() {
                continue;
            }

            if self.mode == ChannelMode::SingleShot {
                self.done = true;
            }

            // a line that is not UTF-8 is still owed a result
            let text = match std::str::from_utf8(&self.line) {
                Ok(text) => text.trim(),
                Err(e) => {
                    let lossy = String::from_utf8_lossy(&self.line);
                    return Ok(Next::Malformed(ActionError::decode(
                        lossy.trim(),
                        "InvocationRecord",
                        e,
                    )));
                }
            };

            return Ok(match InvocationRecord::parse(text) {
                Ok(record) => Next::Invocation(record),
                Err(e) => Next::Malformed(e),
            });
        }
    }

    /// Write one result record, newline-terminated, and flush it.
    pub async fn emit_result(&mut self, result: &ResultRecord) -> Result<(), ActionError> {
        // diagnostics first; a broken stdout must not cost the result
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();

        self.writer.write_all(&result.to_line()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// Open the platform's result descriptor (fd 3 by convention) for writing.
#[cfg(unix)]
pub fn open_result_fd(fd: i32) -> std::io::Result<tokio::fs::File> {
    use std::os::fd::BorrowedFd;

    if fd < 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid result descriptor {fd}"),
        ));
    }
    // SAFETY: the result descriptor is inherited from the platform and stays
    // open for the life of the process. If it was never opened, the dup below
    // fails with EBADF and the borrow is discarded.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let owned = borrowed.try_clone_to_owned()?;
    Ok(tokio::fs::File::from_std(std::fs::File::from(owned)))
}

#[cfg(not(unix))]
pub fn open_result_fd(_fd: i32) -> std::io::Result<tokio::fs::File> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "result descriptors are only supported on unix; use a result file",
    ))
}
