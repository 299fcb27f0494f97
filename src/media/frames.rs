use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{BurnerError, Result};
use super::MediaCommand;

/// Collect a child's stderr in the background so a full pipe never blocks it
fn drain_stderr(child: &mut Child) -> JoinHandle<String> {
    let stderr = child.stderr.take();
    tokio::spawn(async move {
        let mut collected = Vec::new();
        if let Some(mut stderr) = stderr {
            if let Err(e) = stderr.read_to_end(&mut collected).await {
                debug!("Failed to read child stderr: {}", e);
            }
        }
        String::from_utf8_lossy(&collected).trim().to_string()
    })
}

async fn wait_for(mut child: Child, stderr: JoinHandle<String>, description: &str) -> Result<()> {
    let status = child.wait().await?;
    let stderr = stderr.await.unwrap_or_default();

    if !status.success() {
        return Err(BurnerError::Media(format!("{} failed ({}): {}", description, status, stderr)));
    }
    if !stderr.is_empty() {
        debug!("{} stderr: {}", description, stderr);
    }
    Ok(())
}

/// Fill `buf` completely; returns the number of bytes read before EOF
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Reads fixed-size rgb24 frames from a decoder's stdout
pub struct FrameReader {
    child: Child,
    stdout: ChildStdout,
    stderr: JoinHandle<String>,
    frame_size: usize,
    description: String,
}

impl FrameReader {
    pub fn spawn(command: &MediaCommand, frame_size: usize) -> Result<Self> {
        let mut child = command.spawn(false, true)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BurnerError::Media("Decoder stdout not captured".to_string()))?;
        let stderr = drain_stderr(&mut child);

        Ok(Self {
            child,
            stdout,
            stderr,
            frame_size,
            description: command.description.clone(),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Read the next frame into `buf`; `false` at end of stream.
    ///
    /// A truncated trailing frame is discarded.
    pub async fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.resize(self.frame_size, 0);
        let filled = read_full(&mut self.stdout, buf).await?;

        if filled == self.frame_size {
            return Ok(true);
        }
        if filled > 0 {
            warn!(
                "Discarding truncated frame ({} of {} bytes)",
                filled, self.frame_size
            );
        }
        Ok(false)
    }

    /// Wait for the decoder to exit and report its errors
    pub async fn finish(self) -> Result<()> {
        drop(self.stdout);
        wait_for(self.child, self.stderr, &self.description).await
    }

    /// Stop decoding before the end of the stream
    pub async fn stop(mut self) -> Result<()> {
        drop(self.stdout);
        if let Err(e) = self.child.kill().await {
            debug!("{} already exited: {}", self.description, e);
        }
        self.stderr.abort();
        Ok(())
    }
}

/// Writes rgb24 frames to an encoder's stdin
pub struct FrameWriter {
    child: Child,
    stdin: ChildStdin,
    stderr: JoinHandle<String>,
    frame_size: usize,
    description: String,
}

impl FrameWriter {
    pub fn spawn(command: &MediaCommand, frame_size: usize) -> Result<Self> {
        let mut child = command.spawn(true, false)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BurnerError::Media("Encoder stdin not captured".to_string()))?;
        let stderr = drain_stderr(&mut child);

        Ok(Self {
            child,
            stdin,
            stderr,
            frame_size,
            description: command.description.clone(),
        })
    }

    /// Write one frame; `false` once the encoder has closed its input.
    ///
    /// With `-shortest` ffmpeg may end the output early. Whether that was a
    /// success is decided by its exit status in [`FrameWriter::finish`].
    pub async fn write_frame(&mut self, frame: &[u8]) -> Result<bool> {
        if frame.len() != self.frame_size {
            return Err(BurnerError::Media(format!(
                "Frame has {} bytes, expected {}",
                frame.len(),
                self.frame_size
            )));
        }
        match self.stdin.write_all(frame).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("{} closed its input", self.description);
                Ok(false)
            }
            Err(e) => Err(BurnerError::Media(format!("Encoder stopped accepting frames: {}", e))),
        }
    }

    /// Close stdin so the encoder can flush, then wait for it
    pub async fn finish(mut self) -> Result<()> {
        match self.stdin.flush().await {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
            _ => {}
        }
        drop(self.stdin);
        wait_for(self.child, self.stderr, &self.description).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_full_stops_at_eof() {
        let data: &[u8] = &[1, 2, 3, 4, 5];
        let mut reader = data;

        let mut buf = [0u8; 3];
        assert_eq!(read_full(&mut reader, &mut buf).await.unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(read_full(&mut reader, &mut buf).await.unwrap(), 2);
        assert_eq!(read_full(&mut reader, &mut buf).await.unwrap(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reader_drops_truncated_frame() {
        // 10 bytes of output with 4-byte frames: two frames, then a partial one
        let command = MediaCommand::new("sh", "Test source").arg("-c").arg("printf 0123456789");
        let mut reader = FrameReader::spawn(&command, 4).unwrap();
        let mut buf = Vec::new();

        assert!(reader.read_frame(&mut buf).await.unwrap());
        assert_eq!(buf, b"0123");
        assert!(reader.read_frame(&mut buf).await.unwrap());
        assert!(!reader.read_frame(&mut buf).await.unwrap());
        reader.finish().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_process_reports_stderr() {
        let command = MediaCommand::new("sh", "Test source").arg("-c").arg("echo broken >&2; exit 3");
        let mut reader = FrameReader::spawn(&command, 4).unwrap();
        let mut buf = Vec::new();

        assert!(!reader.read_frame(&mut buf).await.unwrap());
        let err = reader.finish().await.unwrap_err();
        assert!(matches!(err, BurnerError::Media(msg) if msg.contains("broken")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_writer_feeds_stdin() {
        let command = MediaCommand::new("sh", "Test sink").arg("-c").arg("wc -c >/dev/null");
        let mut writer = FrameWriter::spawn(&command, 3).unwrap();

        assert!(writer.write_frame(&[1, 2, 3]).await.unwrap());
        assert!(writer.write_frame(&[1, 2]).await.is_err());
        writer.finish().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encoder_closing_early_is_not_an_error() {
        let command = MediaCommand::new("sh", "Test sink")
            .arg("-c")
            .arg("head -c 4 >/dev/null; exit 0");
        let mut writer = FrameWriter::spawn(&command, 4096).unwrap();
        let frame = vec![0u8; 4096];

        let mut accepted = 0;
        while writer.write_frame(&frame).await.unwrap() {
            accepted += 1;
            assert!(accepted < 10_000, "sink never closed its input");
        }
        writer.finish().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encoder_failure_still_reported_after_close() {
        let command = MediaCommand::new("sh", "Test sink")
            .arg("-c")
            .arg("head -c 4 >/dev/null; echo muxing failed >&2; exit 1");
        let mut writer = FrameWriter::spawn(&command, 4096).unwrap();
        let frame = vec![0u8; 4096];

        let mut accepted = 0;
        while writer.write_frame(&frame).await.unwrap() {
            accepted += 1;
            assert!(accepted < 10_000, "sink never closed its input");
        }
        let err = writer.finish().await.unwrap_err();
        assert!(matches!(err, BurnerError::Media(msg) if msg.contains("muxing failed")));
    }
}
