use std::io::{self, IsTerminal, Write};

/// Append-only output shared by the whole process (normally stdout).
///
/// Carries either per-frame audio interleaved with video or a verbatim echo of one
/// channel. It is handed to exactly one pipeline, so writes never contend.
pub struct SideChannel {
    writer: Box<dyn Write + Send>,
    bytes_written: u64,
}

impl SideChannel {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
            bytes_written: 0,
        }
    }

    /// Stdout, unless it is an interactive terminal.
    pub fn stdout() -> Option<Self> {
        let stdout = io::stdout();
        if stdout.is_terminal() {
            return None;
        }
        Some(Self::new(stdout))
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl std::fmt::Debug for SideChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideChannel")
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}
