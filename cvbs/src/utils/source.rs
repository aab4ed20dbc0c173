use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Sequential byte input for one channel.
///
/// Positioned once before streaming starts, then read front to back. A read that
/// returns fewer bytes than requested means the source is exhausted.
pub trait ByteSource: Send {
    /// Read up to `buffer.len()` bytes; 0 indicates EOF.
    fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<usize>;

    /// Position the source at `offset` bytes from its start.
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;

    /// Fill `buffer` as far as the source allows and return the byte count.
    fn read_full(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buffer.len() {
            match self.read_chunk(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

enum Reader {
    File(BufReader<File>),
    Pipe(io::Stdin),
}

/// File or stdin input with buffered reading.
pub struct InputReader {
    reader: Reader,
}

impl InputReader {
    /// Open `input_path`; "-" reads stdin.
    pub fn new<P: AsRef<Path>>(input_path: P) -> io::Result<Self> {
        let reader = if input_path.as_ref().as_os_str() == "-" {
            Reader::Pipe(io::stdin())
        } else {
            Reader::File(BufReader::with_capacity(
                1 << 20,
                File::open(input_path.as_ref())?,
            ))
        };

        Ok(Self { reader })
    }

    pub fn is_pipe(&self) -> bool {
        matches!(self.reader, Reader::Pipe(_))
    }
}

impl ByteSource for InputReader {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        match &mut self.reader {
            Reader::File(file) => file.read(buffer),
            Reader::Pipe(stdin) => stdin.read(buffer),
        }
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        match &mut self.reader {
            Reader::File(file) => file.seek(SeekFrom::Start(offset)).map(|_| ()),
            Reader::Pipe(stdin) => discard(stdin, offset),
        }
    }
}

/// Sources held in memory, mostly useful for tests and prerecorded material.
impl<T: AsRef<[u8]> + Send> ByteSource for Cursor<T> {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        self.read(buffer)
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.set_position(offset);
        Ok(())
    }
}

fn discard<R: Read>(reader: &mut R, count: u64) -> io::Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(count), &mut io::sink())?;
    if skipped < count {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("stream ended after {skipped} of {count} bytes"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_full_reports_short_reads() -> io::Result<()> {
        let mut source = Cursor::new(vec![1u8, 2, 3]);
        let mut buffer = [0u8; 8];
        assert_eq!(source.read_full(&mut buffer)?, 3);
        assert_eq!(&buffer[..3], &[1, 2, 3]);
        assert_eq!(source.read_full(&mut buffer)?, 0);
        Ok(())
    }

    #[test]
    fn file_source_seeks() -> io::Result<()> {
        let path = std::env::temp_dir().join(format!("cvbs-source-{}.u8", std::process::id()));
        File::create(&path)?.write_all(&(0u8..32).collect::<Vec<_>>())?;

        let mut source = InputReader::new(&path)?;
        assert!(!source.is_pipe());
        source.seek_to(10)?;
        let mut buffer = [0u8; 4];
        assert_eq!(source.read_full(&mut buffer)?, 4);
        assert_eq!(buffer, [10, 11, 12, 13]);

        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn discard_fails_past_end() {
        let mut short = Cursor::new(vec![0u8; 4]);
        assert!(discard(&mut short, 8).is_err());
    }
}
