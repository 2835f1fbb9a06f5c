use std::io::{self, Read, Seek, SeekFrom};

/// Random-access byte input the transcoder pulls frames from.
///
/// Any `Read + Seek` (a `File`, a `BufReader<File>`, an in-memory `Cursor`)
/// qualifies through the blanket impl.
pub trait ByteSource {
    /// Total length in bytes.
    fn byte_len(&mut self) -> io::Result<u64>;

    /// Fill `buf` from `offset`; a short read is an `UnexpectedEof` error.
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl<T: Read + Seek> ByteSource for T {
    fn byte_len(&mut self) -> io::Result<u64> {
        let len = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(0))?;
        Ok(len)
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        // Sequential reads skip the seek so a buffered reader keeps its buffer.
        if self.stream_position()? != offset {
            self.seek(SeekFrom::Start(offset))?;
        }
        self.read_exact(buf)
    }
}
