use std::io::{self, BufRead};

use bytes::{BufMut, BytesMut};

fn unexpected_eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "no more data available")
}

/// Parsing helpers on top of any buffered reader.
pub trait BufReadParsing: BufRead + Sized {
    fn read_u8(&mut self) -> io::Result<u8> {
        let arr = self.read_array::<1>()?;
        Ok(arr[0])
    }

    fn read_be_u16(&mut self) -> io::Result<u16> {
        let arr = self.read_array::<2>()?;
        Ok(u16::from_be_bytes(arr))
    }

    fn read_be_u32(&mut self) -> io::Result<u32> {
        let arr = self.read_array::<4>()?;
        Ok(u32::from_be_bytes(arr))
    }

    /// Returns `true` if at least one more byte can be read.
    fn has_remaining(&mut self) -> io::Result<bool> {
        Ok(!self.fill_buf()?.is_empty())
    }

    fn read_array<const C: usize>(&mut self) -> io::Result<[u8; C]> {
        let mut arr = [0u8; C];
        let mut read = 0;

        while read < C {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                return Err(unexpected_eof());
            }

            let available = (C - read).min(buf.len());
            arr[read..read + available].copy_from_slice(&buf[..available]);
            read += available;
            self.consume(available);
        }

        Ok(arr)
    }

    fn take_bytes(&mut self, size: usize) -> io::Result<BytesMut> {
        // Grow with the data actually available, a bogus size must not allocate upfront.
        let mut arr = BytesMut::with_capacity(size.min(1024));

        while arr.len() < size {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                return Err(unexpected_eof());
            }

            let available = (size - arr.len()).min(buf.len());
            arr.put_slice(&buf[..available]);
            self.consume(available);
        }

        Ok(arr)
    }

    fn rest(&mut self) -> io::Result<BytesMut> {
        let mut writer = BytesMut::new().writer();
        io::copy(self, &mut writer)?;
        Ok(writer.into_inner())
    }

    /// Drain the data in this reader, to make sure all is consumed.
    /// Returns how many bytes have been drained
    fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }
}

impl<B: BufRead> BufReadParsing for B {}
