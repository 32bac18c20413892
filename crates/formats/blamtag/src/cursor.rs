use crate::engine::Endian;
use crate::error::{Error, Result};

macro_rules! read_int {
    ($name:ident, $ty:ty, $n:literal) => {
        pub fn $name(&mut self, endian: Endian) -> Result<$ty> {
            let bytes = self.read_array::<$n>()?;
            Ok(match endian {
                Endian::Big => <$ty>::from_be_bytes(bytes),
                Endian::Little => <$ty>::from_le_bytes(bytes),
            })
        }
    };
}

macro_rules! write_int {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, v: $ty, endian: Endian) {
            match endian {
                Endian::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
                Endian::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
            }
        }
    };
}

/// Read cursor over a byte slice. Multi-byte reads take an explicit byte order.
#[derive(Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of underlying data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Remaining bytes from current position.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Skip `n` bytes forward.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Read a slice of `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read up to `n` bytes, stopping early at the end of data.
    pub fn read_available(&mut self, n: usize) -> &'a [u8] {
        let n = n.min(self.remaining());
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    /// Everything from the current position to the end.
    pub fn rest(&mut self) -> &'a [u8] {
        self.read_available(self.remaining())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Look at the next `N` bytes without moving.
    pub fn peek_array<const N: usize>(&self) -> Option<[u8; N]> {
        let mut ahead = self.clone();
        ahead.read_array::<N>().ok()
    }

    /// Read a four-character code, undoing the byte reversal little-endian files apply.
    pub fn read_fourcc(&mut self, endian: Endian) -> Result<[u8; 4]> {
        let mut code = self.read_array::<4>()?;
        if endian == Endian::Little {
            code.reverse();
        }
        Ok(code)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    read_int!(read_i16, i16, 2);
    read_int!(read_u16, u16, 2);
    read_int!(read_i32, i32, 4);
    read_int!(read_u32, u32, 4);
    read_int!(read_i64, i64, 8);

    pub fn read_f32(&mut self, endian: Endian) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32(endian)?))
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }
}

/// Writer that builds a byte buffer. Multi-byte writes take an explicit byte order.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    /// Write a four-character code, reversed under little-endian.
    pub fn write_fourcc(&mut self, code: [u8; 4], endian: Endian) {
        let mut code = code;
        if endian == Endian::Little {
            code.reverse();
        }
        self.buf.extend_from_slice(&code);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    write_int!(write_i16, i16);
    write_int!(write_u16, u16);
    write_int!(write_i32, i32);
    write_int!(write_u32, u32);
    write_int!(write_i64, i64);

    pub fn write_f32(&mut self, v: f32, endian: Endian) {
        self.write_u32(v.to_bits(), endian);
    }

    /// Patch a u32 at a specific position (for backpatching the checksum).
    pub fn patch_u32(&mut self, pos: usize, v: u32, endian: Endian) {
        let bytes = match endian {
            Endian::Big => v.to_be_bytes(),
            Endian::Little => v.to_le_bytes(),
        };
        self.buf[pos..pos + 4].copy_from_slice(&bytes);
    }

    /// Drop everything past `len`, or zero-extend up to it.
    pub fn resize(&mut self, len: usize) {
        self.buf.resize(len, 0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
