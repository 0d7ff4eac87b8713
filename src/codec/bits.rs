//! Bit-granular stream over bytes
//!
//! Bit runs are packed most significant bit first. Fixed-width numerics
//! are little-endian and always start on a byte boundary; any partially
//! filled byte is flushed (writer) or skipped (reader) before them.

use bytes::{BufMut, Bytes, BytesMut};

use super::error::{CodecError, DecodeError};

#[derive(Debug, Default)]
pub struct BitWriter {
    buf: BytesMut,
    pending: u8,
    pending_bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.pending = (self.pending << 1) | bit as u8;
        self.pending_bits += 1;
        if self.pending_bits == 8 {
            self.buf.put_u8(self.pending);
            self.pending = 0;
            self.pending_bits = 0;
        }
    }

    /// Write the low `width` bits of `value`, high bit first
    pub fn write_bits(&mut self, value: u32, width: u32) {
        debug_assert!(width <= 32);
        for shift in (0..width).rev() {
            self.write_bit((value >> shift) & 1 == 1);
        }
    }

    /// Pad the partial byte with zeros
    pub fn flush(&mut self) {
        if self.pending_bits > 0 {
            self.buf.put_u8(self.pending << (8 - self.pending_bits));
            self.pending = 0;
            self.pending_bits = 0;
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.flush();
        self.buf.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.flush();
        self.buf.put_i8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.flush();
        self.buf.put_u16_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.flush();
        self.buf.put_u32_le(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.flush();
        self.buf.put_u64_le(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.flush();
        self.buf.put_f32_le(value);
    }

    pub fn finish(mut self) -> Bytes {
        self.flush();
        self.buf.freeze()
    }
}

#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Bits already consumed from `data[pos]`
    bit: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit: 0,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool, CodecError> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::Truncated)?;
        let value = (byte >> (7 - self.bit)) & 1 == 1;
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.pos += 1;
        }
        Ok(value)
    }

    pub fn read_bits(&mut self, width: u32) -> Result<u32, CodecError> {
        debug_assert!(width <= 32);
        let mut value = 0u32;
        for _ in 0..width {
            value = (value << 1) | self.read_bit()? as u32;
        }
        Ok(value)
    }

    /// Read a `width`-bit enum code and map it into its domain
    pub fn read_enum<T>(&mut self, width: u32, field: &'static str) -> Result<T, CodecError>
    where
        T: TryFrom<u32, Error = u32>,
    {
        let raw = self.read_bits(width)?;
        T::try_from(raw).map_err(|value| DecodeError::OutOfDomain { field, value }.into())
    }

    /// Skip to the next byte boundary
    pub fn align(&mut self) {
        if self.bit > 0 {
            self.bit = 0;
            self.pos += 1;
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.align();
        let end = self.pos.checked_add(N).ok_or(CodecError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(CodecError::Truncated)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(i8::from_le_bytes(self.take()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.take()?))
    }

    /// Whole bytes not yet touched
    pub fn remaining(&self) -> usize {
        let consumed = self.pos + usize::from(self.bit > 0);
        self.data.len().saturating_sub(consumed)
    }

    /// Fail unless every byte has been consumed
    pub fn finish(mut self) -> Result<(), CodecError> {
        self.align();
        match self.data.len().saturating_sub(self.pos) {
            0 => Ok(()),
            extra => Err(DecodeError::TrailingBytes(extra).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_pack_high_first() {
        let mut w = BitWriter::new();
        w.write_bits(0b101, 3);
        w.write_bit(true);
        let bytes = w.finish();
        assert_eq!(&bytes[..], &[0b1011_0000]);
    }

    #[test]
    fn numerics_flush_pending_bits() {
        let mut w = BitWriter::new();
        w.write_bits(0b11, 2);
        w.write_u32(0x0403_0201);
        w.write_bit(true);
        let bytes = w.finish();
        assert_eq!(&bytes[..], &[0b1100_0000, 1, 2, 3, 4, 0b1000_0000]);

        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bits(2).unwrap(), 0b11);
        assert_eq!(r.read_u32().unwrap(), 0x0403_0201);
        assert!(r.read_bit().unwrap());
        r.finish().unwrap();
    }

    #[test]
    fn reading_past_the_end_is_truncated() {
        let mut r = BitReader::new(&[0xff, 0x01]);
        assert_eq!(r.read_u32(), Err(CodecError::Truncated));

        let mut r = BitReader::new(&[0xff]);
        assert_eq!(r.read_bits(8).unwrap(), 0xff);
        assert_eq!(r.read_bit(), Err(CodecError::Truncated));
    }

    #[test]
    fn out_of_domain_enum_is_rejected() {
        let mut w = BitWriter::new();
        w.write_bits(7, 3);
        let bytes = w.finish();
        let mut r = BitReader::new(&bytes);
        let result: Result<crate::movement::spline::AnimTier, _> = r.read_enum(3, "anim_tier");
        assert_eq!(
            result,
            Err(CodecError::Decode(DecodeError::OutOfDomain {
                field: "anim_tier",
                value: 7
            }))
        );
    }

    #[test]
    fn trailing_bytes_are_reported() {
        let r = BitReader::new(&[1, 2, 3]);
        assert_eq!(
            r.finish(),
            Err(CodecError::Decode(DecodeError::TrailingBytes(3)))
        );
    }
}
