//! Byte channels handed to serializers.
//!
//! Integers are written as LEB128 varints (signed values zig-zag encoded
//! first), floats as little-endian IEEE 754, strings as a varint length
//! followed by UTF-8 bytes.

use crate::error::{LiveError, LiveResult};

#[derive(Debug, Default, Clone)]
pub struct Output {
    buffer: Vec<u8>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_bool(&mut self, b: bool) {
        self.write_u8(b as u8);
    }

    pub fn write_varint(&mut self, mut n: u64) {
        while n >= 0x80 {
            self.write_u8((n as u8 & 0x7f) | 0x80);
            n >>= 7;
        }
        self.write_u8(n as u8);
    }

    pub fn write_i64(&mut self, i: i64) {
        self.write_varint(((i << 1) ^ (i >> 63)) as u64);
    }

    pub fn write_f64(&mut self, f: f64) {
        self.write_bytes(&f.to_le_bytes());
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_varint(s.len() as u64);
        self.write_bytes(s.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Deepest nesting of values a stream may describe.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone)]
pub struct Input {
    buffer: Vec<u8>,
    position: usize,
    /// Values currently being read, outermost first
    depth: usize,
}

impl Input {
    pub fn new(buffer: impl Into<Vec<u8>>) -> Self {
        Input {
            buffer: buffer.into(),
            position: 0,
            depth: 0,
        }
    }

    /// Enter one more level of nested value; fails past [`MAX_DEPTH`].
    pub fn descend(&mut self) -> LiveResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(LiveError::InvalidData(format!(
                "nesting too deep (more than {} levels) at offset {}",
                MAX_DEPTH, self.position
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> LiveResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bytes(&mut self, len: usize) -> LiveResult<&[u8]> {
        if self.remaining() < len {
            return Err(LiveError::BufferUnderflow {
                offset: self.position,
                needed: len - self.remaining(),
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&self.buffer[start..self.position])
    }

    pub fn read_bool(&mut self) -> LiveResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(LiveError::InvalidData(format!(
                "invalid boolean byte {:#04x}",
                other
            ))),
        }
    }

    pub fn read_varint(&mut self) -> LiveResult<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 {
                return Err(LiveError::InvalidData("varint overflows 64 bits".into()));
            }
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub fn read_i64(&mut self) -> LiveResult<i64> {
        let n = self.read_varint()?;
        Ok(((n >> 1) as i64) ^ -((n & 1) as i64))
    }

    pub fn read_f64(&mut self) -> LiveResult<f64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.read_bytes(8)?);
        Ok(f64::from_le_bytes(bytes))
    }

    pub fn read_len(&mut self) -> LiveResult<usize> {
        let len = self.read_varint()?;
        usize::try_from(len)
            .map_err(|_| LiveError::InvalidData(format!("length {} does not fit in memory", len)))
    }

    pub fn read_string(&mut self) -> LiveResult<String> {
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?.to_vec();
        String::from_utf8(bytes).map_err(|e| LiveError::InvalidData(e.to_string()))
    }
}

impl From<Output> for Input {
    fn from(output: Output) -> Self {
        Input::new(output.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_varints_use_zigzag() {
        let mut out = Output::new();
        out.write_i64(0);
        out.write_i64(-1);
        out.write_i64(1);
        out.write_i64(-64);
        // zig-zag: 0 -> 0, -1 -> 1, 1 -> 2, -64 -> 127
        assert_eq!(out.as_bytes(), &[0, 1, 2, 127]);

        let mut input = Input::from(out);
        assert_eq!(input.read_i64().unwrap(), 0);
        assert_eq!(input.read_i64().unwrap(), -1);
        assert_eq!(input.read_i64().unwrap(), 1);
        assert_eq!(input.read_i64().unwrap(), -64);
        assert!(input.is_exhausted());
    }

    #[test]
    fn test_extreme_integers_survive() {
        let mut out = Output::new();
        out.write_i64(i64::MIN);
        out.write_i64(i64::MAX);
        out.write_varint(u64::MAX);
        let mut input = Input::from(out);
        assert_eq!(input.read_i64().unwrap(), i64::MIN);
        assert_eq!(input.read_i64().unwrap(), i64::MAX);
        assert_eq!(input.read_varint().unwrap(), u64::MAX);
    }

    #[test]
    fn test_reading_past_end_underflows() {
        let mut out = Output::new();
        out.write_str("héllo");
        let mut bytes = out.into_bytes();
        bytes.truncate(3);
        let mut input = Input::new(bytes);
        assert_eq!(
            input.read_string(),
            Err(LiveError::BufferUnderflow {
                offset: 1,
                needed: 4
            })
        );
    }

    #[test]
    fn test_invalid_bool_byte() {
        let mut input = Input::new(vec![2u8]);
        assert!(matches!(input.read_bool(), Err(LiveError::InvalidData(_))));
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut input = Input::new(Vec::<u8>::new());
        for _ in 0..MAX_DEPTH {
            input.descend().unwrap();
        }
        assert!(matches!(input.descend(), Err(LiveError::InvalidData(_))));
        assert_eq!(input.depth(), MAX_DEPTH);
        input.ascend();
        assert!(input.descend().is_ok());
    }
}
