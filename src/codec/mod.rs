//! Canonical on-log wire encoding
//!
//! The replicated log carries every value in the host's canonical
//! length-prefixed form: fixed-width integers little-endian, byte strings
//! (including 32-byte group payloads) behind a minimal uleb128 length,
//! vectors behind a uleb128 element count, options behind a one-byte tag.
//! Decoding is exact: every length mismatch, non-canonical scalar or point,
//! and trailing byte is a typed error with a stable numeric code.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use thiserror::Error;

use crate::group;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error("uleb128 length is not minimal or does not fit in 64 bits")]
    MalformedLength,
    #[error("payload of {got} bytes where {expected} were expected")]
    WrongPayloadLength { expected: usize, got: usize },
    #[error("byte string is not a canonical Ristretto point")]
    MalformedElement,
    #[error("byte string is not a canonical scalar")]
    MalformedScalar,
    #[error("invalid option tag {0:#04x}")]
    InvalidOptionTag(u8),
    #[error("invalid enum tag {0:#04x}")]
    InvalidEnumTag(u8),
}

impl CodecError {
    /// Stable diagnostic code carried alongside rejections on the log.
    pub fn code(&self) -> u32 {
        match self {
            CodecError::UnexpectedEof => 1,
            CodecError::TrailingBytes(_) => 2,
            CodecError::MalformedLength => 3,
            CodecError::WrongPayloadLength { .. } => 4,
            CodecError::MalformedElement => 5,
            CodecError::MalformedScalar => 6,
            CodecError::InvalidOptionTag(_) => 7,
            CodecError::InvalidEnumTag(_) => 8,
        }
    }
}

#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_uleb128(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// uleb128 length followed by the bytes themselves.
    pub fn write_byte_string(&mut self, bytes: &[u8]) {
        self.write_uleb128(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_element(&mut self, point: &RistrettoPoint) {
        self.write_byte_string(&group::encode_element(point));
    }

    pub fn write_scalar(&mut self, scalar: &Scalar) {
        self.write_byte_string(&group::encode_scalar(scalar));
    }

    pub fn write_len(&mut self, len: usize) {
        self.write_uleb128(len as u64);
    }
}

#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn expect_end(&self) -> Result<(), CodecError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes(self.buf.len()))
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < n {
            return Err(CodecError::UnexpectedEof);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_uleb128(&mut self) -> Result<u64, CodecError> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 1 {
                return Err(CodecError::MalformedLength);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                // Reject padded encodings such as 0x80 0x00.
                if byte == 0 && shift > 0 {
                    return Err(CodecError::MalformedLength);
                }
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(CodecError::MalformedLength);
            }
        }
    }

    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        Ok(self.read_uleb128()? as usize)
    }

    /// Read a byte string whose length tag must equal `expected`.
    pub fn read_byte_string_exact(&mut self, expected: usize) -> Result<&'a [u8], CodecError> {
        let len = self.read_len()?;
        if len != expected {
            return Err(CodecError::WrongPayloadLength { expected, got: len });
        }
        self.take(len)
    }

    pub fn read_element(&mut self) -> Result<RistrettoPoint, CodecError> {
        group::decode_element(self.read_byte_string_exact(group::ENCODED_LEN)?)
    }

    pub fn read_scalar(&mut self) -> Result<Scalar, CodecError> {
        group::decode_scalar(self.read_byte_string_exact(group::ENCODED_LEN)?)
    }

    pub fn read_option_tag(&mut self) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidOptionTag(other)),
        }
    }

    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        self.take(n)
    }
}

/// Values with a canonical on-log byte form.
pub trait WireEncode {
    fn encode(&self, writer: &mut ByteWriter);

    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        self.encode(&mut writer);
        writer.into_bytes()
    }
}

pub trait WireDecode: Sized {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError>;

    /// Decode a complete value: trailing bytes are an error.
    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(bytes);
        let value = Self::decode(&mut reader)?;
        reader.expect_end()?;
        Ok(value)
    }
}

impl WireEncode for Scalar {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_scalar(self);
    }
}

impl WireDecode for Scalar {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        reader.read_scalar()
    }
}

impl WireEncode for RistrettoPoint {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_element(self);
    }
}

impl WireDecode for RistrettoPoint {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        reader.read_element()
    }
}

impl<T: WireEncode> WireEncode for Option<T> {
    fn encode(&self, writer: &mut ByteWriter) {
        match self {
            None => writer.write_u8(0),
            Some(value) => {
                writer.write_u8(1);
                value.encode(writer);
            }
        }
    }
}

impl<T: WireDecode> WireDecode for Option<T> {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        if reader.read_option_tag()? {
            Ok(Some(T::decode(reader)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_len(self.len());
        for item in self {
            item.encode(writer);
        }
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let len = reader.read_len()?;
        // Guard against length tags that promise more items than bytes.
        if len > reader.remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(reader)?);
        }
        Ok(items)
    }
}
