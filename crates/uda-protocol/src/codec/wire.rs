//! Canonical scalar encoding: big-endian integers, IEEE 754 floats by bit
//! pattern, and `u32`-length-prefixed strings.

use std::io::{Read, Write};

use super::errors::CodecError;
use crate::types::Primitive;
use crate::value::ArrayData;

/// Elements reserved per step while reading an array, so a forged count
/// cannot force one huge allocation before any payload arrives.
const RESERVE_STEP: usize = 64 * 1024;

pub(crate) struct WireWriter<'a, W: Write> {
    inner: &'a mut W,
}

#[expect(
    clippy::big_endian_bytes,
    reason = "big-endian is the canonical byte order of the wire format"
)]
impl<'a, W: Write> WireWriter<'a, W> {
    pub(crate) const fn new(inner: &'a mut W) -> Self {
        Self { inner }
    }

    pub(crate) fn bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.inner
            .write_all(bytes)
            .map_err(|error| CodecError::from_io(error, "output"))
    }

    pub(crate) fn u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.bytes(&[value])
    }

    pub(crate) fn u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.bytes(&value.to_be_bytes())
    }

    pub(crate) fn u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.bytes(&value.to_be_bytes())
    }

    pub(crate) fn i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.bytes(&value.to_be_bytes())
    }

    pub(crate) fn u64(&mut self, value: u64) -> Result<(), CodecError> {
        self.bytes(&value.to_be_bytes())
    }

    pub(crate) fn i64(&mut self, value: i64) -> Result<(), CodecError> {
        self.bytes(&value.to_be_bytes())
    }

    pub(crate) fn length(&mut self, length: usize) -> Result<(), CodecError> {
        let encoded = u64::try_from(length)
            .map_err(|_| CodecError::mismatch("length does not fit in 64 bits"))?;
        self.u64(encoded)
    }

    pub(crate) fn string(&mut self, text: &str) -> Result<(), CodecError> {
        let length = u32::try_from(text.len())
            .map_err(|_| CodecError::mismatch("string longer than 4 GiB"))?;
        self.u32(length)?;
        self.bytes(text.as_bytes())
    }

    pub(crate) fn optional_string(&mut self, text: Option<&str>) -> Result<(), CodecError> {
        match text {
            Some(present) => {
                self.u8(1)?;
                self.string(present)
            }
            None => self.u8(0),
        }
    }

    /// Writes the primitive tag, element count and elements.
    pub(crate) fn array(&mut self, data: &ArrayData) -> Result<(), CodecError> {
        self.u8(data.primitive().tag())?;
        self.length(data.len())?;
        self.bytes(&data.to_be_bytes())
    }
}

pub(crate) struct WireReader<'a, R: Read> {
    inner: &'a mut R,
}

#[expect(
    clippy::big_endian_bytes,
    reason = "big-endian is the canonical byte order of the wire format"
)]
impl<'a, R: Read> WireReader<'a, R> {
    pub(crate) const fn new(inner: &'a mut R) -> Self {
        Self { inner }
    }

    fn exact<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], CodecError> {
        let mut buffer = [0_u8; N];
        self.inner
            .read_exact(&mut buffer)
            .map_err(|error| CodecError::from_io(error, context))?;
        Ok(buffer)
    }

    pub(crate) fn u8(&mut self, context: &'static str) -> Result<u8, CodecError> {
        let [byte] = self.exact::<1>(context)?;
        Ok(byte)
    }

    pub(crate) fn u16(&mut self, context: &'static str) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.exact(context)?))
    }

    pub(crate) fn u32(&mut self, context: &'static str) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.exact(context)?))
    }

    pub(crate) fn i32(&mut self, context: &'static str) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.exact(context)?))
    }

    pub(crate) fn u64(&mut self, context: &'static str) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.exact(context)?))
    }

    pub(crate) fn i64(&mut self, context: &'static str) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.exact(context)?))
    }

    pub(crate) fn length(&mut self, context: &'static str) -> Result<usize, CodecError> {
        let length = self.u64(context)?;
        usize::try_from(length).map_err(|_| CodecError::OutOfMemory { requested: length })
    }

    /// Reads `count` raw bytes, reserving storage incrementally.
    pub(crate) fn byte_vec(
        &mut self,
        count: usize,
        context: &'static str,
    ) -> Result<Vec<u8>, CodecError> {
        let mut bytes = Vec::new();
        let mut chunk = [0_u8; 4096];
        while bytes.len() < count {
            let wanted = (count - bytes.len()).min(chunk.len());
            reserve(&mut bytes, wanted)?;
            let target = chunk.get_mut(..wanted).unwrap_or_default();
            self.inner
                .read_exact(target)
                .map_err(|error| CodecError::from_io(error, context))?;
            bytes.extend_from_slice(target);
        }
        Ok(bytes)
    }

    pub(crate) fn string(&mut self, context: &'static str) -> Result<String, CodecError> {
        let length = self.u32(context)?;
        let count = usize::try_from(length).map_err(|_| CodecError::OutOfMemory {
            requested: u64::from(length),
        })?;
        let bytes = self.byte_vec(count, context)?;
        String::from_utf8(bytes)
            .map_err(|_| CodecError::mismatch(format!("{context} is not valid UTF-8")))
    }

    pub(crate) fn optional_string(
        &mut self,
        context: &'static str,
    ) -> Result<Option<String>, CodecError> {
        match self.u8(context)? {
            0 => Ok(None),
            1 => self.string(context).map(Some),
            other => Err(CodecError::mismatch(format!(
                "invalid presence flag {other} for {context}"
            ))),
        }
    }

    /// Reads `count` elements of the primitive identified by `tag`.
    pub(crate) fn array_elements(
        &mut self,
        tag: u8,
        count: usize,
    ) -> Result<ArrayData, CodecError> {
        let primitive = Primitive::from_tag(tag)
            .ok_or_else(|| CodecError::mismatch(format!("unknown primitive tag {tag}")))?;
        let data = match primitive {
            Primitive::Char => ArrayData::Char(self.byte_vec(count, "char array")?),
            Primitive::UInt8 => ArrayData::UInt8(self.byte_vec(count, "byte array")?),
            Primitive::Int8 => ArrayData::Int8(
                self.elements(count, "int8 array", i8::from_be_bytes)?,
            ),
            Primitive::Int16 => {
                ArrayData::Int16(self.elements(count, "int16 array", i16::from_be_bytes)?)
            }
            Primitive::UInt16 => {
                ArrayData::UInt16(self.elements(count, "uint16 array", u16::from_be_bytes)?)
            }
            Primitive::Int32 => {
                ArrayData::Int32(self.elements(count, "int32 array", i32::from_be_bytes)?)
            }
            Primitive::UInt32 => {
                ArrayData::UInt32(self.elements(count, "uint32 array", u32::from_be_bytes)?)
            }
            Primitive::Int64 => {
                ArrayData::Int64(self.elements(count, "int64 array", i64::from_be_bytes)?)
            }
            Primitive::UInt64 => {
                ArrayData::UInt64(self.elements(count, "uint64 array", u64::from_be_bytes)?)
            }
            Primitive::Float32 => {
                ArrayData::Float32(self.elements(count, "float32 array", f32::from_be_bytes)?)
            }
            Primitive::Float64 => {
                ArrayData::Float64(self.elements(count, "float64 array", f64::from_be_bytes)?)
            }
        };
        Ok(data)
    }

    /// Reads a primitive tag and element count, then the elements.
    pub(crate) fn array(&mut self) -> Result<ArrayData, CodecError> {
        let tag = self.u8("array primitive")?;
        let count = self.length("array length")?;
        self.array_elements(tag, count)
    }

    fn elements<T, const N: usize>(
        &mut self,
        count: usize,
        context: &'static str,
        convert: impl Fn([u8; N]) -> T,
    ) -> Result<Vec<T>, CodecError> {
        let mut values = Vec::new();
        while values.len() < count {
            if values.len() == values.capacity() {
                let step = (count - values.len()).min(RESERVE_STEP);
                reserve(&mut values, step)?;
            }
            values.push(convert(self.exact::<N>(context)?));
        }
        Ok(values)
    }
}

/// Reserves room for `additional` more elements, mapping failure to
/// [`CodecError::OutOfMemory`].
pub(crate) fn reserve<T>(values: &mut Vec<T>, additional: usize) -> Result<(), CodecError> {
    values
        .try_reserve(additional)
        .map_err(|_| CodecError::OutOfMemory {
            requested: u64::try_from(additional).unwrap_or(u64::MAX),
        })
}
