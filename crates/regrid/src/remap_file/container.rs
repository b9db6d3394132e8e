//! Self-describing binary container for remap weights.
//!
//! Layout (little-endian):
//!
//! ```text
//! "RMAP" | version u16 | flags u16 | header_len u32 | header (JSON)
//!        | payload_len u64 | payload | crc32(payload) u32
//! ```
//!
//! The header lists dimensions, attributes and a variable table giving each
//! variable's type, dimensions and element offset into the payload. Flag
//! bit 0 marks a zlib-compressed payload; the checksum covers the payload as
//! stored.

use crate::error::{RegridError, Result};
use bytes::{Buf, BufMut, BytesMut};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 4] = b"RMAP";
pub const VERSION: u16 = 1;
const FLAG_DEFLATE: u16 = 0x1;

/// Element type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int32,
    Float64,
}

impl DType {
    fn size(self) -> usize {
        match self {
            Self::Int32 => 4,
            Self::Float64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarData {
    Int(Vec<i32>),
    Double(Vec<f64>),
}

impl VarData {
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Int32,
            Self::Double(_) => DType::Float64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub dims: Vec<String>,
    pub data: VarData,
}

#[derive(Debug, Serialize, Deserialize)]
struct VarEntry {
    name: String,
    dtype: DType,
    dims: Vec<String>,
    /// Byte offset into the uncompressed payload.
    offset: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    dims: BTreeMap<String, usize>,
    attrs: BTreeMap<String, serde_json::Value>,
    variables: Vec<VarEntry>,
}

fn check_len(name: &str, actual: usize, expected: usize) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(RegridError::format(format!(
            "variable '{name}' has {actual} values, expected {expected}"
        )))
    }
}

/// Named dimensions, attributes and variables of one remap file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemapDataset {
    pub dims: BTreeMap<String, usize>,
    pub attrs: BTreeMap<String, serde_json::Value>,
    pub vars: BTreeMap<String, Variable>,
}

impl RemapDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dim(&mut self, name: &str, len: usize) {
        self.dims.insert(name.to_string(), len);
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<serde_json::Value>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    /// Number of elements implied by a list of dimension names.
    fn shape_len(&self, dims: &[String]) -> Result<usize> {
        dims.iter().try_fold(1usize, |acc, d| {
            let n = self
                .dims
                .get(d)
                .ok_or_else(|| RegridError::format(format!("undefined dimension '{d}'")))?;
            acc.checked_mul(*n)
                .ok_or_else(|| RegridError::format(format!("dimension '{d}' overflows the variable size")))
        })
    }

    /// Add a variable; its length must match its dimensions.
    pub fn add_var(&mut self, name: &str, dims: &[&str], data: VarData) -> Result<()> {
        let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
        let expected = self.shape_len(&dims)?;
        if data.len() != expected {
            return Err(RegridError::format(format!(
                "variable '{name}' has {} values, dimensions imply {expected}",
                data.len()
            )));
        }
        self.vars.insert(name.to_string(), Variable { dims, data });
        Ok(())
    }

    pub fn dim(&self, name: &str) -> Result<usize> {
        self.dims
            .get(name)
            .copied()
            .ok_or_else(|| RegridError::format(format!("missing dimension '{name}'")))
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn var_i32(&self, name: &str) -> Result<&[i32]> {
        match self.vars.get(name).map(|v| &v.data) {
            Some(VarData::Int(v)) => Ok(v),
            Some(_) => Err(RegridError::format(format!("variable '{name}' is not int32"))),
            None => Err(RegridError::format(format!("missing variable '{name}'"))),
        }
    }

    pub fn var_f64(&self, name: &str) -> Result<&[f64]> {
        match self.vars.get(name).map(|v| &v.data) {
            Some(VarData::Double(v)) => Ok(v),
            Some(_) => Err(RegridError::format(format!("variable '{name}' is not float64"))),
            None => Err(RegridError::format(format!("missing variable '{name}'"))),
        }
    }

    /// An int32 variable that must hold exactly `len` values.
    pub fn var_i32_len(&self, name: &str, len: usize) -> Result<&[i32]> {
        let v = self.var_i32(name)?;
        check_len(name, v.len(), len)?;
        Ok(v)
    }

    /// A float64 variable that must hold exactly `len` values.
    pub fn var_f64_len(&self, name: &str, len: usize) -> Result<&[f64]> {
        let v = self.var_f64(name)?;
        check_len(name, v.len(), len)?;
        Ok(v)
    }

    pub fn attr(&self, name: &str) -> Result<&serde_json::Value> {
        self.attrs
            .get(name)
            .ok_or_else(|| RegridError::format(format!("missing attribute '{name}'")))
    }

    pub fn attr_u64(&self, name: &str) -> Result<u64> {
        self.attr(name)?
            .as_u64()
            .ok_or_else(|| RegridError::format(format!("attribute '{name}' is not an unsigned integer")))
    }

    pub fn attr_str(&self, name: &str) -> Result<&str> {
        self.attr(name)?
            .as_str()
            .ok_or_else(|| RegridError::format(format!("attribute '{name}' is not a string")))
    }

    /// Serialize to bytes, optionally compressing the payload.
    pub fn encode(&self, compress: bool) -> Result<Vec<u8>> {
        let mut payload = BytesMut::new();
        let mut variables = Vec::with_capacity(self.vars.len());
        for (name, var) in &self.vars {
            variables.push(VarEntry {
                name: name.clone(),
                dtype: var.data.dtype(),
                dims: var.dims.clone(),
                offset: payload.len() as u64,
            });
            match &var.data {
                VarData::Int(values) => values.iter().for_each(|v| payload.put_i32_le(*v)),
                VarData::Double(values) => values.iter().for_each(|v| payload.put_f64_le(*v)),
            }
        }

        let header = serde_json::to_vec(&Header {
            dims: self.dims.clone(),
            attrs: self.attrs.clone(),
            variables,
        })?;

        let (stored, flags) = if compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&payload)?;
            (encoder.finish()?, FLAG_DEFLATE)
        } else {
            (payload.to_vec(), 0)
        };

        let mut out = BytesMut::with_capacity(4 + 2 + 2 + 4 + header.len() + 8 + stored.len() + 4);
        out.put_slice(MAGIC);
        out.put_u16_le(VERSION);
        out.put_u16_le(flags);
        out.put_u32_le(header.len() as u32);
        out.put_slice(&header);
        out.put_u64_le(stored.len() as u64);
        out.put_slice(&stored);
        out.put_u32_le(crc32fast::hash(&stored));
        Ok(out.to_vec())
    }

    /// Parse and verify bytes produced by [`RemapDataset::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        if buf.remaining() < 12 {
            return Err(RegridError::format("file too short for header"));
        }
        if &buf[..4] != MAGIC {
            return Err(RegridError::format("invalid magic bytes"));
        }
        buf.advance(4);
        let version = buf.get_u16_le();
        if version != VERSION {
            return Err(RegridError::format(format!("unsupported version {version}")));
        }
        let flags = buf.get_u16_le();
        let header_len = buf.get_u32_le() as usize;
        if buf.remaining() < header_len + 8 {
            return Err(RegridError::format("truncated header"));
        }
        let header: Header = serde_json::from_slice(&buf[..header_len])?;
        buf.advance(header_len);

        let stored_len = buf.get_u64_le() as usize;
        if buf.remaining() != stored_len + 4 {
            return Err(RegridError::format(format!(
                "payload is {} bytes, header says {stored_len}",
                buf.remaining().saturating_sub(4)
            )));
        }
        let stored = &buf[..stored_len];
        buf.advance(stored_len);
        let crc = buf.get_u32_le();
        if crc32fast::hash(stored) != crc {
            return Err(RegridError::format("payload checksum mismatch"));
        }

        let payload = if flags & FLAG_DEFLATE != 0 {
            let mut out = Vec::new();
            ZlibDecoder::new(stored).read_to_end(&mut out)?;
            out
        } else {
            stored.to_vec()
        };

        let mut dataset = RemapDataset {
            dims: header.dims,
            attrs: header.attrs,
            vars: BTreeMap::new(),
        };
        for entry in header.variables {
            let count = dataset.shape_len(&entry.dims)?;
            let start = entry.offset as usize;
            let end = count
                .checked_mul(entry.dtype.size())
                .and_then(|bytes| bytes.checked_add(start));
            let Some(end) = end.filter(|&end| end <= payload.len()) else {
                return Err(RegridError::format(format!(
                    "variable '{}' runs past the end of the payload",
                    entry.name
                )));
            };
            let mut raw = &payload[start..end];
            let data = match entry.dtype {
                DType::Int32 => VarData::Int((0..count).map(|_| raw.get_i32_le()).collect()),
                DType::Float64 => VarData::Double((0..count).map(|_| raw.get_f64_le()).collect()),
            };
            dataset.vars.insert(
                entry.name,
                Variable {
                    dims: entry.dims,
                    data,
                },
            );
        }
        Ok(dataset)
    }

    pub fn write(&self, path: &Path, compress: bool) -> Result<()> {
        std::fs::write(path, self.encode(compress)?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        Self::decode(&std::fs::read(path)?)
    }
}
