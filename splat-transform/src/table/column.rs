/// Typed column buffers backing a data table
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplatError};

/// Scalar element types, named after their PLY property types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl DataType {
    pub fn size(&self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    pub fn ply_name(&self) -> &'static str {
        match self {
            DataType::Int8 => "char",
            DataType::UInt8 => "uchar",
            DataType::Int16 => "short",
            DataType::UInt16 => "ushort",
            DataType::Int32 => "int",
            DataType::UInt32 => "uint",
            DataType::Float32 => "float",
            DataType::Float64 => "double",
        }
    }

    /// Accepts both the classic and the sized PLY spellings.
    pub fn from_ply_name(name: &str) -> Option<Self> {
        let ty = match name {
            "char" | "int8" => DataType::Int8,
            "uchar" | "uint8" => DataType::UInt8,
            "short" | "int16" => DataType::Int16,
            "ushort" | "uint16" => DataType::UInt16,
            "int" | "int32" => DataType::Int32,
            "uint" | "uint32" => DataType::UInt32,
            "float" | "float32" => DataType::Float32,
            "double" | "float64" => DataType::Float64,
            _ => return None,
        };
        Some(ty)
    }
}

/// Contiguous buffer of one element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

// Expands `$body` once per variant with `$v` bound to the inner Vec.
macro_rules! with_vec {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ColumnData::Int8($v) => $body,
            ColumnData::UInt8($v) => $body,
            ColumnData::Int16($v) => $body,
            ColumnData::UInt16($v) => $body,
            ColumnData::Int32($v) => $body,
            ColumnData::UInt32($v) => $body,
            ColumnData::Float32($v) => $body,
            ColumnData::Float64($v) => $body,
        }
    };
}

// Same as `with_vec!` but rewraps the produced Vec in the matching variant.
macro_rules! map_vec {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ColumnData::Int8($v) => ColumnData::Int8($body),
            ColumnData::UInt8($v) => ColumnData::UInt8($body),
            ColumnData::Int16($v) => ColumnData::Int16($body),
            ColumnData::UInt16($v) => ColumnData::UInt16($body),
            ColumnData::Int32($v) => ColumnData::Int32($body),
            ColumnData::UInt32($v) => ColumnData::UInt32($body),
            ColumnData::Float32($v) => ColumnData::Float32($body),
            ColumnData::Float64($v) => ColumnData::Float64($body),
        }
    };
}

impl ColumnData {
    /// Zero-filled buffer of `len` elements.
    pub fn zeros(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Int8 => ColumnData::Int8(vec![0; len]),
            DataType::UInt8 => ColumnData::UInt8(vec![0; len]),
            DataType::Int16 => ColumnData::Int16(vec![0; len]),
            DataType::UInt16 => ColumnData::UInt16(vec![0; len]),
            DataType::Int32 => ColumnData::Int32(vec![0; len]),
            DataType::UInt32 => ColumnData::UInt32(vec![0; len]),
            DataType::Float32 => ColumnData::Float32(vec![0.0; len]),
            DataType::Float64 => ColumnData::Float64(vec![0.0; len]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Int8(_) => DataType::Int8,
            ColumnData::UInt8(_) => DataType::UInt8,
            ColumnData::Int16(_) => DataType::Int16,
            ColumnData::UInt16(_) => DataType::UInt16,
            ColumnData::Int32(_) => DataType::Int32,
            ColumnData::UInt32(_) => DataType::UInt32,
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Float64(_) => DataType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        with_vec!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads element `i` widened to f64.
    pub fn get_f64(&self, i: usize) -> f64 {
        with_vec!(self, v => v[i] as f64)
    }

    /// Writes element `i`, narrowing with `as` semantics for integer types.
    pub fn set_f64(&mut self, i: usize, value: f64) {
        match self {
            ColumnData::Int8(v) => v[i] = value as i8,
            ColumnData::UInt8(v) => v[i] = value as u8,
            ColumnData::Int16(v) => v[i] = value as i16,
            ColumnData::UInt16(v) => v[i] = value as u16,
            ColumnData::Int32(v) => v[i] = value as i32,
            ColumnData::UInt32(v) => v[i] = value as u32,
            ColumnData::Float32(v) => v[i] = value as f32,
            ColumnData::Float64(v) => v[i] = value,
        }
    }

    /// Gathers `indices` into a new buffer of the same type.
    pub fn gather(&self, indices: &[usize]) -> Self {
        map_vec!(self, v => indices.iter().map(|&i| v[i]).collect())
    }

    /// Applies precomputed permutation cycles in place.
    /// Each cycle lists positions `j0, j1, ..` where `j(t+1) = indices[j(t)]`.
    pub(crate) fn apply_cycles(&mut self, cycles: &[Vec<usize>]) {
        with_vec!(self, v => {
            for cycle in cycles {
                let first = v[cycle[0]];
                for w in cycle.windows(2) {
                    v[w[0]] = v[w[1]];
                }
                v[cycle[cycle.len() - 1]] = first;
            }
        })
    }

    /// Appends `other`, which must share this buffer's type.
    pub fn extend_from(&mut self, other: &ColumnData) -> bool {
        match (self, other) {
            (ColumnData::Int8(a), ColumnData::Int8(b)) => a.extend_from_slice(b),
            (ColumnData::UInt8(a), ColumnData::UInt8(b)) => a.extend_from_slice(b),
            (ColumnData::Int16(a), ColumnData::Int16(b)) => a.extend_from_slice(b),
            (ColumnData::UInt16(a), ColumnData::UInt16(b)) => a.extend_from_slice(b),
            (ColumnData::Int32(a), ColumnData::Int32(b)) => a.extend_from_slice(b),
            (ColumnData::UInt32(a), ColumnData::UInt32(b)) => a.extend_from_slice(b),
            (ColumnData::Float32(a), ColumnData::Float32(b)) => a.extend_from_slice(b),
            (ColumnData::Float64(a), ColumnData::Float64(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }

    /// Appends `count` zero elements.
    pub fn extend_zeros(&mut self, count: usize) {
        match self {
            ColumnData::Int8(v) => v.resize(v.len() + count, 0),
            ColumnData::UInt8(v) => v.resize(v.len() + count, 0),
            ColumnData::Int16(v) => v.resize(v.len() + count, 0),
            ColumnData::UInt16(v) => v.resize(v.len() + count, 0),
            ColumnData::Int32(v) => v.resize(v.len() + count, 0),
            ColumnData::UInt32(v) => v.resize(v.len() + count, 0),
            ColumnData::Float32(v) => v.resize(v.len() + count, 0.0),
            ColumnData::Float64(v) => v.resize(v.len() + count, 0.0),
        }
    }

    /// Element `i` in little-endian bytes, appended to `out`.
    pub fn write_le(&self, i: usize, out: &mut Vec<u8>) {
        with_vec!(self, v => out.extend_from_slice(&v[i].to_le_bytes()))
    }

    /// Appends one little-endian element decoded from `bytes`.
    pub fn push_le(&mut self, bytes: &[u8]) {
        match self {
            ColumnData::Int8(v) => v.push(bytes[0] as i8),
            ColumnData::UInt8(v) => v.push(bytes[0]),
            ColumnData::Int16(v) => v.push(i16::from_le_bytes([bytes[0], bytes[1]])),
            ColumnData::UInt16(v) => v.push(u16::from_le_bytes([bytes[0], bytes[1]])),
            ColumnData::Int32(v) => v.push(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            ColumnData::UInt32(v) => v.push(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            ColumnData::Float32(v) => v.push(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
            ColumnData::Float64(v) => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&bytes[..8]);
                v.push(f64::from_le_bytes(b));
            }
        }
    }

    /// Empty buffer with room for `capacity` elements.
    pub fn with_capacity(data_type: DataType, capacity: usize) -> Self {
        match data_type {
            DataType::Int8 => ColumnData::Int8(Vec::with_capacity(capacity)),
            DataType::UInt8 => ColumnData::UInt8(Vec::with_capacity(capacity)),
            DataType::Int16 => ColumnData::Int16(Vec::with_capacity(capacity)),
            DataType::UInt16 => ColumnData::UInt16(Vec::with_capacity(capacity)),
            DataType::Int32 => ColumnData::Int32(Vec::with_capacity(capacity)),
            DataType::UInt32 => ColumnData::UInt32(Vec::with_capacity(capacity)),
            DataType::Float32 => ColumnData::Float32(Vec::with_capacity(capacity)),
            DataType::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
        }
    }
}

/// Named column of a data table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn from_f32(name: impl Into<String>, values: Vec<f32>) -> Self {
        Self::new(name, ColumnData::Float32(values))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn as_f32(&self) -> Result<&[f32]> {
        match &self.data {
            ColumnData::Float32(v) => Ok(v),
            other => Err(type_error(&self.name, DataType::Float32, other.data_type())),
        }
    }

    pub fn as_f32_mut(&mut self) -> Result<&mut Vec<f32>> {
        match &mut self.data {
            ColumnData::Float32(v) => Ok(v),
            other => Err(type_error(&self.name, DataType::Float32, other.data_type())),
        }
    }

    pub fn as_u32(&self) -> Result<&[u32]> {
        match &self.data {
            ColumnData::UInt32(v) => Ok(v),
            other => Err(type_error(&self.name, DataType::UInt32, other.data_type())),
        }
    }

    pub fn as_u8(&self) -> Result<&[u8]> {
        match &self.data {
            ColumnData::UInt8(v) => Ok(v),
            other => Err(type_error(&self.name, DataType::UInt8, other.data_type())),
        }
    }
}

fn type_error(name: &str, expected: DataType, actual: DataType) -> SplatError {
    SplatError::DataTypeMismatch {
        name: name.to_string(),
        expected,
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_allows_duplicates_and_omissions() {
        let data = ColumnData::UInt32(vec![10, 11, 12, 13]);
        assert_eq!(data.gather(&[3, 3, 0]), ColumnData::UInt32(vec![13, 13, 10]));
    }

    #[test]
    fn test_extend_rejects_mismatched_types() {
        let mut a = ColumnData::Float32(vec![1.0]);
        assert!(!a.extend_from(&ColumnData::UInt8(vec![1])));
        assert!(a.extend_from(&ColumnData::Float32(vec![2.0])));
        assert_eq!(a, ColumnData::Float32(vec![1.0, 2.0]));
    }

    #[test]
    fn test_le_bytes_roundtrip() {
        let src = ColumnData::Int16(vec![-2, 300]);
        let mut bytes = Vec::new();
        src.write_le(0, &mut bytes);
        src.write_le(1, &mut bytes);

        let mut dst = ColumnData::with_capacity(DataType::Int16, 2);
        dst.push_le(&bytes[0..2]);
        dst.push_le(&bytes[2..4]);
        assert_eq!(src, dst);
    }

    #[test]
    fn test_typed_accessor_reports_mismatch() {
        let col = Column::new("packed_position", ColumnData::Float32(vec![0.0]));
        assert!(matches!(
            col.as_u32(),
            Err(SplatError::DataTypeMismatch { expected: DataType::UInt32, .. })
        ));
    }
}
