//! Binary little-endian PLY container I/O.
//!
//! A PLY file is a list of elements, each a fixed-size record of scalar
//! properties repeated `count` times. Each element maps onto a
//! [`DataSection`]: the element name plus a [`DataTable`] with one column per
//! property.

use std::io::{BufRead, Read, Write};

use crate::error::{Result, SplatError};
use crate::table::{Column, ColumnData, DataTable, DataType};

/// Headers longer than this are rejected.
const MAX_HEADER_BYTES: usize = 128 * 1024;

/// Rows per buffered block when reading element data.
const READ_BLOCK_ROWS: usize = 65_536;

/// One named group of rows, such as the `vertex` element of a PLY file.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSection {
    pub name: String,
    pub table: DataTable,
}

impl DataSection {
    pub fn new(name: impl Into<String>, table: DataTable) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

/// Parsed PLY file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlyData {
    pub comments: Vec<String>,
    pub sections: Vec<DataSection>,
}

struct ElementHeader {
    name: String,
    count: usize,
    properties: Vec<(String, DataType)>,
}

impl ElementHeader {
    fn record_size(&self) -> usize {
        self.properties.iter().map(|(_, ty)| ty.size()).sum()
    }
}

fn ply_error(message: impl Into<String>) -> SplatError {
    SplatError::Ply(message.into())
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<(Vec<String>, Vec<ElementHeader>)> {
    let mut comments = Vec::new();
    let mut elements: Vec<ElementHeader> = Vec::new();
    let mut format_seen = false;
    let mut header_bytes = 0;
    let mut line = String::new();

    for line_index in 0.. {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            return Err(ply_error("unexpected end of file in header"));
        }
        header_bytes += read;
        if header_bytes > MAX_HEADER_BYTES {
            return Err(ply_error("header too large"));
        }

        let trimmed = line.trim();
        if line_index == 0 {
            if trimmed != "ply" {
                return Err(ply_error("missing 'ply' magic"));
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        match fields[0] {
            "format" if fields.len() == 3 => {
                if fields[1] != "binary_little_endian" {
                    return Err(ply_error(format!("unsupported format '{}'", fields[1])));
                }
                if fields[2] != "1.0" {
                    return Err(ply_error(format!("unsupported version '{}'", fields[2])));
                }
                format_seen = true;
            }
            "comment" | "obj_info" => {
                comments.push(trimmed[fields[0].len()..].trim().to_string());
            }
            "element" if fields.len() == 3 => {
                let count = fields[2]
                    .parse()
                    .map_err(|_| ply_error(format!("invalid element count '{}'", fields[2])))?;
                elements.push(ElementHeader {
                    name: fields[1].to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            "property" => {
                if fields.get(1) == Some(&"list") {
                    return Err(ply_error("list properties are not supported"));
                }
                if fields.len() != 3 {
                    return Err(ply_error(format!("invalid property line '{}'", trimmed)));
                }
                let element = elements
                    .last_mut()
                    .ok_or_else(|| ply_error("property outside of element"))?;
                let ty = DataType::from_ply_name(fields[1])
                    .ok_or_else(|| ply_error(format!("unsupported property type '{}'", fields[1])))?;
                element.properties.push((fields[2].to_string(), ty));
            }
            "end_header" => break,
            _ => return Err(ply_error(format!("unsupported header line '{}'", trimmed))),
        }
    }

    if !format_seen {
        return Err(ply_error("missing format line"));
    }
    Ok((comments, elements))
}

fn read_element<R: Read>(reader: &mut R, header: &ElementHeader) -> Result<DataSection> {
    let record_size = header.record_size();
    if record_size == 0 && header.count > 0 {
        return Err(ply_error(format!(
            "element '{}' has {} rows but no properties",
            header.name, header.count
        )));
    }
    if header.count.checked_mul(record_size).is_none() {
        return Err(ply_error(format!(
            "element '{}' count {} is too large",
            header.name, header.count
        )));
    }

    // The header count is untrusted; columns grow as blocks arrive.
    let block_rows = READ_BLOCK_ROWS.min(header.count);
    let mut data: Vec<ColumnData> = header
        .properties
        .iter()
        .map(|(_, ty)| ColumnData::with_capacity(*ty, block_rows))
        .collect();

    let mut buffer = vec![0u8; record_size * block_rows];
    let mut remaining = header.count;
    while remaining > 0 {
        let rows = remaining.min(READ_BLOCK_ROWS);
        let block = &mut buffer[..rows * record_size];
        reader.read_exact(block).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ply_error(format!("element '{}' is truncated", header.name))
            } else {
                SplatError::Io(e)
            }
        })?;

        for record in block.chunks_exact(record_size) {
            let mut offset = 0;
            for (column, (_, ty)) in data.iter_mut().zip(&header.properties) {
                column.push_le(&record[offset..offset + ty.size()]);
                offset += ty.size();
            }
        }
        remaining -= rows;
    }

    let columns = header
        .properties
        .iter()
        .zip(data)
        .map(|((name, _), data)| Column::new(name.clone(), data))
        .collect();
    let mut table = DataTable::new(columns)?;
    if table.num_columns() == 0 {
        table = DataTable::with_rows(header.count);
    }
    Ok(DataSection::new(header.name.clone(), table))
}

/// Reads a whole binary little-endian PLY file.
pub fn read_ply<R: BufRead>(mut reader: R) -> Result<PlyData> {
    let (comments, headers) = parse_header(&mut reader)?;
    let sections = headers
        .iter()
        .map(|header| read_element(&mut reader, header))
        .collect::<Result<Vec<_>>>()?;
    Ok(PlyData { comments, sections })
}

/// Writes sections as a binary little-endian PLY file.
pub fn write_ply<W: Write>(mut writer: W, data: &PlyData) -> Result<()> {
    let mut header = String::from("ply\nformat binary_little_endian 1.0\n");
    for comment in &data.comments {
        header.push_str(&format!("comment {}\n", comment));
    }
    for section in &data.sections {
        header.push_str(&format!(
            "element {} {}\n",
            section.name,
            section.table.num_rows()
        ));
        for column in section.table.columns() {
            header.push_str(&format!(
                "property {} {}\n",
                column.data_type().ply_name(),
                column.name
            ));
        }
    }
    header.push_str("end_header\n");
    writer.write_all(header.as_bytes())?;

    for section in &data.sections {
        let columns = section.table.columns();
        let record_size: usize = columns.iter().map(|c| c.data_type().size()).sum();
        let mut block = Vec::with_capacity(record_size * READ_BLOCK_ROWS);
        for row in 0..section.table.num_rows() {
            for column in columns {
                column.data.write_le(row, &mut block);
            }
            if block.len() >= record_size * READ_BLOCK_ROWS {
                writer.write_all(&block)?;
                block.clear();
            }
        }
        writer.write_all(&block)?;
    }
    writer.flush()?;
    Ok(())
}

/// Serialises to an in-memory buffer.
pub fn ply_to_bytes(data: &PlyData) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_ply(&mut bytes, data)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> PlyData {
        let vertex = DataTable::new(vec![
            Column::from_f32("x", vec![1.0, -2.5]),
            Column::new("packed", ColumnData::UInt32(vec![7, 0xdead_beef])),
            Column::new("tag", ColumnData::Int8(vec![-1, 3])),
        ])
        .unwrap();
        let chunk = DataTable::new(vec![Column::new("min", ColumnData::Float64(vec![0.25]))]).unwrap();
        PlyData {
            comments: vec!["Generated by test".to_string()],
            sections: vec![
                DataSection::new("chunk", chunk),
                DataSection::new("vertex", vertex),
            ],
        }
    }

    #[test]
    fn test_write_then_read() {
        let data = sample();
        let bytes = ply_to_bytes(&data).unwrap();
        let text = String::from_utf8_lossy(&bytes[..120]);
        assert!(text.starts_with("ply\nformat binary_little_endian 1.0\ncomment Generated by test\n"));

        let back = read_ply(Cursor::new(bytes)).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_rejects_ascii_format() {
        let text = "ply\nformat ascii 1.0\nelement vertex 0\nend_header\n";
        assert!(matches!(read_ply(Cursor::new(text)), Err(SplatError::Ply(_))));
    }

    #[test]
    fn test_rejects_list_properties() {
        let text = "ply\nformat binary_little_endian 1.0\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n";
        assert!(matches!(read_ply(Cursor::new(text)), Err(SplatError::Ply(_))));
    }

    #[test]
    fn test_truncated_body() {
        let mut bytes = ply_to_bytes(&sample()).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(read_ply(Cursor::new(bytes)), Err(SplatError::Ply(_))));
    }

    #[test]
    fn test_rejects_rows_without_properties() {
        let text = "ply\nformat binary_little_endian 1.0\nelement face 3\nend_header\n";
        assert!(matches!(read_ply(Cursor::new(text)), Err(SplatError::Ply(_))));

        let empty = "ply\nformat binary_little_endian 1.0\nelement face 0\nend_header\n";
        let back = read_ply(Cursor::new(empty)).unwrap();
        assert_eq!(back.sections[0].table.num_rows(), 0);
    }

    #[test]
    fn test_huge_element_count_is_an_error() {
        let overflowing = "ply\nformat binary_little_endian 1.0\nelement vertex 4611686018427387904\nproperty float x\nend_header\n";
        assert!(matches!(read_ply(Cursor::new(overflowing)), Err(SplatError::Ply(_))));

        // Fits in usize but the body is far shorter than the count claims.
        let mut bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 1000000000000\nproperty float x\nend_header\n".to_vec();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        assert!(matches!(read_ply(Cursor::new(bytes)), Err(SplatError::Ply(_))));
    }

    #[test]
    fn test_sized_type_names() {
        let mut bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 1\nproperty float32 x\nend_header\n".to_vec();
        bytes.extend_from_slice(&3.5f32.to_le_bytes());
        let back = read_ply(Cursor::new(bytes)).unwrap();
        assert_eq!(back.sections[0].table.f32_column("x").unwrap(), &[3.5]);
    }
}
