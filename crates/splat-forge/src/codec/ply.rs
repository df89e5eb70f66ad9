//! PLY point-cloud reader for Gaussian-splat vertices
//!
//! Handles `ascii`, `binary_little_endian` and `binary_big_endian` bodies.
//! Only the `vertex` element is decoded; other elements (faces, etc.) are
//! skipped, including list properties.

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};

use super::SplatPoint;

/// Vertex properties every splat file must carry, in [`SplatPoint`] order
pub const REQUIRED_PROPERTIES: [&str; 14] = [
    "x", "y", "z",
    "scale_0", "scale_1", "scale_2",
    "opacity",
    "f_dc_0", "f_dc_1", "f_dc_2",
    "rot_0", "rot_1", "rot_2", "rot_3",
];

/// Upper bound on the capacity reserved from a header's vertex count
const MAX_PRESIZED_POINTS: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "char" | "int8" => ScalarType::Int8,
            "uchar" | "uint8" => ScalarType::UInt8,
            "short" | "int16" => ScalarType::Int16,
            "ushort" | "uint16" => ScalarType::UInt16,
            "int" | "int32" => ScalarType::Int32,
            "uint" | "uint32" => ScalarType::UInt32,
            "float" | "float32" => ScalarType::Float32,
            "double" | "float64" => ScalarType::Float64,
            other => return Err(Error::format(format!("unknown PLY scalar type '{}'", other))),
        })
    }

    fn read<B: ByteOrder, R: Read>(self, reader: &mut R) -> std::io::Result<f64> {
        Ok(match self {
            ScalarType::Int8 => reader.read_i8()? as f64,
            ScalarType::UInt8 => reader.read_u8()? as f64,
            ScalarType::Int16 => reader.read_i16::<B>()? as f64,
            ScalarType::UInt16 => reader.read_u16::<B>()? as f64,
            ScalarType::Int32 => reader.read_i32::<B>()? as f64,
            ScalarType::UInt32 => reader.read_u32::<B>()? as f64,
            ScalarType::Float32 => reader.read_f32::<B>()? as f64,
            ScalarType::Float64 => reader.read_f64::<B>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    pub kind: PropertyKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementDef {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PropertyDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlyHeader {
    pub format: PlyFormat,
    pub elements: Vec<ElementDef>,
}

impl PlyHeader {
    /// Parse the header, leaving `reader` positioned at the first body byte
    pub fn read<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut line = String::new();
        let mut format = None;
        let mut elements: Vec<ElementDef> = Vec::new();

        if read_header_line(reader, &mut line)? != "ply" {
            return Err(Error::format("missing 'ply' magic"));
        }

        loop {
            let text = read_header_line(reader, &mut line)?;
            let mut tokens = text.split_whitespace();
            match tokens.next() {
                Some("end_header") => break,
                Some("comment") | Some("obj_info") | None => {}
                Some("format") => {
                    format = Some(match tokens.next() {
                        Some("ascii") => PlyFormat::Ascii,
                        Some("binary_little_endian") => PlyFormat::BinaryLittleEndian,
                        Some("binary_big_endian") => PlyFormat::BinaryBigEndian,
                        other => {
                            return Err(Error::format(format!("unsupported PLY format {:?}", other)))
                        }
                    });
                }
                Some("element") => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::format("element without a name"))?;
                    let count = tokens
                        .next()
                        .and_then(|c| c.parse::<usize>().ok())
                        .ok_or_else(|| Error::format(format!("element '{}' has no count", name)))?;
                    elements.push(ElementDef {
                        name: name.to_string(),
                        count,
                        properties: Vec::new(),
                    });
                }
                Some("property") => {
                    let element = elements
                        .last_mut()
                        .ok_or_else(|| Error::format("property declared before any element"))?;
                    let property = match tokens.next() {
                        Some("list") => {
                            let count = ScalarType::parse(tokens.next().unwrap_or_default())?;
                            let item = ScalarType::parse(tokens.next().unwrap_or_default())?;
                            let name = tokens.next().ok_or_else(|| Error::format("unnamed list property"))?;
                            PropertyDef {
                                name: name.to_string(),
                                kind: PropertyKind::List { count, item },
                            }
                        }
                        Some(ty) => {
                            let ty = ScalarType::parse(ty)?;
                            let name = tokens.next().ok_or_else(|| Error::format("unnamed property"))?;
                            PropertyDef {
                                name: name.to_string(),
                                kind: PropertyKind::Scalar(ty),
                            }
                        }
                        None => return Err(Error::format("empty property declaration")),
                    };
                    element.properties.push(property);
                }
                Some(other) => {
                    return Err(Error::format(format!("unexpected header keyword '{}'", other)))
                }
            }
        }

        let format = format.ok_or_else(|| Error::format("header has no format line"))?;
        Ok(Self { format, elements })
    }

    pub fn element(&self, name: &str) -> Option<&ElementDef> {
        self.elements.iter().find(|e| e.name == name)
    }
}

fn read_header_line<'a, R: BufRead>(reader: &mut R, line: &'a mut String) -> Result<&'a str> {
    line.clear();
    let read = reader.read_line(line).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData => Error::format("PLY header is not valid text"),
        _ => Error::Io(e),
    })?;
    if read == 0 {
        return Err(Error::format("unexpected end of file in PLY header"));
    }
    Ok(line.trim())
}

/// Read every vertex of a splat PLY file
pub fn read_ply_file(path: impl AsRef<Path>) -> Result<Vec<SplatPoint>> {
    let file = File::open(path.as_ref())?;
    read_ply(BufReader::new(file))
}

/// Read every vertex of a splat PLY stream.
///
/// Missing required properties are reported before the body is touched.
pub fn read_ply<R: BufRead>(mut reader: R) -> Result<Vec<SplatPoint>> {
    let header = PlyHeader::read(&mut reader)?;

    let vertex = header
        .element("vertex")
        .ok_or_else(|| Error::format("no 'vertex' element"))?;

    let mut columns = [0usize; REQUIRED_PROPERTIES.len()];
    for (slot, wanted) in columns.iter_mut().zip(REQUIRED_PROPERTIES) {
        *slot = vertex
            .properties
            .iter()
            .position(|p| p.name == wanted && matches!(p.kind, PropertyKind::Scalar(_)))
            .ok_or_else(|| Error::format(format!("vertex property '{}' is missing", wanted)))?;
    }

    let mut body = BodyReader::new(header.format, reader);
    let mut points = Vec::new();
    let mut row = Vec::new();

    for element in &header.elements {
        let is_vertex = element.name == "vertex";
        if is_vertex {
            // The count is untrusted until the rows are actually read
            points.reserve(element.count.min(MAX_PRESIZED_POINTS));
        }
        for index in 0..element.count {
            body.read_row(element, &mut row).map_err(|e| match e {
                Error::Io(io) => Error::format(format!(
                    "truncated or malformed '{}' element {}: {}",
                    element.name, index, io
                )),
                other => other,
            })?;
            if is_vertex {
                points.push(SplatPoint::from_columns(&row, &columns));
            }
        }
        if is_vertex {
            break;
        }
    }

    Ok(points)
}

/// Decodes element rows for one body encoding
struct BodyReader<R> {
    format: PlyFormat,
    reader: R,
    line: String,
}

impl<R: BufRead> BodyReader<R> {
    fn new(format: PlyFormat, reader: R) -> Self {
        Self {
            format,
            reader,
            line: String::new(),
        }
    }

    /// Fill `row` with one value per scalar property; list values are dropped
    fn read_row(&mut self, element: &ElementDef, row: &mut Vec<f64>) -> Result<()> {
        row.clear();
        match self.format {
            PlyFormat::Ascii => self.read_ascii_row(element, row),
            PlyFormat::BinaryLittleEndian => self.read_binary_row::<LittleEndian>(element, row),
            PlyFormat::BinaryBigEndian => self.read_binary_row::<BigEndian>(element, row),
        }
    }

    fn read_binary_row<B: ByteOrder>(&mut self, element: &ElementDef, row: &mut Vec<f64>) -> Result<()> {
        for property in &element.properties {
            match property.kind {
                PropertyKind::Scalar(ty) => row.push(ty.read::<B, _>(&mut self.reader)?),
                PropertyKind::List { count, item } => {
                    let n = count.read::<B, _>(&mut self.reader)? as usize;
                    for _ in 0..n {
                        item.read::<B, _>(&mut self.reader)?;
                    }
                    row.push(f64::NAN);
                }
            }
        }
        Ok(())
    }

    fn read_ascii_row(&mut self, element: &ElementDef, row: &mut Vec<f64>) -> Result<()> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Err(Error::format(format!("unexpected end of '{}' data", element.name)));
        }

        let mut tokens = self.line.split_whitespace();
        let mut next = |what: &str| -> Result<f64> {
            let token = tokens
                .next()
                .ok_or_else(|| Error::format(format!("missing value for '{}'", what)))?;
            token
                .parse::<f64>()
                .map_err(|_| Error::format(format!("invalid number '{}' for '{}'", token, what)))
        };

        for property in &element.properties {
            match property.kind {
                PropertyKind::Scalar(_) => row.push(next(&property.name)?),
                PropertyKind::List { .. } => {
                    let n = next(&property.name)? as usize;
                    for _ in 0..n {
                        next(&property.name)?;
                    }
                    row.push(f64::NAN);
                }
            }
        }
        Ok(())
    }
}
