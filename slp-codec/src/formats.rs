//! Milestone-driven fixed-header formats
//!
//! Milestones describe each header as a list of atom names (for example
//! `["u8", "bytes16", "f64"]`). The interpreter packs and unpacks values
//! little-endian, mirroring the struct layouts of the protocol revisions.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatAtom {
    U8,
    U16,
    U32,
    U64,
    F64,
    Bool,
    Bytes(usize),
}

impl FormatAtom {
    pub fn parse(name: &str) -> Result<Self, CodecError> {
        match name {
            "u8" => Ok(Self::U8),
            "u16" => Ok(Self::U16),
            "u32" => Ok(Self::U32),
            "u64" => Ok(Self::U64),
            "f64" => Ok(Self::F64),
            "bool" => Ok(Self::Bool),
            _ => match name.strip_prefix("bytes") {
                Some(len) => len
                    .parse()
                    .map(Self::Bytes)
                    .map_err(|_| CodecError::UnknownAtom(name.to_string())),
                None => Err(CodecError::UnknownAtom(name.to_string())),
            },
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::U8 | Self::Bool => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 | Self::F64 => 8,
            Self::Bytes(len) => *len,
        }
    }
}

/// A value carried by one fixed-header atom.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Uint(u64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_uint(&self) -> Result<u64, CodecError> {
        match self {
            Self::Uint(v) => Ok(*v),
            _ => Err(CodecError::HeaderOverrun),
        }
    }

    pub fn as_bool(&self) -> Result<bool, CodecError> {
        match self {
            Self::Bool(v) => Ok(*v),
            _ => Err(CodecError::HeaderOverrun),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], CodecError> {
        match self {
            Self::Bytes(v) => Ok(v),
            _ => Err(CodecError::HeaderOverrun),
        }
    }
}

/// An ordered run of atoms describing one fixed header.
#[derive(Debug, Clone)]
pub struct FixedFormat(Vec<FormatAtom>);

impl FixedFormat {
    pub fn from_names(names: &[String]) -> Result<Self, CodecError> {
        names
            .iter()
            .map(|n| FormatAtom::parse(n))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn atoms(&self) -> &[FormatAtom] {
        &self.0
    }

    pub fn size(&self) -> usize {
        self.0.iter().map(FormatAtom::size).sum()
    }

    pub fn pack(&self, values: &[FieldValue]) -> Result<Vec<u8>, CodecError> {
        if values.len() != self.0.len() {
            return Err(CodecError::HeaderOverrun);
        }
        let mut out = Vec::with_capacity(self.size());
        for (atom, value) in self.0.iter().zip(values) {
            match (atom, value) {
                (FormatAtom::U8, FieldValue::Uint(v)) => {
                    out.write_u8(u8::try_from(*v).map_err(|_| CodecError::HeaderOverrun)?)
                }
                (FormatAtom::U16, FieldValue::Uint(v)) => out.write_u16::<LittleEndian>(
                    u16::try_from(*v).map_err(|_| CodecError::HeaderOverrun)?,
                ),
                (FormatAtom::U32, FieldValue::Uint(v)) => out.write_u32::<LittleEndian>(
                    u32::try_from(*v).map_err(|_| CodecError::HeaderOverrun)?,
                ),
                (FormatAtom::U64, FieldValue::Uint(v)) => out.write_u64::<LittleEndian>(*v),
                (FormatAtom::F64, FieldValue::Float(v)) => out.write_f64::<LittleEndian>(*v),
                (FormatAtom::Bool, FieldValue::Bool(v)) => out.write_u8(u8::from(*v)),
                (FormatAtom::Bytes(len), FieldValue::Bytes(v)) if v.len() == *len => {
                    out.extend_from_slice(v);
                    Ok(())
                }
                _ => return Err(CodecError::HeaderOverrun),
            }
            .map_err(|_| CodecError::HeaderOverrun)?;
        }
        Ok(out)
    }

    pub fn unpack(&self, bytes: &[u8]) -> Result<Vec<FieldValue>, CodecError> {
        if bytes.len() != self.size() {
            return Err(CodecError::HeaderOverrun);
        }
        let mut cursor = bytes;
        let mut out = Vec::with_capacity(self.0.len());
        for atom in &self.0 {
            let value = match atom {
                FormatAtom::U8 => FieldValue::Uint(cursor.read_u8().map(u64::from).map_err(|_| CodecError::HeaderOverrun)?),
                FormatAtom::U16 => FieldValue::Uint(
                    cursor
                        .read_u16::<LittleEndian>()
                        .map(u64::from)
                        .map_err(|_| CodecError::HeaderOverrun)?,
                ),
                FormatAtom::U32 => FieldValue::Uint(
                    cursor
                        .read_u32::<LittleEndian>()
                        .map(u64::from)
                        .map_err(|_| CodecError::HeaderOverrun)?,
                ),
                FormatAtom::U64 => FieldValue::Uint(
                    cursor
                        .read_u64::<LittleEndian>()
                        .map_err(|_| CodecError::HeaderOverrun)?,
                ),
                FormatAtom::F64 => FieldValue::Float(
                    cursor
                        .read_f64::<LittleEndian>()
                        .map_err(|_| CodecError::HeaderOverrun)?,
                ),
                FormatAtom::Bool => FieldValue::Bool(
                    cursor.read_u8().map_err(|_| CodecError::HeaderOverrun)? != 0,
                ),
                FormatAtom::Bytes(len) => {
                    if cursor.len() < *len {
                        return Err(CodecError::HeaderOverrun);
                    }
                    let (taken, rest) = cursor.split_at(*len);
                    cursor = rest;
                    FieldValue::Bytes(taken.to_vec())
                }
            };
            out.push(value);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn atom_sizes_match_struct_layout() {
        let genesis = FixedFormat::from_names(&names(&["u8", "u8", "u64", "bool", "bool"])).unwrap();
        assert_eq!(genesis.size(), 12);
        let fungible = FixedFormat::from_names(&names(&["u8", "bytes16", "f64"])).unwrap();
        assert_eq!(fungible.size(), 25);
    }

    #[test]
    fn pack_unpack_round_trip() {
        let format = FixedFormat::from_names(&names(&["u8", "bytes16", "u64", "bool"])).unwrap();
        let values = vec![
            FieldValue::Uint(2),
            FieldValue::Bytes(vec![0xab; 16]),
            FieldValue::Uint(1000),
            FieldValue::Bool(true),
        ];
        let packed = format.pack(&values).unwrap();
        assert_eq!(format.unpack(&packed).unwrap(), values);
    }

    #[test]
    fn truncated_header_is_refused() {
        let format = FixedFormat::from_names(&names(&["u8", "u64"])).unwrap();
        assert!(matches!(
            format.unpack(&[0u8; 4]),
            Err(CodecError::HeaderOverrun)
        ));
    }

    #[test]
    fn unknown_atom_is_refused() {
        assert!(FixedFormat::from_names(&names(&["u8", "i32"])).is_err());
    }
}
