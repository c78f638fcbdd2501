//! Binary layout of exchange files.
//!
//! Every exchange file is a little-endian container made of a self-describing header followed by
//! a column-major body:
//!
//! ```text
//! magic      4 bytes   "ANKX"
//! version    u16       1
//! reserved   u16       0
//! n_rows     u64
//! n_attrs    u32       then n_attrs × (u16 len, UTF-8 name, f64 value)
//! n_cols     u32       then n_cols  × (u16 len, UTF-8 name, u8 dtype)
//! body                 one block per column, in header order
//! ```
//!
//! `dtype` is `0` for `f64`, `1` for `i64` and `2` for 3-vectors of `f64`, whose block stores the
//! three components of row 0, then row 1, and so on. A file must end exactly at the end of the
//! last column block.
//!
//! # See also
//! ------------
//! * [`ExchangeHeader::parse`] – nom decoder of the header.
//! * [`parse_body`] – nom decoder of the column blocks.
//! * [`ExchangeHeader::write_to`] / [`write_body`] – the matching encoders.
use std::{fmt, io::Write};

use nalgebra::Vector3;
use nom::{
    bytes::complete::tag,
    combinator::{map, map_res, verify},
    multi::{count, length_data},
    number::complete::{le_f64, le_i64, le_u16, le_u32, le_u64, le_u8},
    IResult, Parser,
};

use super::{ColumnData, ColumnType, ExchangeTable};
use crate::ananke_errors::AnankeError;

pub const MAGIC: &[u8; 4] = b"ANKX";
pub const FORMAT_VERSION: u16 = 1;

/// Name and element type of one column, as declared in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub name: String,
    pub column_type: ColumnType,
}

/// Decoded header of an exchange file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeHeader {
    pub version: u16,
    pub n_rows: u64,
    pub attributes: Vec<(String, f64)>,
    pub columns: Vec<ColumnHeader>,
}

fn parse_name(input: &[u8]) -> IResult<&[u8], String> {
    map(map_res(length_data(le_u16), std::str::from_utf8), str::to_owned).parse(input)
}

fn parse_attribute(input: &[u8]) -> IResult<&[u8], (String, f64)> {
    (parse_name, le_f64).parse(input)
}

fn parse_column_header(input: &[u8]) -> IResult<&[u8], ColumnHeader> {
    map(
        (parse_name, map_res(le_u8, ColumnType::try_from)),
        |(name, column_type)| ColumnHeader { name, column_type },
    )
    .parse(input)
}

impl ExchangeHeader {
    /// Header describing the given table.
    pub fn for_table(table: &ExchangeTable) -> Self {
        ExchangeHeader {
            version: FORMAT_VERSION,
            n_rows: table.n_rows() as u64,
            attributes: table.attributes().to_vec(),
            columns: table
                .columns()
                .map(|(name, data)| ColumnHeader {
                    name: name.to_string(),
                    column_type: data.column_type(),
                })
                .collect(),
        }
    }

    /// Decode the header at the start of an exchange file.
    ///
    /// Arguments
    /// -----------------
    /// * `input`: bytes starting at the beginning of the file.
    ///
    /// Return
    /// ----------
    /// * `(remaining, header)` where `remaining` starts at the first column block.
    ///
    /// See also
    /// ------------
    /// * [`parse_body`] – decodes what follows the header.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(&MAGIC[..]).parse(input)?;
        let (input, version) = verify(le_u16, |v: &u16| *v == FORMAT_VERSION).parse(input)?;
        let (input, _reserved) = le_u16(input)?;
        let (input, n_rows) = le_u64(input)?;
        let (input, n_attrs) = le_u32(input)?;
        let (input, attributes) = count(parse_attribute, n_attrs as usize).parse(input)?;
        let (input, n_cols) = le_u32(input)?;
        let (input, columns) = count(parse_column_header, n_cols as usize).parse(input)?;
        Ok((
            input,
            ExchangeHeader {
                version,
                n_rows,
                attributes,
                columns,
            },
        ))
    }

    /// Encode the header.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::Schema)` if a name does not fit the `u16` length prefix.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), AnankeError> {
        out.write_all(MAGIC)?;
        out.write_all(&self.version.to_le_bytes())?;
        out.write_all(&0u16.to_le_bytes())?;
        out.write_all(&self.n_rows.to_le_bytes())?;

        out.write_all(&(self.attributes.len() as u32).to_le_bytes())?;
        for (name, value) in &self.attributes {
            write_name(out, name)?;
            out.write_all(&value.to_le_bytes())?;
        }

        out.write_all(&(self.columns.len() as u32).to_le_bytes())?;
        for column in &self.columns {
            write_name(out, &column.name)?;
            out.write_all(&[column.column_type as u8])?;
        }
        Ok(())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }
}

fn write_name<W: Write>(out: &mut W, name: &str) -> Result<(), AnankeError> {
    let len = u16::try_from(name.len())
        .map_err(|_| AnankeError::Schema(format!("name too long for exchange file: '{name}'")))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(name.as_bytes())?;
    Ok(())
}

fn parse_vector3(input: &[u8]) -> IResult<&[u8], Vector3<f64>> {
    map((le_f64, le_f64, le_f64), |(x, y, z)| Vector3::new(x, y, z)).parse(input)
}

/// Decode the column blocks described by `header`.
pub fn parse_body<'a>(
    mut input: &'a [u8],
    header: &ExchangeHeader,
) -> IResult<&'a [u8], Vec<ColumnData>> {
    let n = header.n_rows as usize;
    let mut columns = Vec::with_capacity(header.columns.len());
    for column in &header.columns {
        let (rest, data) = match column.column_type {
            ColumnType::Float => map(count(le_f64, n), ColumnData::Float).parse(input)?,
            ColumnType::Integer => map(count(le_i64, n), ColumnData::Integer).parse(input)?,
            ColumnType::Vector3 => map(count(parse_vector3, n), ColumnData::Vector3).parse(input)?,
        };
        columns.push(data);
        input = rest;
    }
    Ok((input, columns))
}

/// Encode the column blocks of `table` in column order.
pub fn write_body<W: Write>(out: &mut W, table: &ExchangeTable) -> Result<(), AnankeError> {
    for (_, data) in table.columns() {
        match data {
            ColumnData::Float(values) => {
                for v in values {
                    out.write_all(&v.to_le_bytes())?;
                }
            }
            ColumnData::Integer(values) => {
                for v in values {
                    out.write_all(&v.to_le_bytes())?;
                }
            }
            ColumnData::Vector3(values) => {
                for v in values {
                    for component in v.iter() {
                        out.write_all(&component.to_le_bytes())?;
                    }
                }
            }
        }
    }
    Ok(())
}

impl fmt::Display for ExchangeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LABEL_WIDTH: usize = 18;
        const VALUE_WIDTH: usize = 40;

        let border = format!(
            "+{:-<label$}+{:-<value$}+",
            "",
            "",
            label = LABEL_WIDTH + 1,
            value = VALUE_WIDTH + 1
        );
        let row = |f: &mut fmt::Formatter<'_>, label: &str, value: String| {
            writeln!(
                f,
                "| {:<label$}| {:<value$}|",
                label,
                value,
                label = LABEL_WIDTH,
                value = VALUE_WIDTH
            )
        };

        writeln!(f, "{border}")?;
        row(f, "Exchange Header", String::new())?;
        writeln!(f, "{border}")?;
        row(f, "Version", self.version.to_string())?;
        row(f, "Rows", self.n_rows.to_string())?;
        for (name, value) in &self.attributes {
            row(f, &format!("attr {name}"), value.to_string())?;
        }
        for column in &self.columns {
            row(f, &format!("col {}", column.name), column.column_type.to_string())?;
        }
        writeln!(f, "{border}")
    }
}

#[cfg(test)]
mod test_exchange_format {
    use super::*;

    fn sample_table() -> ExchangeTable {
        let mut table = ExchangeTable::new(2);
        table.set_attribute("ngb", 64.0);
        table
            .push_column(
                "pos3",
                ColumnData::Vector3(vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0)]),
            )
            .unwrap();
        table
            .push_column("partid", ColumnData::Integer(vec![7, -8]))
            .unwrap();
        table
    }

    fn encode(table: &ExchangeTable) -> Vec<u8> {
        let mut bytes = Vec::new();
        ExchangeHeader::for_table(table)
            .write_to(&mut bytes)
            .unwrap();
        write_body(&mut bytes, table).unwrap();
        bytes
    }

    #[test]
    fn test_layout_is_little_endian_and_row_interleaved() {
        let bytes = encode(&sample_table());
        assert_eq!(&bytes[0..4], b"ANKX");
        assert_eq!(&bytes[4..6], &[1, 0]);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 2);

        // the body is 6 f64 for pos3 followed by 2 i64 for partid
        let body = &bytes[bytes.len() - 64..];
        let first = f64::from_le_bytes(body[0..8].try_into().unwrap());
        let second = f64::from_le_bytes(body[8..16].try_into().unwrap());
        assert_eq!((first, second), (1.0, 2.0));
        assert_eq!(i64::from_le_bytes(body[56..64].try_into().unwrap()), -8);
    }

    #[test]
    fn test_parse_header_and_body() {
        let table = sample_table();
        let bytes = encode(&table);
        let (rest, header) = ExchangeHeader::parse(&bytes).unwrap();
        assert_eq!(header.n_rows, 2);
        assert_eq!(header.attribute("ngb"), Some(64.0));
        assert_eq!(header.column_names().collect::<Vec<_>>(), ["pos3", "partid"]);

        let (rest, columns) = parse_body(rest, &header).unwrap();
        assert!(rest.is_empty());
        assert_eq!(Some(&columns[1]), table.column("partid"));
    }

    #[test]
    fn test_rejects_bad_magic_version_and_dtype() {
        let mut bytes = encode(&sample_table());
        bytes[0] = b'X';
        assert!(ExchangeHeader::parse(&bytes).is_err());

        let mut bytes = encode(&sample_table());
        bytes[4] = 2;
        assert!(ExchangeHeader::parse(&bytes).is_err());

        let table = sample_table();
        let mut bytes = encode(&table);
        // the dtype byte of the last column sits right before the body
        let dtype_offset = bytes.len() - 64 - 1;
        bytes[dtype_offset] = 9;
        assert!(ExchangeHeader::parse(&bytes).is_err());
    }

    #[test]
    fn test_truncated_body_fails() {
        let bytes = encode(&sample_table());
        let (rest, header) = ExchangeHeader::parse(&bytes).unwrap();
        assert!(parse_body(&rest[..rest.len() - 1], &header).is_err());
    }

    #[test]
    fn test_display_lists_columns() {
        let header = ExchangeHeader::for_table(&sample_table());
        let text = header.to_string();
        assert!(text.contains("col pos3"));
        assert!(text.contains("f64x3"));
        assert!(text.contains("attr ngb"));
    }
}
