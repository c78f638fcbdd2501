use std::{
    fs::{self, File},
    io::Read,
};

use camino::Utf8Path;

use super::{
    format::{parse_body, ExchangeHeader},
    ExchangeTable,
};
use crate::ananke_errors::AnankeError;

/// Headers larger than this are only decoded after reading the whole file.
const HEADER_PREFIX_BYTES: u64 = 1 << 20;

/// Decodes exchange files written by [`ExchangeFileWriter`](super::writer::ExchangeFileWriter)
/// or by the engine.
pub struct ExchangeFileReader;

impl ExchangeFileReader {
    /// Decode a full exchange file into a table.
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::ExchangeFormat)` if the header or a column block is malformed,
    ///   or if bytes remain after the last column.
    pub fn read(path: &Utf8Path) -> Result<ExchangeTable, AnankeError> {
        let bytes = fs::read(path)?;
        let total = bytes.len();

        let (rest, header) =
            ExchangeHeader::parse(&bytes).map_err(|e| format_error(path, total, e))?;
        let (rest, columns) = parse_body(rest, &header).map_err(|e| format_error(path, total, e))?;
        if !rest.is_empty() {
            return Err(AnankeError::ExchangeFormat {
                path: path.to_string(),
                reason: format!("{} trailing bytes after the last column", rest.len()),
            });
        }

        let mut table = ExchangeTable::new(header.n_rows as usize);
        for (name, value) in header.attributes {
            table.set_attribute(name, value);
        }
        for (column, data) in header.columns.into_iter().zip(columns) {
            table
                .push_column(column.name, data)
                .map_err(|e| AnankeError::ExchangeFormat {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(table)
    }

    /// Decode only the header of an exchange file.
    ///
    /// Only the beginning of the file is read unless the header is unusually large.
    pub fn read_header(path: &Utf8Path) -> Result<ExchangeHeader, AnankeError> {
        let mut prefix = Vec::new();
        File::open(path)?
            .take(HEADER_PREFIX_BYTES)
            .read_to_end(&mut prefix)?;

        match ExchangeHeader::parse(&prefix) {
            Ok((_, header)) => Ok(header),
            Err(_) if prefix.len() as u64 == HEADER_PREFIX_BYTES => {
                let bytes = fs::read(path)?;
                ExchangeHeader::parse(&bytes)
                    .map(|(_, header)| header)
                    .map_err(|e| format_error(path, bytes.len(), e))
            }
            Err(e) => Err(format_error(path, prefix.len(), e)),
        }
    }
}

fn format_error(
    path: &Utf8Path,
    total: usize,
    err: nom::Err<nom::error::Error<&[u8]>>,
) -> AnankeError {
    let reason = match err {
        nom::Err::Incomplete(_) => "unexpected end of file".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = total - e.input.len();
            if e.input.is_empty() || e.code == nom::error::ErrorKind::Eof {
                format!("unexpected end of file at byte {offset}")
            } else {
                format!("{:?} check failed at byte {offset}", e.code)
            }
        }
    };
    AnankeError::ExchangeFormat {
        path: path.to_string(),
        reason,
    }
}
