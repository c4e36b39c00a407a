//! Report destinations

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

use super::OutputRow;

/// A flushed row: the rendered line and the raw field values
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub line: &'a str,
    pub fields: &'a [String],
}

impl Row<'_> {
    fn to_output_row(self) -> io::Result<OutputRow> {
        OutputRow::from_fields(self.fields).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("row has {} fields, expected 12", self.fields.len()),
            )
        })
    }
}

pub trait RowSink {
    /// Called once per dumped root before its first row
    fn write_header(&mut self, header: Row<'_>) -> io::Result<()>;

    fn write_row(&mut self, row: Row<'_>) -> io::Result<()>;

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: RowSink + ?Sized> RowSink for &mut S {
    fn write_header(&mut self, header: Row<'_>) -> io::Result<()> {
        (**self).write_header(header)
    }

    fn write_row(&mut self, row: Row<'_>) -> io::Result<()> {
        (**self).write_row(row)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputEncoding {
    Utf8,
    /// Little-endian UTF-16 with a byte order mark, as spreadsheet tools expect
    #[default]
    Utf16Le,
}

/// Separated text, one row per line
pub struct CsvSink<W: Write> {
    writer: W,
    encoding: OutputEncoding,
    bom_written: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, encoding: OutputEncoding) -> Self {
        Self {
            writer,
            encoding,
            bom_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self.encoding {
            OutputEncoding::Utf8 => {
                self.writer.write_all(line.as_bytes())?;
                self.writer.write_all(b"\n")
            }
            OutputEncoding::Utf16Le => {
                if !self.bom_written {
                    self.writer.write_all(&[0xFF, 0xFE])?;
                    self.bom_written = true;
                }
                let bytes: Vec<u8> = line
                    .encode_utf16()
                    .chain("\r\n".encode_utf16())
                    .flat_map(u16::to_le_bytes)
                    .collect();
                self.writer.write_all(&bytes)
            }
        }
    }
}

impl<W: Write> RowSink for CsvSink<W> {
    fn write_header(&mut self, header: Row<'_>) -> io::Result<()> {
        self.write_line(header.line)
    }

    fn write_row(&mut self, row: Row<'_>) -> io::Result<()> {
        self.write_line(row.line)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// One JSON object per row; headers are implied by the keys
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RowSink for JsonLinesSink<W> {
    fn write_header(&mut self, _header: Row<'_>) -> io::Result<()> {
        Ok(())
    }

    fn write_row(&mut self, row: Row<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, &row.to_output_row()?)?;
        self.writer.write_all(b"\n")
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Keeps rows in memory
#[derive(Debug, Default)]
pub struct CollectSink {
    pub headers: usize,
    pub rows: Vec<OutputRow>,
    /// Rendered lines, header lines included
    pub lines: Vec<String>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowSink for CollectSink {
    fn write_header(&mut self, header: Row<'_>) -> io::Result<()> {
        self.headers += 1;
        self.lines.push(header.line.to_string());
        Ok(())
    }

    fn write_row(&mut self, row: Row<'_>) -> io::Result<()> {
        self.rows.push(row.to_output_row()?);
        self.lines.push(row.line.to_string());
        Ok(())
    }
}
