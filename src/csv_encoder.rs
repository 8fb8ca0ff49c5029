//! CSV escaping and rendering.
//!
//! Output is a pure function of the input: fields are joined with `,`,
//! records with `\n`, and there is no trailing newline. A field is quoted
//! only when it contains a comma, a double quote or a line break.

use std::borrow::Cow;

use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};

use crate::error::ExportError;

/// Writer with the export dialect. Width checks are done by
/// [`RowAccumulator`], so the writer itself is flexible.
fn new_writer() -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

/// Flushes the writer and drops the terminator of the last record.
fn into_bytes(writer: Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    let mut bytes = writer.into_inner().map_err(|e| {
        ExportError::Encoding(format!("Failed to flush CSV writer: {}", e.error()))
    })?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    Ok(bytes)
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, ExportError> {
    String::from_utf8(into_bytes(writer)?)
        .map_err(|e| ExportError::Encoding(format!("CSV output is not UTF-8: {}", e)))
}

fn write_record<'a, I>(writer: &mut Writer<Vec<u8>>, values: I) -> Result<(), ExportError>
where
    I: IntoIterator<Item = &'a str>,
{
    writer
        .write_record(values)
        .map_err(|e| ExportError::Encoding(format!("Failed to serialize record: {}", e)))
}

/// Escapes a single value. Absent values become the empty string.
///
/// # Errors
///
/// Returns `ExportError::Encoding` if the writer fails.
pub fn escape(value: Option<&str>) -> Result<Cow<'_, str>, ExportError> {
    let value = match value {
        Some(v) if !v.is_empty() => v,
        _ => return Ok(Cow::Borrowed("")),
    };

    let mut writer = new_writer();
    write_record(&mut writer, [value])?;
    let escaped = into_string(writer)?;

    if escaped == value {
        Ok(Cow::Borrowed(value))
    } else {
        Ok(Cow::Owned(escaped))
    }
}

/// Renders one record from values in header order.
///
/// # Errors
///
/// Returns `ExportError::Encoding` if the writer fails.
pub fn render_row<'a, I>(values: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut writer = new_writer();
    write_record(&mut writer, values.into_iter().map(Option::unwrap_or_default))?;
    into_string(writer)
}

/// Renders a header line followed by all rows.
///
/// # Errors
///
/// Returns `ExportError::Encoding` if the writer fails.
pub fn render<'a, R>(headers: &[&str], rows: R) -> Result<String, ExportError>
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = Option<&'a str>>,
{
    let mut writer = new_writer();
    write_record(&mut writer, headers.iter().copied())?;
    for row in rows {
        write_record(&mut writer, row.into_iter().map(Option::unwrap_or_default))?;
    }
    into_string(writer)
}

// ─────────────────────────────────────────────────────────────────────────────
// RowAccumulator
// ─────────────────────────────────────────────────────────────────────────────

/// Incremental encoder: rows are appended as they are projected, so the
/// canonical rows never need to be held in memory together.
pub struct RowAccumulator {
    writer: Writer<Vec<u8>>,
    width: usize,
    rows: usize,
}

impl std::fmt::Debug for RowAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowAccumulator")
            .field("width", &self.width)
            .field("rows", &self.rows)
            .finish()
    }
}

impl RowAccumulator {
    /// Starts a payload with the given header line.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Encoding` if the header cannot be written.
    pub fn new(headers: &[&str]) -> Result<Self, ExportError> {
        let mut writer = new_writer();
        write_record(&mut writer, headers.iter().copied())?;
        Ok(Self {
            writer,
            width: headers.len(),
            rows: 0,
        })
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Encoding` if the record width differs from the
    /// header width.
    pub fn push_row<'a, I>(&mut self, values: I) -> Result<(), ExportError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let values: Vec<&str> = values.into_iter().collect();
        if values.len() != self.width {
            return Err(ExportError::Encoding(format!(
                "Row {} has {} fields, expected {}",
                self.rows + 1,
                values.len(),
                self.width
            )));
        }

        write_record(&mut self.writer, values)?;
        self.rows += 1;
        Ok(())
    }

    /// Number of records appended so far (header excluded).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns declared by the header.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Consumes the accumulator and returns the UTF-8 payload.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Encoding` if the writer cannot be flushed.
    pub fn finish(self) -> Result<Vec<u8>, ExportError> {
        into_bytes(self.writer)
    }
}
