//! CSV rendering of served listing rows
//!
//! The header is always written, even for an empty result, so consumers can
//! rely on the column layout `page,title,price,seller,reviews,image_url`.

use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;

use crate::domain::product::{EXPORT_HEADER, ExportRow};

pub fn write_rows<W: Write>(writer: W, rows: &[ExportRow]) -> Result<(), csv::Error> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(EXPORT_HEADER)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_rows_to_path(path: &Path, rows: &[ExportRow]) -> Result<(), csv::Error> {
    let file = std::fs::File::create(path)?;
    write_rows(file, rows)
}
