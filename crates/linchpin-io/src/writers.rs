//! Deterministic table and JSON writers.
//!
//! Floats are written in Rust's shortest round-trip form so identical
//! results always produce byte-identical files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use linchpin_common::Result;

pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        "NaN".to_string()
    } else if x == 0.0 {
        // normalises -0.0
        "0".to_string()
    } else {
        format!("{x}")
    }
}

/// CSV writer with a fixed header row.
pub struct TableWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl TableWriter<File> {
    /// Create (or truncate) `path`, creating parent directories.
    pub fn create(path: &Path, headers: &[&str]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::from_writer(File::create(path)?, headers)
    }
}

impl<W: Write> TableWriter<W> {
    pub fn from_writer(writer: W, headers: &[&str]) -> Result<Self> {
        let mut inner = csv::WriterBuilder::new().from_writer(writer);
        inner.write_record(headers)?;
        Ok(Self { inner })
    }

    pub fn write_row<I, T>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.inner.write_record(row)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        self.inner
            .into_inner()
            .map_err(|e| linchpin_common::LinchpinError::Io(e.into_error()))
    }
}

/// Pretty-printed JSON with a trailing newline.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut w, value)?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-0.0), "0");
        assert_eq!(format_float(1e-12), "0.000000000001");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_table_writer_header_only() {
        let w = TableWriter::from_writer(Vec::new(), &["gene_id", "log2fc"]).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "gene_id,log2fc\n");
    }

    #[test]
    fn test_table_writer_rows() {
        let mut w = TableWriter::from_writer(Vec::new(), &["a", "b"]).unwrap();
        w.write_row(["x", format_float(2.5).as_str()]).unwrap();
        let out = String::from_utf8(w.finish().unwrap()).unwrap();
        assert_eq!(out, "a,b\nx,2.5\n");
    }

    #[test]
    fn test_write_json_creates_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("x.json");
        write_json(&path, &serde_json::json!({"k": 1})).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
    }
}
