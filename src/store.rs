//! CSV persistence: append-only raw stores shared between workers, the resume
//! state read back from them, and the fixed-schema tables written by the
//! cleaning steps.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use compact_str::CompactString;
use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use hashbrown::HashSet;
use parking_lot::Mutex;
use serde::Serialize;

const BOM: &[u8] = b"\xEF\xBB\xBF";

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Append-only CSV file. The header is written only when the file is new or
/// empty, and every record is flushed as soon as it is written so that an
/// interrupted run leaves a valid prefix behind.
pub struct CsvSink {
    path: PathBuf,
    writer: Mutex<Writer<File>>,
}

impl CsvSink {
    pub fn append(path: impl Into<PathBuf>, header: &[&str]) -> anyhow::Result<Self> {
        let path = path.into();
        ensure_parent(&path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        let fresh = file.metadata()?.len() == 0;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if fresh {
            writer.write_record(header)?;
            writer.flush()?;
        }

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write<I, T>(&self, record: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut writer = self.writer.lock();
        writer.write_record(record)?;
        writer.flush()?;
        Ok(())
    }

    pub fn serialize<S: Serialize>(&self, record: &S) -> anyhow::Result<()> {
        let mut writer = self.writer.lock();
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}

/// Distinct non-empty values of `column` in an existing CSV. A missing or
/// empty file yields the empty set.
pub fn load_column(path: &Path, column: &str) -> anyhow::Result<HashSet<CompactString>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let table = Table::read(path, false)?;
    let Some(idx) = table.index(column) else {
        return Ok(HashSet::new());
    };
    Ok(table
        .rows
        .iter()
        .filter_map(|row| row.get(idx))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(CompactString::from)
        .collect())
}

/// A CSV loaded in memory, with header names trimmed (and BOM-stripped).
#[derive(Debug, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl Table {
    pub fn read(path: &Path, lowercase_headers: bool) -> anyhow::Result<Self> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("read {}", path.display()))?;

        let headers = reader
            .headers()?
            .iter()
            .map(|h| {
                let h = h.trim_start_matches('\u{feff}').trim();
                if lowercase_headers { h.to_lowercase() } else { h.to_owned() }
            })
            .collect();

        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.index(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Column {
        Column(self.index(name))
    }
}

/// Accessor for one column; reads as `""` when the column or the cell is
/// absent.
#[derive(Clone, Copy, Debug)]
pub struct Column(Option<usize>);

impl Column {
    pub fn get<'r>(&self, row: &'r StringRecord) -> &'r str {
        self.0.and_then(|i| row.get(i)).unwrap_or("")
    }

    pub const fn exists(&self) -> bool {
        self.0.is_some()
    }
}

/// Writes a whole table, replacing `path`. With `bom` the file starts with a
/// UTF-8 byte order mark so spreadsheet tools pick the right encoding.
pub fn write_table<S: Serialize>(
    path: &Path,
    header: &[&str],
    rows: impl IntoIterator<Item = S>,
    bom: bool,
) -> anyhow::Result<usize> {
    ensure_parent(path)?;
    let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    if bom {
        file.write_all(BOM)?;
    }

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(header)?;
    let mut n = 0;
    for row in rows {
        writer.serialize(row)?;
        n += 1;
    }
    writer.flush()?;
    Ok(n)
}
