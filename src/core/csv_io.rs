use crate::domain::model::Member;
use crate::utils::error::{BatchError, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

/// 輸入檔的欄位配置，由表頭寬度決定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    /// `type,name,email,phone,address,deleteFlag`
    MemberOnly,
    /// `id,type,...`; the leading id column is ignored
    LeadingId,
}

impl RowLayout {
    fn from_header_width(width: usize, line: u64) -> Result<Self> {
        match width {
            w if w == Member::FIELD_COUNT => Ok(RowLayout::MemberOnly),
            w if w == Member::FIELD_COUNT + 1 => Ok(RowLayout::LeadingId),
            w => Err(BatchError::validation(
                line,
                format!(
                    "header has {} columns, expected {} or {}",
                    w,
                    Member::FIELD_COUNT,
                    Member::FIELD_COUNT + 1
                ),
            )),
        }
    }

    fn width(&self) -> usize {
        match self {
            RowLayout::MemberOnly => Member::FIELD_COUNT,
            RowLayout::LeadingId => Member::FIELD_COUNT + 1,
        }
    }

    fn member_fields<'a>(&self, fields: &'a [String]) -> &'a [String] {
        match self {
            RowLayout::MemberOnly => fields,
            RowLayout::LeadingId => &fields[1..],
        }
    }

    pub fn parse_row(&self, row: &RawRow) -> Result<Member> {
        if row.fields.len() != self.width() {
            return Err(BatchError::validation(
                row.line,
                format!(
                    "expected {} fields, found {}",
                    self.width(),
                    row.fields.len()
                ),
            ));
        }

        Member::from_row(self.member_fields(&row.fields), row.line)
    }
}

/// One undecoded data row with its 1-based line number in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub fields: Vec<String>,
}

/// 唯讀、單次走訪的 CSV 來源。表頭在開檔時就被讀掉。
pub struct CsvSource {
    path: PathBuf,
    reader: csv::Reader<File>,
    layout: Option<RowLayout>,
}

impl std::fmt::Debug for CsvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSource")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .finish()
    }
}

impl CsvSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BatchError::NotFound {
                path: path.display().to_string(),
            });
        }

        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BatchError::NotFound {
                path: path.display().to_string(),
            },
            _ => BatchError::Io(e),
        })?;

        // 寬度不一致的列由 parse_row 回報，才能帶上行號
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut header = csv::StringRecord::new();
        let layout = if reader.read_record(&mut header)? {
            let line = header.position().map(|p| p.line()).unwrap_or(1);
            tracing::debug!("CSV header at line {}: {:?}", line, header);
            Some(RowLayout::from_header_width(header.len(), line)?)
        } else {
            tracing::warn!("The CSV file {} is empty (no header row)", path.display());
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            layout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file had no header row at all.
    pub fn layout(&self) -> Option<RowLayout> {
        self.layout
    }

    /// Consumes the remaining data rows. Yields nothing for a header-less file.
    pub fn rows(&mut self) -> impl Iterator<Item = Result<RawRow>> + '_ {
        self.reader.records().map(|record| -> Result<RawRow> {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            Ok(RawRow {
                line,
                fields: record.iter().map(str::to_string).collect(),
            })
        })
    }

    /// Parses the remaining data rows into members, in file order.
    pub fn members(&mut self) -> impl Iterator<Item = Result<Member>> + '_ {
        let layout = self.layout;
        self.rows().map(move |row| -> Result<Member> {
            let row = row?;
            match layout {
                Some(layout) => layout.parse_row(&row),
                None => Err(BatchError::validation(
                    row.line,
                    "data row found before any header row",
                )),
            }
        })
    }
}

/// CSV 輸出。建立時先寫表頭，`finish` 時 flush。
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
    rows_written: usize,
}

impl CsvSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        writer.write_record(Member::HEADER)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows_written: 0,
        })
    }

    pub fn write(&mut self, member: &Member) -> Result<()> {
        self.writer.write_record(member.to_row())?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flushes every accepted row to disk and closes the file.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        let inner = self.writer.into_inner().map_err(|e| BatchError::Io(e.into_error()))?;
        inner.into_inner().map_err(|e| BatchError::Io(e.into_error()))?.sync_all()?;

        tracing::debug!("Wrote {} rows to {}", self.rows_written, self.path.display());
        Ok(self.rows_written)
    }
}
