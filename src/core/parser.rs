use crate::domain::model::{EnrollmentBatch, EnrollmentRecord, ParsedEntry, ParsedLine};
use crate::utils::error::{AttendanceError, Result};
use std::path::Path;

pub const REGISTRATION_COLUMN: &str = "registration_number";
pub const COURSE_COLUMN: &str = "course_code";
pub const DEFAULT_COLUMNS: [&str; 2] = [REGISTRATION_COLUMN, COURSE_COLUMN];

const FIELD_SEPARATOR: char = '\t';
const UTF8_BOM: char = '\u{feff}';

/// 解析 TSV 選課檔。標題列無論內容為何一律丟棄，逐行解析，
/// 單行格式錯誤只會產生 Malformed 項目，不會中斷整批。
#[derive(Debug, Clone)]
pub struct RecordParser {
    expected_columns: Vec<String>,
    registration_index: usize,
    course_index: usize,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self {
            expected_columns: DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            registration_index: 0,
            course_index: 1,
        }
    }
}

impl RecordParser {
    pub fn new<S: AsRef<str>>(expected_columns: &[S]) -> Result<Self> {
        let expected_columns: Vec<String> = expected_columns
            .iter()
            .map(|c| c.as_ref().trim().to_string())
            .collect();

        let position = |name: &str| {
            expected_columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| AttendanceError::InvalidConfigValueError {
                    field: "enrollment.expected_columns".to_string(),
                    value: expected_columns.join(","),
                    reason: format!("missing required column '{}'", name),
                })
        };

        let registration_index = position(REGISTRATION_COLUMN)?;
        let course_index = position(COURSE_COLUMN)?;

        Ok(Self {
            expected_columns,
            registration_index,
            course_index,
        })
    }

    pub fn expected_columns(&self) -> &[String] {
        &self.expected_columns
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<EnrollmentBatch> {
        let bytes = std::fs::read(&path)?;
        tracing::debug!(
            "Read {} bytes from {}",
            bytes.len(),
            path.as_ref().display()
        );
        self.parse_bytes(&bytes)
    }

    pub fn parse_bytes(&self, raw: &[u8]) -> Result<EnrollmentBatch> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| AttendanceError::parse(format!("input is not valid UTF-8: {}", e)))?;
        self.parse(text)
    }

    pub fn parse(&self, raw: &str) -> Result<EnrollmentBatch> {
        let raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
        if raw.trim().is_empty() {
            return Err(AttendanceError::parse("input is empty"));
        }

        // 前導空白行不算標題列
        let mut lines = raw
            .lines()
            .enumerate()
            .skip_while(|(_, line)| line.trim().is_empty());
        lines.next();

        let parsed: Vec<ParsedLine> = lines
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| ParsedLine {
                line_number: index + 1,
                entry: self.parse_line(line),
            })
            .collect();

        let batch = EnrollmentBatch::new(parsed);
        tracing::debug!(
            "Parsed {} enrollment lines ({} malformed)",
            batch.len(),
            batch.malformed_count()
        );
        Ok(batch)
    }

    fn parse_line(&self, line: &str) -> ParsedEntry {
        let trimmed = line.trim();
        let fields: Vec<&str> = trimmed.split(FIELD_SEPARATOR).collect();

        if fields.len() != self.expected_columns.len() {
            return ParsedEntry::Malformed {
                reason: format!(
                    "expected {} fields, found {}",
                    self.expected_columns.len(),
                    fields.len()
                ),
                raw: trimmed.to_string(),
            };
        }

        match EnrollmentRecord::new(fields[self.registration_index], fields[self.course_index]) {
            Ok(record) => ParsedEntry::Candidate(record),
            Err(reason) => ParsedEntry::Malformed {
                reason,
                raw: trimmed.to_string(),
            },
        }
    }
}
