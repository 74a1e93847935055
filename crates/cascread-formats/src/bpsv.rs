//! BPSV (pipe-separated values) documents
//!
//! Used by `.build.info`, the patch service `versions` and `cdns`
//! endpoints. The first line declares the columns as `Name!TYPE:size`, the
//! remaining lines are `|`-separated rows. Lines starting with `##` carry
//! metadata such as the sequence number.
//!
//! ```
//! use cascread_formats::bpsv::BpsvDocument;
//!
//! let doc = BpsvDocument::parse("Region!STRING:0|BuildConfig!HEX:16\n## seqn = 7\nus|abcd\n").unwrap();
//! assert_eq!(doc.sequence_number(), Some(7));
//! assert_eq!(doc.rows()[0].get("BuildConfig"), Some("abcd"));
//! ```

use thiserror::Error;

/// BPSV parse errors
#[derive(Debug, Error)]
pub enum BpsvError {
    /// Document has no header line
    #[error("empty document")]
    EmptyDocument,

    /// Header line is malformed
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A row has the wrong number of fields
    #[error("row {row} has {actual} fields, expected {expected}")]
    FieldCount {
        /// One-based line number
        row: usize,
        /// Columns declared
        expected: usize,
        /// Fields present
        actual: usize,
    },
}

/// Parsed BPSV document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BpsvDocument {
    columns: Vec<String>,
    rows: Vec<BpsvRow>,
    sequence_number: Option<u64>,
}

/// One data row. Values are looked up by column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BpsvRow {
    columns: std::sync::Arc<[String]>,
    values: Vec<String>,
}

impl BpsvRow {
    /// Value of a column, `None` if the column does not exist.
    ///
    /// Column names are matched case-insensitively.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .and_then(|index| self.values.get(index))
            .map(String::as_str)
    }

    /// Value of a column, treating empty strings as absent
    pub fn get_non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|value| !value.is_empty())
    }
}

impl BpsvDocument {
    /// Parse a document from text
    pub fn parse(text: &str) -> Result<Self, BpsvError> {
        // Line numbers are 1-based and count blank lines
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let (_, header) = lines.next().ok_or(BpsvError::EmptyDocument)?;
        if !header.contains('!') {
            return Err(BpsvError::InvalidHeader(
                "Header must contain field type specifications".to_string(),
            ));
        }

        let columns: std::sync::Arc<[String]> = header
            .split('|')
            .map(|field| {
                field
                    .split_once('!')
                    .map(|(name, _)| name.to_string())
                    .ok_or_else(|| BpsvError::InvalidHeader(format!("field without type: {field}")))
            })
            .collect::<Result<Vec<_>, _>>()?
            .into();

        let mut document = Self {
            columns: columns.to_vec(),
            rows: Vec::new(),
            sequence_number: None,
        };

        for (line_no, line) in lines {
            if let Some(meta) = line.strip_prefix("##") {
                if let Some((key, value)) = meta.split_once('=') {
                    if key.trim() == "seqn" {
                        document.sequence_number = value.trim().parse().ok();
                    }
                }
                continue;
            }

            let values: Vec<String> = line.split('|').map(str::to_string).collect();
            if values.len() != columns.len() {
                return Err(BpsvError::FieldCount {
                    row: line_no,
                    expected: columns.len(),
                    actual: values.len(),
                });
            }
            document.rows.push(BpsvRow {
                columns: columns.clone(),
                values,
            });
        }

        Ok(document)
    }

    /// Column names in declaration order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows
    pub fn rows(&self) -> &[BpsvRow] {
        &self.rows
    }

    /// Sequence number from a `## seqn` line
    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }

    /// First row whose `column` equals `value` (case-insensitive)
    pub fn find(&self, column: &str, value: &str) -> Option<&BpsvRow> {
        self.rows
            .iter()
            .find(|row| row.get(column).is_some_and(|v| v.eq_ignore_ascii_case(value)))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const BUILD_INFO: &str = "Branch!STRING:0|Active!DEC:1|Build Key!HEX:16|CDN Key!HEX:16\n\
                              eu|0|1111|2222\n\
                              us|1|3333|4444\n";

    #[test]
    fn test_columns_with_spaces() {
        let doc = BpsvDocument::parse(BUILD_INFO).unwrap();
        assert_eq!(doc.columns().len(), 4);
        let active = doc.find("Active", "1").unwrap();
        assert_eq!(active.get("Build Key"), Some("3333"));
        assert_eq!(active.get("build key"), Some("3333"));
        assert_eq!(active.get("Missing"), None);
    }

    #[test]
    fn test_field_count_mismatch() {
        let err = BpsvDocument::parse("A!STRING:0|B!STRING:0\nonly\n").unwrap_err();
        assert!(matches!(err, BpsvError::FieldCount { row: 2, expected: 2, actual: 1 }));
    }

    #[test]
    fn test_field_count_row_counts_blank_lines() {
        let text = "A!STRING:0|B!STRING:0\n\na|b\n\n## seqn = 7\n\nbroken\n";
        let err = BpsvDocument::parse(text).unwrap_err();
        assert!(matches!(err, BpsvError::FieldCount { row: 7, expected: 2, actual: 1 }));
    }

    #[test]
    fn test_empty_and_headerless() {
        assert!(matches!(BpsvDocument::parse(""), Err(BpsvError::EmptyDocument)));
        assert!(matches!(
            BpsvDocument::parse("a|b\n"),
            Err(BpsvError::InvalidHeader(_))
        ));
    }
}
