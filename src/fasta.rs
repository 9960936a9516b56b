//! Minimal FASTA reading and writing
//!
//! The pipeline core consumes pre-parsed records; this module is the thin
//! edge that gets protein FASTA in and paired amino-acid/nucleotide FASTA
//! out. Sequences are written wrapped at 60 columns.

use std::io::{BufRead, Write};

use crate::error::CdsError;

const LINE_WIDTH: usize = 60;

/// One FASTA entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// First whitespace-delimited token of the header
    pub id: String,
    /// Remainder of the header line
    pub description: String,
    /// Sequence with line breaks removed
    pub sequence: String,
}

impl FastaRecord {
    /// Create a record from parts.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        sequence: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            sequence: sequence.into(),
        }
    }

    /// Full header line (id plus description).
    pub fn header(&self) -> String {
        if self.description.is_empty() {
            self.id.clone()
        } else {
            format!("{} {}", self.id, self.description)
        }
    }
}

/// Read all FASTA records from a reader.
///
/// # Errors
///
/// Returns [`CdsError::Classification`] for a record with an empty header
/// and [`CdsError::Io`] for underlying read failures. Sequence lines before
/// the first header are rejected.
pub fn read_fasta<R: BufRead>(reader: R) -> Result<Vec<FastaRecord>, CdsError> {
    let mut records = Vec::new();
    let mut current: Option<(String, String, String)> = None;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();

        if let Some(header) = line.strip_prefix('>') {
            if let Some((id, desc, seq)) = current.take() {
                records.push(FastaRecord::new(id, desc, seq));
            }
            let header = header.trim();
            if header.is_empty() {
                return Err(CdsError::classification("empty header"));
            }
            let (id, desc) = match header.split_once(char::is_whitespace) {
                Some((id, rest)) => (id.to_string(), rest.trim().to_string()),
                None => (header.to_string(), String::new()),
            };
            current = Some((id, desc, String::new()));
        } else if !line.is_empty() {
            match current.as_mut() {
                Some((_, _, seq)) => seq.push_str(line.trim()),
                None => {
                    return Err(CdsError::classification(
                        "sequence data before first FASTA header",
                    ))
                }
            }
        }
    }

    if let Some((id, desc, seq)) = current.take() {
        records.push(FastaRecord::new(id, desc, seq));
    }

    Ok(records)
}

/// Write FASTA records to a writer, wrapping sequences at 60 columns.
pub fn write_fasta<W: Write>(writer: &mut W, records: &[FastaRecord]) -> Result<(), CdsError> {
    for record in records {
        writeln!(writer, ">{}", record.header())?;
        for chunk in record.sequence.as_bytes().chunks(LINE_WIDTH) {
            writer.write_all(chunk)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_single_record() {
        let input = ">XP_000001.1 hypothetical protein\nMKVLAG\nWYQ\n";
        let records = read_fasta(Cursor::new(input)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "XP_000001.1");
        assert_eq!(records[0].description, "hypothetical protein");
        assert_eq!(records[0].sequence, "MKVLAGWYQ");
    }

    #[test]
    fn test_read_multiple_records() {
        let input = ">a one\nMK\n>b\nVL\n>c three words here\nAG\n";
        let records = read_fasta(Cursor::new(input)).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].id, "b");
        assert_eq!(records[1].description, "");
        assert_eq!(records[2].description, "three words here");
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let input = ">a\nMK\n\nVL\n";
        let records = read_fasta(Cursor::new(input)).unwrap();
        assert_eq!(records[0].sequence, "MKVL");
    }

    #[test]
    fn test_read_empty_header_is_error() {
        let input = ">\nMK\n";
        assert!(read_fasta(Cursor::new(input)).is_err());
    }

    #[test]
    fn test_read_sequence_before_header_is_error() {
        let input = "MKVL\n>a\nMK\n";
        assert!(read_fasta(Cursor::new(input)).is_err());
    }

    #[test]
    fn test_write_wraps_at_sixty_columns() {
        let seq = "A".repeat(125);
        let records = vec![FastaRecord::new("acc.1", "desc", seq)];
        let mut out = Vec::new();
        write_fasta(&mut out, &records).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ">acc.1 desc");
        assert_eq!(lines[1].len(), 60);
        assert_eq!(lines[2].len(), 60);
        assert_eq!(lines[3].len(), 5);
    }

    #[test]
    fn test_roundtrip() {
        let records = vec![
            FastaRecord::new("a", "first", "MKVLAG"),
            FastaRecord::new("b", "", "WYQ"),
        ];
        let mut out = Vec::new();
        write_fasta(&mut out, &records).unwrap();
        let parsed = read_fasta(Cursor::new(out)).unwrap();
        assert_eq!(parsed, records);
    }
}
