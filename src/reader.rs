// Delimited-text reader that copes with files of unknown encoding.
//
// The file is read once; each candidate encoding is then tried in order
// and the first one that decodes cleanly *and* yields a well-formed table
// wins. When all candidates fail, the bytes are decoded lossily with the
// single-byte fallback and the result is reported as degraded.

use std::borrow::Cow;
use std::path::Path;

use encoding_rs::{DecoderResult, Encoding, EUC_KR, UTF_8, WINDOWS_1252};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::types::{RawTable, Value};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Candidate text encodings, in the order they are usually worth trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8, with a leading byte-order mark stripped when present.
    Utf8Sig,
    /// Windows code page 949 (unified Hangul code).
    Cp949,
    /// EUC-KR.
    EucKr,
    /// Single-byte Western encoding; never fails to decode.
    Latin1,
}

impl TextEncoding {
    pub const DEFAULT_CANDIDATES: [TextEncoding; 4] = [
        TextEncoding::Utf8Sig,
        TextEncoding::Cp949,
        TextEncoding::EucKr,
        TextEncoding::Latin1,
    ];

    /// Encoding used for the last-resort lossy decode.
    pub const FALLBACK: TextEncoding = TextEncoding::Latin1;

    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Cp949 => "cp949",
            TextEncoding::EucKr => "euc-kr",
            TextEncoding::Latin1 => "latin1",
        }
    }

    // encoding_rs implements the WHATWG "euc-kr", which is the cp949
    // superset, and maps "latin1" to windows-1252.
    fn codec(&self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8Sig => UTF_8,
            TextEncoding::Cp949 | TextEncoding::EucKr => EUC_KR,
            TextEncoding::Latin1 => WINDOWS_1252,
        }
    }

    fn strip_signature<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        match self {
            TextEncoding::Utf8Sig => bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes),
            _ => bytes,
        }
    }

    /// Decode without replacement; `None` on any malformed sequence.
    pub fn decode_strict<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        self.codec()
            .decode_without_bom_handling_and_without_replacement(self.strip_signature(bytes))
    }

    /// Decode dropping every malformed sequence. Returns the text and the
    /// number of input bytes dropped. U+FFFD already present in the input
    /// is ordinary text and is kept.
    pub fn decode_lossy(&self, bytes: &[u8]) -> (String, usize) {
        let mut decoder = self.codec().new_decoder_without_bom_handling();
        let mut input = self.strip_signature(bytes);
        let mut text = String::with_capacity(
            decoder
                .max_utf8_buffer_length_without_replacement(input.len())
                .unwrap_or(input.len()),
        );
        let mut dropped = 0;
        loop {
            let (result, read) =
                decoder.decode_to_string_without_replacement(input, &mut text, true);
            input = &input[read..];
            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => {
                    let more = decoder
                        .max_utf8_buffer_length_without_replacement(input.len())
                        .unwrap_or(input.len());
                    text.reserve(more.max(4));
                }
                DecoderResult::Malformed(bad, _) => dropped += usize::from(bad),
            }
        }
        (text, dropped)
    }
}

/// Result of reading a table: either a clean decode or a degraded one that
/// may contain corrupted text.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Clean {
        table: RawTable,
        encoding: TextEncoding,
    },
    Degraded {
        table: RawTable,
        encoding: TextEncoding,
        dropped_bytes: usize,
    },
}

impl ReadOutcome {
    pub fn table(&self) -> &RawTable {
        match self {
            ReadOutcome::Clean { table, .. } | ReadOutcome::Degraded { table, .. } => table,
        }
    }

    pub fn into_table(self) -> RawTable {
        match self {
            ReadOutcome::Clean { table, .. } | ReadOutcome::Degraded { table, .. } => table,
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        match self {
            ReadOutcome::Clean { encoding, .. } | ReadOutcome::Degraded { encoding, .. } => {
                *encoding
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ReadOutcome::Degraded { .. })
    }

    pub fn dropped_bytes(&self) -> usize {
        match self {
            ReadOutcome::Clean { .. } => 0,
            ReadOutcome::Degraded { dropped_bytes, .. } => *dropped_bytes,
        }
    }
}

#[derive(Debug, Error)]
enum ParseRejection {
    #[error("no header row")]
    NoHeader,
    #[error("line {line}: expected {expected} fields, saw {found}")]
    TooManyFields {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Reader for delimited text with a fixed list of candidate encodings.
#[derive(Debug, Clone)]
pub struct TableReader {
    candidates: Vec<TextEncoding>,
    delimiter: u8,
}

impl Default for TableReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableReader {
    /// Comma-delimited reader trying [`TextEncoding::DEFAULT_CANDIDATES`].
    pub fn new() -> Self {
        Self {
            candidates: TextEncoding::DEFAULT_CANDIDATES.to_vec(),
            delimiter: b',',
        }
    }

    #[must_use]
    pub fn with_candidates(mut self, candidates: &[TextEncoding]) -> Self {
        self.candidates = candidates.to_vec();
        self
    }

    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read `path` and decode it into a table.
    ///
    /// Only an I/O failure is an error; undecodable content comes back as
    /// [`ReadOutcome::Degraded`].
    pub fn read_path(&self, path: &Path) -> Result<ReadOutcome> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let outcome = self.read_bytes(&bytes);
        match &outcome {
            ReadOutcome::Clean { table, encoding } => info!(
                path = %path.display(),
                encoding = encoding.label(),
                rows = table.len(),
                "table read"
            ),
            ReadOutcome::Degraded {
                table,
                encoding,
                dropped_bytes,
            } => warn!(
                path = %path.display(),
                encoding = encoding.label(),
                rows = table.len(),
                dropped_bytes,
                "no candidate encoding produced a clean table; using lossy decode"
            ),
        }
        Ok(outcome)
    }

    /// Decode already-loaded bytes. Never fails.
    pub fn read_bytes(&self, bytes: &[u8]) -> ReadOutcome {
        for encoding in &self.candidates {
            let Some(text) = encoding.decode_strict(bytes) else {
                debug!(encoding = encoding.label(), "decode failed");
                continue;
            };
            match self.parse(&text, true) {
                Ok(table) => {
                    return ReadOutcome::Clean {
                        table,
                        encoding: *encoding,
                    }
                }
                Err(e) => debug!(encoding = encoding.label(), error = %e, "parse failed"),
            }
        }

        let encoding = TextEncoding::FALLBACK;
        let (text, dropped_bytes) = encoding.decode_lossy(bytes);
        let table = match self.parse(&text, false) {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "lenient parse failed; returning empty table");
                RawTable::default()
            }
        };
        ReadOutcome::Degraded {
            table,
            encoding,
            dropped_bytes,
        }
    }

    /// Parse decoded text. In strict mode a missing header or a row wider
    /// than the header rejects the table; otherwise wide rows are truncated.
    /// Short rows are padded with [`Value::Missing`] in both modes.
    fn parse(&self, text: &str, strict: bool) -> std::result::Result<RawTable, ParseRejection> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
            if strict {
                return Err(ParseRejection::NoHeader);
            }
            return Ok(RawTable::default());
        }

        let width = headers.len();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) if strict => return Err(e.into()),
                Err(_) => continue,
            };
            if record.len() > width && strict {
                return Err(ParseRejection::TooManyFields {
                    line: record.position().map(|p| p.line()).unwrap_or(0),
                    expected: width,
                    found: record.len(),
                });
            }
            let mut row: Vec<Value> = record.iter().take(width).map(Value::from_cell).collect();
            row.resize(width, Value::Missing);
            rows.push(row);
        }
        Ok(RawTable::new(headers, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn euc_kr_bytes(s: &str) -> Vec<u8> {
        let (bytes, _, had_errors) = EUC_KR.encode(s);
        assert!(!had_errors);
        bytes.into_owned()
    }

    #[test]
    fn test_reads_plain_utf8() {
        let outcome = TableReader::new().read_bytes("a,b\n1,x\n2,y\n".as_bytes());
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.encoding(), TextEncoding::Utf8Sig);
        let table = outcome.table();
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(1, "b"), Some(&Value::Text("y".to_string())));
    }

    #[test]
    fn test_strips_utf8_signature() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("지점명,기온(°C)\n서울,1.5\n".as_bytes());
        let outcome = TableReader::new().read_bytes(&bytes);
        assert_eq!(outcome.encoding(), TextEncoding::Utf8Sig);
        assert_eq!(outcome.table().headers[0], "지점명");
    }

    #[test]
    fn test_falls_back_to_korean_legacy_encoding() {
        let bytes = euc_kr_bytes("지점명,일시\n서울,2024-01-01 00:00\n부산,2024-01-01 00:00\n");
        assert!(std::str::from_utf8(&bytes).is_err());

        let outcome = TableReader::new().read_bytes(&bytes);
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.encoding(), TextEncoding::Cp949);
        let table = outcome.table();
        assert_eq!(table.headers, vec!["지점명", "일시"]);
        assert_eq!(table.value(0, "지점명"), Some(&Value::Text("서울".to_string())));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_malformed_table_moves_to_next_candidate() {
        // Wider-than-header rows reject every strict candidate.
        let outcome = TableReader::new().read_bytes(b"a,b\n1,2,3\n4,5\n");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.encoding(), TextEncoding::Latin1);
        let table = outcome.table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec![Value::from_cell("1"), Value::from_cell("2")]);
    }

    #[test]
    fn test_lossy_fallback_still_returns_table() {
        // Invalid UTF-8 with only UTF-8 allowed; the single-byte fallback
        // maps every byte, so nothing is dropped.
        let reader = TableReader::new().with_candidates(&[TextEncoding::Utf8Sig]);
        let outcome = reader.read_bytes(b"a,b\n\xff1,2\n");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.table().len(), 1);
        assert_eq!(outcome.dropped_bytes(), 0);
    }

    #[test]
    fn test_decode_lossy_drops_invalid_sequences() {
        let (text, dropped) = TextEncoding::Utf8Sig.decode_lossy(b"ab\xffc\xfe");
        assert_eq!(text, "abc");
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_decode_lossy_keeps_existing_replacement_character() {
        let (text, dropped) = TextEncoding::Utf8Sig.decode_lossy(b"x\xef\xbf\xbdy\xff");
        assert_eq!(text, "x\u{FFFD}y");
        assert_eq!(dropped, 1);

        let (text, dropped) = TextEncoding::Utf8Sig.decode_lossy("서울\u{FFFD}".as_bytes());
        assert_eq!(text, "서울\u{FFFD}");
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let outcome = TableReader::new().read_bytes(b"a,b,c\n1\n");
        assert!(!outcome.is_degraded());
        assert_eq!(
            outcome.table().rows[0],
            vec![Value::from_cell("1"), Value::Missing, Value::Missing]
        );
    }

    #[test]
    fn test_empty_input_is_degraded_empty_table() {
        let outcome = TableReader::new().read_bytes(b"");
        assert!(outcome.is_degraded());
        assert!(outcome.table().is_empty());
        assert!(outcome.table().headers.is_empty());
    }

    #[test]
    fn test_custom_delimiter() {
        let outcome = TableReader::new()
            .with_delimiter(b'\t')
            .read_bytes(b"a\tb\n1\t2\n");
        assert_eq!(outcome.table().headers, vec!["a", "b"]);
        assert_eq!(
            outcome.table().value(0, "b").and_then(Value::as_number),
            Some(2.0)
        );
    }

    #[test]
    fn test_read_path_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&euc_kr_bytes("GRNDS_CTPV_NM,OCRN_YMD\n서울특별시,20240101\n"))
            .unwrap();
        let outcome = TableReader::new().read_path(file.path()).unwrap();
        assert_eq!(outcome.encoding(), TextEncoding::Cp949);
        assert_eq!(
            outcome.table().value(0, "GRNDS_CTPV_NM"),
            Some(&Value::Text("서울특별시".to_string()))
        );
    }

    #[test]
    fn test_read_path_missing_file_is_error() {
        let err = TableReader::new()
            .read_path(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::FileRead { .. }));
    }
}
