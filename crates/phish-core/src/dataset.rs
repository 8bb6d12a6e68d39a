//! Dataset preparation: encoding detection, over-long line filtering and
//! tolerant CSV loading of `(url, label)` rows.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use chardetng::EncodingDetector;
use csv::ReaderBuilder;
use encoding_rs::{DecoderResult, Encoding, UTF_8};
use tracing::{debug, info, warn};

use crate::config::TrainConfig;
use crate::error::{PhishError, Result};
use crate::features::UrlInput;
use crate::label::Label;

/// Number of leading bytes sampled for encoding detection.
pub const ENCODING_SAMPLE_BYTES: u64 = 100_000;

pub const URL_COLUMN: &str = "url";
pub const LABEL_COLUMN: &str = "label";

/// Cell values treated as missing, matching common dataframe defaults.
const MISSING_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledUrl {
    pub url: UrlInput,
    pub label: Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanReport {
    pub kept_lines: usize,
    pub dropped_lines: usize,
    /// Encoding the cleaned file was written in.
    pub encoding: &'static Encoding,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareStats {
    pub lines_kept: usize,
    pub lines_dropped: usize,
    pub rows_loaded: usize,
    pub rows_skipped: usize,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub rows: Vec<LabeledUrl>,
    pub encoding: &'static Encoding,
    pub stats: PrepareStats,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn open_input(path: &Path) -> Result<fs::File> {
    fs::File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PhishError::MissingInputFile {
            path: path.to_path_buf(),
        },
        _ => PhishError::Io(e),
    })
}

/// Guess the text encoding from the first [`ENCODING_SAMPLE_BYTES`] bytes.
/// Returns `None` when there is nothing to sample.
pub fn detect_encoding(path: &Path) -> Result<Option<&'static Encoding>> {
    let mut sample = Vec::new();
    open_input(path)?
        .take(ENCODING_SAMPLE_BYTES)
        .read_to_end(&mut sample)?;

    if sample.is_empty() {
        return Ok(None);
    }
    if let Some((encoding, _)) = Encoding::for_bom(&sample) {
        return Ok(Some(encoding));
    }
    if sample.is_ascii() {
        return Ok(Some(UTF_8));
    }

    let whole_file = (sample.len() as u64) < ENCODING_SAMPLE_BYTES;
    let mut detector = EncodingDetector::new();
    detector.feed(&sample, whole_file);
    Ok(Some(detector.guess(None, true)))
}

/// [`detect_encoding`] with a UTF-8 fallback.
pub fn resolve_encoding(path: &Path) -> Result<&'static Encoding> {
    match detect_encoding(path)? {
        Some(encoding) => {
            info!(encoding = encoding.name(), path = %path.display(), "detected encoding");
            Ok(encoding)
        }
        None => {
            warn!(path = %path.display(), "encoding detection found nothing, using UTF-8");
            Ok(UTF_8)
        }
    }
}

/// Decode `raw`, skipping malformed byte sequences instead of replacing them.
/// Returns the text and the number of sequences skipped.
fn decode_lossy_skip(encoding: &'static Encoding, raw: &[u8]) -> (String, usize) {
    let mut decoder = encoding.new_decoder();
    let mut text = String::with_capacity(raw.len());
    let mut input = raw;
    let mut skipped = 0;
    loop {
        let (result, read) = decoder.decode_to_string_without_replacement(input, &mut text, true);
        input = &input[read..];
        match result {
            DecoderResult::InputEmpty => break,
            DecoderResult::OutputFull => text.reserve(input.len() * 3 + 16),
            DecoderResult::Malformed(_, _) => skipped += 1,
        }
    }
    (text, skipped)
}

/// Copy `input` to `output`, dropping every line longer than
/// `max_line_chars` characters. Output lines are `\n`-terminated.
pub fn clean_file(
    input: &Path,
    output: &Path,
    encoding: &'static Encoding,
    max_line_chars: usize,
) -> Result<CleanReport> {
    let mut raw = Vec::new();
    open_input(input)?.read_to_end(&mut raw)?;

    let (text, skipped) = decode_lossy_skip(encoding, &raw);
    if skipped > 0 {
        warn!(
            encoding = encoding.name(),
            path = %input.display(),
            skipped,
            "malformed byte sequences dropped while decoding"
        );
    }

    let mut cleaned = String::with_capacity(text.len());
    let mut kept_lines = 0;
    let mut dropped_lines = 0;
    for line in text.lines() {
        if line.chars().count() <= max_line_chars {
            cleaned.push_str(line);
            cleaned.push('\n');
            kept_lines += 1;
        } else {
            dropped_lines += 1;
        }
    }

    let out_encoding = encoding.output_encoding();
    let (bytes, _, _) = out_encoding.encode(&cleaned);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &bytes)?;

    info!(
        kept = kept_lines,
        dropped = dropped_lines,
        max_line_chars,
        path = %output.display(),
        "cleaned CSV written"
    );

    Ok(CleanReport {
        kept_lines,
        dropped_lines,
        encoding: out_encoding,
    })
}

fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell)
}

/// Parse a cleaned CSV file into labeled rows.
///
/// Returns the rows and the number of records that were skipped, either
/// because they did not parse or because their label was not 0 or 1.
pub fn load_rows(path: &Path, encoding: &'static Encoding) -> Result<(Vec<LabeledUrl>, usize)> {
    let mut raw = Vec::new();
    open_input(path)?.read_to_end(&mut raw)?;
    let (text, _, _) = encoding.decode(&raw);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .quote(b'"')
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == name)
    };
    let (url_idx, label_idx) = match (position(URL_COLUMN), position(LABEL_COLUMN)) {
        (Some(u), Some(l)) => (u, l),
        (u, l) => {
            let missing = [(URL_COLUMN, u), (LABEL_COLUMN, l)]
                .into_iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(PhishError::SchemaViolation { missing });
        }
    };

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(record = line + 1, error = %e, "skipping malformed row");
                skipped += 1;
                continue;
            }
        };

        let Some(label) = record.get(label_idx).and_then(Label::parse_cell) else {
            debug!(record = line + 1, "skipping row without a 0/1 label");
            skipped += 1;
            continue;
        };

        let url = match record.get(url_idx) {
            Some(cell) if !is_missing(cell) => UrlInput::Valid(cell.to_string()),
            _ => UrlInput::Invalid,
        };
        rows.push(LabeledUrl { url, label });
    }

    Ok((rows, skipped))
}

/// Detect, clean and load the dataset named by `config`.
pub fn prepare(config: &TrainConfig) -> Result<Dataset> {
    let encoding = resolve_encoding(&config.data_path)?;
    let clean = clean_file(
        &config.data_path,
        &config.clean_path,
        encoding,
        config.max_line_chars,
    )?;
    let (rows, skipped) = load_rows(&config.clean_path, clean.encoding)?;

    info!(rows = rows.len(), skipped, "dataset loaded");

    Ok(Dataset {
        stats: PrepareStats {
            lines_kept: clean.kept_lines,
            lines_dropped: clean.dropped_lines,
            rows_loaded: rows.len(),
            rows_skipped: skipped,
        },
        rows,
        encoding: clean.encoding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn config_for(dir: &TempDir, input: &Path) -> TrainConfig {
        TrainConfig {
            data_path: input.to_path_buf(),
            clean_path: dir.path().join("out/urls_clean.csv"),
            ..TrainConfig::default()
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let result = detect_encoding(Path::new("/nonexistent/urls.csv"));
        assert!(matches!(result, Err(PhishError::MissingInputFile { .. })));
    }

    #[test]
    fn empty_file_falls_back_to_utf8() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.csv", b"");
        assert_eq!(detect_encoding(&path).unwrap(), None);
        assert_eq!(resolve_encoding(&path).unwrap(), UTF_8);
    }

    #[test]
    fn detects_bom_and_ascii() {
        let dir = TempDir::new().unwrap();
        let bom = write(&dir, "bom.csv", b"\xEF\xBB\xBFurl,label\n");
        assert_eq!(detect_encoding(&bom).unwrap(), Some(UTF_8));
        let ascii = write(&dir, "ascii.csv", b"url,label\nhttp://a.com,0\n");
        assert_eq!(detect_encoding(&ascii).unwrap(), Some(UTF_8));
    }

    #[test]
    fn drops_and_counts_long_lines() {
        let dir = TempDir::new().unwrap();
        let long = format!("http://{}.com,1", "a".repeat(20_000));
        let contents = format!("url,label\nhttp://a.com,0\n{long}\nhttp://b.com,1\n");
        let input = write(&dir, "urls.csv", contents.as_bytes());
        let output = dir.path().join("nested/clean.csv");

        let report = clean_file(&input, &output, UTF_8, 10_000).unwrap();
        assert_eq!(report.kept_lines, 3);
        assert_eq!(report.dropped_lines, 1);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "url,label\nhttp://a.com,0\nhttp://b.com,1\n"
        );
    }

    #[test]
    fn line_at_the_limit_is_kept() {
        let dir = TempDir::new().unwrap();
        let at_limit = "a".repeat(10_000);
        let over_limit = "b".repeat(10_001);
        let contents = format!("url,label\n{at_limit}\n{over_limit}\n");
        let input = write(&dir, "urls.csv", contents.as_bytes());
        let output = dir.path().join("clean.csv");

        let report = clean_file(&input, &output, UTF_8, 10_000).unwrap();
        assert_eq!(report.kept_lines, 2);
        assert_eq!(report.dropped_lines, 1);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            format!("url,label\n{at_limit}\n")
        );
    }

    #[test]
    fn undecodable_bytes_are_dropped() {
        let dir = TempDir::new().unwrap();
        let mut contents = b"url,label\nhttp://ex\xFFample.com,0\n".to_vec();
        // The stray byte does not count towards the line length.
        contents.extend_from_slice(&[b'a'; 10_000]);
        contents.extend_from_slice(b"\xFE\n");
        let input = write(&dir, "urls.csv", &contents);
        let output = dir.path().join("clean.csv");

        let report = clean_file(&input, &output, UTF_8, 10_000).unwrap();
        assert_eq!(report.dropped_lines, 0);
        let cleaned = fs::read_to_string(&output).unwrap();
        assert!(!cleaned.contains('\u{FFFD}'));
        assert!(cleaned.starts_with("url,label\nhttp://example.com,0\n"));
        assert_eq!(cleaned.lines().nth(2).map(str::len), Some(10_000));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let input = write(
            &dir,
            "urls.csv",
            b"url,label\r\nhttp://a.com,0\r\n\"http://b.com/?q=1,2\",1\r\n",
        );
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");

        clean_file(&input, &first, UTF_8, 10_000).unwrap();
        clean_file(&input, &second, UTF_8, 10_000).unwrap();
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());

        let again = dir.path().join("again.csv");
        clean_file(&first, &again, UTF_8, 10_000).unwrap();
        assert_eq!(fs::read(&first).unwrap(), fs::read(&again).unwrap());
    }

    #[test]
    fn missing_columns_are_named() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.csv", b"link,label\nhttp://a.com,0\n");
        match load_rows(&path, UTF_8) {
            Err(PhishError::SchemaViolation { missing }) => assert_eq!(missing, vec!["url"]),
            other => panic!("expected schema violation, got {other:?}"),
        }

        let path = write(&dir, "bad2.csv", b"name\nx\n");
        match load_rows(&path, UTF_8) {
            Err(PhishError::SchemaViolation { missing }) => {
                assert_eq!(missing, vec!["url", "label"])
            }
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[test]
    fn malformed_row_is_dropped_others_load() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "urls.csv",
            b"url,label\nhttp://a.com,0\nhttp://b.com,extra,1\nhttps://c.com,1\n",
        );
        let (rows, skipped) = load_rows(&path, UTF_8).unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(
            rows,
            vec![
                LabeledUrl {
                    url: "http://a.com".into(),
                    label: Label::Safe
                },
                LabeledUrl {
                    url: "https://c.com".into(),
                    label: Label::Phishing
                },
            ]
        );
    }

    #[test]
    fn extra_columns_ignored_and_missing_urls_invalid() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "urls.csv",
            b"id,label,url\n1,1,http://a.com\n2,0,\n3,0,NaN\n4,maybe,http://d.com\n",
        );
        let (rows, skipped) = load_rows(&path, UTF_8).unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].url, UrlInput::Valid("http://a.com".into()));
        assert_eq!(rows[1].url, UrlInput::Invalid);
        assert_eq!(rows[2].url, UrlInput::Invalid);
    }

    #[test]
    fn prepare_handles_bom_prefixed_utf8() {
        let dir = TempDir::new().unwrap();
        let input = write(
            &dir,
            "urls.csv",
            "\u{feff}url,label\nhttps://bücher.de,0\n".as_bytes(),
        );
        let dataset = prepare(&config_for(&dir, &input)).unwrap();
        assert_eq!(dataset.encoding, UTF_8);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.rows[0].url, UrlInput::Valid("https://bücher.de".into()));
        assert_eq!(dataset.stats.rows_loaded, 1);
    }

    #[test]
    fn prepare_reports_missing_input() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, &dir.path().join("absent.csv"));
        assert!(matches!(
            prepare(&config),
            Err(PhishError::MissingInputFile { .. })
        ));
    }
}
