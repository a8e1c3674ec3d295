//! Reading `<lat> <lon>` pairs out of plain text coordinate lists.
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct CoordinatePair {
    pub latitude: f64,
    pub longitude: f64,
}

impl CoordinatePair {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<(f64, f64)> for CoordinatePair {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

/// What a single input line turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Pair(CoordinatePair),
    /// Blank line, nothing to report.
    Empty,
    /// Wrong number of tokens.
    WrongTokenCount(usize),
    /// Two tokens, but at least one is not a number.
    NotNumeric(String),
}

pub fn parse_line(line: &str) -> LineOutcome {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return LineOutcome::Empty;
    }
    if parts.len() != 2 {
        return LineOutcome::WrongTokenCount(parts.len());
    }
    match (parts[0].parse::<f64>(), parts[1].parse::<f64>()) {
        (Ok(latitude), Ok(longitude)) => {
            LineOutcome::Pair(CoordinatePair::new(latitude, longitude))
        }
        _ => LineOutcome::NotNumeric(line.trim().to_string()),
    }
}

/// Lazily yields the valid pairs of a text source, in input order.
///
/// Bad lines, including lines that are not UTF-8, are logged and dropped. A
/// read error is yielded once and ends the sequence.
pub struct CoordinateReader<R> {
    reader: R,
    buf: Vec<u8>,
    line_number: usize,
    done: bool,
}

impl<R: BufRead> CoordinateReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_number: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for CoordinateReader<R> {
    type Item = Result<CoordinatePair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
            self.line_number += 1;

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line,
                Err(_) => {
                    warn!(line = self.line_number, "Skipping line: not valid UTF-8");
                    continue;
                }
            };

            match parse_line(line) {
                LineOutcome::Pair(pair) => return Some(Ok(pair)),
                LineOutcome::Empty => {}
                LineOutcome::WrongTokenCount(n) => {
                    debug!(
                        line = self.line_number,
                        tokens = n,
                        "Skipping line: expected 2 tokens"
                    );
                }
                LineOutcome::NotNumeric(text) => {
                    warn!(
                        line = self.line_number,
                        "Skipping line: {text} - Not a valid pair of floats."
                    );
                }
            }
        }
    }
}

/// A coordinate list on disk. Every call to `pairs` starts from the top of
/// the file.
#[derive(Debug, Clone)]
pub struct CoordinateFile {
    path: PathBuf,
}

impl CoordinateFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // Fail early on a missing or unreadable file.
        File::open(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pairs(&self) -> Result<CoordinateReader<BufReader<File>>> {
        let file = File::open(&self.path)?;
        Ok(CoordinateReader::new(BufReader::new(file)))
    }
}

/// Parses an in-memory list, dropping bad lines.
pub fn parse_str(content: &str) -> Vec<CoordinatePair> {
    CoordinateReader::new(content.as_bytes())
        .filter_map(|pair| pair.ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_mixed_input() {
        let pairs = parse_str("1.0 2.0\nbad line\n3.5 -4.25");
        assert_eq!(
            pairs,
            vec![
                CoordinatePair::new(1.0, 2.0),
                CoordinatePair::new(3.5, -4.25)
            ]
        );
    }

    #[test]
    fn test_parse_line_values() {
        assert_eq!(
            parse_line("  37.7749\t-122.4194  "),
            LineOutcome::Pair(CoordinatePair::new(37.7749, -122.4194))
        );
        assert_eq!(
            parse_line("-0 1e2"),
            LineOutcome::Pair(CoordinatePair::new(-0.0, 100.0))
        );
    }

    #[test]
    fn test_parse_line_rejects() {
        assert_eq!(parse_line(""), LineOutcome::Empty);
        assert_eq!(parse_line("   "), LineOutcome::Empty);
        assert_eq!(parse_line("1.0"), LineOutcome::WrongTokenCount(1));
        assert_eq!(parse_line("1.0 2.0 3.0"), LineOutcome::WrongTokenCount(3));
        assert_eq!(
            parse_line("1.0 east"),
            LineOutcome::NotNumeric("1.0 east".to_string())
        );
        assert_eq!(
            parse_line("1,5 2.0"),
            LineOutcome::NotNumeric("1,5 2.0".to_string())
        );
    }

    #[test]
    fn test_non_utf8_line_is_skipped() {
        let input: &[u8] = b"1.0 2.0\n\xff\xfe 3\n3.5 -4.25\n";
        let pairs: Vec<_> = CoordinateReader::new(input).collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(*pairs[0].as_ref().unwrap(), CoordinatePair::new(1.0, 2.0));
        assert_eq!(*pairs[1].as_ref().unwrap(), CoordinatePair::new(3.5, -4.25));
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        assert_eq!(
            parse_str("1.0 2.0\r\n-5 6.5"),
            vec![
                CoordinatePair::new(1.0, 2.0),
                CoordinatePair::new(-5.0, 6.5)
            ]
        );
    }

    #[test]
    fn test_comma_separated_is_one_token() {
        assert_eq!(parse_line("1.0,2.0"), LineOutcome::WrongTokenCount(1));
    }

    #[test]
    fn test_file_is_restartable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10.5 20.25").unwrap();
        writeln!(file, "x y").unwrap();
        writeln!(file, "").unwrap();
        writeln!(file, "-33.9 151.2").unwrap();

        let source = CoordinateFile::open(file.path()).unwrap();
        let first: Vec<_> = source.pairs().unwrap().map(|p| p.unwrap()).collect();
        let second: Vec<_> = source.pairs().unwrap().map(|p| p.unwrap()).collect();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first[1], CoordinatePair::new(-33.9, 151.2));
    }

    #[test]
    fn test_missing_file() {
        assert!(CoordinateFile::open("/nonexistent/coords.txt").is_err());
    }
}
