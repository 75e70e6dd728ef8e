//! LDIF content records (RFC 2849).
//!
//! Only content records are handled; change records are not used by
//! exports or bulk imports. Values are kept as raw bytes because `::`
//! values may carry binary data.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use thiserror::Error;

/// Column at which written lines are folded.
const FOLD_WIDTH: usize = 76;

/// Errors reading or writing LDIF.
#[derive(Debug, Error)]
pub enum LdifError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input.
    #[error("line {line}: {message}")]
    Parse {
        /// Physical line number (1-based).
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// Invalid base64 in a `::` value.
    #[error("line {line}: invalid base64 value: {source}")]
    Base64 {
        /// Physical line number (1-based).
        line: usize,
        /// Decoder error.
        #[source]
        source: base64::DecodeError,
    },
}

/// One entry: a DN and its attributes. Attribute names are grouped
/// case-insensitively and keep the spelling of their first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdifRecord {
    /// Distinguished name.
    pub dn: String,
    /// Attributes in first-seen order.
    pub attributes: Vec<(String, Vec<Vec<u8>>)>,
}

impl LdifRecord {
    /// Create a record with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Append a value, grouping with an existing attribute of the same name.
    pub fn add_value(&mut self, name: &str, value: impl Into<Vec<u8>>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, values)) => values.push(value),
            None => self.attributes.push((name.to_string(), vec![value])),
        }
    }

    /// Builder form of [`add_value`](Self::add_value).
    pub fn with_value(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.add_value(name, value);
        self
    }

    /// Values of an attribute (case-insensitive lookup).
    pub fn get(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Values of an attribute as strings, skipping non-UTF-8 values.
    pub fn get_str(&self, name: &str) -> Vec<&str> {
        self.get(name)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| std::str::from_utf8(v).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First value of an attribute as a string.
    pub fn first_str(&self, name: &str) -> Option<&str> {
        self.get_str(name).into_iter().next()
    }

    /// Whether the attribute is present.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.attributes.len() != before
    }

    /// Lowercased attribute name to the name as spelled in the record.
    pub fn name_map(&self) -> HashMap<String, String> {
        self.attributes
            .iter()
            .map(|(n, _)| (n.to_ascii_lowercase(), n.clone()))
            .collect()
    }
}

/// Streaming LDIF reader yielding one record at a time.
pub struct LdifReader<R> {
    input: R,
    line_no: usize,
    first_record: bool,
}

impl<R: BufRead> LdifReader<R> {
    /// Create a reader over buffered input.
    pub fn new(input: R) -> Self {
        Self {
            input,
            line_no: 0,
            first_record: true,
        }
    }

    /// Read the next record, or `None` at end of input.
    pub fn read_record(&mut self) -> Result<Option<LdifRecord>, LdifError> {
        loop {
            let Some(mut lines) = self.next_logical_lines()? else {
                return Ok(None);
            };

            if self.first_record {
                self.first_record = false;
                if lines
                    .first()
                    .is_some_and(|(_, l)| l.to_ascii_lowercase().starts_with("version:"))
                {
                    lines.remove(0);
                }
            }
            if lines.is_empty() {
                continue;
            }

            return parse_record(lines).map(Some);
        }
    }

    /// Collect the unfolded lines of the next record with the physical
    /// line number each one started on. Comments are dropped.
    fn next_logical_lines(&mut self) -> Result<Option<Vec<(usize, String)>>, LdifError> {
        let mut logical: Vec<(usize, String)> = Vec::new();
        let mut in_comment = false;
        let mut buf = String::new();

        loop {
            buf.clear();
            if self.input.read_line(&mut buf)? == 0 {
                break;
            }
            self.line_no += 1;
            let line = buf.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if logical.is_empty() {
                    in_comment = false;
                    continue;
                }
                break;
            }

            if let Some(rest) = line.strip_prefix(' ') {
                if in_comment {
                    continue;
                }
                match logical.last_mut() {
                    Some((_, current)) => current.push_str(rest),
                    None => {
                        return Err(LdifError::Parse {
                            line: self.line_no,
                            message: "continuation line without a preceding line".to_string(),
                        })
                    }
                }
                continue;
            }

            if line.starts_with('#') {
                in_comment = true;
                continue;
            }

            in_comment = false;
            logical.push((self.line_no, line.to_string()));
        }

        Ok(if logical.is_empty() { None } else { Some(logical) })
    }
}

impl<R: BufRead> Iterator for LdifReader<R> {
    type Item = Result<LdifRecord, LdifError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

fn parse_record(lines: Vec<(usize, String)>) -> Result<LdifRecord, LdifError> {
    let mut iter = lines.into_iter();
    let Some((line, first)) = iter.next() else {
        return Err(LdifError::Parse {
            line: 0,
            message: "empty record".to_string(),
        });
    };

    let (name, value) = parse_line(line, &first)?;
    if !name.eq_ignore_ascii_case("dn") {
        return Err(LdifError::Parse {
            line,
            message: format!("record must start with dn, found '{}'", name),
        });
    }
    let dn = String::from_utf8(value).map_err(|_| LdifError::Parse {
        line,
        message: "dn is not valid UTF-8".to_string(),
    })?;

    let mut record = LdifRecord::new(dn);
    for (line, text) in iter {
        let (name, value) = parse_line(line, &text)?;
        record.add_value(&name, value);
    }
    Ok(record)
}

fn parse_line(line: usize, text: &str) -> Result<(String, Vec<u8>), LdifError> {
    let Some(colon) = text.find(':') else {
        return Err(LdifError::Parse {
            line,
            message: format!("missing ':' in '{}'", text),
        });
    };
    let name = text[..colon].trim().to_string();
    if name.is_empty() {
        return Err(LdifError::Parse {
            line,
            message: "empty attribute name".to_string(),
        });
    }

    let rest = &text[colon + 1..];
    let value = if let Some(encoded) = rest.strip_prefix(':') {
        STANDARD
            .decode(encoded.trim())
            .map_err(|source| LdifError::Base64 { line, source })?
    } else if rest.starts_with('<') {
        return Err(LdifError::Parse {
            line,
            message: format!("URL values are not supported for '{}'", name),
        });
    } else {
        rest.trim_start_matches(' ').as_bytes().to_vec()
    };

    Ok((name, value))
}

/// LDIF writer. Values that are not safe strings are base64 encoded and
/// long lines are folded.
pub struct LdifWriter<W> {
    output: W,
    records: usize,
}

impl<W: Write> LdifWriter<W> {
    /// Create a writer.
    pub fn new(output: W) -> Self {
        Self { output, records: 0 }
    }

    /// Write one record followed by a blank separator line.
    pub fn write_record(&mut self, record: &LdifRecord) -> Result<(), LdifError> {
        self.write_value("dn", record.dn.as_bytes())?;
        for (name, values) in &record.attributes {
            for value in values {
                self.write_value(name, value)?;
            }
        }
        self.output.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Flush and return the underlying output.
    pub fn finish(mut self) -> Result<W, LdifError> {
        self.output.flush()?;
        Ok(self.output)
    }

    fn write_value(&mut self, name: &str, value: &[u8]) -> Result<(), LdifError> {
        let line = if is_safe_string(value) {
            // Safe strings are ASCII.
            format!("{}: {}", name, String::from_utf8_lossy(value))
        } else {
            format!("{}:: {}", name, STANDARD.encode(value))
        };
        self.write_folded(&line)
    }

    fn write_folded(&mut self, line: &str) -> Result<(), LdifError> {
        let bytes = line.as_bytes();
        let (head, mut rest) = bytes.split_at(bytes.len().min(FOLD_WIDTH));
        self.output.write_all(head)?;
        self.output.write_all(b"\n")?;
        while !rest.is_empty() {
            let (chunk, tail) = rest.split_at(rest.len().min(FOLD_WIDTH - 1));
            self.output.write_all(b" ")?;
            self.output.write_all(chunk)?;
            self.output.write_all(b"\n")?;
            rest = tail;
        }
        Ok(())
    }
}

/// RFC 2849 SAFE-STRING, additionally rejecting a trailing space.
fn is_safe_string(value: &[u8]) -> bool {
    let Some((&first, _)) = value.split_first() else {
        return true;
    };
    if matches!(first, b' ' | b':' | b'<') || value.last() == Some(&b' ') {
        return false;
    }
    value
        .iter()
        .all(|&b| b != 0 && b != b'\n' && b != b'\r' && b < 0x80)
}
