// chunkflow/src/flat_file.rs

//! The file-backed default source: a delimited text stream with a
//! skippable header, positional fields bound by name, and an explicit,
//! statically-typed mapping function per record schema.

use crate::core::item::ItemSource;
use crate::error::{BatchError, BatchResult};
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

/// Splits one line on a configured delimiter into positional fields bound
/// by name.
///
/// Lenient by default: a short line is padded with empty fields, extra
/// tokens are ignored. Strict mode rejects any token-count mismatch.
#[derive(Debug, Clone)]
pub struct DelimitedLineTokenizer {
  delimiter: String,
  field_names: Arc<Vec<String>>,
  strict: bool,
}

impl DelimitedLineTokenizer {
  /// Creates a lenient tokenizer. Panics on an empty delimiter or an empty
  /// field-name list; both are setup errors, not runtime conditions.
  pub fn new(delimiter: impl Into<String>, field_names: &[&str]) -> Self {
    let delimiter = delimiter.into();
    assert!(
      !delimiter.is_empty(),
      "chunkflow setup error: tokenizer delimiter must not be empty"
    );
    assert!(
      !field_names.is_empty(),
      "chunkflow setup error: tokenizer needs at least one field name"
    );
    Self {
      delimiter,
      field_names: Arc::new(field_names.iter().map(|n| (*n).to_string()).collect()),
      strict: false,
    }
  }

  /// The common case: comma-delimited.
  pub fn comma_separated(field_names: &[&str]) -> Self {
    Self::new(",", field_names)
  }

  pub fn strict(mut self, strict: bool) -> Self {
    self.strict = strict;
    self
  }

  /// Tokenizes one line. `offset` is only used to report strict-mode
  /// mismatches as read errors at the right record.
  pub fn tokenize(&self, line: &str, offset: u64) -> BatchResult<FieldSet> {
    let tokens: Vec<&str> = line.split(self.delimiter.as_str()).collect();
    if self.strict && tokens.len() != self.field_names.len() {
      return Err(BatchError::read(
        offset,
        anyhow::anyhow!(
          "expected {} fields, found {}",
          self.field_names.len(),
          tokens.len()
        ),
      ));
    }
    let mut values: Vec<String> = tokens
      .into_iter()
      .take(self.field_names.len())
      .map(str::to_string)
      .collect();
    values.resize(self.field_names.len(), String::new());
    Ok(FieldSet {
      names: Arc::clone(&self.field_names),
      values,
    })
  }
}

/// One tokenized record: positional values addressable by field name.
#[derive(Debug, Clone)]
pub struct FieldSet {
  names: Arc<Vec<String>>,
  values: Vec<String>,
}

impl FieldSet {
  pub fn names(&self) -> &[String] {
    &self.names
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// The raw value of the named field. Unknown names are an error; mapping
  /// functions reference fields explicitly rather than reflectively.
  pub fn read_string(&self, name: &str) -> anyhow::Result<&str> {
    self
      .names
      .iter()
      .position(|n| n == name)
      .map(|idx| self.values[idx].as_str())
      .ok_or_else(|| anyhow::anyhow!("unknown field '{}'", name))
  }

  /// Parses the named field into any `FromStr` type, trimming surrounding
  /// whitespace first.
  pub fn read_parsed<F>(&self, name: &str) -> anyhow::Result<F>
  where
    F: FromStr,
    F::Err: std::error::Error + Send + Sync + 'static,
  {
    let raw = self.read_string(name)?;
    raw
      .trim()
      .parse::<F>()
      .with_context(|| format!("field '{}': cannot parse '{}'", name, raw))
  }
}

type LineMapper<T> = Arc<dyn Fn(&FieldSet) -> anyhow::Result<T> + Send + Sync>;

/// An [`ItemSource`] over a delimited text file.
///
/// The file is opened lazily on the first `next()`. By default the first
/// line is treated as a header and skipped; blank lines are ignored. Each
/// remaining line is tokenized and handed to the mapping function; any
/// failure (I/O, tokenization, mapping) surfaces as a
/// [`BatchError::Read`] carrying the 1-based line number.
pub struct FlatFileSource<T> {
  path: PathBuf,
  lines_to_skip: usize,
  tokenizer: DelimitedLineTokenizer,
  mapper: LineMapper<T>,
  reader: Option<Lines<BufReader<File>>>,
  /// 1-based number of the last line read, header included.
  offset: u64,
}

impl<T> FlatFileSource<T> {
  pub fn new(
    path: impl Into<PathBuf>,
    tokenizer: DelimitedLineTokenizer,
    mapper: impl Fn(&FieldSet) -> anyhow::Result<T> + Send + Sync + 'static,
  ) -> Self {
    Self {
      path: path.into(),
      lines_to_skip: 1,
      tokenizer,
      mapper: Arc::new(mapper),
      reader: None,
      offset: 0,
    }
  }

  /// Number of leading lines to skip. Defaults to 1 (the header); pass 0
  /// for headerless files.
  pub fn lines_to_skip(mut self, lines: usize) -> Self {
    self.lines_to_skip = lines;
    self
  }

  pub fn path(&self) -> &std::path::Path {
    &self.path
  }
}

#[async_trait]
impl<T: Send + 'static> ItemSource for FlatFileSource<T> {
  type Item = T;

  async fn next(&mut self) -> BatchResult<Option<T>> {
    if self.reader.is_none() {
      let file = File::open(&self.path).await.map_err(|err| {
        BatchError::read(
          0,
          anyhow::Error::new(err).context(format!("opening '{}'", self.path.display())),
        )
      })?;
      self.reader = Some(BufReader::new(file).lines());
    }
    let reader = match self.reader.as_mut() {
      Some(reader) => reader,
      None => return Err(BatchError::Internal("flat-file reader vanished".to_string())),
    };

    loop {
      let line = reader
        .next_line()
        .await
        .map_err(|err| BatchError::read(self.offset + 1, err))?;
      let line = match line {
        Some(line) => line,
        None => return Ok(None),
      };
      self.offset += 1;
      if self.offset <= self.lines_to_skip as u64 {
        continue;
      }
      if line.trim().is_empty() {
        continue;
      }
      let fields = self.tokenizer.tokenize(&line, self.offset)?;
      let item = (self.mapper)(&fields).map_err(|source| BatchError::Read {
        offset: self.offset,
        source,
      })?;
      return Ok(Some(item));
    }
  }
}
