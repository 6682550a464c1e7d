//! Source embedding.
//!
//! The driver is compiled into the runtime as a C++ translation unit holding
//! three symbols:
//!
//! ```text
//! namespace node {
//!   char gRecordReplayDriver[] = "\177\105\114\106...";
//!   int gRecordReplayDriverSize = 123456;
//!   char gBuildId[] = "linux-node-20240115-1a2b3c4d5e6f-f00dcafe";
//! }
//! ```
//!
//! Every payload byte is written as a backslash followed by exactly three
//! octal digits. Fixed-width escapes keep the literal unambiguous: a shorter
//! escape followed by a payload byte that happens to be an ASCII digit would
//! otherwise be read back as a different byte.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::build_id::BuildId;

/// Errors raised while writing or decoding embedded sources.
#[derive(Debug, Error)]
pub enum EmbedError {
  #[error("failed to write embedded source '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed octal literal at offset {offset}")]
  Decode { offset: usize },
}

/// The driver payload and the constants rendered alongside it.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSource<'a> {
  payload: &'a [u8],
  build_id: &'a BuildId,
}

impl<'a> EmbeddedSource<'a> {
  pub fn new(payload: &'a [u8], build_id: &'a BuildId) -> Self {
    Self { payload, build_id }
  }

  /// Value of the size constant; always the number of encoded bytes.
  pub fn payload_len(&self) -> usize {
    self.payload.len()
  }

  /// Render the translation unit.
  pub fn render(&self) -> String {
    let literal = encode_octal_literal(self.payload);
    let build_id = escape_c_string(self.build_id.as_str());

    let mut out = String::with_capacity(literal.len() + build_id.len() + 160);
    out.push_str("\nnamespace node {\n");
    let _ = writeln!(out, "  char gRecordReplayDriver[] = \"{}\";", literal);
    let _ = writeln!(out, "  int gRecordReplayDriverSize = {};", self.payload_len());
    let _ = writeln!(out, "  char gBuildId[] = \"{}\";", build_id);
    out.push_str("}\n");
    out
  }
}

/// Encode every byte as `\ooo`.
pub fn encode_octal_literal(bytes: &[u8]) -> String {
  let mut out = String::with_capacity(bytes.len() * 4);
  for &byte in bytes {
    push_octal(&mut out, byte);
  }
  out
}

/// Inverse of [`encode_octal_literal`].
pub fn decode_octal_literal(literal: &str) -> Result<Vec<u8>, EmbedError> {
  let raw = literal.as_bytes();
  if raw.len() % 4 != 0 {
    return Err(EmbedError::Decode {
      offset: raw.len() - raw.len() % 4,
    });
  }

  raw
    .chunks_exact(4)
    .enumerate()
    .map(|(i, chunk)| {
      let offset = i * 4;
      match chunk {
        [b'\\', hi @ b'0'..=b'3', mid @ b'0'..=b'7', lo @ b'0'..=b'7'] => {
          Ok(((hi - b'0') << 6) | ((mid - b'0') << 3) | (lo - b'0'))
        }
        _ => Err(EmbedError::Decode { offset }),
      }
    })
    .collect()
}

/// Escape a string for use inside a C string literal.
///
/// Printable ASCII passes through except for `\` and `"`; everything else is
/// written as fixed-width octal escapes of its UTF-8 bytes.
fn escape_c_string(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for &byte in s.as_bytes() {
    match byte {
      b'\\' | b'"' => push_octal(&mut out, byte),
      0x20..=0x7e => out.push(char::from(byte)),
      _ => push_octal(&mut out, byte),
    }
  }
  out
}

fn push_octal(out: &mut String, byte: u8) {
  out.push('\\');
  out.push(char::from(b'0' + (byte >> 6)));
  out.push(char::from(b'0' + ((byte >> 3) & 0o7)));
  out.push(char::from(b'0' + (byte & 0o7)));
}

/// Overwrite `path` with the rendered source.
pub fn write_embedded_source(path: &Path, source: &str) -> Result<(), EmbedError> {
  std::fs::write(path, source).map_err(|e| EmbedError::Write {
    path: path.to_path_buf(),
    source: e,
  })?;
  info!(path = %path.display(), size = source.len(), "wrote embedded source");
  Ok(())
}
