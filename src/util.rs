//! Small utility helpers used across modules.

/// Expand tabs to four spaces for display purposes.
/// The correctness check compares lines verbatim; this is only for the
/// rendered code preview.
pub fn tabs_to_spaces(s: &str) -> String {
  s.replace('\t', "    ")
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads. The cut lands on
/// a char boundary: remote bodies are arbitrary bytes-of-text and must never
/// panic the caller.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max { return s.to_string(); }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}
