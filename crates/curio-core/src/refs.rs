//! Image reference extraction from subject bodies.
//!
//! Bodies are Markdown with optional inline HTML. Both `![alt](target)` and
//! `<img src="target">` count as references. A target is reduced to its
//! object name: the last path segment, without query or fragment.

use std::collections::BTreeSet;

/// Collect the distinct image object names referenced by `body`.
pub fn image_refs(body: &str) -> BTreeSet<String> {
  let mut refs = BTreeSet::new();
  markdown_refs(body, &mut refs);
  html_refs(body, &mut refs);
  refs
}

/// Reduce a URL or path to the object name it points at.
pub fn object_name(target: &str) -> Option<&str> {
  let target = target.trim();
  let end = target.find(['?', '#']).unwrap_or(target.len());
  let path = target[..end].trim_end_matches('/');
  let name = path.rsplit('/').next().unwrap_or(path);
  if name.is_empty() { None } else { Some(name) }
}

fn markdown_refs(body: &str, out: &mut BTreeSet<String>) {
  let mut rest = body;
  while let Some(start) = rest.find("![") {
    rest = &rest[start + 2..];
    let Some(close) = rest.find("](") else { break };
    rest = &rest[close + 2..];
    let Some(end) = rest.find(')') else { break };
    // The optional title in `![alt](name.png "title")` is not part of the target.
    let target = rest[..end].split_whitespace().next().unwrap_or("");
    let target = target.trim_matches(|c| c == '<' || c == '>');
    if let Some(name) = object_name(target) {
      out.insert(name.to_owned());
    }
    rest = &rest[end + 1..];
  }
}

fn html_refs(body: &str, out: &mut BTreeSet<String>) {
  let lower = body.to_ascii_lowercase();
  let mut offset = 0;
  while let Some(found) = lower[offset..].find("<img") {
    let tag_start = offset + found;
    let tag_end = lower[tag_start..]
      .find('>')
      .map_or(lower.len(), |i| tag_start + i);
    let tag = &lower[tag_start..tag_end];

    if let Some(src_at) = tag.find("src=") {
      let value_start = tag_start + src_at + 4;
      let original = &body[value_start..tag_end];
      let target = match original.chars().next() {
        Some(q @ ('"' | '\'')) => original[1..].split(q).next().unwrap_or(""),
        _ => original.split_whitespace().next().unwrap_or(""),
      };
      if let Some(name) = object_name(target.trim_end_matches('/')) {
        out.insert(name.to_owned());
      }
    }
    offset = tag_end;
  }
}
