//! Path resolution for schema searches.
//!
//! A search is resolved against the pathname of a namespace. Absolute searches
//! (leading `/`) are taken as-is. Anything else is tried relative to the
//! namespace first and, when the search contains no `.`, relative to the root.
//!
//! ```
//! use fixtury::path::possible_absolute_paths;
//!
//! assert_eq!(possible_absolute_paths("/countries", "earth"), vec!["/countries/earth", "/earth"]);
//! assert_eq!(possible_absolute_paths("/countries/towns", "../earth"), vec!["/countries/earth"]);
//! assert_eq!(possible_absolute_paths("/countries", "/earth"), vec!["/earth"]);
//! ```

/// Path separator used by schema pathnames.
pub const SEPARATOR: char = '/';

/// Candidate absolute paths for `search`, most specific first, without duplicates.
pub fn possible_absolute_paths(namespace: &str, search: &str) -> Vec<String> {
  let mut candidates = Vec::with_capacity(2);

  if search.starts_with(SEPARATOR) {
    candidates.push(search.to_string());
  } else {
    candidates.push(join(namespace, search));
    if !search.contains('.') {
      candidates.push(join("/", search));
    }
  }

  let mut out: Vec<String> = Vec::with_capacity(candidates.len());
  for candidate in candidates {
    let normalized = normalize(&candidate);
    if !out.contains(&normalized) {
      out.push(normalized);
    }
  }
  out
}

/// Join two path fragments with a single separator.
pub fn join(base: &str, tail: &str) -> String {
  if base.is_empty() {
    return tail.to_string();
  }
  format!("{}{}{}", base.trim_end_matches(SEPARATOR), SEPARATOR, tail.trim_start_matches(SEPARATOR))
}

/// Expand a path against `/`: collapses `.` and `..` segments and duplicate separators.
///
/// `..` above the root stays at the root.
pub fn normalize(path: &str) -> String {
  let mut stack: Vec<&str> = Vec::new();
  for segment in path.split(SEPARATOR) {
    match segment {
      "" | "." => {}
      ".." => {
        stack.pop();
      }
      other => stack.push(other),
    }
  }
  format!("{}{}", SEPARATOR, stack.join("/"))
}

/// Non-empty segments of an absolute path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
  path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Pathname of a child node named `name` under `parent`.
pub fn child_pathname(parent: &str, name: &str) -> String {
  normalize(&join(parent, name))
}
