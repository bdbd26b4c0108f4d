//! Shell-glob matching for file trigger patterns.
//!
//! Supports `*` (within one path segment), `?` (single character), `[...]`
//! character classes, and recursive `**` spanning separators. Patterns are
//! compiled to anchored regexes; an invalid pattern never matches and never
//! raises.

use regex::Regex;
use tracing::warn;

/// Check whether `path` matches the shell-glob `pattern`.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    match compile(pattern) {
        Some(re) => re.is_match(path),
        None => {
            warn!(pattern = %pattern, "Skipping unparseable file glob");
            false
        }
    }
}

/// Compile a shell glob into an anchored regex.
pub fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(&glob_to_regex(pattern)).ok()
}

fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_start = i == 0;
                let after_slash = i > 0 && chars[i - 1] == '/';
                if (at_start || after_slash) && chars.get(i + 2) == Some(&'/') {
                    // `**/` spans zero or more whole directories
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                re.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                re.push_str("[^/]");
                i += 1;
            }
            '[' => {
                // Copy a character class through verbatim, mapping a leading
                // `!` to regex negation. Unterminated classes fall back to a
                // literal bracket.
                if let Some(end) = find_class_end(&chars, i) {
                    re.push('[');
                    let mut j = i + 1;
                    if chars.get(j) == Some(&'!') {
                        re.push('^');
                        j += 1;
                    }
                    while j < end {
                        let c = chars[j];
                        if c == '\\' {
                            re.push('\\');
                        }
                        re.push(c);
                        j += 1;
                    }
                    re.push(']');
                    i = end + 1;
                } else {
                    re.push_str(&regex::escape("["));
                    i += 1;
                }
            }
            c => {
                re.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    re.push('$');
    re
}

fn find_class_end(chars: &[char], open: usize) -> Option<usize> {
    // The first position may hold a literal `]` (e.g. `[]]`), skip it.
    let mut j = open + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() {
        if chars[j] == ']' {
            return Some(j);
        }
        j += 1;
    }
    None
}
