// src/report/repair.rs
//! Textual repairs for almost-JSON model output.
//!
//! Each step is a string-aware scan (quotes and escapes are tracked, so
//! characters inside string values are never mistaken for structure):
//!
//! 1. cut the object out of fences and surrounding prose
//! 2. drop `//` and `/* */` comments
//! 3. escape raw control characters and stray quotes inside strings
//! 4. drop separators that sit right before a closer
//! 5. close whatever is still open, progressively dropping unterminated
//!    trailing elements
//!
//! `candidates` returns the repaired texts in the order they should be tried.

/// Upper bound on truncation points tried when closing an unbalanced object.
const MAX_CUT_CANDIDATES: usize = 32;

/// Repaired texts to retry strict parsing on, most faithful first.
/// Empty when the input holds no object at all.
pub fn candidates(raw: &str) -> Vec<String> {
    let Some(body) = strip_wrapper(raw) else {
        return Vec::new();
    };
    let text = strip_comments(body);
    let text = escape_in_strings(&text);
    let text = remove_trailing_separators(&text);
    close_candidates(&text)
        .into_iter()
        .map(|c| remove_trailing_separators(&c))
        .collect()
}

/// Slice holding the first top-level object, preferring fenced blocks.
pub fn strip_wrapper(raw: &str) -> Option<&str> {
    let scope = fenced_block(raw).unwrap_or(raw);
    let start = scope.find('{')?;
    let obj = &scope[start..];
    match matching_close(obj) {
        Some(end) => Some(&obj[..=end]),
        None => Some(obj),
    }
}

/// Body of the first ``` fenced block that contains an object.
fn fenced_block(raw: &str) -> Option<&str> {
    let mut rest = raw;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let tag_end = after.find('\n').unwrap_or(after.len());
        let tag = &after[..tag_end];
        let is_lang_tag = tag
            .trim()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let body_start = if is_lang_tag {
            (tag_end + 1).min(after.len())
        } else {
            0
        };
        let body = &after[body_start..];
        let (block, next) = match body.find("```") {
            Some(close) => (&body[..close], &body[close + 3..]),
            None => (body, ""),
        };
        if block.contains('{') {
            return Some(block);
        }
        rest = next;
    }
    None
}

/// Byte index of the brace closing the object that starts at `s[0]`.
fn matching_close(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_str = false;
    let mut esc = false;
    for (i, c) in s.char_indices() {
        if in_str {
            if esc {
                esc = false;
            } else if c == '\\' {
                esc = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove comments outside of strings.
pub fn strip_comments(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut in_str = false;
    let mut esc = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_str {
            out.push(c);
            if esc {
                esc = false;
            } else if c == '\\' {
                esc = true;
            } else if c == '"' {
                in_str = false;
            }
            i += 1;
            continue;
        }
        match (c, chars.get(i + 1)) {
            ('"', _) => {
                in_str = true;
                out.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Escape raw control characters inside strings. A quote inside a string
/// that is not followed by `,` `:` `}` `]` (or the end) is taken as a literal
/// quote and escaped too.
pub fn escape_in_strings(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 8);
    let mut in_str = false;
    let mut esc = false;
    for (i, &c) in chars.iter().enumerate() {
        if !in_str {
            if c == '"' {
                in_str = true;
            }
            out.push(c);
            continue;
        }
        if esc {
            esc = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                esc = true;
                out.push(c);
            }
            '"' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                match next {
                    None | Some(',') | Some(':') | Some('}') | Some(']') => {
                        in_str = false;
                        out.push('"');
                    }
                    Some(_) => out.push_str("\\\""),
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

/// Drop `,` (and runs of them) that directly precede `}` or `]`.
/// Single pass: commas and whitespace are held back until the next
/// significant character decides whether the commas survive.
pub fn remove_trailing_separators(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending = String::new();
    let mut in_str = false;
    let mut esc = false;
    for c in s.chars() {
        if in_str {
            if esc {
                esc = false;
            } else if c == '\\' {
                esc = true;
            } else if c == '"' {
                in_str = false;
            }
            out.push(c);
            continue;
        }
        if c == ',' || c.is_whitespace() {
            pending.push(c);
            continue;
        }
        if c == '}' || c == ']' {
            out.extend(pending.chars().filter(|ch| *ch != ','));
        } else {
            out.push_str(&pending);
        }
        pending.clear();
        if c == '"' {
            in_str = true;
        }
        out.push(c);
    }
    out.push_str(&pending);
    out
}

#[derive(Debug, Clone)]
struct Cut {
    /// Byte length of the prefix to keep.
    len: usize,
    /// Closers still owed at that point, innermost last.
    owed: Vec<char>,
}

fn closers(owed: &[char]) -> String {
    owed.iter().rev().collect()
}

/// Candidate closings for `s`: the text itself if balanced, otherwise the
/// minimal closer suffix followed by progressively shorter truncations.
/// Mismatched closers are repaired in passing (missing inner closers are
/// inserted, closers with no opener dropped).
pub fn close_candidates(s: &str) -> Vec<String> {
    let mut out = String::with_capacity(s.len() + 8);
    let mut owed: Vec<char> = Vec::new();
    let mut cuts: Vec<Cut> = Vec::new();
    let mut in_str = false;
    let mut esc = false;

    for c in s.chars() {
        if in_str {
            out.push(c);
            if esc {
                esc = false;
            } else if c == '\\' {
                esc = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_str = true;
                out.push(c);
            }
            '{' | '[' => {
                out.push(c);
                owed.push(if c == '{' { '}' } else { ']' });
                cuts.push(Cut {
                    len: out.len(),
                    owed: owed.clone(),
                });
            }
            '}' | ']' => {
                if !owed.contains(&c) {
                    continue;
                }
                while let Some(top) = owed.pop() {
                    out.push(top);
                    if top == c {
                        break;
                    }
                }
                if owed.is_empty() {
                    // Anything after the top-level close is trailing noise.
                    return vec![out];
                }
                cuts.push(Cut {
                    len: out.len(),
                    owed: owed.clone(),
                });
            }
            ',' => {
                cuts.push(Cut {
                    len: out.len(),
                    owed: owed.clone(),
                });
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if owed.is_empty() && !in_str {
        return vec![out];
    }

    let mut result = Vec::new();

    let mut direct = out.trim_end().to_string();
    if in_str {
        if esc {
            direct.pop();
        }
        direct.push('"');
    }
    direct.push_str(&closers(&owed));
    result.push(direct);

    for cut in cuts.iter().rev().take(MAX_CUT_CANDIDATES) {
        let mut cand = out[..cut.len].trim_end().to_string();
        cand.push_str(&closers(&cut.owed));
        if !result.contains(&cand) {
            result.push(cand);
        }
    }
    result
}
