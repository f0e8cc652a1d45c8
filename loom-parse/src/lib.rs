//! A minimal, self-contained implementation of the hypertext fragment
//! grammar from SPEC_FULL.md §6.1.
//!
//! The distilled spec treats the external parser as out-of-scope, but
//! Actions cannot function without one, so this crate provides it: a
//! fragment list over `{literal text, [nested hypertext], $name}`, with a
//! backslash-escaping convention (`\$`, `\[`, `\]`, `\\`) resolving the
//! original grammar's open question about literal special characters.
//!
//! This crate never touches a Store: it produces an AST of [`ParsedFragment`]
//! values. Resolving `Name` fragments against a pointer naming and inserting
//! nested nodes is `loom-actions`' job, which is the layer that actually has
//! both a naming and Store access in scope at the same time.

use loom_base::{err, Kind, Result};

/// One node of the parsed fragment tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParsedFragment {
    Literal(String),
    Nested(Vec<ParsedFragment>),
    /// The name text with its leading `$` stripped, e.g. `"3"`, `"q1"`.
    Name(String),
}

/// Parses `input` into a sequence of top-level fragments.
pub fn parse(input: &str) -> Result<Vec<ParsedFragment>> {
    let (fragments, consumed) = parse_sequence(input.as_bytes(), 0, false)?;
    debug_assert_eq!(consumed, input.len());
    Ok(fragments)
}

const SPECIAL: [u8; 4] = [b'$', b'[', b']', b'\\'];

/// The earliest occurrence of any of `$`, `[`, `]`, `\` in `bytes`.
/// `memchr` has no N-ary needle search, so this combines `memchr3` over
/// three of them with a separate `memchr` for the fourth.
fn find_special(bytes: &[u8]) -> Option<usize> {
    let bracket_or_dollar = memchr::memchr3(b'$', b'[', b']', bytes);
    let backslash = memchr::memchr(b'\\', bytes);
    match (bracket_or_dollar, backslash) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

fn parse_sequence(bytes: &[u8], start: usize, nested: bool) -> Result<(Vec<ParsedFragment>, usize)> {
    let mut fragments = Vec::new();
    let mut literal = String::new();
    let mut i = start;

    loop {
        match find_special(&bytes[i..]) {
            None => {
                literal.push_str(std::str::from_utf8(&bytes[i..]).expect("utf8 boundary"));
                if nested {
                    return Err(err(
                        Kind::Parse,
                        "unterminated nested hypertext: missing closing ']'",
                    ));
                }
                i = bytes.len();
                break;
            }
            Some(off) => {
                let special_pos = i + off;
                literal.push_str(
                    std::str::from_utf8(&bytes[i..special_pos]).expect("utf8 boundary"),
                );
                match bytes[special_pos] {
                    b'\\' => {
                        let escaped = *bytes.get(special_pos + 1).ok_or_else(|| {
                            err(Kind::Parse, "trailing '\\' with nothing to escape")
                        })?;
                        if !SPECIAL.contains(&escaped) {
                            return Err(err(
                                Kind::Parse,
                                format!(
                                    "'\\{}' is not a recognized escape sequence",
                                    escaped as char
                                ),
                            ));
                        }
                        literal.push(escaped as char);
                        i = special_pos + 2;
                    }
                    b'[' => {
                        push_literal(&mut fragments, &mut literal);
                        let (inner, next) = parse_sequence(bytes, special_pos + 1, true)?;
                        fragments.push(ParsedFragment::Nested(inner));
                        i = next;
                    }
                    b']' => {
                        if !nested {
                            return Err(err(Kind::Parse, "unmatched ']'"));
                        }
                        push_literal(&mut fragments, &mut literal);
                        return Ok((fragments, special_pos + 1));
                    }
                    b'$' => {
                        push_literal(&mut fragments, &mut literal);
                        let (name, next) = scan_name(bytes, special_pos + 1)?;
                        fragments.push(ParsedFragment::Name(name));
                        i = next;
                    }
                    _ => unreachable!("find_special only matches SPECIAL"),
                }
            }
        }
    }

    push_literal(&mut fragments, &mut literal);
    Ok((fragments, i))
}

fn push_literal(fragments: &mut Vec<ParsedFragment>, literal: &mut String) {
    if !literal.is_empty() {
        fragments.push(ParsedFragment::Literal(std::mem::take(literal)));
    }
}

/// Names are `$1`, `$2`, ... or `$q1`, `$a1`, `$w1`, ...: an optional
/// `q`/`a`/`w` prefix followed by one or more ASCII digits.
fn scan_name(bytes: &[u8], start: usize) -> Result<(String, usize)> {
    let mut i = start;
    let mut name = String::new();

    if matches!(bytes.get(i), Some(b'q') | Some(b'a') | Some(b'w')) {
        name.push(bytes[i] as char);
        i += 1;
    }

    let digits_start = i;
    while matches!(bytes.get(i), Some(b) if b.is_ascii_digit()) {
        name.push(bytes[i] as char);
        i += 1;
    }

    if i == digits_start {
        return Err(err(
            Kind::Parse,
            "'$' must be followed by a pointer number, e.g. '$1' or '$q1'",
        ));
    }

    Ok((name, i))
}
