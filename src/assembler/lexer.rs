//! Line-level lexical helpers shared by the preprocessor and both passes
//!
//! Tokens are extracted against a caller-supplied separator set so that the
//! same machinery serves label scanning (`":\t "`), operand scanning
//! (`",\t "`) and whole-remainder extraction (`""`). A token terminated by
//! a colon keeps the colon, which is how labels are recognised.

use std::sync::LazyLock;

use regex::Regex;

use super::encoding::{Directive, Opcode};
use super::{Error, MAX_SYMBOL_LEN};

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+$").unwrap());
static REGISTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^@r[0-7]$").unwrap());
static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^"[^"]*"$"#).unwrap());

/// Whether a string is empty or consists only of whitespace
pub fn is_blank(s: &str) -> bool {
    s.trim_start().is_empty()
}

/// Whether a line carries nothing to assemble: blank lines and comment
/// lines (first non-whitespace character is `;`)
pub fn should_ignore(line: &str) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with(';')
}

/// Extract the next token from `src`, delimited by the characters in
/// `seps`.
///
/// Leading whitespace is skipped first. When the terminating character is a
/// colon the colon is part of the returned token; this is what makes
/// `LOOP:` come back as a single label token when scanning with `":\t "`.
pub fn next_token<'a>(src: &'a str, seps: &str) -> &'a str {
    let src = src.trim_start();
    for (i, c) in src.char_indices() {
        if seps.contains(c) {
            return if c == ':' { &src[..=i] } else { &src[..i] };
        }
    }
    src
}

/// Advance past the token at the head of `src` and return what follows.
///
/// A colon terminating the token is consumed along with it; any other
/// separator is left in place so callers can inspect it (comma discipline
/// depends on seeing the comma). Returns `""` once the line is exhausted.
pub fn remaining<'a>(src: &'a str, seps: &str) -> &'a str {
    let src = src.trim_start();
    if src.is_empty() {
        return "";
    }
    for (i, c) in src.char_indices() {
        if seps.contains(c) {
            let rest = if c == ':' { &src[i + 1..] } else { &src[i..] };
            return rest.trim_start();
        }
    }
    ""
}

/// Whether a token is a valid number: an optional sign followed by digits
pub fn is_number(token: &str) -> bool {
    NUMBER.is_match(token)
}

/// Whether a token names a register (`@r0` through `@r7`)
pub fn is_register(token: &str) -> bool {
    REGISTER.is_match(token)
}

/// The index of the register a token names
pub fn register_index(token: &str) -> Option<u16> {
    if is_register(token) {
        token[2..].parse().ok()
    } else {
        None
    }
}

/// Whether a token is a quoted string with no interior quote
pub fn is_string_literal(token: &str) -> bool {
    STRING_LITERAL.is_match(token)
}

/// Validate a symbol name, reporting the specific violation.
///
/// The name must be 1..=31 characters, start with an alphabetic character,
/// continue alphanumerically, and must not collide with a register,
/// operation or directive name. Any colon has already been stripped by the
/// caller.
pub fn check_symbol_name(name: &str, line: usize) -> Result<(), Error> {
    if name.len() > MAX_SYMBOL_LEN {
        return Err(Error::SymbolTooLong { line });
    }
    if is_register(name) {
        return Err(Error::SymbolIsRegister { line });
    }
    if Opcode::from_name(name).is_some() {
        return Err(Error::SymbolIsOperation { line });
    }
    if Directive::from_name(name).is_some() {
        return Err(Error::SymbolIsDirective { line });
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return Err(Error::SymbolInvalidFirstChar { line }),
    }
    if chars.any(|c| !c.is_ascii_alphanumeric()) {
        return Err(Error::SymbolInvalidChar { line });
    }
    Ok(())
}

/// Whether a token is a well-formed symbol name.
///
/// The non-reporting form of [`check_symbol_name`], used where an invalid
/// name merely means "not this addressing mode".
pub fn is_valid_symbol(name: &str) -> bool {
    check_symbol_name(name, 0).is_ok()
}
