//! Macro capture and expansion
//!
//! The preprocessor scans the original source once. `mcro NAME` opens a
//! definition, the following lines are captured verbatim, and `endmcro`
//! closes it. A line consisting of nothing but a defined macro's name is
//! replaced by the captured body; every other line passes through
//! unchanged. The resulting expanded stream is what both passes consume.
//!
//! Macros take no parameters and do not nest; a name must be defined
//! before it is invoked. The first error aborts the expansion.

use super::encoding::{Directive, Opcode};
use super::{Error, lexer};

/// Longest accepted macro name
pub const MAX_MACRO_LEN: usize = 31;

/// A captured code template: its name and body lines, verbatim
#[derive(Debug)]
struct Macro {
    name: String,
    lines: Vec<String>,
}

/// Insertion-ordered mapping from macro name to its body
#[derive(Debug, Default)]
struct MacroTable {
    macros: Vec<Macro>,
}

impl MacroTable {
    fn push(&mut self, name: &str) {
        self.macros.push(Macro {
            name: name.to_string(),
            lines: Vec::new(),
        });
    }

    /// Append a body line to the macro currently being defined
    fn capture(&mut self, line: &str) {
        if let Some(current) = self.macros.last_mut() {
            current.lines.push(line.to_string());
        }
    }

    fn find(&self, name: &str) -> Option<&Macro> {
        self.macros.iter().find(|m| m.name == name)
    }
}

/// Expand every macro invocation in `source`, yielding the expanded stream.
///
/// Definitions are stripped from the output; invocations are replaced by
/// the captured body lines in order. Any error aborts preprocessing and the
/// partial expansion is discarded.
pub fn preprocess(source: &str) -> Result<String, Error> {
    let mut table = MacroTable::default();
    let mut inside_macro = false;
    let mut expanded = String::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        let mut words = trimmed.split_whitespace();
        let head = words.next();

        if head == Some("mcro") {
            let name = words.next().ok_or(Error::MissingMacroName { line })?;
            if words.next().is_some() {
                return Err(Error::McroExtraneousText { line });
            }
            check_macro_name(name, line)?;
            table.push(name);
            inside_macro = true;
        } else if inside_macro && head == Some("endmcro") {
            if words.next().is_some() {
                return Err(Error::EndmcroExtraneousText { line });
            }
            inside_macro = false;
        } else if inside_macro {
            table.capture(raw);
        } else if let Some(invoked) = table.find(trimmed) {
            for body_line in &invoked.lines {
                expanded.push_str(body_line);
                expanded.push('\n');
            }
        } else {
            expanded.push_str(raw);
            expanded.push('\n');
        }
    }

    Ok(expanded)
}

/// Validate a macro name: length plus the register/operation/directive
/// collision rules
fn check_macro_name(name: &str, line: usize) -> Result<(), Error> {
    if name.len() > MAX_MACRO_LEN {
        return Err(Error::MacroNameTooLong { line });
    }
    if lexer::is_register(name) {
        return Err(Error::MacroNameIsRegister { line });
    }
    if Opcode::from_name(name).is_some() {
        return Err(Error::MacroNameIsOperation { line });
    }
    if Directive::from_name(name).is_some() {
        return Err(Error::MacroNameIsDirective { line });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_each_invocation() {
        let source = "\
mcro INIT
        clr @r2
endmcro
        INIT
        INIT
        stop
";
        let expanded = preprocess(source).unwrap();
        assert_eq!(expanded, "        clr @r2\n        clr @r2\n        stop\n");
    }

    #[test]
    fn macro_free_input_is_unchanged() {
        let source = "MAIN:   mov @r3, @r4\n; comment\n\n        stop\n";
        assert_eq!(preprocess(source).unwrap(), source);
    }

    #[test]
    fn body_lines_keep_their_whitespace() {
        let source = "mcro M\n\tmov\t@r1 ,  @r2\nendmcro\nM\n";
        assert_eq!(preprocess(source).unwrap(), "\tmov\t@r1 ,  @r2\n");
    }

    #[test]
    fn definition_lines_are_stripped() {
        let source = "mcro M\nstop\nendmcro\n";
        assert_eq!(preprocess(source).unwrap(), "");
    }

    #[test]
    fn missing_name_is_an_error() {
        assert_eq!(
            preprocess("mcro\n"),
            Err(Error::MissingMacroName { line: 1 })
        );
    }

    #[test]
    fn extraneous_text_after_mcro() {
        assert_eq!(
            preprocess("mcro M extra\n"),
            Err(Error::McroExtraneousText { line: 1 })
        );
    }

    #[test]
    fn extraneous_text_after_endmcro() {
        assert_eq!(
            preprocess("mcro M\nstop\nendmcro extra\n"),
            Err(Error::EndmcroExtraneousText { line: 3 })
        );
    }

    #[test]
    fn reserved_names_are_rejected() {
        assert_eq!(
            preprocess("mcro mov\n"),
            Err(Error::MacroNameIsOperation { line: 1 })
        );
        assert_eq!(
            preprocess("mcro .data\n"),
            Err(Error::MacroNameIsDirective { line: 1 })
        );
        assert_eq!(
            preprocess("mcro @r3\n"),
            Err(Error::MacroNameIsRegister { line: 1 })
        );
        let long = format!("mcro {}\n", "M".repeat(32));
        assert_eq!(preprocess(&long), Err(Error::MacroNameTooLong { line: 1 }));
    }

    #[test]
    fn endmcro_outside_a_definition_passes_through() {
        let source = "endmcro\n";
        assert_eq!(preprocess(source).unwrap(), "endmcro\n");
    }

    #[test]
    fn undefined_invocation_passes_through() {
        // A bare name that matches no macro is emitted unchanged; the first
        // pass will reject it.
        let source = "NOTDEFINED\n";
        assert_eq!(preprocess(source).unwrap(), "NOTDEFINED\n");
    }
}
