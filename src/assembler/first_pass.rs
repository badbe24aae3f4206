//! First pass: symbol table construction and segment layout
//!
//! Every statement line of the expanded stream is classified as an
//! operation or a directive, optionally preceded by a label. Operations are
//! validated against the addressing-mode tables, their opcode word is
//! emitted and room is reserved for the operand words the second pass will
//! fill in. Directives feed the data segment and the symbol table. A line
//! that fails validation rolls back the label it defined and contributes an
//! error, but the pass keeps going so one run reports everything.

use crate::logging;

use super::encoding::{self, Directive, Opcode};
use super::lexer;
use super::symbols::{Segment, SymbolTable};
use super::{Context, Error, MEM_START};

/// Provisional address given to a label until its segment is known
const DEFAULT_ADDR: u16 = 0;

/// Most commas an operation line may contain
const OP_MAX_COMMAS: usize = 1;

/// Run the first pass over the expanded stream, returning every error
/// found.
///
/// On return the symbol table holds final addresses: instruction symbols
/// were shifted by the base address and data symbols by the base address
/// plus the final instruction count, so code sits at `[100, 100 + IC)` and
/// data directly after it.
pub fn run(ctx: &mut Context, expanded: &str) -> Vec<Error> {
    ctx.ic = 0;
    ctx.dc = 0;
    ctx.code.clear();
    ctx.data.clear();
    ctx.symbols = SymbolTable::new();
    ctx.entry_exists = false;
    ctx.extern_exists = false;

    let mut errors = Vec::new();
    for (index, raw) in expanded.lines().enumerate() {
        let line = raw.trim();
        if lexer::should_ignore(line) {
            continue;
        }
        if let Err(e) = parse_line(ctx, line, index + 1) {
            errors.push(e);
        }
    }

    ctx.symbols.relocate(Segment::Instruction, MEM_START);
    ctx.symbols.relocate(Segment::Directive, ctx.ic as u16 + MEM_START);

    errors
}

/// Parse one statement line: peel off an optional label, then dispatch on
/// the operation or directive that follows
fn parse_line(ctx: &mut Context, mut line: &str, line_num: usize) -> Result<(), Error> {
    let mut label: Option<&str> = None;
    let mut token = lexer::next_token(line, ":\t ");

    if let Some(name) = token.strip_suffix(':') {
        lexer::check_symbol_name(name, line_num)?;
        if !ctx.symbols.insert(name, DEFAULT_ADDR, false) {
            return Err(Error::SymbolAlreadyExists { line: line_num });
        }
        line = lexer::remaining(line, ":");
        if lexer::is_blank(line) {
            ctx.symbols.remove(name);
            return Err(Error::SymbolOnly { line: line_num });
        }
        label = Some(name);
        token = lexer::next_token(line, ",\t ");
    }

    let result = parse_statement(ctx, token, line, line_num, label);
    if result.is_err() {
        if let Some(name) = label {
            ctx.symbols.remove(name);
        }
    }
    result
}

fn parse_statement(
    ctx: &mut Context,
    token: &str,
    line: &str,
    line_num: usize,
    label: Option<&str>,
) -> Result<(), Error> {
    if let Some(op) = Opcode::from_name(token) {
        if let Some(symbol) = label.and_then(|name| ctx.symbols.get_mut(name)) {
            symbol.segment = Segment::Instruction;
            symbol.address = ctx.ic as u16;
        }
        let rest = lexer::remaining(line, ",\t ");
        check_commas(rest, line_num)?;
        process_operation(ctx, op, rest, line_num)
    } else if let Some(dir) = Directive::from_name(token) {
        match dir {
            // Labels mean nothing on .entry/.extern; drop them.
            Directive::Entry | Directive::Extern => {
                if let Some(name) = label {
                    logging::warning(
                        format!("label before {} is ignored", dir.name()),
                        line_num,
                    );
                    ctx.symbols.remove(name);
                }
            }
            Directive::Data | Directive::String => {
                if let Some(symbol) = label.and_then(|name| ctx.symbols.get_mut(name)) {
                    symbol.segment = Segment::Directive;
                    symbol.address = ctx.dc as u16;
                }
            }
        }
        let rest = lexer::remaining(line, ",\t ");
        check_commas(rest, line_num)?;
        process_directive(ctx, dir, rest, line_num)
    } else {
        Err(Error::UndefinedOpOrDirective { line: line_num })
    }
}

/// Comma discipline shared by operations and directives: nothing may start
/// with a comma, and no two commas may be separated only by whitespace
fn check_commas(rest: &str, line_num: usize) -> Result<(), Error> {
    if rest.starts_with(',') {
        return Err(Error::IllegalComma { line: line_num });
    }
    if has_consecutive_commas(rest) {
        return Err(Error::ConsecutiveCommas { line: line_num });
    }
    Ok(())
}

/// Validate an operation line, emit its opcode word and reserve room for
/// the operand words
fn process_operation(
    ctx: &mut Context,
    op: Opcode,
    mut line: &str,
    line_num: usize,
) -> Result<(), Error> {
    let mut first: Option<&str> = None;
    let mut second: Option<&str> = None;

    if count_commas(line) > OP_MAX_COMMAS {
        return Err(Error::ExtraneousComma { line: line_num });
    }

    if count_commas(line) == 1 {
        // Two operands separated by a comma.
        let token = lexer::next_token(line, ",\t ");
        line = lexer::remaining(line, ",\t ");
        if token.is_empty() {
            return Err(Error::MissingOperand { line: line_num });
        }
        first = Some(token);
        match line.strip_prefix(',') {
            Some(after_comma) => {
                let token = lexer::next_token(after_comma, "\t ");
                line = lexer::remaining(after_comma, "\t ");
                if token.is_empty() {
                    return Err(Error::MissingOperand { line: line_num });
                }
                second = Some(token);
            }
            None => return Err(Error::ExtraneousText { line: line_num }),
        }
    } else {
        // A single operand, or none at all.
        let token = lexer::next_token(line, "\t ");
        line = lexer::remaining(line, "\t ");
        if !token.is_empty() {
            first = Some(token);
        } else if op != Opcode::Rts && op != Opcode::Stop {
            return Err(Error::MissingOperand { line: line_num });
        }
    }

    if !lexer::is_blank(line) {
        return Err(Error::ExtraneousText { line: line_num });
    }

    let first_mode = first.map(encoding::detect_addr_mode);
    let second_mode = second.map(encoding::detect_addr_mode);
    if first_mode == Some(None) || second_mode == Some(None) {
        return Err(Error::InvalidAddressingMode { line: line_num });
    }
    let first_mode = first_mode.flatten();
    let second_mode = second_mode.flatten();

    if !encoding::is_valid_operand_count(op, first.is_some(), second.is_some()) {
        return Err(Error::InvalidOperandCount { line: line_num });
    }
    if !encoding::is_valid_mode_combination(op, first_mode, second_mode) {
        return Err(Error::InvalidOperandModes { line: line_num });
    }

    ctx.append_code(encoding::first_word(op, first_mode, second_mode));
    ctx.reserve_code(encoding::extra_word_count(first_mode, second_mode));

    Ok(())
}

fn process_directive(
    ctx: &mut Context,
    dir: Directive,
    line: &str,
    line_num: usize,
) -> Result<(), Error> {
    if lexer::is_blank(line) {
        return Err(Error::DirectiveMissingParams { line: line_num });
    }
    match dir {
        Directive::Data => process_data(ctx, line, line_num),
        Directive::String => process_string(ctx, line, line_num),
        Directive::Entry => process_entry(line, line_num),
        Directive::Extern => process_extern(ctx, line, line_num),
    }
}

/// `.data`: comma-separated numbers, one data word each.
///
/// Items are appended as they are parsed, so an error mid-list keeps the
/// words already laid down; the label that pointed at them is rolled back
/// by the caller and the artifacts are withheld anyway.
fn process_data(ctx: &mut Context, mut line: &str, line_num: usize) -> Result<(), Error> {
    while !lexer::is_blank(line) {
        let param = lexer::next_token(line, ",\t ");
        if !lexer::is_number(param) {
            return Err(Error::DataNotNumber { line: line_num });
        }
        line = lexer::remaining(line, ",\t ");
        if !lexer::is_blank(line) && !line.starts_with(',') {
            return Err(Error::DataMissingComma { line: line_num });
        }
        if let Some(after_comma) = line.strip_prefix(',') {
            if lexer::is_blank(after_comma) {
                return Err(Error::DataExtraneousText { line: line_num });
            }
        }
        ctx.append_data(param.parse::<i32>().unwrap_or(0) as u16);
        if !lexer::is_blank(line) {
            line = &line[1..];
        }
    }
    Ok(())
}

/// `.string`: one quoted literal whose bytes become data words, closed by a
/// single zero word
fn process_string(ctx: &mut Context, line: &str, line_num: usize) -> Result<(), Error> {
    let param = lexer::next_token(line.trim_end(), "");
    if !lexer::is_string_literal(param) {
        return Err(Error::InvalidStringLiteral { line: line_num });
    }
    for byte in param[1..param.len() - 1].bytes() {
        ctx.append_data(u16::from(byte));
    }
    ctx.append_data(0);
    Ok(())
}

/// `.entry`: validate the symbol name; the marking itself happens in the
/// second pass, once the symbol table is complete
fn process_entry(line: &str, line_num: usize) -> Result<(), Error> {
    let param = lexer::next_token(line, "\t ");
    if param.is_empty() {
        return Err(Error::EntryMissingSymbol { line: line_num });
    }
    lexer::check_symbol_name(param, line_num)?;
    if !lexer::is_blank(lexer::remaining(line, "\t ")) {
        return Err(Error::EntryExtraneousText { line: line_num });
    }
    Ok(())
}

/// `.extern`: validate the symbol name and record it as an external
/// definition at address zero
fn process_extern(ctx: &mut Context, line: &str, line_num: usize) -> Result<(), Error> {
    let param = lexer::next_token(line, "\t ");
    if param.is_empty() {
        return Err(Error::ExternMissingSymbol { line: line_num });
    }
    lexer::check_symbol_name(param, line_num)?;
    if !lexer::is_blank(lexer::remaining(line, "\t ")) {
        return Err(Error::ExternExtraneousText { line: line_num });
    }
    if !ctx.symbols.insert(param, DEFAULT_ADDR, true) {
        return Err(Error::SymbolAlreadyExists { line: line_num });
    }
    ctx.extern_exists = true;
    Ok(())
}

fn count_commas(s: &str) -> usize {
    s.chars().filter(|&c| c == ',').count()
}

/// Two commas with nothing but whitespace between them
fn has_consecutive_commas(s: &str) -> bool {
    let mut comma_seen = false;
    for c in s.chars() {
        if c == ',' {
            if comma_seen {
                return true;
            }
            comma_seen = true;
        } else if !c.is_whitespace() {
            comma_seen = false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(source: &str) -> (Context, Vec<Error>) {
        let mut ctx = Context::new();
        let errors = run(&mut ctx, source);
        (ctx, errors)
    }

    #[test]
    fn lays_out_a_minimal_program() {
        let (ctx, errors) = pass("MAIN:   mov @r3, @r4\n        stop\n");
        assert!(errors.is_empty());
        // mov with a shared register word, then stop.
        assert_eq!(ctx.ic, 3);
        assert_eq!(ctx.dc, 0);
        assert_eq!(ctx.code.len(), 3);
        assert_eq!(ctx.code[0], ((5 << 7) | 5) << 2);
        assert_eq!(ctx.code[2], (15 << 3) << 2);
        assert_eq!(ctx.symbols.get("MAIN").unwrap().address, 100);
    }

    #[test]
    fn data_and_string_layout() {
        let (ctx, errors) = pass("LIST:   .data 7, -57, +17\nSTR:    .string \"ab\"\n");
        assert!(errors.is_empty());
        assert_eq!(ctx.ic, 0);
        assert_eq!(ctx.dc, 6);
        assert_eq!(ctx.data, vec![7, 4039, 17, 97, 98, 0]);
        assert_eq!(ctx.symbols.get("LIST").unwrap().address, 100);
        assert_eq!(ctx.symbols.get("STR").unwrap().address, 103);
    }

    #[test]
    fn data_symbols_land_after_code() {
        let (ctx, errors) = pass("        stop\nX:      .data 1\n");
        assert!(errors.is_empty());
        // One code word, so data starts at 101.
        assert_eq!(ctx.symbols.get("X").unwrap().address, 101);
    }

    #[test]
    fn reserves_operand_slots_for_the_second_pass() {
        let (ctx, errors) = pass("        mov -1, @r3\n        jmp LOOP\nLOOP:   stop\n");
        assert!(errors.is_empty());
        // mov: opcode + immediate + register; jmp: opcode + symbol; stop.
        assert_eq!(ctx.ic, 6);
        assert_eq!(ctx.code.len(), 6);
        assert_eq!(ctx.code[1], 0);
        assert_eq!(ctx.code[2], 0);
        assert_eq!(ctx.code[4], 0);
    }

    #[test]
    fn extern_definition_sets_the_flag() {
        let (ctx, errors) = pass("        .extern EXT\n");
        assert!(errors.is_empty());
        assert!(ctx.extern_exists);
        let symbol = ctx.symbols.get("EXT").unwrap();
        assert!(symbol.is_external);
        assert_eq!(symbol.address, 0);
    }

    #[test]
    fn entry_does_not_touch_the_table_in_pass_one() {
        let (ctx, errors) = pass("X:      .data 1\n        .entry X\n");
        assert!(errors.is_empty());
        assert!(!ctx.entry_exists);
        assert!(!ctx.symbols.get("X").unwrap().is_entry);
    }

    #[test]
    fn label_before_extern_is_dropped() {
        let (ctx, errors) = pass("L:      .extern EXT\n");
        assert!(errors.is_empty());
        assert!(ctx.symbols.get("L").is_none());
        assert!(ctx.symbols.get("EXT").is_some());
    }

    #[test]
    fn collects_every_error_in_one_run() {
        let source = "\
A:      mov @r1
B:      .data 1
B:      add 5, @r2
        foo
";
        let (ctx, errors) = pass(source);
        assert_eq!(
            errors,
            vec![
                Error::InvalidOperandCount { line: 1 },
                Error::SymbolAlreadyExists { line: 3 },
                Error::UndefinedOpOrDirective { line: 4 },
            ]
        );
        // A rolled back, B kept from its valid definition.
        assert!(ctx.symbols.get("A").is_none());
        assert!(ctx.symbols.get("B").is_some());
    }

    #[test]
    fn failed_line_rolls_back_its_label() {
        let (ctx, errors) = pass("A:      mov 5, 6\n");
        assert_eq!(errors, vec![Error::InvalidOperandModes { line: 1 }]);
        assert!(ctx.symbols.get("A").is_none());
        assert_eq!(ctx.ic, 0);
    }

    #[test]
    fn bare_label_is_rejected_and_rolled_back() {
        let (ctx, errors) = pass("ALONE:\n");
        assert_eq!(errors, vec![Error::SymbolOnly { line: 1 }]);
        assert!(ctx.symbols.is_empty());
    }

    #[test]
    fn comma_discipline() {
        let (_, errors) = pass("        mov , @r1, @r2\n");
        assert_eq!(errors, vec![Error::IllegalComma { line: 1 }]);

        let (_, errors) = pass("        mov @r1,, @r2\n");
        assert_eq!(errors, vec![Error::ConsecutiveCommas { line: 1 }]);

        let (_, errors) = pass("        mov @r1, @r2, @r3\n");
        assert_eq!(errors, vec![Error::ExtraneousComma { line: 1 }]);

        let (_, errors) = pass("        mov @r1 @r2\n");
        assert_eq!(errors, vec![Error::ExtraneousText { line: 1 }]);

        let (_, errors) = pass("        mov @r1,\n");
        assert_eq!(errors, vec![Error::MissingOperand { line: 1 }]);
    }

    #[test]
    fn data_list_syntax() {
        let (ctx, errors) = pass("        .data 5\n");
        assert!(errors.is_empty());
        assert_eq!(ctx.data, vec![5]);

        let (_, errors) = pass("        .data 5,\n");
        assert_eq!(errors, vec![Error::DataExtraneousText { line: 1 }]);

        let (_, errors) = pass("        .data 5 6\n");
        assert_eq!(errors, vec![Error::DataMissingComma { line: 1 }]);

        let (_, errors) = pass("        .data five\n");
        assert_eq!(errors, vec![Error::DataNotNumber { line: 1 }]);

        let (_, errors) = pass("        .data\n");
        assert_eq!(errors, vec![Error::DirectiveMissingParams { line: 1 }]);
    }

    #[test]
    fn string_must_be_quoted() {
        let (_, errors) = pass("        .string abc\n");
        assert_eq!(errors, vec![Error::InvalidStringLiteral { line: 1 }]);

        let (ctx, errors) = pass("        .string \"a b\"\n");
        assert!(errors.is_empty());
        assert_eq!(ctx.data, vec![97, 32, 98, 0]);
    }

    #[test]
    fn invalid_addressing_mode_is_reported() {
        let (_, errors) = pass("        mov #5, @r1\n");
        assert_eq!(errors, vec![Error::InvalidAddressingMode { line: 1 }]);
    }

    #[test]
    fn labelled_opcode_gets_the_current_ic() {
        let (ctx, errors) = pass("        stop\nHERE:   stop\n");
        assert!(errors.is_empty());
        assert_eq!(ctx.symbols.get("HERE").unwrap().address, 101);
    }

    #[test]
    fn thirty_one_character_label_is_accepted() {
        let name = "L".repeat(31);
        let (ctx, errors) = pass(&format!("{}: stop\n", name));
        assert!(errors.is_empty());
        assert_eq!(ctx.symbols.get(&name).unwrap().address, 100);

        let long = "L".repeat(32);
        let (_, errors) = pass(&format!("{}: stop\n", long));
        assert_eq!(errors, vec![Error::SymbolTooLong { line: 1 }]);
    }
}
