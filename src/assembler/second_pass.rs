//! Second pass: symbol resolution and operand-word emission
//!
//! The pass re-walks the expanded stream with the completed symbol table in
//! hand. For every operation line it skips the opcode word laid down by the
//! first pass, re-extracts the operand tokens and fills the reserved slots:
//! immediates and registers encode directly, direct-mode operands resolve
//! through the symbol table. Each direct reference to an external symbol is
//! recorded so the externals artifact can list every reference site.

use super::encoding::{self, AddressingMode, Are, Directive, Opcode};
use super::lexer;
use super::symbols::ExtRef;
use super::{Context, Error, MEM_START};

/// Run the second pass over the expanded stream, returning every error
/// found
pub fn run(ctx: &mut Context, expanded: &str) -> Vec<Error> {
    ctx.ic = 0;
    ctx.ext_refs.clear();

    let mut errors = Vec::new();
    for (index, raw) in expanded.lines().enumerate() {
        let line = raw.trim();
        if lexer::should_ignore(line) {
            continue;
        }
        process_line(ctx, line, index + 1, &mut errors);
    }
    errors
}

fn process_line(ctx: &mut Context, mut line: &str, line_num: usize, errors: &mut Vec<Error>) {
    let mut token = lexer::next_token(line, ":\t ");

    // Labels were handled in the first pass; skip them here.
    if let Some(name) = token.strip_suffix(':') {
        if lexer::is_valid_symbol(name) {
            line = lexer::remaining(line, ":");
            token = lexer::next_token(line, ",\t ");
        }
    }

    if let Some(op) = Opcode::from_name(token) {
        let rest = lexer::remaining(line, ",\t ");
        process_operation(ctx, op, rest, line_num, errors);
    } else if Directive::from_name(token) == Some(Directive::Entry) {
        let rest = lexer::remaining(line, ",\t ");
        let name = lexer::next_token(rest, "\t ");
        if let Err(e) = make_entry(ctx, name, line_num) {
            errors.push(e);
        }
    }
    // Other directives finished their work in the first pass.
}

/// Emit the operand words of one operation, advancing the instruction
/// counter past the opcode word emitted by the first pass
fn process_operation(
    ctx: &mut Context,
    op: Opcode,
    mut line: &str,
    line_num: usize,
    errors: &mut Vec<Error>,
) {
    let (has_src, has_dest) = encoding::expects_operands(op);

    // The first pass recorded the addressing modes in the opcode word.
    let opcode_word = ctx.code.get(ctx.ic).copied().unwrap_or(0);
    let src_mode = if has_src {
        encoding::src_mode_of(opcode_word)
    } else {
        None
    };
    let dest_mode = if has_dest {
        encoding::dest_mode_of(opcode_word)
    } else {
        None
    };

    let mut src_token = "";
    let mut dest_token = "";
    if has_dest {
        if has_src {
            src_token = lexer::next_token(line, ",\t ");
            line = lexer::remaining(line, ",\t ");
            if let Some(after_comma) = line.strip_prefix(',') {
                line = after_comma;
            }
            dest_token = lexer::next_token(line, "\t ");
        } else {
            dest_token = lexer::next_token(line, "\t ");
        }
    }

    ctx.ic += 1;

    if src_mode == Some(AddressingMode::RegDirect) && dest_mode == Some(AddressingMode::RegDirect)
    {
        // Two registers share a single operand word.
        let word = encoding::encode_register(lexer::register_index(src_token).unwrap_or(0), false)
            | encoding::encode_register(lexer::register_index(dest_token).unwrap_or(0), true);
        ctx.store_code(word);
        return;
    }

    // Both operands are attempted even if the first fails, so every
    // unresolved symbol on the line gets reported.
    if let Some(mode) = src_mode {
        if let Err(e) = encode_operand(ctx, src_token, mode, false, line_num) {
            errors.push(e);
        }
    }
    if let Some(mode) = dest_mode {
        if let Err(e) = encode_operand(ctx, dest_token, mode, true, line_num) {
            errors.push(e);
        }
    }
}

/// Encode one operand word according to its addressing mode
fn encode_operand(
    ctx: &mut Context,
    token: &str,
    mode: AddressingMode,
    is_dest: bool,
    line_num: usize,
) -> Result<(), Error> {
    match mode {
        AddressingMode::Immediate => {
            let value = token.parse::<i32>().unwrap_or(0);
            ctx.store_code(encoding::encode_are(value as u16, Are::Absolute));
            Ok(())
        }
        AddressingMode::RegDirect => {
            let index = lexer::register_index(token).unwrap_or(0);
            ctx.store_code(encoding::encode_register(index, is_dest));
            Ok(())
        }
        AddressingMode::Direct => encode_symbol(ctx, token, line_num),
    }
}

/// Resolve a direct-mode operand through the symbol table.
///
/// External symbols encode as value zero with the external tag and leave a
/// reference record at the operand word's address; everything else encodes
/// its final address as relocatable. An unresolved name still advances the
/// counter so later lines stay addressable.
fn encode_symbol(ctx: &mut Context, name: &str, line_num: usize) -> Result<(), Error> {
    let Some((address, is_external)) = ctx
        .symbols
        .get(name)
        .map(|s| (s.address, s.is_external))
    else {
        ctx.ic += 1;
        return Err(Error::SymbolNotFound { line: line_num });
    };

    let word = if is_external {
        ctx.ext_refs.push(ExtRef {
            name: name.to_string(),
            address: ctx.ic as u16 + MEM_START,
        });
        encoding::encode_are(address, Are::External)
    } else {
        encoding::encode_are(address, Are::Relocatable)
    };
    ctx.store_code(word);
    Ok(())
}

/// Mark a symbol as an entry. Marking the same symbol twice is harmless.
fn make_entry(ctx: &mut Context, name: &str, line_num: usize) -> Result<(), Error> {
    let Some(symbol) = ctx.symbols.get_mut(name) else {
        return Err(Error::EntrySymbolNotFound { line: line_num });
    };
    if symbol.is_external {
        return Err(Error::EntryCannotBeExtern { line: line_num });
    }
    symbol.is_entry = true;
    ctx.entry_exists = true;
    Ok(())
}
