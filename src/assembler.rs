//! Translates assembly source for a small 12-bit architecture into object,
//! entry and external listings in a two-pass manner
//!
//! The preprocessor expands user-defined macros into an expanded source
//! stream. The first pass tokenises each expanded line, builds the symbol
//! table and lays out the code and data segments while deferring symbol
//! resolution; the second pass re-walks the stream, resolves symbol
//! references and fills in the remaining operand words, recording every
//! reference to an external symbol.
//!
//! Comments start with a semicolon (`;`) at the beginning of a line and run
//! to its end. A statement line has the form
//!
//! ```ignore
//! [label:] {operation operands | directive params}
//! ```
//!
//! where whitespace is any mix of spaces and tabs. Labels end with a colon
//! and name the address of the statement they precede.
//!
//! The assembler supports the following operations:
//! - mov, cmp, add, sub, lea: two operands (source, destination)
//! - not, clr, inc, dec, jmp, bne, red, prn, jsr: one destination operand
//! - rts, stop: no operands
//!
//! Operands are immediates (a bare number, e.g. `-5`), registers
//! (`@r0`..`@r7`) or symbol names.
//!
//! The assembler supports the following directives:
//! - .data: store comma-separated numbers in the data segment
//! - .string: store a quoted string followed by a terminating zero word
//! - .entry: export a symbol defined in this file
//! - .extern: declare a symbol defined in another file
//!
//! Macros are defined with `mcro NAME` ... `endmcro` and invoked by writing
//! the macro name on a line of its own. Macros take no parameters, do not
//! nest, and must be defined before first use.

pub mod encoding;
pub mod first_pass;
pub mod lexer;
pub mod output;
pub mod preprocessor;
pub mod second_pass;
pub mod symbols;

use std::{fmt, fs};

use output::FileKind;
use symbols::{ExtRef, SymbolTable};

/// First memory address available to user programs
pub const MEM_START: u16 = 100;

/// Capacity of each of the code and data segments, in words
pub const MEM_SIZE: usize = 1024;

/// Longest accepted source line, excluding the terminator
pub const MAX_LINE_LEN: usize = 80;

/// Longest accepted symbol or label name
pub const MAX_SYMBOL_LEN: usize = 31;

/// Per-file assembly state threaded through both passes.
///
/// The instruction counter indexes the code segment and the data counter
/// indexes the data segment; user-visible addresses are offset by
/// [`MEM_START`]. The first pass appends opcode words and reserves one
/// zeroed slot per pending operand word, so `code.len()` equals `ic` at
/// every pass boundary and the second pass can fill the slots in place.
pub struct Context {
    pub code: Vec<u16>,
    pub data: Vec<u16>,
    pub ic: usize,
    pub dc: usize,
    pub symbols: SymbolTable,
    pub ext_refs: Vec<ExtRef>,
    pub entry_exists: bool,
    pub extern_exists: bool,
}

impl Context {
    /// Create a fresh context for one source file
    pub fn new() -> Context {
        Context {
            code: Vec::new(),
            data: Vec::new(),
            ic: 0,
            dc: 0,
            symbols: SymbolTable::new(),
            ext_refs: Vec::new(),
            entry_exists: false,
            extern_exists: false,
        }
    }

    /// Append a word to the code segment and advance the instruction counter
    pub fn append_code(&mut self, word: u16) {
        self.code.push(word & encoding::WORD_MASK);
        self.ic += 1;
    }

    /// Reserve zeroed slots for operand words the second pass will fill in
    pub fn reserve_code(&mut self, count: usize) {
        self.code.resize(self.code.len() + count, 0);
        self.ic += count;
    }

    /// Write a word at the instruction counter, filling a reserved slot.
    ///
    /// Falls back to appending when the counter has run past the first-pass
    /// layout; that only happens after first-pass errors, when no artifacts
    /// will be written.
    pub fn store_code(&mut self, word: u16) {
        let word = word & encoding::WORD_MASK;
        if self.ic < self.code.len() {
            self.code[self.ic] = word;
        } else {
            self.code.push(word);
        }
        self.ic += 1;
    }

    /// Append a word to the data segment and advance the data counter
    pub fn append_data(&mut self, word: u16) {
        self.data.push(word & encoding::WORD_MASK);
        self.dc += 1;
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::new()
    }
}

/// The rendered output artifacts of one successfully assembled file
#[derive(Debug)]
pub struct Artifacts {
    pub object: String,
    pub entries: Option<String>,
    pub externals: Option<String>,
}

/// Assemble a source string into its output artifacts.
///
/// Runs the full pipeline: preprocessing, both passes, and artifact
/// rendering. All errors found by the passes are returned together.
pub fn assemble(source: &str) -> Result<Artifacts, Vec<Error>> {
    let expanded = preprocessor::preprocess(source).map_err(|e| vec![e])?;
    assemble_expanded(&expanded)
}

/// Run both passes over an already-expanded source stream and render the
/// artifacts if neither pass reported an error
pub fn assemble_expanded(expanded: &str) -> Result<Artifacts, Vec<Error>> {
    let mut ctx = Context::new();

    let mut errors = first_pass::run(&mut ctx, expanded);
    errors.extend(second_pass::run(&mut ctx, expanded));
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Artifacts {
        object: output::render_object(&ctx),
        entries: output::render_entries(&ctx),
        externals: output::render_externals(&ctx),
    })
}

/// Assemble `<base_name>.as`, leaving `<base_name>.am` plus the object,
/// entries and externals artifacts next to it.
///
/// The expanded stream is written whenever preprocessing succeeds, even if
/// the passes later fail; a preprocessing failure removes any stale
/// expanded artifact instead. The object, entries and externals files are
/// written only when both passes are clean.
pub fn assemble_from_file(base_name: &str) -> Result<(), Vec<Error>> {
    let source_path = output::artifact_name(base_name, FileKind::Source);
    let source = fs::read_to_string(&source_path)
        .map_err(|_| vec![Error::CannotOpenFile { path: source_path }])?;

    let expanded_path = output::artifact_name(base_name, FileKind::Expanded);
    let expanded = match preprocessor::preprocess(&source) {
        Ok(expanded) => expanded,
        Err(e) => {
            // A failed expansion must not leave a stale expanded artifact
            // behind.
            let mut errors = vec![e];
            if let Err(io) = fs::remove_file(&expanded_path) {
                if io.kind() != std::io::ErrorKind::NotFound {
                    errors.push(Error::CannotDeleteFile {
                        path: expanded_path,
                    });
                }
            }
            return Err(errors);
        }
    };
    fs::write(&expanded_path, &expanded)
        .map_err(|_| vec![Error::CannotCreateFile { path: expanded_path }])?;

    let artifacts = assemble_expanded(&expanded)?;

    write_artifact(base_name, FileKind::Object, &artifacts.object)?;
    if let Some(entries) = &artifacts.entries {
        write_artifact(base_name, FileKind::Entries, entries)?;
    }
    if let Some(externals) = &artifacts.externals {
        write_artifact(base_name, FileKind::Externals, externals)?;
    }

    Ok(())
}

fn write_artifact(base_name: &str, kind: FileKind, contents: &str) -> Result<(), Vec<Error>> {
    let path = output::artifact_name(base_name, kind);
    fs::write(&path, contents).map_err(|_| vec![Error::CannotCreateFile { path }])
}

/// An error that can occur during the assembly process.
///
/// Line numbers refer to the expanded source stream for pass errors and to
/// the original source for preprocessor errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A file could not be opened for reading
    CannotOpenFile { path: String },
    /// A file could not be created or written
    CannotCreateFile { path: String },
    /// A stale artifact could not be deleted
    CannotDeleteFile { path: String },

    /// A macro name exceeds the maximum length
    MacroNameTooLong { line: usize },
    /// A macro name collides with a register name
    MacroNameIsRegister { line: usize },
    /// A macro name collides with an operation name
    MacroNameIsOperation { line: usize },
    /// A macro name collides with a directive name
    MacroNameIsDirective { line: usize },
    /// A `mcro` line carries no macro name
    MissingMacroName { line: usize },
    /// A `mcro` line carries text after the macro name
    McroExtraneousText { line: usize },
    /// An `endmcro` line carries text after the keyword
    EndmcroExtraneousText { line: usize },

    /// A line consists of a label with no statement after it
    SymbolOnly { line: usize },
    /// A comma appears before the first operand or parameter
    IllegalComma { line: usize },
    /// Two commas separated only by whitespace
    ConsecutiveCommas { line: usize },
    /// The leading token is neither an operation nor a directive
    UndefinedOpOrDirective { line: usize },
    /// An operation line carries more commas than operands allow
    ExtraneousComma { line: usize },
    /// An operand expected by the operation is missing
    MissingOperand { line: usize },
    /// Text found after the operands of an operation
    ExtraneousText { line: usize },
    /// An operand fits no addressing mode
    InvalidAddressingMode { line: usize },
    /// The number of operands does not match the operation
    InvalidOperandCount { line: usize },
    /// The operand addressing modes are not permitted for the operation
    InvalidOperandModes { line: usize },
    /// A directive line carries no parameters
    DirectiveMissingParams { line: usize },
    /// A `.data` item is not a valid number
    DataNotNumber { line: usize },
    /// Two `.data` items are not separated by a comma
    DataMissingComma { line: usize },
    /// Text (or a trailing comma) after the last `.data` item
    DataExtraneousText { line: usize },
    /// A `.string` parameter is not a valid quoted string
    InvalidStringLiteral { line: usize },
    /// A `.entry` directive carries no symbol name
    EntryMissingSymbol { line: usize },
    /// Text found after the `.entry` symbol name
    EntryExtraneousText { line: usize },
    /// A `.extern` directive carries no symbol name
    ExternMissingSymbol { line: usize },
    /// Text found after the `.extern` symbol name
    ExternExtraneousText { line: usize },
    /// A symbol name exceeds the maximum length
    SymbolTooLong { line: usize },
    /// A symbol name collides with a register name
    SymbolIsRegister { line: usize },
    /// A symbol name collides with an operation name
    SymbolIsOperation { line: usize },
    /// A symbol name collides with a directive name
    SymbolIsDirective { line: usize },
    /// A symbol name does not start with an alphabetic character
    SymbolInvalidFirstChar { line: usize },
    /// A symbol name contains a character that is not alphanumeric
    SymbolInvalidChar { line: usize },
    /// A symbol is defined more than once
    SymbolAlreadyExists { line: usize },

    /// A `.entry` symbol does not exist in the symbol table
    EntrySymbolNotFound { line: usize },
    /// A `.entry` symbol was declared `.extern`
    EntryCannotBeExtern { line: usize },
    /// A direct-mode operand names a symbol that was never defined
    SymbolNotFound { line: usize },
}

impl Error {
    /// Whether this error must flip the process exit code.
    ///
    /// Only failures to create output files count; per-file assembly errors
    /// are reported but leave the exit code untouched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CannotCreateFile { .. } | Error::CannotDeleteFile { .. }
        )
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CannotOpenFile { path } => write!(f, "cannot open file {}", path),
            Error::CannotCreateFile { path } => write!(f, "cannot create file {}", path),
            Error::CannotDeleteFile { path } => write!(f, "cannot delete file {}", path),
            Error::MacroNameTooLong { line } => {
                write!(f, "macro name is too long at line {}", line)
            }
            Error::MacroNameIsRegister { line } => {
                write!(f, "macro name cannot be a register name at line {}", line)
            }
            Error::MacroNameIsOperation { line } => {
                write!(f, "macro name cannot be an operation name at line {}", line)
            }
            Error::MacroNameIsDirective { line } => {
                write!(f, "macro name cannot be a directive name at line {}", line)
            }
            Error::MissingMacroName { line } => write!(f, "missing macro name at line {}", line),
            Error::McroExtraneousText { line } => {
                write!(f, "extraneous text after mcro at line {}", line)
            }
            Error::EndmcroExtraneousText { line } => {
                write!(f, "extraneous text after endmcro at line {}", line)
            }
            Error::SymbolOnly { line } => {
                write!(f, "only a label is provided at line {}", line)
            }
            Error::IllegalComma { line } => write!(f, "illegal comma at line {}", line),
            Error::ConsecutiveCommas { line } => write!(f, "consecutive commas at line {}", line),
            Error::UndefinedOpOrDirective { line } => {
                write!(f, "undefined operation or directive at line {}", line)
            }
            Error::ExtraneousComma { line } => write!(f, "extraneous comma at line {}", line),
            Error::MissingOperand { line } => write!(f, "missing operand at line {}", line),
            Error::ExtraneousText { line } => {
                write!(f, "extraneous text after operation at line {}", line)
            }
            Error::InvalidAddressingMode { line } => {
                write!(f, "invalid addressing mode at line {}", line)
            }
            Error::InvalidOperandCount { line } => {
                write!(f, "invalid number of operands at line {}", line)
            }
            Error::InvalidOperandModes { line } => {
                write!(f, "invalid addressing mode combination at line {}", line)
            }
            Error::DirectiveMissingParams { line } => {
                write!(f, "directive missing parameters at line {}", line)
            }
            Error::DataNotNumber { line } => {
                write!(f, ".data argument is not a valid number at line {}", line)
            }
            Error::DataMissingComma { line } => write!(f, ".data missing comma at line {}", line),
            Error::DataExtraneousText { line } => {
                write!(f, "extraneous text after .data argument at line {}", line)
            }
            Error::InvalidStringLiteral { line } => {
                write!(f, ".string argument is not a valid string at line {}", line)
            }
            Error::EntryMissingSymbol { line } => {
                write!(f, ".entry missing symbol at line {}", line)
            }
            Error::EntryExtraneousText { line } => {
                write!(f, "extraneous text after .entry argument at line {}", line)
            }
            Error::ExternMissingSymbol { line } => {
                write!(f, ".extern missing symbol at line {}", line)
            }
            Error::ExternExtraneousText { line } => {
                write!(f, "extraneous text after .extern argument at line {}", line)
            }
            Error::SymbolTooLong { line } => write!(f, "symbol name is too long at line {}", line),
            Error::SymbolIsRegister { line } => {
                write!(f, "symbol name cannot be a register name at line {}", line)
            }
            Error::SymbolIsOperation { line } => {
                write!(f, "symbol name cannot be an operation name at line {}", line)
            }
            Error::SymbolIsDirective { line } => {
                write!(f, "symbol name cannot be a directive name at line {}", line)
            }
            Error::SymbolInvalidFirstChar { line } => write!(
                f,
                "symbol name must start with an alphabetic character at line {}",
                line
            ),
            Error::SymbolInvalidChar { line } => write!(
                f,
                "symbol name contains an invalid character at line {}",
                line
            ),
            Error::SymbolAlreadyExists { line } => {
                write!(f, "symbol already defined at line {}", line)
            }
            Error::EntrySymbolNotFound { line } => {
                write!(f, "entry symbol not found at line {}", line)
            }
            Error::EntryCannotBeExtern { line } => write!(
                f,
                "symbol marked as .entry cannot also be .extern at line {}",
                line
            ),
            Error::SymbolNotFound { line } => write!(f, "symbol not found at line {}", line),
        }
    }
}
