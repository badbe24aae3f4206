//! Pretty-printing assembler diagnostics to the console

use colored::Colorize;

/// Pretty-print an error message to the console
pub fn error(error_message: String) {
    let error_title = "error:".red().bold();
    eprintln!("{} {}", error_title, error_message);
}

/// Pretty-print a warning message tied to a source line to the console
pub fn warning(message: String, line_number: usize) {
    let warning_title = "warning:".yellow().bold();
    eprintln!("{} line {}: {}", warning_title, line_number, message);
}
