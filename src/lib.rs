//! A two-pass assembler for a small 12-bit instruction-set architecture,
//! featuring:
//! - a macro preprocessor
//! - symbol resolution across two passes
//! - base-64 object output with entry and external listings

pub mod assembler;
pub mod logging;
