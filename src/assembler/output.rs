//! Artifact naming and rendering
//!
//! A successful assembly of `prog.as` produces `prog.ob` (always),
//! `prog.ent` (when at least one `.entry` was seen) and `prog.ext` (when at
//! least one `.extern` was seen), plus the intermediate `prog.am` expanded
//! stream that the passes consume.

use super::encoding;
use super::Context;

/// The file kinds the assembler reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Source,
    Expanded,
    Object,
    Entries,
    Externals,
}

impl FileKind {
    /// The extension appended to the source base name
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Source => ".as",
            FileKind::Expanded => ".am",
            FileKind::Object => ".ob",
            FileKind::Entries => ".ent",
            FileKind::Externals => ".ext",
        }
    }
}

/// Build the file name for one artifact of `base_name`
pub fn artifact_name(base_name: &str, kind: FileKind) -> String {
    format!("{}{}", base_name, kind.extension())
}

/// Render the object artifact: the final instruction and data counts,
/// followed by one base-64 line per code word and then per data word
pub fn render_object(ctx: &Context) -> String {
    let mut out = format!("{}\t{}\n", ctx.ic, ctx.dc);
    for &word in ctx.code.iter().chain(ctx.data.iter()) {
        out.push_str(&encoding::to_base64(word));
        out.push('\n');
    }
    out
}

/// Render the entries artifact: every entry symbol with its final address,
/// in symbol-table order. `None` when no `.entry` directive was seen.
pub fn render_entries(ctx: &Context) -> Option<String> {
    if !ctx.entry_exists {
        return None;
    }
    let mut out = String::new();
    for symbol in ctx.symbols.iter() {
        if symbol.is_entry {
            out.push_str(&format!("{}\t{}\n", symbol.name, symbol.address));
        }
    }
    Some(out)
}

/// Render the externals artifact: one line per recorded reference to an
/// external symbol, in the order the second pass met them. `None` when no
/// `.extern` directive was seen.
pub fn render_externals(ctx: &Context) -> Option<String> {
    if !ctx.extern_exists {
        return None;
    }
    let mut out = String::new();
    for ext_ref in &ctx.ext_refs {
        out.push_str(&format!("{}\t{}\n", ext_ref.name, ext_ref.address));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::symbols::ExtRef;

    #[test]
    fn artifact_names() {
        assert_eq!(artifact_name("prog", FileKind::Source), "prog.as");
        assert_eq!(artifact_name("prog", FileKind::Expanded), "prog.am");
        assert_eq!(artifact_name("prog", FileKind::Object), "prog.ob");
        assert_eq!(artifact_name("prog", FileKind::Entries), "prog.ent");
        assert_eq!(artifact_name("prog", FileKind::Externals), "prog.ext");
    }

    #[test]
    fn object_lists_code_then_data() {
        let mut ctx = Context::new();
        ctx.append_code(0xA14);
        ctx.append_code(0x190);
        ctx.append_data(7);
        assert_eq!(render_object(&ctx), "2\t1\noU\nGQ\nAH\n");
    }

    #[test]
    fn entries_render_only_when_flagged() {
        let mut ctx = Context::new();
        ctx.symbols.insert("MAIN", 100, false);
        ctx.symbols.get_mut("MAIN").unwrap().is_entry = true;
        assert_eq!(render_entries(&ctx), None);

        ctx.entry_exists = true;
        assert_eq!(render_entries(&ctx).unwrap(), "MAIN\t100\n");
    }

    #[test]
    fn externals_keep_reference_order_and_duplicates() {
        let mut ctx = Context::new();
        ctx.extern_exists = true;
        ctx.ext_refs.push(ExtRef {
            name: "EXT".to_string(),
            address: 101,
        });
        ctx.ext_refs.push(ExtRef {
            name: "EXT".to_string(),
            address: 104,
        });
        assert_eq!(render_externals(&ctx).unwrap(), "EXT\t101\nEXT\t104\n");
    }
}
