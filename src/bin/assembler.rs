use std::env;

use asm12::assembler;
use asm12::logging::error;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        error("not enough parameters".to_string());
        eprintln!("Usage: {} <source> [<source> ...]", args[0]);
        std::process::exit(1);
    }

    // Each base name is assembled independently; one file failing does not
    // stop the rest. Only file-creation failures flip the exit code.
    let mut exit_code = 0;
    for base_name in &args[1..] {
        if let Err(errors) = assembler::assemble_from_file(base_name) {
            for e in &errors {
                error(format!("{}: {}", base_name, e));
            }
            if errors.iter().any(|e| e.is_fatal()) {
                exit_code = 1;
            }
        }
    }

    std::process::exit(exit_code);
}
