// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use std::sync::Arc;

use bracket_pairs_engine::{BracketTokens, BracketsConfiguration, RawBracketsConfiguration};

#[allow(dead_code)]
pub fn brackets() -> Arc<BracketTokens> {
    let raw = RawBracketsConfiguration::new([("(", ")"), ("[", "]"), ("{", "}")]);
    Arc::new(BracketTokens::new(&BracketsConfiguration::new(&raw)).expect("bracket pattern compiles"))
}

/// Source-like text with `functions` functions, each nesting a few levels deep.
#[allow(dead_code)]
pub fn generate_source(functions: usize) -> String {
    let mut source = String::new();
    for idx in 0..functions {
        source.push_str(&format!("fn item_{idx}(a: [u8; 4], b: (u32, u32)) {{\n"));
        source.push_str("    if a[0] > 1 {\n");
        source.push_str(&format!("        call(b.0, [a[1], a[2]], {{ {idx} }});\n"));
        source.push_str("    }\n");
        source.push_str("    let s = \"text with (parens) inside\";\n");
        source.push_str("}\n\n");
    }
    source
}
