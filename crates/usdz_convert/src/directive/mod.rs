//! Directive surface: tokenizing, parsing and usage text.
//!
//! Directives come from the command line, from `-f` files, or from a file
//! list plus suffix options. All three end up as a [`ConversionRequest`].

mod files;
mod parser;
pub mod tokenizer;
pub mod usage;

pub use files::arguments_from_files;
pub use parser::{parse_arguments, ConversionRequest, LoopMode, ParseOutcome};
pub use tokenizer::{expand_arguments, read_directive_file, tokenize_directives};
