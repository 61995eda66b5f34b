//! Delimited-text format handling
//!
//! Knows how to turn one line of a delimited file into fields, and how to
//! pick the delimiter for a file. Everything about *where* a line lives in
//! the file belongs to the loader.

mod model;
mod parser;

pub use model::Delimiter;
pub use parser::{detect_delimiter, parse_row};
