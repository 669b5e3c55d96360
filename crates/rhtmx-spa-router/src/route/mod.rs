/// Path template compilation
///
/// - [`pattern`]: template tokenizer
/// - [`parser`]: regex, keys, scores and stringify
/// - [`encoding`]: param percent-encoding

pub mod encoding;
pub mod parser;
pub mod pattern;

pub use parser::{compare_score, ParamKey, PathParser};
pub use pattern::{tokenize_path, PathSegment, PathToken};
