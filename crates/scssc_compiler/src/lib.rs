//! SCSS-to-CSS compiler.
//!
//! The pipeline: sources are preprocessed into line-indexed text, split
//! into blocks, walked by the block compiler (which evaluates the
//! expression language against per-rule contexts), resolved for `@extend`,
//! ordered, printed and post-processed.
//!
//! ```
//! use scssc_compiler::Compiler;
//! use scssc_config::Config;
//!
//! let mut compiler = Compiler::new(Config::default());
//! compiler.set_option("compress", 0);
//! let css = compiler.compile_string("a { color: #f00; }").unwrap();
//! assert_eq!(css, "a {\n  color: red;\n}\n");
//! ```

pub mod blocks;
mod calculator;
pub mod colors;
mod engine;
mod extend;
pub mod functions;
mod output;
pub mod preprocess;
pub mod rule;
pub mod scanner;
pub mod units;
pub mod value;

pub use engine::Compiler;
pub use functions::assets::AssetBackend;
pub use value::Value;

use scssc_config::Config;
use scssc_shared::errors::ScssResult;

/// Compiles one SCSS string with default configuration and options
/// (compressed output).
pub fn compile_string(input: &str) -> ScssResult<String> {
    Compiler::new(Config::default()).compile_string(input)
}
