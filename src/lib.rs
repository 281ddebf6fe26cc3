//! # splain: explain pipe-chained log search queries
//!
//! > **Read the query. Never run it.**
//!
//! splain takes a query in a pipe-chained, command-oriented search language
//! and produces a fixed-section Markdown explanation plus correctness and
//! performance warnings. Extraction is lenient: unknown syntax degrades to
//! placeholders instead of errors.
//!
//! ## Quick Example
//!
//! ```
//! let doc = splain::explain("index=main earliest=-24h | stats count BY host | table host, count");
//! assert!(doc.contains("### Validation Result"));
//! ```
//!
//! ## Pipeline
//!
//! | Stage      | Module        | Output                          |
//! |------------|---------------|---------------------------------|
//! | Segment    | [`parser`]    | [`ast::Pipeline`]               |
//! | Classify   | [`intent`]    | intent label                    |
//! | Summarize  | [`summary`]   | one sentence                    |
//! | Validate   | [`validator`] | [`validator::Warning`] list     |
//! | Render     | [`render`]    | nine-section Markdown           |
//! | Orchestrate| [`engine`]    | [`engine::Explanation`]         |

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod intent;
pub mod parser;
pub mod render;
pub mod store;
pub mod summary;
pub mod validator;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::{Config, OutputFormat};
    pub use crate::engine::{CommandEngine, EngineKind, ExplainEngine, Explainer, Explanation};
    pub use crate::error::*;
    pub use crate::parser::parse;
    pub use crate::validator::{validate, Warning};
}

/// Parse query text into its structural model.
///
/// # Example
///
/// ```
/// let p = splain::parse("index=web | join host [search index=dns | stats count]");
/// assert_eq!(p.operations.joins[0].subsearch, "search index=dns | stats count");
/// ```
pub fn parse(input: &str) -> ast::Pipeline {
    parser::parse(input)
}

/// Explain a query with the rule-based engine and return the document.
pub fn explain(input: &str) -> String {
    engine::Explainer::default().explain_markdown(input)
}
