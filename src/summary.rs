//! One-sentence summary of a parsed query.

use crate::ast::{Command, Overview, Pipeline};
use crate::intent;

/// Phrase used when the query names no index or sourcetype.
pub const NO_DATA_SOURCE: &str = "an unspecified data source";

/// Step used when no command category has entries.
pub const SIMPLE_FILTER: &str = "simple filter/basic search";

/// Describe what a category contributes to the query.
pub fn step_label(command: Command) -> &'static str {
    match command {
        Command::Search => "apply base search terms",
        Command::Eval => "eval computation",
        Command::Transaction => "correlate events with transaction",
        Command::Stats => "stats aggregation",
        Command::Timechart => "timechart time-series aggregation",
        Command::Join => "join with subsearch",
        Command::Rex => "rex regex extraction",
        Command::Lookup => "lookup enrichment",
        Command::Sort => "sort ordering",
        Command::Dedup => "dedup duplicate removal",
        Command::TableOrFields => "choose output fields with table/fields",
        Command::Where => "where filtering",
        Command::Other => "other commands",
    }
}

/// Data-source clause: `index=a,b / sourcetype=x`, sorted and deduplicated.
pub fn data_source_clause(overview: &Overview) -> String {
    let mut parts = Vec::new();
    if !overview.indexes.is_empty() {
        let list: Vec<&str> = overview.indexes.iter().map(String::as_str).collect();
        parts.push(format!("index={}", list.join(",")));
    }
    if !overview.sourcetypes.is_empty() {
        let list: Vec<&str> = overview.sourcetypes.iter().map(String::as_str).collect();
        parts.push(format!("sourcetype={}", list.join(",")));
    }
    if parts.is_empty() {
        NO_DATA_SOURCE.to_string()
    } else {
        parts.join(" / ")
    }
}

/// Steps in fixed precedence order, independent of pipe order.
pub fn steps(pipeline: &Pipeline) -> Vec<&'static str> {
    let steps: Vec<&'static str> = Command::PRECEDENCE
        .iter()
        .filter(|c| pipeline.operations.has(**c))
        .map(|c| step_label(*c))
        .collect();
    if steps.is_empty() {
        vec![SIMPLE_FILTER]
    } else {
        steps
    }
}

/// Compose the summary sentence.
pub fn summarize(pipeline: &Pipeline, text: &str) -> String {
    format!(
        "This query reads {} and performs {}. Intent: {}",
        data_source_clause(&pipeline.overview),
        steps(pipeline).join(" → "),
        intent::classify(text)
    )
}
