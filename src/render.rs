//! Markdown renderer for the rule-based explanation.
//!
//! The nine sections in [`SECTIONS`] are always emitted, once each, in that
//! order. Empty sections carry a placeholder line.

use regex::Regex;
use std::fmt::{self, Write};
use std::sync::LazyLock;

use crate::ast::{Command, Pipeline};
use crate::validator::{self, Warning};
use crate::{intent, parser, summary};

/// Section headings, in output order.
pub const SECTIONS: [&str; 9] = [
    "Overall Description",
    "Intent Summary",
    "Data Source",
    "Base Filters",
    "Operation Steps",
    "Tuning/Threshold Points",
    "False-Positive Considerations",
    "Output Fields",
    "Validation Result",
];

/// Heading of the optional verbatim query block.
pub const INPUT_QUERY: &str = "Input Query";

const NOT_SPECIFIED: &str = "(not specified)";

static RE_TRANSACTION_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(maxspan|maxpause)\s*=\s*([\w.:]+)").expect("valid span pattern")
});
static RE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bspan\s*=\s*([\w.:]+)").expect("valid span pattern"));
static RE_COUNT_AS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcount\s+as\s+\w+").expect("valid count pattern"));

/// Benign activity that commonly trips detections, as pattern/note pairs.
/// Every matching note is rendered.
static FALSE_POSITIVES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"(?i)powershell|psexec|wmic|schtasks",
            "administrative scripts or admin tooling running benign automation",
        ),
        (
            r"(?i)sqlmap|OR 1=1|UNION",
            "vulnerability scans or QA test traffic",
        ),
        (
            r"(?i)7z|invoke-webrequest|wget|curl",
            "backup or log-collection jobs that archive and upload data",
        ),
    ]
    .into_iter()
    .map(|(p, note)| (Regex::new(p).expect("valid false-positive pattern"), note))
    .collect()
});

const DEFAULT_FALSE_POSITIVE: &str = "possible confusion with routine automation/batch jobs";

/// Renders a [`Pipeline`] into the fixed-section document.
pub struct Renderer {
    buffer: String,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Render the document. `text` is the raw query the pipeline came from.
    pub fn render(mut self, pipeline: &Pipeline, text: &str) -> Result<String, fmt::Error> {
        let warnings = validator::validate(pipeline);
        let bodies: [Vec<String>; 9] = [
            vec![summary::summarize(pipeline, text)],
            vec![intent::classify(text).to_string()],
            data_source(pipeline),
            base_filters(pipeline),
            operation_steps(pipeline),
            tuning_points(pipeline),
            false_positives(text),
            output_fields(pipeline),
            validation(&warnings),
        ];

        for (i, (heading, lines)) in SECTIONS.iter().zip(bodies.iter()).enumerate() {
            if i > 0 {
                writeln!(self.buffer)?;
            }
            self.section(heading, lines)?;
        }
        Ok(self.buffer)
    }

    fn section(&mut self, heading: &str, lines: &[String]) -> fmt::Result {
        writeln!(self.buffer, "### {}", heading)?;
        for line in lines {
            writeln!(self.buffer, "- {}", line)?;
        }
        Ok(())
    }
}

/// Render with a fresh [`Renderer`].
pub fn render(pipeline: &Pipeline, text: &str) -> Result<String, fmt::Error> {
    Renderer::new().render(pipeline, text)
}

/// `<!-- engine=RULE; model=m; error=e -->`
///
/// Values are flattened to one line and cannot close the comment early.
pub fn metadata_header(engine: &str, model: &str, error: Option<&str>) -> String {
    let model = comment_safe(model);
    match error {
        Some(e) => format!(
            "<!-- engine={}; model={}; error={} -->\n",
            engine,
            model,
            comment_safe(e)
        ),
        None => format!("<!-- engine={}; model={} -->\n", engine, model),
    }
}

fn comment_safe(value: &str) -> String {
    let mut flat = value.split_whitespace().collect::<Vec<_>>().join(" ");
    while flat.contains("--") {
        flat = flat.replace("--", "- -");
    }
    flat
}

/// Verbatim block holding the original query.
pub fn input_query_block(text: &str) -> String {
    format!("### {}\n```spl\n{}\n```\n\n", INPUT_QUERY, text)
}

fn or_placeholder(lines: Vec<String>, placeholder: &str) -> Vec<String> {
    if lines.is_empty() {
        vec![placeholder.to_string()]
    } else {
        lines
    }
}

fn data_source(pipeline: &Pipeline) -> Vec<String> {
    let ov = &pipeline.overview;
    let join = |set: &std::collections::BTreeSet<String>| {
        if set.is_empty() {
            NOT_SPECIFIED.to_string()
        } else {
            set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
        }
    };
    let window = if ov.time_window.is_unbounded() {
        NOT_SPECIFIED.to_string()
    } else {
        ov.time_window.to_string()
    };
    vec![
        format!("index: {}", join(&ov.indexes)),
        format!("sourcetype: {}", join(&ov.sourcetypes)),
        format!("time range: {}", window),
    ]
}

fn base_filters(pipeline: &Pipeline) -> Vec<String> {
    let ops = &pipeline.operations;
    let mut lines = Vec::new();
    let terms = parser::base_terms(&pipeline.base);
    if !terms.is_empty() {
        lines.push(terms);
    }
    if let Some(first) = ops.searches.first() {
        lines.push(format!("search {}", first));
    }
    lines.extend(ops.wheres.iter().map(|w| format!("where {}", w)));
    or_placeholder(lines, "(no search terms/where specified)")
}

fn operation_steps(pipeline: &Pipeline) -> Vec<String> {
    let ops = &pipeline.operations;
    let lines = Command::PRECEDENCE
        .iter()
        .chain(std::iter::once(&Command::Other))
        .flat_map(|cmd| {
            ops.entries(*cmd)
                .into_iter()
                .map(move |entry| format!("**{}**: {}", cmd.label(), entry))
        })
        .collect();
    or_placeholder(lines, "(no operations detected)")
}

fn tuning_points(pipeline: &Pipeline) -> Vec<String> {
    let ops = &pipeline.operations;
    let mut lines = Vec::new();

    for t in &ops.transactions {
        for cap in RE_TRANSACTION_SPAN.captures_iter(t) {
            lines.push(format!(
                "transaction {}={} (adjust to your environment)",
                cap[1].to_ascii_lowercase(),
                &cap[2]
            ));
        }
    }
    for t in &ops.timecharts {
        if let Some(cap) = RE_SPAN.captures(t) {
            lines.push(format!("timechart span={} (bucket size)", &cap[1]));
        }
    }
    for w in ops.wheres.iter().filter(|w| validator::has_numeric_threshold(w)) {
        lines.push(format!("where threshold: {}", w));
    }
    for s in ops.stats.iter().filter(|s| RE_COUNT_AS.is_match(s)) {
        lines.push(format!("count threshold from stats: {}", s));
    }
    or_placeholder(lines, "(no explicit thresholds)")
}

fn false_positives(text: &str) -> Vec<String> {
    let notes = FALSE_POSITIVES
        .iter()
        .filter(|(re, _)| re.is_match(text))
        .map(|(_, note)| note.to_string())
        .collect();
    or_placeholder(notes, DEFAULT_FALSE_POSITIVE)
}

fn output_fields(pipeline: &Pipeline) -> Vec<String> {
    match pipeline.operations.outputs.first() {
        Some(fields) => vec![fields.clone()],
        None => vec!["(unspecified: no table/fields)".to_string()],
    }
}

fn validation(warnings: &[Warning]) -> Vec<String> {
    or_placeholder(
        warnings.iter().map(|w| w.to_string()).collect(),
        validator::NO_WARNINGS,
    )
}
