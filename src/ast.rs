//! Structural model of a pipe-chained search query.
//!
//! A [`Pipeline`] is what the parser extracts from raw query text: the base
//! segment in front of the first pipe, the data-source [`Overview`], and the
//! [`Operations`] found in the trailing pipe segments. It carries no grammar
//! beyond command keywords.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Leading command keyword of a pipe segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Search,
    Eval,
    Transaction,
    Stats,
    Timechart,
    Where,
    Join,
    Lookup,
    Rex,
    Sort,
    Dedup,
    /// `table` or `fields`.
    TableOrFields,
    /// Any keyword outside the recognized set.
    Other,
}

impl Command {
    /// Recognized keywords with what they do, in documentation order.
    pub const KEYWORDS: [(&'static str, Command, &'static str); 13] = [
        ("search", Command::Search, "Filter events by search terms"),
        ("eval", Command::Eval, "Compute new fields"),
        ("transaction", Command::Transaction, "Group related events"),
        ("stats", Command::Stats, "Aggregate into a table"),
        ("timechart", Command::Timechart, "Aggregate over time buckets"),
        ("where", Command::Where, "Filter by expression"),
        ("lookup", Command::Lookup, "Enrich from a lookup table"),
        ("rex", Command::Rex, "Extract fields with a regex"),
        ("join", Command::Join, "Combine with a subsearch"),
        ("sort", Command::Sort, "Order results"),
        ("dedup", Command::Dedup, "Drop duplicate results"),
        ("table", Command::TableOrFields, "Choose output columns"),
        ("fields", Command::TableOrFields, "Keep or drop fields"),
    ];

    /// Precedence used by the summary and the operation-steps section.
    pub const PRECEDENCE: [Command; 11] = [
        Command::Search,
        Command::Eval,
        Command::Transaction,
        Command::Stats,
        Command::Timechart,
        Command::Join,
        Command::Rex,
        Command::Lookup,
        Command::Sort,
        Command::Dedup,
        Command::TableOrFields,
    ];

    /// Classify a keyword, case-insensitively.
    pub fn from_keyword(word: &str) -> Self {
        let word = word.to_ascii_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(kw, _, _)| *kw == word)
            .map(|(_, cmd, _)| *cmd)
            .unwrap_or(Command::Other)
    }

    /// Short label used in rendered output.
    pub fn label(&self) -> &'static str {
        match self {
            Command::Search => "search",
            Command::Eval => "eval",
            Command::Transaction => "transaction",
            Command::Stats => "stats",
            Command::Timechart => "timechart",
            Command::Where => "where",
            Command::Join => "join",
            Command::Lookup => "lookup",
            Command::Rex => "rex",
            Command::Sort => "sort",
            Command::Dedup => "dedup",
            Command::TableOrFields => "table/fields",
            Command::Other => "other",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One trailing pipe segment, classified once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub command: Command,
    /// Keyword as written (lower-cased).
    pub keyword: String,
    /// Whitespace-normalized arguments after the keyword.
    pub body: String,
    /// The segment text as written, trimmed.
    pub text: String,
}

/// A `join` clause: field list plus the bracketed subsearch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinClause {
    pub fields: String,
    pub subsearch: String,
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "on {} | subsearch: {}", self.fields, self.subsearch)
    }
}

/// Time window; only the first `earliest=`/`latest=` is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

impl TimeWindow {
    pub fn is_unbounded(&self) -> bool {
        self.earliest.is_none() && self.latest.is_none()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(e) = &self.earliest {
            parts.push(format!("earliest={}", e));
        }
        if let Some(l) = &self.latest {
            parts.push(format!("latest={}", l));
        }
        f.write_str(&parts.join(", "))
    }
}

/// Data sources and time window found anywhere in the query text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub indexes: BTreeSet<String>,
    pub sourcetypes: BTreeSet<String>,
    pub time_window: TimeWindow,
}

impl Overview {
    pub fn has_data_source(&self) -> bool {
        !self.indexes.is_empty() || !self.sourcetypes.is_empty()
    }
}

/// Segment bodies grouped by category, each in pipe order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Operations {
    pub searches: Vec<String>,
    pub evals: Vec<String>,
    pub transactions: Vec<String>,
    pub stats: Vec<String>,
    pub timecharts: Vec<String>,
    pub wheres: Vec<String>,
    pub joins: Vec<JoinClause>,
    pub lookups: Vec<String>,
    pub rexes: Vec<String>,
    pub sorts: Vec<String>,
    pub dedups: Vec<String>,
    pub outputs: Vec<String>,
    /// Full text of segments with an unrecognized keyword.
    pub others: Vec<String>,
}

impl Operations {
    /// Number of entries recorded under a category.
    pub fn count(&self, command: Command) -> usize {
        match command {
            Command::Search => self.searches.len(),
            Command::Eval => self.evals.len(),
            Command::Transaction => self.transactions.len(),
            Command::Stats => self.stats.len(),
            Command::Timechart => self.timecharts.len(),
            Command::Where => self.wheres.len(),
            Command::Join => self.joins.len(),
            Command::Lookup => self.lookups.len(),
            Command::Rex => self.rexes.len(),
            Command::Sort => self.sorts.len(),
            Command::Dedup => self.dedups.len(),
            Command::TableOrFields => self.outputs.len(),
            Command::Other => self.others.len(),
        }
    }

    pub fn has(&self, command: Command) -> bool {
        self.count(command) > 0
    }

    /// Entries of a category as display lines.
    pub fn entries(&self, command: Command) -> Vec<String> {
        match command {
            Command::Join => self.joins.iter().map(|j| j.to_string()).collect(),
            Command::Search => self.searches.clone(),
            Command::Eval => self.evals.clone(),
            Command::Transaction => self.transactions.clone(),
            Command::Stats => self.stats.clone(),
            Command::Timechart => self.timecharts.clone(),
            Command::Where => self.wheres.clone(),
            Command::Lookup => self.lookups.clone(),
            Command::Rex => self.rexes.clone(),
            Command::Sort => self.sorts.clone(),
            Command::Dedup => self.dedups.clone(),
            Command::TableOrFields => self.outputs.clone(),
            Command::Other => self.others.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Command::PRECEDENCE
            .iter()
            .chain([Command::Where, Command::Other].iter())
            .all(|c| !self.has(*c))
    }
}

/// Everything extracted from one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    /// Text before the first top-level pipe, whitespace-normalized.
    pub base: String,
    pub overview: Overview,
    pub operations: Operations,
    /// Trailing segments in pipe order.
    pub segments: Vec<Segment>,
}
