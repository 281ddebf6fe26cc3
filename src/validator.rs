//! Correctness and performance warnings.
//!
//! Every check runs on every query; a check contributes at most one
//! [`Warning`]. Output order follows check order.

use regex::Regex;
use std::sync::LazyLock;

use crate::ast::Pipeline;

static RE_EQ_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\s*-?\d").expect("valid threshold pattern"));

/// A triggered check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Warning {
    /// Neither `index` nor `sourcetype` is present.
    NoDataSource,
    /// Neither `earliest` nor `latest` is present.
    UnboundedTimeRange,
    /// A `join` is used.
    JoinAtScale,
    /// A `transaction` is used.
    TransactionCost,
    /// No `table` or `fields` command.
    NoOutputFields,
    /// `where` clauses exist but none compares against a number.
    NoNumericThreshold,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Warning::NoDataSource => "data source unspecified (no index/sourcetype)",
            Warning::UnboundedTimeRange => {
                "unbounded time range (no earliest/latest): the search may scan all data"
            }
            Warning::JoinAtScale => {
                "join may degrade at scale: check key consistency and filter both sides first"
            }
            Warning::TransactionCost => {
                "transaction is resource-intensive: consider stats-based correlation instead"
            }
            Warning::NoOutputFields => {
                "output fields unspecified (no table/fields): results are hard to read"
            }
            Warning::NoNumericThreshold => {
                "no numeric threshold in filter condition: detection criteria may be unclear"
            }
        };
        f.write_str(msg)
    }
}

/// Line rendered when no check fires.
pub const NO_WARNINGS: &str = "no special warnings";

/// True when a clause compares against a number: `>=`, `<=`, `>`, `<`, or `= <number>`.
pub fn has_numeric_threshold(clause: &str) -> bool {
    clause.contains(['<', '>']) || RE_EQ_NUMBER.is_match(clause)
}

/// Run all checks.
pub fn validate(pipeline: &Pipeline) -> Vec<Warning> {
    let ov = &pipeline.overview;
    let ops = &pipeline.operations;

    let checks = [
        (!ov.has_data_source(), Warning::NoDataSource),
        (ov.time_window.is_unbounded(), Warning::UnboundedTimeRange),
        (!ops.joins.is_empty(), Warning::JoinAtScale),
        (!ops.transactions.is_empty(), Warning::TransactionCost),
        (ops.outputs.is_empty(), Warning::NoOutputFields),
        (
            !ops.wheres.is_empty() && !ops.wheres.iter().any(|w| has_numeric_threshold(w)),
            Warning::NoNumericThreshold,
        ),
    ];

    checks
        .into_iter()
        .filter(|(fired, _)| *fired)
        .map(|(_, warning)| {
            tracing::debug!(%warning, "check fired");
            warning
        })
        .collect()
}
