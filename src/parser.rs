//! Lenient segmenter and field extractor.
//!
//! Splits raw query text into pipe segments and tags each one with its
//! [`Command`], then scans the whole text for data-source and time-window
//! tokens. Parsing never fails: anything unrecognized lands in
//! [`Operations::others`].
//!
//! # Segment layout
//!
//! ```text
//! index=main earliest=-24h | stats count BY host | join host [search x | head 1]
//! ──────────┬───────────── ──────────┬───────── ───────────────┬────────────────
//!           │                        │                         └── join: fields + subsearch
//!           │                        └── keyword + body
//!           └── base segment (not a command)
//! ```
//!
//! Pipes only split at bracket depth zero and outside double quotes, so a
//! subsearch or a quoted regex alternation stays inside its segment.

use nom::{
    bytes::complete::take_till1,
    character::complete::multispace0,
    sequence::preceded,
    IResult,
};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::ast::*;

static RE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bindex\s*=\s*"?([\w:.@+\-]+)"?"#).expect("valid index pattern")
});
static RE_SOURCETYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bsourcetype\s*=\s*"?([\w:.@+\-]+)"?"#).expect("valid sourcetype pattern")
});
static RE_EARLIEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bearliest\s*=\s*"?([\w:.@+\-]+)"?"#).expect("valid earliest pattern")
});
static RE_LATEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\blatest\s*=\s*"?([\w:.@+\-]+)"?"#).expect("valid latest pattern")
});
/// A group left holding only boolean operators once tokens are stripped.
static RE_EMPTY_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*(?:(?:OR|AND)\s*)*\)").expect("valid empty group pattern")
});

/// Parse raw query text into a [`Pipeline`].
///
/// # Example
///
/// ```
/// use splain::parser::parse;
///
/// let p = parse("index=main | stats count BY host");
/// assert!(p.overview.indexes.contains("main"));
/// assert_eq!(p.operations.stats, vec!["count BY host"]);
/// ```
pub fn parse(input: &str) -> Pipeline {
    let text = input.trim();
    let overview = extract_overview(text);

    let mut parts = split_segments(text).into_iter();
    let base = parts.next().map(normalize).unwrap_or_default();

    let mut operations = Operations::default();
    let mut segments = Vec::new();
    for raw in parts {
        let Some(segment) = classify(raw) else {
            continue;
        };
        tracing::debug!(command = %segment.command, body = %segment.body, "segment");
        record(&mut operations, &segment);
        segments.push(segment);
    }

    Pipeline {
        base,
        overview,
        operations,
        segments,
    }
}

/// Scan the whole text for `index=`, `sourcetype=`, `earliest=` and `latest=`.
///
/// Every index and sourcetype is collected; only the first earliest and the
/// first latest are kept.
pub fn extract_overview(text: &str) -> Overview {
    let collect = |re: &Regex| -> BTreeSet<String> {
        re.captures_iter(text)
            .map(|c| c[1].to_string())
            .collect()
    };
    let first = |re: &Regex| re.captures(text).map(|c| c[1].to_string());

    Overview {
        indexes: collect(&*RE_INDEX),
        sourcetypes: collect(&*RE_SOURCETYPE),
        time_window: TimeWindow {
            earliest: first(&*RE_EARLIEST),
            latest: first(&*RE_LATEST),
        },
    }
}

/// Free search terms of the base segment, with data-source and time tokens removed.
pub fn base_terms(base: &str) -> String {
    let mut s = base.to_string();
    for re in [&*RE_INDEX, &*RE_SOURCETYPE, &*RE_EARLIEST, &*RE_LATEST, &*RE_EMPTY_GROUP] {
        s = re.replace_all(&s, " ").into_owned();
    }
    let s = normalize(&s);
    let s = s.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());
    let s = match command_head(s) {
        Ok((rest, head)) if head.eq_ignore_ascii_case("search") => rest,
        _ => s,
    };
    trim_operators(s)
}

/// Drop boolean operators left dangling at either end.
fn trim_operators(s: &str) -> String {
    let is_operator = |w: &&str| w.eq_ignore_ascii_case("or") || w.eq_ignore_ascii_case("and");
    let mut words: Vec<&str> = s.split_whitespace().collect();
    while words.first().is_some_and(is_operator) {
        words.remove(0);
    }
    while words.last().is_some_and(is_operator) {
        words.pop();
    }
    words.join(" ")
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First whitespace-delimited token.
fn command_head(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, take_till1(|c: char| c.is_whitespace()))(input)
}

/// Classify one trailing segment. Blank segments yield `None`.
fn classify(raw: &str) -> Option<Segment> {
    let text = raw.trim();
    let (rest, head) = command_head(text).ok()?;
    let keyword = head.to_ascii_lowercase();
    Some(Segment {
        command: Command::from_keyword(&keyword),
        keyword,
        body: normalize(rest),
        text: text.to_string(),
    })
}

fn record(ops: &mut Operations, segment: &Segment) {
    let body = segment.body.clone();
    match segment.command {
        Command::Search => ops.searches.push(body),
        Command::Eval => ops.evals.push(body),
        Command::Transaction => ops.transactions.push(body),
        Command::Stats => ops.stats.push(body),
        Command::Timechart => ops.timecharts.push(body),
        Command::Where => ops.wheres.push(body),
        Command::Join => ops.joins.push(split_join(&segment.body)),
        Command::Lookup => ops.lookups.push(body),
        Command::Rex => ops.rexes.push(body),
        Command::Sort => ops.sorts.push(body),
        Command::Dedup => ops.dedups.push(body),
        Command::TableOrFields => ops.outputs.push(body),
        Command::Other => ops.others.push(segment.text.clone()),
    }
}

/// Split a join body into its field list and bracketed subsearch.
///
/// The closing bracket is found by depth counting, so nested subsearches are
/// captured whole. An unclosed bracket takes the rest of the body.
pub fn split_join(body: &str) -> JoinClause {
    let Some(open) = find_unquoted(body, '[') else {
        return JoinClause {
            fields: normalize(body),
            subsearch: String::new(),
        };
    };

    let inner_start = open + 1;
    let mut depth = 1usize;
    let mut end = body.len();
    let mut scan = Scanner::default();
    for (i, c) in body[inner_start..].char_indices() {
        match scan.step(c) {
            Some('[') => depth += 1,
            Some(']') => {
                depth -= 1;
                if depth == 0 {
                    end = inner_start + i;
                    break;
                }
            }
            _ => {}
        }
    }

    JoinClause {
        fields: normalize(&body[..open]),
        subsearch: normalize(&body[inner_start..end]),
    }
}

fn find_unquoted(s: &str, target: char) -> Option<usize> {
    let mut scan = Scanner::default();
    s.char_indices()
        .find(|(_, c)| scan.step(*c) == Some(target))
        .map(|(i, _)| i)
}

/// Split on top-level pipes.
///
/// Falls back to ignoring brackets, then quotes, when the text is unbalanced,
/// so a stray `[` or `"` cannot swallow the rest of the query.
fn split_segments(text: &str) -> Vec<&str> {
    split_pipes(text, true, true)
        .or_else(|| split_pipes(text, false, true))
        .or_else(|| split_pipes(text, false, false))
        .unwrap_or_else(|| text.split('|').collect())
}

fn split_pipes(text: &str, brackets: bool, quotes: bool) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut scan = Scanner {
        quotes,
        ..Scanner::default()
    };

    for (i, c) in text.char_indices() {
        match scan.step(c) {
            Some('[') if brackets => depth += 1,
            Some(']') if brackets => depth = depth.checked_sub(1)?,
            Some('|') if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 || scan.in_quote {
        return None;
    }
    parts.push(&text[start..]);
    Some(parts)
}

/// Tracks double quotes and backslash escapes one character at a time.
///
/// `step` returns the character when it is structural (outside quotes and
/// not escaped), `None` otherwise.
struct Scanner {
    quotes: bool,
    in_quote: bool,
    escaped: bool,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            quotes: true,
            in_quote: false,
            escaped: false,
        }
    }
}

impl Scanner {
    fn step(&mut self, c: char) -> Option<char> {
        if self.escaped {
            self.escaped = false;
            return None;
        }
        match c {
            '\\' => {
                self.escaped = true;
                None
            }
            '"' if self.quotes => {
                self.in_quote = !self.in_quote;
                None
            }
            _ if self.in_quote => None,
            _ => Some(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let p = parse("");
        assert_eq!(p.base, "");
        assert!(p.operations.is_empty());
        assert!(!p.overview.has_data_source());
        assert!(p.overview.time_window.is_unbounded());
    }

    #[test]
    fn test_base_only() {
        let p = parse("index=main error");
        assert_eq!(p.base, "index=main error");
        assert!(p.segments.is_empty());
        assert!(p.operations.is_empty());
    }

    #[test]
    fn test_segment_bodies_are_normalized() {
        let p = parse("index=main |  stats   count\n  BY host |eval x = 1");
        assert_eq!(p.operations.stats, vec!["count BY host"]);
        assert_eq!(p.operations.evals, vec!["x = 1"]);
        assert_eq!(p.segments[0].command, Command::Stats);
        assert_eq!(p.segments[1].command, Command::Eval);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let p = parse("index=a | STATS count | Table host");
        assert_eq!(p.operations.stats, vec!["count"]);
        assert_eq!(p.operations.outputs, vec!["host"]);
    }

    #[test]
    fn test_category_order_preserved() {
        let p = parse("x | eval a=1 | stats count | eval b=2");
        assert_eq!(p.operations.evals, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_unknown_command_goes_to_others_verbatim() {
        let p = parse("index=main | tstats  count where index=main | head 10");
        assert_eq!(
            p.operations.others,
            vec!["tstats  count where index=main", "head 10"]
        );
        assert_eq!(p.segments[0].command, Command::Other);
        assert_eq!(p.segments[0].keyword, "tstats");
    }

    #[test]
    fn test_empty_segments_skipped() {
        let p = parse("index=main | | stats count |");
        assert_eq!(p.segments.len(), 1);
        assert_eq!(p.operations.stats, vec!["count"]);
    }

    #[test]
    fn test_join_with_nested_pipe() {
        let p = parse("index=a | join host,user [search foo | stats count] | table host");
        assert_eq!(p.operations.joins.len(), 1);
        assert_eq!(p.operations.joins[0].fields, "host,user");
        assert_eq!(p.operations.joins[0].subsearch, "search foo | stats count");
        assert_eq!(p.operations.outputs, vec!["host"]);
        // subsearch commands do not leak into the outer pipeline
        assert!(p.operations.stats.is_empty());
        assert!(p.operations.searches.is_empty());
    }

    #[test]
    fn test_join_with_nested_subsearch() {
        let p = parse("x | join id [search a [search b | head 1] | fields id]");
        assert_eq!(
            p.operations.joins[0].subsearch,
            "search a [search b | head 1] | fields id"
        );
    }

    #[test]
    fn test_join_without_bracket() {
        let j = split_join("type=left host");
        assert_eq!(j.fields, "type=left host");
        assert_eq!(j.subsearch, "");
    }

    #[test]
    fn test_join_unclosed_bracket() {
        let j = split_join("host [search foo | stats count");
        assert_eq!(j.fields, "host");
        assert_eq!(j.subsearch, "search foo | stats count");
    }

    #[test]
    fn test_quoted_pipe_does_not_split() {
        let p = parse(r#"index=web | rex field=uri "(?<x>UNION|SELECT)" | stats count"#);
        assert_eq!(p.operations.rexes, vec![r#"field=uri "(?<x>UNION|SELECT)""#]);
        assert_eq!(p.operations.stats, vec!["count"]);
        assert!(p.operations.others.is_empty());
    }

    #[test]
    fn test_stray_bracket_degrades() {
        let p = parse("index=a foo[ | stats count");
        assert_eq!(p.operations.stats, vec!["count"]);
    }

    #[test]
    fn test_stray_quote_degrades() {
        let p = parse(r#"index=a "foo | stats count"#);
        assert_eq!(p.operations.stats, vec!["count"]);
    }

    #[test]
    fn test_overview_collects_sources() {
        let o = extract_overview(
            r#"index=main OR index=web sourcetype="web:access" sourcetype=syslog index=main"#,
        );
        assert_eq!(o.indexes.len(), 2);
        assert!(o.indexes.contains("main"));
        assert!(o.indexes.contains("web"));
        assert!(o.sourcetypes.contains("web:access"));
        assert!(o.sourcetypes.contains("syslog"));
    }

    #[test]
    fn test_first_time_bound_wins() {
        let o = extract_overview("earliest=-24h latest=now earliest=-7d@d latest=-1h");
        assert_eq!(o.time_window.earliest.as_deref(), Some("-24h"));
        assert_eq!(o.time_window.latest.as_deref(), Some("now"));
    }

    #[test]
    fn test_time_value_characters() {
        let o = extract_overview("earliest=-7d@d latest=+1h");
        assert_eq!(o.time_window.earliest.as_deref(), Some("-7d@d"));
        assert_eq!(o.time_window.latest.as_deref(), Some("+1h"));
    }

    #[test]
    fn test_embedded_keys_not_matched() {
        let o = extract_overview("_index_earliest=-1h myindex=foo");
        assert!(o.time_window.earliest.is_none());
        assert!(o.indexes.is_empty());
    }

    #[test]
    fn test_base_terms() {
        assert_eq!(
            base_terms(r#"(index=main sourcetype="web:access" earliest=-24h latest=now)"#),
            ""
        );
        assert_eq!(
            base_terms("search index=security EventCode=4625 failed"),
            "EventCode=4625 failed"
        );
    }

    #[test]
    fn test_base_terms_drop_dangling_operators() {
        assert_eq!(base_terms("index=a OR index=b error"), "error");
        assert_eq!(base_terms("error AND index=a"), "error");
        assert_eq!(base_terms("(index=a OR index=b) error"), "error");
        assert_eq!(base_terms("search index=a OR index=b"), "");
        assert_eq!(base_terms("failed OR denied"), "failed OR denied");
    }

    #[test]
    fn test_join_escaped_bracket_not_counted() {
        let p = parse(r"index=a | join host [search uri=\[x | stats count] | table host");
        assert_eq!(p.operations.joins.len(), 1);
        assert_eq!(p.operations.joins[0].fields, "host");
        assert_eq!(p.operations.joins[0].subsearch, r"search uri=\[x | stats count");
        assert_eq!(p.operations.outputs, vec!["host"]);

        let join = split_join(r"host [search a=\] | head 1]");
        assert_eq!(join.subsearch, r"search a=\] | head 1");
    }
}
