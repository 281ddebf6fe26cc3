use pretty_assertions::assert_eq;
use splain::engine::{EngineKind, Explainer};
use splain::prelude::*;
use splain::render::{self, SECTIONS};
use splain::summary;

const SQLI_QUERY: &str = r#"index=main sourcetype="web:access" earliest=-24h latest=now | rex field=uri "(?i)(?<sqlinj>UNION|SELECT)" | stats count AS total BY src_ip | where total>=5 | table _time, src_ip, total"#;

/// Pull the verbatim query back out of a rendered document.
fn input_query(document: &str) -> Option<&str> {
    let start = document.find("### Input Query\n```spl\n")? + "### Input Query\n```spl\n".len();
    let len = document[start..].find("\n```\n")?;
    Some(&document[start..start + len])
}

fn rule_doc(q: &str) -> String {
    render::render(&parse(q), q).unwrap()
}

#[test]
fn test_no_keywords_means_empty_operations() {
    for q in ["", "error", "index=main failed login", "| ", "foo | bar baz | qux"] {
        let p = parse(q);
        for cmd in Command::PRECEDENCE {
            assert_eq!(p.operations.count(cmd), 0, "{:?} in {:?}", cmd, q);
        }
        assert!(p.operations.wheres.is_empty());
        assert_eq!(summary::steps(&p), vec![summary::SIMPLE_FILTER]);
    }
}

#[test]
fn test_sections_present_once_in_order() {
    let queries = [
        "",
        "error",
        SQLI_QUERY,
        "index=a | join host [search b | stats count] | transaction user maxspan=1m",
        r#"index=x | eval a="[" | table a"#,
    ];
    for q in queries {
        let doc = rule_doc(q);
        let mut last = None;
        for heading in SECTIONS {
            let marker = format!("### {}\n", heading);
            assert_eq!(doc.matches(&marker).count(), 1, "{} in {:?}", heading, q);
            let pos = doc.find(&marker).unwrap();
            if let Some(prev) = last {
                assert!(pos > prev, "{} out of order", heading);
            }
            last = Some(pos);
        }
    }
}

#[test]
fn test_adding_earliest_removes_only_time_warning() {
    let without = "index=main | join host [search x] | stats count";
    let with = "index=main earliest=-24h | join host [search x] | stats count";

    let before = validate(&parse(without));
    let after = validate(&parse(with));

    assert!(before.contains(&Warning::UnboundedTimeRange));
    assert!(!after.contains(&Warning::UnboundedTimeRange));
    let rest: Vec<Warning> = before
        .into_iter()
        .filter(|w| *w != Warning::UnboundedTimeRange)
        .collect();
    assert_eq!(rest, after);
}

#[test]
fn test_join_subsearch_with_nested_pipe() {
    let p = parse("index=a | join host,user [search foo | stats count]");
    assert_eq!(p.operations.joins.len(), 1);
    assert_eq!(p.operations.joins[0].fields, "host,user");
    assert_eq!(p.operations.joins[0].subsearch, "search foo | stats count");
}

#[test]
fn test_rule_path_is_deterministic() {
    let explainer = Explainer::default();
    assert_eq!(explainer.explain(SQLI_QUERY), explainer.explain(SQLI_QUERY));
    assert_eq!(splain::explain(SQLI_QUERY), splain::explain(SQLI_QUERY));
}

#[test]
fn test_sqli_scenario() {
    let p = parse(SQLI_QUERY);
    assert!(p.overview.indexes.contains("main"));
    assert!(p.overview.sourcetypes.contains("web:access"));
    assert_eq!(p.overview.time_window.earliest.as_deref(), Some("-24h"));
    assert_eq!(p.overview.time_window.latest.as_deref(), Some("now"));
    assert_eq!(p.operations.rexes, vec![r#"field=uri "(?i)(?<sqlinj>UNION|SELECT)""#]);
    assert_eq!(p.operations.stats, vec!["count AS total BY src_ip"]);
    assert_eq!(p.operations.wheres, vec!["total>=5"]);
    assert_eq!(p.operations.outputs, vec!["_time, src_ip, total"]);
    assert!(p.operations.others.is_empty());

    assert!(validate(&p).is_empty());

    let doc = rule_doc(SQLI_QUERY);
    assert!(doc.contains("### Validation Result\n- no special warnings\n"));
    assert!(doc.contains("### Output Fields\n- _time, src_ip, total\n"));
    assert!(doc.contains("### Intent Summary\n- SQL injection / authentication bypass attempt detection\n"));
    assert!(doc.contains("- where threshold: total>=5"));
    assert!(doc.contains("- vulnerability scans or QA test traffic"));
}

#[test]
fn test_reparsing_input_block_round_trips() {
    let queries = [
        SQLI_QUERY,
        "index=a | join host,user [search foo | stats count] | table host",
        "  search error\n| head 5  ",
        "",
    ];
    for q in queries {
        let doc = Explainer::default().explain_markdown(q);
        let recovered = input_query(&doc).expect("input block");
        assert_eq!(recovered, q);
        assert_eq!(parse(recovered), parse(q));
    }
}

#[test]
fn test_full_document_layout() {
    let q = "index=sec EventCode=4625 | stats count AS failures BY user | where failures>10";
    let result = Explainer::new("local-model").explain(q);
    assert_eq!(result.engine, EngineKind::Rule);

    let expected = "\
<!-- engine=RULE; model=local-model -->
### Input Query
```spl
index=sec EventCode=4625 | stats count AS failures BY user | where failures>10
```

### Overall Description
- This query reads index=sec and performs stats aggregation. Intent: brute-force logon attempt detection

### Intent Summary
- brute-force logon attempt detection

### Data Source
- index: sec
- sourcetype: (not specified)
- time range: (not specified)

### Base Filters
- EventCode=4625
- where failures>10

### Operation Steps
- **stats**: count AS failures BY user

### Tuning/Threshold Points
- where threshold: failures>10
- count threshold from stats: count AS failures BY user

### False-Positive Considerations
- possible confusion with routine automation/batch jobs

### Output Fields
- (unspecified: no table/fields)

### Validation Result
- unbounded time range (no earliest/latest): the search may scan all data
- output fields unspecified (no table/fields): results are hard to read
";
    assert_eq!(result.document, expected);
}

#[test]
fn test_arbitrary_text_never_panics() {
    let inputs = [
        "|||",
        "[[[",
        "]]]",
        "\"unterminated | stats count",
        "index= | join [",
        "| join",
        "\\|\\[",
        "ünïcødé | stäts cöunt | where x>1",
        "index=main | join host [search a [search b] ] ]",
    ];
    for q in inputs {
        let doc = splain::explain(q);
        assert!(doc.contains("### Validation Result"), "{:?}", q);
    }
}
