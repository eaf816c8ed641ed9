// tests/report_assemble.rs
use chrono::{TimeZone, Utc};
use news_digest::report::{assemble, parse, Strategy};
use news_digest::{Article, ArticleId};
use std::collections::HashSet;

fn accepted(n: usize) -> Vec<Article> {
    let ts = Utc.with_ymd_and_hms(2026, 4, 9, 6, 30, 0).unwrap();
    (0..n)
        .map(|i| {
            Article::new(
                format!("https://news.test/a/{i}"),
                format!("Headline {i}"),
                format!("body {i}"),
                "Wire",
                ts,
            )
        })
        .collect()
}

#[test]
fn unknown_reference_among_a_thousand_articles_is_dropped() {
    let arts = accepted(1_000);
    let valid = arts[500].id.clone();
    let raw = format!(
        r#"{{"marketOverview": "Busy day", "clusters": [
            {{"topic": "Mixed", "importanceTag": "medium", "insight": "n/a", "articleRefs": ["42", "{valid}"]}}
        ], "newsflash": [
            {{"articleRef": "42", "oneLineComment": "ghost item"}},
            {{"articleRef": "{valid}", "oneLineComment": "real item"}}
        ]}}"#
    );
    let parsed = parse(&raw);
    assert_eq!(parsed.strategy, Strategy::Strict);

    let report = assemble(parsed, &arts);
    assert_eq!(report.clusters.len(), 1);
    assert_eq!(report.clusters[0].articles.len(), 1);
    assert_eq!(report.clusters[0].articles[0].id, valid);
    assert_eq!(report.newsflash.len(), 1);
    assert_eq!(report.newsflash[0].comment, "real item");
    assert_eq!(report.dropped_refs, 2);
}

#[test]
fn every_output_reference_is_in_the_accepted_set() {
    let arts = accepted(20);
    let known: HashSet<&ArticleId> = arts.iter().map(|a| &a.id).collect();
    let raw = format!(
        "## Market Overview\nQuiet.\n\n## Themes\n- Banks (high): steady [refs: {}, zzz, {}]\n\n\
         ## Newsflash\n- [{}] Headline 3: noted\n- [nope] Phantom: gone\n- Headline 7: matched by title\n",
        arts[1].id, arts[2].id, arts[3].id
    );
    let report = assemble(parse(&raw), &arts);
    assert_eq!(report.strategy, Strategy::Extracted);
    for c in &report.clusters {
        assert!(c.articles.iter().all(|a| known.contains(&a.id)));
    }
    assert!(report.newsflash.iter().all(|f| known.contains(&f.article.id)));
    assert_eq!(report.newsflash.len(), 2);
    assert_eq!(report.newsflash[1].article.id, arts[7].id);
    assert_eq!(report.dropped_refs, 2);
    assert_eq!(report.article_count(), 4);
}

#[test]
fn empty_model_text_assembles_to_sentinels() {
    let report = assemble(parse(""), &accepted(3));
    assert_eq!(report.strategy, Strategy::Empty);
    assert_eq!(report.market_overview, "unavailable");
    assert!(report.clusters.is_empty());
    assert!(report.newsflash.is_empty());
    assert_eq!(report.dropped_refs, 0);
}
