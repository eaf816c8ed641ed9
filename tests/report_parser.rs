// tests/report_parser.rs
use news_digest::report::{parse, Report, Strategy, UNAVAILABLE};
use news_digest::ArticleId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CANONICAL: &str = r#"{
  "marketOverview": "Equities firm as yields ease; banks lead.",
  "clusters": [
    {"topic": "Rate path", "importanceTag": "high", "summary": "Fed on hold",
     "insight": "Curve steepens", "articleRefs": ["a1b2c3d4e5f6", "0f0f0f0f0f0f"]},
    {"topic": "Insurance", "importanceTag": "low", "insight": "Premium growth", "articleRefs": []}
  ],
  "newsflash": [
    {"articleRef": "a1b2c3d4e5f6", "headline": "Fed holds", "oneLineComment": "As expected."},
    {"articleRef": "0f0f0f0f0f0f", "oneLineComment": "Watch deposits."}
  ]
}"#;

fn assert_well_formed(r: &Report) {
    assert!(!r.market_overview.trim().is_empty());
    if r.strategy == Strategy::Empty {
        assert_eq!(r.market_overview, UNAVAILABLE);
        assert!(r.clusters.is_empty());
        assert!(r.newsflash.is_empty());
    }
    for c in &r.clusters {
        assert!(!c.topic.is_empty() || !c.insight.is_empty());
    }
    for f in &r.newsflash {
        assert!(!f.comment.trim().is_empty());
    }
}

#[test]
fn canonical_output_is_strict() {
    let r = parse(CANONICAL);
    assert_eq!(r.strategy, Strategy::Strict);
    assert_eq!(r.clusters.len(), 2);
    assert_eq!(r.newsflash.len(), 2);
    assert!(r.referenced_ids().contains(&ArticleId::from("0f0f0f0f0f0f")));
}

#[test]
fn fenced_output_with_trailing_comma_is_repaired() {
    let raw = "```json\n{\"marketOverview\": \"...\", \"clusters\": [], \"newsflash\": [],}\n```";
    let r = parse(raw);
    assert_eq!(r.strategy, Strategy::Repaired);
    assert_eq!(r.market_overview, "...");
    assert!(r.clusters.is_empty());
    assert!(r.newsflash.is_empty());
}

#[test]
fn prose_wrapped_output_with_raw_newlines_is_repaired() {
    let raw = "Here is today's digest:\n\n{\"marketOverview\": \"Line one\nline two\", \
               \"clusters\": [], \"newsflash\": []}\n\nLet me know if you need more.";
    let r = parse(raw);
    assert_eq!(r.strategy, Strategy::Repaired);
    assert_eq!(r.market_overview, "Line one line two");
}

#[test]
fn truncated_output_is_closed_when_enough_survives() {
    let cut = CANONICAL.find("\"oneLineComment\": \"Watch").unwrap();
    let r = parse(&CANONICAL[..cut]);
    assert_eq!(r.strategy, Strategy::Repaired);
    assert_eq!(r.clusters.len(), 2);
    assert_eq!(r.newsflash.len(), 1);
}

#[test]
fn truncated_fragment_falls_back_to_overview_heading() {
    let raw = "## Market Overview\nCalm session, banks lead.\n\n\
               {\"clusters\": [{\"topic\": \"Banks\", \"articleRefs\": [\"a1\",";
    let r = parse(raw);
    assert_eq!(r.strategy, Strategy::Extracted);
    assert_eq!(r.market_overview, "Calm session, banks lead.");
    assert!(r.clusters.is_empty());
    assert!(r.newsflash.is_empty());
}

#[test]
fn extraction_without_overview_uses_sentinel() {
    let raw = "### Newsflash\n- [a1] CPI: cooler than feared";
    let r = parse(raw);
    assert_eq!(r.strategy, Strategy::Extracted);
    assert_eq!(r.market_overview, UNAVAILABLE);
    assert_eq!(r.newsflash.len(), 1);
}

#[test]
fn empty_text_is_the_empty_report() {
    let r = parse("");
    assert_eq!(r.strategy, Strategy::Empty);
    assert_eq!(r.market_overview, UNAVAILABLE);
    assert!(r.clusters.is_empty() && r.newsflash.is_empty());
}

#[test]
fn refusal_is_the_empty_report() {
    assert_eq!(parse("I can't produce that report today.").strategy, Strategy::Empty);
}

#[test]
fn prose_starting_with_a_heading_word_is_the_empty_report() {
    let r = parse("Overviewing the data, nothing to report.");
    assert_eq!(r.strategy, Strategy::Empty);
    assert_eq!(r.market_overview, UNAVAILABLE);
}

#[test]
fn random_corruption_never_panics_and_keeps_sentinels() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let noise = ['{', '}', '[', ']', '"', ',', ':', '\n', '\\', 'x', ' ', '`', '#'];
    let base: Vec<char> = CANONICAL.chars().collect();

    for _ in 0..500 {
        let mut chars = base.clone();
        let cut = rng.random_range(0..=chars.len());
        chars.truncate(cut);
        for _ in 0..rng.random_range(0..6) {
            if chars.is_empty() {
                break;
            }
            let at = rng.random_range(0..chars.len());
            match rng.random_range(0..3) {
                0 => {
                    chars.remove(at);
                }
                1 => chars.insert(at, noise[rng.random_range(0..noise.len())]),
                _ => chars[at] = noise[rng.random_range(0..noise.len())],
            }
        }
        let text: String = chars.into_iter().collect();
        let r = parse(&text);
        assert_well_formed(&r);
    }
}

#[test]
fn lossy_decoded_random_bytes_never_panic() {
    let mut rng = StdRng::seed_from_u64(0xb17e5);
    for _ in 0..2000 {
        let len = rng.random_range(0..256);
        let bytes: Vec<u8> = (0..len).map(|_| rng.random::<u8>()).collect();
        let text = String::from_utf8_lossy(&bytes);
        assert_well_formed(&parse(&text));
    }
}

#[test]
fn multibyte_structural_soup_never_panics() {
    let alphabet: Vec<&str> = vec![
        "{", "}", "[", "]", "\"", ",", ":", "：", "\n", "\\", " ", "```", "#", "- ", "* ",
        "—", "–", " - ", "市场综述", "快讯", "主题", "（高）", "综", "é", "ß", "🚀", "📉", "👍🏽",
        "[a1]", "[refs: a1, 🚀]", "marketOverview", "clusters", "newsflash", "Overview",
        "News flash", "Themes", "\u{0}", "\r\n", "\"articleRefs\": [", "\"headline\": \"",
    ];
    let mut rng = StdRng::seed_from_u64(0xc0ffee);
    for _ in 0..2000 {
        let pieces = rng.random_range(0..40);
        let text: String = (0..pieces)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())])
            .collect();
        assert_well_formed(&parse(&text));
    }
}
