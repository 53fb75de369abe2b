//! Text sentiment mapped to a 1 to 100 score and a seven-tier trading
//! classification.
//!
//! Text is cleaned first (URLs and non-letters removed, lower-cased), then
//! every configured [`PolarityScorer`] produces a polarity in `[-1, 1]`.
//! The polarities are averaged and mapped with `int((c + 1) * 50)`, clamped
//! to `1..=100`.

use std::{collections::HashMap, fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"http\S+").expect("valid url regex"));
static NON_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z ]").expect("valid letter regex"));

/// Drops URLs and anything that is not an ASCII letter or a space, then
/// trims and lower-cases. Inner runs of spaces are kept.
pub fn clean_text(text: &str) -> String {
    let without_urls = URL.replace_all(text, "");
    NON_LETTER
        .replace_all(&without_urls, "")
        .trim()
        .to_lowercase()
}

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "without", "cannot",
    "cant", "dont", "doesnt", "didnt", "isnt", "arent", "wasnt", "werent", "wont", "wouldnt",
    "shouldnt", "couldnt", "hasnt", "havent", "hadnt", "aint",
];

const BOOSTERS: &[&str] = &[
    "very", "extremely", "really", "highly", "hugely", "incredibly", "remarkably",
    "significantly", "substantially", "sharply", "totally", "absolutely", "deeply", "so", "most",
];

const DAMPENERS: &[&str] = &[
    "slightly", "somewhat", "barely", "hardly", "marginally", "partly", "little",
];

/// Word valences on a -4 to +4 scale.
#[derive(Debug, Clone)]
pub struct Lexicon {
    valence: HashMap<String, f64>,
}

impl Lexicon {
    /// General sentiment words plus market vocabulary.
    pub fn financial() -> Self {
        let words: &[(&str, f64)] = &[
            ("good", 1.9),
            ("great", 3.1),
            ("excellent", 2.7),
            ("best", 3.2),
            ("happy", 2.7),
            ("positive", 2.6),
            ("optimistic", 1.3),
            ("confident", 2.2),
            ("strong", 2.3),
            ("stronger", 1.9),
            ("robust", 1.4),
            ("solid", 1.2),
            ("win", 2.8),
            ("wins", 2.7),
            ("success", 2.7),
            ("successful", 2.8),
            ("profit", 1.9),
            ("profits", 1.9),
            ("profitable", 1.9),
            ("gain", 2.4),
            ("gains", 1.9),
            ("growth", 1.6),
            ("grow", 1.4),
            ("growing", 1.3),
            ("surge", 1.8),
            ("surges", 1.8),
            ("soar", 2.2),
            ("soars", 2.2),
            ("rally", 1.9),
            ("rallies", 1.9),
            ("boost", 1.7),
            ("beat", 1.2),
            ("beats", 1.2),
            ("outperform", 1.8),
            ("upgrade", 1.5),
            ("upgraded", 1.5),
            ("bullish", 2.2),
            ("record", 0.8),
            ("opportunity", 1.8),
            ("recovery", 1.4),
            ("bad", -2.5),
            ("poor", -2.1),
            ("terrible", -2.1),
            ("awful", -2.0),
            ("worst", -3.1),
            ("negative", -2.7),
            ("weak", -1.9),
            ("weaker", -1.9),
            ("loss", -1.3),
            ("losses", -1.7),
            ("lose", -1.7),
            ("losing", -1.6),
            ("decline", -1.4),
            ("declines", -1.4),
            ("drop", -1.1),
            ("drops", -1.1),
            ("fall", -1.0),
            ("falls", -1.0),
            ("plunge", -2.2),
            ("plunges", -2.2),
            ("crash", -2.4),
            ("crashes", -2.4),
            ("collapse", -2.3),
            ("collapsing", -2.1),
            ("slump", -1.9),
            ("fear", -2.2),
            ("fears", -2.2),
            ("panic", -2.6),
            ("risk", -1.1),
            ("risky", -1.4),
            ("warning", -1.4),
            ("lawsuit", -1.5),
            ("fraud", -3.0),
            ("scandal", -2.4),
            ("bankruptcy", -2.8),
            ("bankrupt", -2.6),
            ("default", -1.6),
            ("downgrade", -1.6),
            ("downgraded", -1.6),
            ("bearish", -2.1),
            ("recession", -2.2),
            ("layoffs", -2.0),
            ("miss", -1.3),
            ("misses", -1.3),
        ];
        Self {
            valence: words.iter().map(|&(w, v)| (w.to_string(), v)).collect(),
        }
    }

    /// Adds or overrides a word.
    pub fn with_word(mut self, word: impl Into<String>, valence: f64) -> Self {
        self.valence.insert(word.into(), valence);
        self
    }

    pub fn valence(&self, word: &str) -> Option<f64> {
        self.valence.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.valence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valence.is_empty()
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::financial()
    }
}

/// Maps cleaned text to a polarity in `[-1, 1]`.
pub trait PolarityScorer: Send + Sync {
    fn name(&self) -> &str;
    fn polarity(&self, text: &str) -> f64;
}

/// Sums word valences, shifting for boosters and dampeners and flipping
/// under a nearby negation, then squashes the sum with `x / sqrt(x^2 + 15)`.
#[derive(Debug, Clone, Default)]
pub struct ValenceScorer {
    lexicon: Lexicon,
}

impl ValenceScorer {
    const ALPHA: f64 = 15.0;
    const BOOST: f64 = 0.293;
    const NEGATE: f64 = -0.74;

    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    fn token_valence(&self, tokens: &[&str], i: usize) -> Option<f64> {
        let mut v = self.lexicon.valence(tokens[i])?;
        let sign = v.signum();
        let before = &tokens[i.saturating_sub(3)..i];

        for (distance, word) in before.iter().rev().enumerate() {
            let decay = 1.0 - 0.05 * distance as f64;
            if BOOSTERS.contains(word) {
                v += sign * Self::BOOST * decay;
            } else if DAMPENERS.contains(word) {
                v -= sign * Self::BOOST * decay;
            }
        }
        if before.iter().any(|w| NEGATIONS.contains(w)) {
            v *= Self::NEGATE;
        }
        Some(v)
    }
}

impl PolarityScorer for ValenceScorer {
    fn name(&self) -> &str {
        "valence"
    }

    fn polarity(&self, text: &str) -> f64 {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let sum: f64 = (0..tokens.len())
            .filter_map(|i| self.token_valence(&tokens, i))
            .sum();
        if sum == 0.0 {
            return 0.0;
        }
        (sum / (sum * sum + Self::ALPHA).sqrt()).clamp(-1.0, 1.0)
    }
}

/// Average polarity of the words found in the lexicon, each rescaled to
/// `[-1, 1]`. A preceding booster scales a word by 1.3, a preceding
/// negation by -0.5. Text with no known words scores 0.
#[derive(Debug, Clone, Default)]
pub struct MeanPolarityScorer {
    lexicon: Lexicon,
}

impl MeanPolarityScorer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }
}

impl PolarityScorer for MeanPolarityScorer {
    fn name(&self) -> &str {
        "mean_polarity"
    }

    fn polarity(&self, text: &str) -> f64 {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut total = 0.0;
        let mut hits = 0usize;
        for (i, word) in tokens.iter().enumerate() {
            let Some(v) = self.lexicon.valence(word) else {
                continue;
            };
            let mut p = v / 4.0;
            if let Some(prev) = i.checked_sub(1).map(|j| tokens[j]) {
                if BOOSTERS.contains(&prev) {
                    p *= 1.3;
                } else if NEGATIONS.contains(&prev) {
                    p *= -0.5;
                }
            }
            total += p.clamp(-1.0, 1.0);
            hits += 1;
        }
        if hits == 0 { 0.0 } else { total / hits as f64 }
    }
}

/// Trading tier for a sentiment score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentimentClass {
    #[serde(rename = "Strong Sell")]
    StrongSell,
    #[serde(rename = "Sell")]
    Sell,
    #[serde(rename = "Weak Sell")]
    WeakSell,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Weak Buy")]
    WeakBuy,
    #[serde(rename = "Buy")]
    Buy,
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    /// Nothing was scored.
    #[serde(rename = "Unknown")]
    Unknown,
}

impl SentimentClass {
    /// Bands: below 41 Strong Sell, 41..45 Sell, 45..48 Weak Sell,
    /// 48..52 Neutral, 52..55 Weak Buy, 55..60 Buy, 60 and up Strong Buy.
    /// Fractional averages fall into the band whose lower bound they pass.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s.is_nan() => SentimentClass::Unknown,
            s if s < 41.0 => SentimentClass::StrongSell,
            s if s < 45.0 => SentimentClass::Sell,
            s if s < 48.0 => SentimentClass::WeakSell,
            s if s < 52.0 => SentimentClass::Neutral,
            s if s < 55.0 => SentimentClass::WeakBuy,
            s if s < 60.0 => SentimentClass::Buy,
            _ => SentimentClass::StrongBuy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SentimentClass::StrongSell => "Strong Sell",
            SentimentClass::Sell => "Sell",
            SentimentClass::WeakSell => "Weak Sell",
            SentimentClass::Neutral => "Neutral",
            SentimentClass::WeakBuy => "Weak Buy",
            SentimentClass::Buy => "Buy",
            SentimentClass::StrongBuy => "Strong Buy",
            SentimentClass::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SentimentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Averages its scorers over cleaned text.
pub struct SentimentScorer {
    scorers: Vec<Box<dyn PolarityScorer>>,
}

impl SentimentScorer {
    pub fn new(scorers: Vec<Box<dyn PolarityScorer>>) -> Self {
        Self { scorers }
    }

    /// Mean polarity over all scorers, 0 when there are none.
    pub fn combined(&self, text: &str) -> f64 {
        if self.scorers.is_empty() {
            return 0.0;
        }
        let cleaned = clean_text(text);
        let total: f64 = self.scorers.iter().map(|s| s.polarity(&cleaned)).sum();
        total / self.scorers.len() as f64
    }

    pub fn score(&self, text: &str) -> u8 {
        to_score(self.combined(text))
    }

    pub fn classify(&self, text: &str) -> SentimentClass {
        SentimentClass::from_score(f64::from(self.score(text)))
    }
}

impl Default for SentimentScorer {
    /// The valence and mean-polarity scorers over [`Lexicon::financial`].
    fn default() -> Self {
        Self::new(vec![
            Box::new(ValenceScorer::default()),
            Box::new(MeanPolarityScorer::default()),
        ])
    }
}

/// `int((polarity + 1) * 50)` clamped to `1..=100`.
pub fn to_score(polarity: f64) -> u8 {
    let p = if polarity.is_finite() { polarity.clamp(-1.0, 1.0) } else { 0.0 };
    ((p + 1.0) * 50.0).floor().clamp(1.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn clean_text_strips_urls_and_symbols() {
        assert_eq!(
            clean_text("  Check https://x.co/abc NOW!! 100% Gains "),
            "check  now  gains"
        );
        assert_eq!(clean_text("$$$"), "");
    }

    #[test]
    fn negative_headline_is_a_sell() {
        let scorer = SentimentScorer::default();
        let text = "Terrible quarter: losses mount as the company faces bankruptcy fears";
        let class = scorer.classify(text);
        assert!(
            matches!(class, SentimentClass::StrongSell | SentimentClass::Sell),
            "{class}"
        );
        assert!(scorer.score(text) < 41);
    }

    #[test]
    fn positive_headline_is_a_buy() {
        let scorer = SentimentScorer::default();
        let text = "Strong earnings beat, shares rally to record gains";
        assert_eq!(scorer.classify(text), SentimentClass::StrongBuy);
    }

    #[test]
    fn text_without_known_words_is_neutral() {
        let scorer = SentimentScorer::default();
        assert_eq!(scorer.score("The company will report results on Tuesday"), 50);
        assert_eq!(scorer.classify(""), SentimentClass::Neutral);
    }

    #[test]
    fn negation_and_boosters() {
        let v = ValenceScorer::default();
        assert!(v.polarity("good") > 0.0);
        assert!(v.polarity("not good") < 0.0);
        assert!(v.polarity("very good") > v.polarity("good"));
        assert!(v.polarity("slightly good") < v.polarity("good"));

        let m = MeanPolarityScorer::default();
        assert!(m.polarity("not good") < 0.0);
        assert!(m.polarity("very good") > m.polarity("good"));
        assert_eq!(m.polarity("nothing here"), 0.0);
    }

    #[test]
    fn custom_lexicon_words_count() {
        let lex = Lexicon::financial().with_word("moon", 3.0);
        assert!(ValenceScorer::new(lex).polarity("to the moon") > 0.5);
    }

    #[test]
    fn class_bands() {
        let cases = [
            (1.0, SentimentClass::StrongSell),
            (40.0, SentimentClass::StrongSell),
            (40.5, SentimentClass::StrongSell),
            (41.0, SentimentClass::Sell),
            (44.9, SentimentClass::Sell),
            (45.0, SentimentClass::WeakSell),
            (48.0, SentimentClass::Neutral),
            (51.5, SentimentClass::Neutral),
            (52.0, SentimentClass::WeakBuy),
            (55.0, SentimentClass::Buy),
            (59.99, SentimentClass::Buy),
            (60.0, SentimentClass::StrongBuy),
            (100.0, SentimentClass::StrongBuy),
        ];
        for (score, class) in cases {
            assert_eq!(SentimentClass::from_score(score), class, "{score}");
        }
        assert_eq!(
            serde_json::to_string(&SentimentClass::WeakBuy).unwrap(),
            "\"Weak Buy\""
        );
    }

    #[test]
    fn score_mapping_edges() {
        assert_eq!(to_score(-1.0), 1);
        assert_eq!(to_score(0.0), 50);
        assert_eq!(to_score(1.0), 100);
        assert_eq!(to_score(0.039), 51);
        assert_eq!(to_score(f64::NAN), 50);
    }

    proptest! {
        #[test]
        fn scores_stay_in_range(text in "\\PC{0,80}") {
            let s = SentimentScorer::default().score(&text);
            prop_assert!((1..=100).contains(&s));
        }
    }
}
