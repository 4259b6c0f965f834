//! Extraction of self-reported metrics from solver diagnostics.
//!
//! Solvers report their score, elapsed time and an auxiliary count on stderr.
//! Two line formats are understood:
//!
//! | Protocol | Matches | Value |
//! |----------|---------|-------|
//! | [`Substring`](DiagnosticProtocol::Substring) | line contains the key anywhere, any case | second whitespace-separated token |
//! | [`KeyValue`](DiagnosticProtocol::KeyValue) | line starts with the key, any case | the token after whitespace, `:` or `=` |
//!
//! Under both protocols the last matching line wins, fields that never match
//! stay zero, and a line whose value does not parse leaves the previous value
//! untouched.
//!
//! ```
//! use mtest::metrics::{DiagnosticParser, DiagnosticProtocol};
//!
//! let parser = DiagnosticParser::new(DiagnosticProtocol::Substring, 3.0);
//! let metrics = parser.parse("score 10\nscore 20\nelapsed 0.504\n");
//! assert_eq!(metrics.score, 20);
//! assert_eq!(metrics.elapsed_secs, 0.5);
//! assert!(!metrics.exceeded_limit);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static KEY_VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(score|elapsed|count)(?:\s*[:=]\s*|\s+)(\S+)\s*$")
        .expect("diagnostic pattern is valid")
});

/// Metrics reported by one solver run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunMetrics {
    /// Reported score.
    pub score: u64,

    /// Reported elapsed time in seconds, rounded to two decimals.
    pub elapsed_secs: f64,

    /// Reported auxiliary count (iterations, states, ...).
    pub count: u64,

    /// Whether `elapsed_secs` reached the time limit.
    pub exceeded_limit: bool,
}

/// How diagnostic lines are recognised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticProtocol {
    /// Any line containing `score`, `elapsed` or `count` (case-insensitive);
    /// the value is the line's second token. One line may feed several
    /// fields.
    #[default]
    Substring,

    /// Only lines of the form `<key> <value>`, `<key>: <value>` or
    /// `<key>=<value>` where the key is exactly one of `score`, `elapsed`,
    /// `count`.
    KeyValue,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Score,
    Elapsed,
    Count,
}

impl Field {
    const ALL: [Field; 3] = [Field::Score, Field::Elapsed, Field::Count];

    fn key(self) -> &'static str {
        match self {
            Field::Score => "score",
            Field::Elapsed => "elapsed",
            Field::Count => "count",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| key.eq_ignore_ascii_case(field.key()))
    }
}

/// Parses raw diagnostic text into [`RunMetrics`].
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticParser {
    protocol: DiagnosticProtocol,
    time_limit_secs: f64,
}

impl DiagnosticParser {
    /// Creates a parser flagging runs whose elapsed time is at least
    /// `time_limit_secs`.
    pub fn new(protocol: DiagnosticProtocol, time_limit_secs: f64) -> Self {
        Self {
            protocol,
            time_limit_secs,
        }
    }

    /// Parses the complete diagnostic text of one run.
    pub fn parse(&self, text: &str) -> RunMetrics {
        let mut metrics = RunMetrics::default();

        for line in text.lines() {
            match self.protocol {
                DiagnosticProtocol::Substring => {
                    let lower = line.to_lowercase();
                    let token = line.split_whitespace().nth(1);
                    for field in Field::ALL {
                        if lower.contains(field.key()) {
                            record(&mut metrics, field, token);
                        }
                    }
                }
                DiagnosticProtocol::KeyValue => {
                    if let Some(caps) = KEY_VALUE_LINE.captures(line)
                        && let Some(field) = Field::from_key(&caps[1])
                    {
                        record(&mut metrics, field, caps.get(2).map(|m| m.as_str()));
                    }
                }
            }
        }

        metrics.exceeded_limit = metrics.elapsed_secs >= self.time_limit_secs;
        metrics
    }
}

/// Overwrites one field if `token` holds a valid value for it.
fn record(metrics: &mut RunMetrics, field: Field, token: Option<&str>) {
    let applied = match (field, token) {
        (Field::Score, Some(t)) => t.parse::<u64>().map(|v| metrics.score = v).is_ok(),
        (Field::Count, Some(t)) => t.parse::<u64>().map(|v| metrics.count = v).is_ok(),
        (Field::Elapsed, Some(t)) => match parse_seconds(t) {
            Some(v) => {
                metrics.elapsed_secs = v;
                true
            }
            None => false,
        },
        (_, None) => false,
    };

    if !applied {
        debug!(
            "Ignoring malformed {} value {:?} in solver diagnostics",
            field.key(),
            token.unwrap_or("")
        );
    }
}

fn parse_seconds(token: &str) -> Option<f64> {
    let value: f64 = token.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 100.0).round() / 100.0)
}
