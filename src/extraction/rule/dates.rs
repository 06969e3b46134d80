//! Generic date extraction and normalization to `DD/MM/YYYY`.
//!
//! Grounded on `rule_extraction.py`'s `extract_dates` and the five date
//! patterns it tries in sequence.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

fn french_months() -> &'static HashMap<&'static str, u32> {
    static MONTHS: LazyLock<HashMap<&'static str, u32>> = LazyLock::new(|| {
        HashMap::from([
            ("janvier", 1), ("février", 2), ("fevrier", 2), ("mars", 3),
            ("avril", 4), ("mai", 5), ("juin", 6), ("juillet", 7),
            ("août", 8), ("aout", 8), ("septembre", 9), ("octobre", 10),
            ("novembre", 11), ("décembre", 12), ("decembre", 12),
            ("janv", 1), ("jan", 1), ("fév", 2), ("fev", 2), ("févr", 2), ("fevr", 2),
            ("avr", 4), ("juil", 7), ("juill", 7),
            ("sept", 9), ("oct", 10), ("nov", 11), ("déc", 12), ("dec", 12),
        ])
    });
    &MONTHS
}

fn month_names_pattern() -> String {
    let mut names: Vec<&str> = french_months().keys().copied().collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    names.join("|")
}

static PAT_DATE_DMY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?P<day>\d{1,2})[/.\-](?P<month>\d{1,2})[/.\-](?P<year>\d{4})\b").unwrap());

static PAT_DATE_YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?P<year>\d{4})[/.\-](?P<month>\d{1,2})[/.\-](?P<day>\d{1,2})\b").unwrap());

static PAT_DATE_FULL_FR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?P<day>\d{{1,2}})\s+(?P<month>{})\s+(?P<year>\d{{4}})\b",
        month_names_pattern()
    ))
    .unwrap()
});

static PAT_DATE_ABBREV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?P<month>{})[.\-](?P<year>\d{{2,4}})\b", month_names_pattern())).unwrap()
});

static PAT_DATE_YEAR_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:en|depuis|ann[ée]e)\s+(?P<year>(?:19|20)\d{2})\b").unwrap());

fn normalise_year(y: &str) -> u32 {
    let y_int: u32 = y.parse().unwrap_or(0);
    if y_int < 100 {
        if y_int < 50 {
            2000 + y_int
        } else {
            1900 + y_int
        }
    } else {
        y_int
    }
}

fn normalise_month_name(name: &str) -> Option<u32> {
    french_months().get(name.to_lowercase().trim_end_matches('.')).copied()
}

/// `(normalised_date, raw_span, start, end)`, sorted by position,
/// deduplicated by `(start, end)`.
pub fn extract_dates(text: &str) -> Vec<(String, String, usize, usize)> {
    let mut results = Vec::new();
    let mut seen: HashSet<(usize, usize)> = HashSet::new();

    let mut add = |day: u32, month: u32, year: &str, raw: &str, start: usize, end: usize, results: &mut Vec<(String, String, usize, usize)>| {
        if !seen.insert((start, end)) {
            return;
        }
        let y = normalise_year(year);
        results.push((format!("{day:02}/{month:02}/{y:04}"), raw.to_string(), start, end));
    };

    for m in PAT_DATE_DMY.captures_iter(text) {
        let whole = m.get(0).unwrap();
        let day: u32 = m["day"].parse().unwrap_or(0);
        let month: u32 = m["month"].parse().unwrap_or(0);
        add(day, month, &m["year"], whole.as_str(), whole.start(), whole.end(), &mut results);
    }

    for m in PAT_DATE_YMD.captures_iter(text) {
        let whole = m.get(0).unwrap();
        let day: u32 = m["day"].parse().unwrap_or(0);
        let month: u32 = m["month"].parse().unwrap_or(0);
        add(day, month, &m["year"], whole.as_str(), whole.start(), whole.end(), &mut results);
    }

    for m in PAT_DATE_FULL_FR.captures_iter(text) {
        if let Some(month_num) = normalise_month_name(&m["month"]) {
            let whole = m.get(0).unwrap();
            let day: u32 = m["day"].parse().unwrap_or(0);
            add(day, month_num, &m["year"], whole.as_str(), whole.start(), whole.end(), &mut results);
        }
    }

    for m in PAT_DATE_ABBREV.captures_iter(text) {
        if let Some(month_num) = normalise_month_name(&m["month"]) {
            let whole = m.get(0).unwrap();
            add(1, month_num, &m["year"], whole.as_str(), whole.start(), whole.end(), &mut results);
        }
    }

    for m in PAT_DATE_YEAR_ONLY.captures_iter(text) {
        let whole = m.get(0).unwrap();
        let pos = (whole.start(), whole.end());
        if !seen.contains(&pos) {
            seen.insert(pos);
            results.push((format!("01/01/{}", &m["year"]), whole.as_str().to_string(), whole.start(), whole.end()));
        }
    }

    results.sort_by_key(|r| r.2);
    results
}
