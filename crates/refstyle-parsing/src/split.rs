use once_cell::sync::Lazy;
use regex::Regex;

use refstyle_core::{MarkerKind, ReferenceEntry, SplitStats};

use crate::config::ParsingConfig;
use crate::text_processing::join_entry_lines;

const DEFAULT_NOISE_PHRASES: &[&str] = &[
    "no references available",
    "no citations found",
    "references not available",
    "none available",
    "not applicable",
    "n/a",
    "tbd",
    "to be determined",
    "coming soon",
    "under construction",
];

static BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d{1,4})\]").unwrap());
static PERIOD_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{1,3})\.\s+\S").unwrap());
static PLAIN_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,3})\s+\p{Lu}").unwrap());

static AUTHOR_START_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Smith, J. A.
        r"^\p{Lu}[\p{L}'\-]+,\s+(?:\p{Lu}\.\s*)+",
        // Smith, John.  /  Smith, John, and
        r"^\p{Lu}[\p{L}'\-]+,\s+\p{Lu}\p{Ll}+(?:\s+\p{Lu}\.)?(?:,|\.|\s+and\b)",
        // Smith et al.
        r"^\p{Lu}[\p{L}'\-]+(?:\s+\p{Lu}[\p{L}'\-]+)?\s+et\s+al\.",
        // World Health Organization (2020)
        r"^\p{Lu}[\p{L}'\-]+(?:\s+\p{Lu}[\p{L}'\-]+)*\s+\((?:19|20)\d{2}[a-z]?\)",
        // A. Smith,
        r"^(?:\p{Lu}\.\s*)+\p{Lu}[\p{L}'\-]+,",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static PAGE_ARTIFACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:page\s+)?\d{1,4}\s*$|^\s*---\s*page\s+\d+\s*---\s*$").unwrap()
});

/// Entries split from a reference section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitResult {
    pub entries: Vec<ReferenceEntry>,
    pub stats: SplitStats,
}

/// Whether a line looks like the first line of a reference entry.
pub(crate) fn looks_like_entry_start(line: &str) -> bool {
    let t = line.trim_start();
    (t.starts_with('[') && BRACKET_RE.find(t).is_some_and(|m| m.start() == 0))
        || PERIOD_START_RE.is_match(t)
        || PLAIN_START_RE.is_match(t)
        || is_author_start(t)
}

fn is_author_start(line: &str) -> bool {
    AUTHOR_START_RES.iter().any(|re| re.is_match(line))
}

/// Split a reference section into entries.
///
/// Markers are tried in priority order: `[n]`, `n.`, then `n ` followed by a
/// capitalized word. A marker only counts while its number increases by at
/// most 5 over the previous one, so years, volumes and bracketed in-entry
/// numbers do not start new entries. The first kind with at least two
/// markers wins; without one, entries are separated at author-led lines and
/// blank lines. Wrapped lines are joined, broken words rejoined, and
/// candidates that look like noise are discarded.
pub fn split_references(text: &str) -> SplitResult {
    split_references_with_config(text, &ParsingConfig::default())
}

/// Config-aware version of [`split_references`].
pub(crate) fn split_references_with_config(text: &str, config: &ParsingConfig) -> SplitResult {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !PAGE_ARTIFACT_RE.is_match(l))
        .collect();

    let first_content_line = lines.iter().position(|l| !l.trim().is_empty());
    let scans: Vec<(MarkerKind, Vec<Marker>)> = [
        MarkerKind::Bracketed,
        MarkerKind::NumberedPeriod,
        MarkerKind::PlainNumber,
    ]
    .into_iter()
    .map(|kind| (kind, scan_markers(&lines, kind)))
    .collect();

    let chosen = scans
        .iter()
        .filter(|(kind, m)| numbering_leads(&lines, *kind, m, first_content_line))
        .find(|(_, m)| m.len() >= 2)
        .or_else(|| {
            scans
                .iter()
                .find(|(_, m)| m.len() == 1 && Some(m[0].line) == first_content_line)
        });

    let (kind, candidates) = match chosen {
        Some((kind, markers)) => (*kind, cut_at_markers(&lines, markers)),
        None => (MarkerKind::AuthorLed, split_author_led(&lines)),
    };

    let phrases = config.noise_phrases.resolve(&default_noise_phrases());
    let mut stats = SplitStats::default();
    let mut entries = Vec::new();

    for candidate in candidates {
        stats.total_raw += 1;
        // Text before the first marker is never an entry of its own
        if candidate.leading {
            stats.noise += 1;
            continue;
        }
        let entry = ReferenceEntry {
            index: entries.len(),
            number: candidate.number,
            marker: kind,
            text: join_entry_lines(&candidate.raw, config),
        };
        if is_noise(entry.body(), &phrases, config) {
            tracing::debug!(text = %entry.text, "discarding noise candidate");
            stats.noise += 1;
        } else {
            entries.push(entry);
        }
    }

    tracing::debug!(
        marker = ?kind,
        entries = entries.len(),
        raw = stats.total_raw,
        noise = stats.noise,
        "split reference list"
    );
    SplitResult { entries, stats }
}

fn default_noise_phrases() -> Vec<String> {
    DEFAULT_NOISE_PHRASES.iter().map(|s| s.to_string()).collect()
}

/// Bare numbers at line starts also occur in wrapped titles ("3 Workshop
/// on ..."). Numbered markers only count when no author-led entry starts
/// before the first of them.
fn numbering_leads(
    lines: &[&str],
    kind: MarkerKind,
    markers: &[Marker],
    first_content_line: Option<usize>,
) -> bool {
    if kind == MarkerKind::Bracketed {
        return true;
    }
    let Some(first) = markers.first() else {
        return false;
    };
    if Some(first.line) == first_content_line {
        return true;
    }
    !lines[..first.line]
        .iter()
        .any(|l| is_author_start(l.trim_start()))
}

#[derive(Debug, Clone, Copy)]
struct Marker {
    line: usize,
    /// Byte offset of the marker within its line.
    col: usize,
    number: u32,
}

struct Candidate {
    raw: String,
    number: Option<u32>,
    leading: bool,
}

fn in_sequence(last: Option<u32>, n: u32) -> bool {
    match last {
        None => true,
        Some(l) => n > l && n <= l + 5,
    }
}

fn scan_markers(lines: &[&str], kind: MarkerKind) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut last: Option<u32> = None;

    for (i, line) in lines.iter().enumerate() {
        match kind {
            MarkerKind::Bracketed => {
                for caps in BRACKET_RE.captures_iter(line) {
                    let (Some(m), Ok(n)) = (caps.get(0), caps[1].parse::<u32>()) else {
                        continue;
                    };
                    let before = line[..m.start()].trim_end();
                    let accepted = if before.trim_start().is_empty() {
                        in_sequence(last, n)
                    } else {
                        // Inline marker: next number right after a finished entry
                        last.is_some_and(|l| n == l + 1) && before.ends_with('.')
                    };
                    if accepted {
                        markers.push(Marker {
                            line: i,
                            col: m.start(),
                            number: n,
                        });
                        last = Some(n);
                    }
                }
            }
            MarkerKind::NumberedPeriod | MarkerKind::PlainNumber => {
                let re = if kind == MarkerKind::NumberedPeriod {
                    &PERIOD_START_RE
                } else {
                    &PLAIN_START_RE
                };
                if let Some(caps) = re.captures(line)
                    && let Ok(n) = caps[1].parse::<u32>()
                    && in_sequence(last, n)
                {
                    let col = line.len() - line.trim_start().len();
                    markers.push(Marker {
                        line: i,
                        col,
                        number: n,
                    });
                    last = Some(n);
                }
            }
            MarkerKind::AuthorLed => {}
        }
    }
    markers
}

/// Text between two `(line, col)` positions, lines joined with `\n`.
fn slice_lines(lines: &[&str], start: (usize, usize), end: (usize, usize)) -> String {
    let (sl, sc) = start;
    let (el, ec) = end;
    if sl == el {
        return lines[sl][sc..ec].to_string();
    }
    let mut parts = Vec::with_capacity(el - sl + 1);
    parts.push(&lines[sl][sc..]);
    parts.extend(lines[sl + 1..el].iter().copied());
    if el < lines.len() {
        parts.push(&lines[el][..ec]);
    }
    parts.join("\n")
}

fn cut_at_markers(lines: &[&str], markers: &[Marker]) -> Vec<Candidate> {
    let mut candidates = Vec::with_capacity(markers.len() + 1);

    if let Some(first) = markers.first() {
        let leading = slice_lines(lines, (0, 0), (first.line, first.col));
        if !leading.trim().is_empty() {
            candidates.push(Candidate {
                raw: leading,
                number: None,
                leading: true,
            });
        }
    }

    for (k, marker) in markers.iter().enumerate() {
        let end = markers
            .get(k + 1)
            .map_or((lines.len(), 0), |next| (next.line, next.col));
        candidates.push(Candidate {
            raw: slice_lines(lines, (marker.line, marker.col), end),
            number: Some(marker.number),
            leading: false,
        });
    }
    candidates
}

/// Whether a line plausibly finishes an entry, so that an author-led line
/// after it starts a new one.
pub(crate) fn closes_entry(line: &str) -> bool {
    let t = line.trim_end();
    if t.ends_with(['.', ')', ']']) {
        return true;
    }
    t.rsplit(char::is_whitespace).next().is_some_and(|last| {
        let last = last.to_ascii_lowercase();
        last.starts_with("http") || last.starts_with("doi:") || last.starts_with("10.")
    })
}

fn flush_candidate(candidates: &mut Vec<Candidate>, current: &mut Vec<&str>) {
    if !current.is_empty() {
        candidates.push(Candidate {
            raw: current.join("\n"),
            number: None,
            leading: false,
        });
        current.clear();
    }
}

fn split_author_led(lines: &[&str]) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in lines {
        let t = line.trim();
        if t.is_empty() {
            flush_candidate(&mut candidates, &mut current);
            continue;
        }
        if current.last().is_some_and(|prev| closes_entry(prev)) && is_author_start(t) {
            flush_candidate(&mut candidates, &mut current);
        }
        current.push(line);
    }
    flush_candidate(&mut candidates, &mut current);
    candidates
}

/// `phrase` occurs in `haystack` as whole words.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    haystack.match_indices(phrase).any(|(i, m)| {
        let before_ok = haystack[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[i + m.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

/// Whether a candidate entry body is page noise or placeholder text.
fn is_noise(body: &str, phrases: &[String], config: &ParsingConfig) -> bool {
    static INDICATOR_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"\b(?:1[5-9]|20)\d{2}\b|\p{Lu}\p{Ll}+,|\.\s+\S.*\.|https?://|(?i:\bdoi\b|\bvol\.|\bpp\.|\b(?:journal|proceedings|conference|press|university)\b)",
        )
        .unwrap()
    });

    let lower = body.to_lowercase();
    if phrases
        .iter()
        .any(|p| contains_phrase(&lower, &p.to_lowercase()))
    {
        return true;
    }
    if body.chars().count() <= config.min_entry_len {
        return true;
    }
    if !body.contains(' ') && !body.contains(',') {
        return true;
    }
    !INDICATOR_RE.is_match(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(result: &SplitResult) -> Vec<&str> {
        result.entries.iter().map(|e| e.text.as_str()).collect()
    }

    #[test]
    fn test_bracketed_entries_with_wrapped_lines() {
        let text = "[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans. Neural\n\
                    Netw., vol. 12, no. 3, pp. 45-60, 2021.\n\
                    [2] B. Jones and C. Lee, \"Graph Methods for Classifi-\n\
                    cation,\" in Proc. ICML, 2020, pp. 1-9.\n\
                    [3] D. Kim, \"Attention,\" Nature, vol. 5, pp. 10-20, 2019.";
        let result = split_references(text);
        assert_eq!(result.entries.len(), 3);
        assert_eq!(
            result.entries[0].text,
            "[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans. Neural Netw., vol. 12, no. 3, pp. 45-60, 2021."
        );
        assert!(result.entries[1].text.contains("Classification"));
        assert_eq!(result.entries[2].number, Some(3));
        assert!(
            result
                .entries
                .iter()
                .all(|e| e.marker == MarkerKind::Bracketed)
        );
        assert_eq!(result.stats.noise, 0);
    }

    #[test]
    fn test_inline_bracket_markers() {
        let text = "[1] A. Smith, \"Deep Learning,\" IEEE Trans., vol. 1, 2021. [2] B. Jones, \"Graphs,\" in Proc. ICML, pp. 1-9, 2020.";
        let result = split_references(text);
        assert_eq!(result.entries.len(), 2);
        assert!(result.entries[1].text.starts_with("[2] B. Jones"));
    }

    #[test]
    fn test_in_entry_brackets_do_not_split() {
        let text = "[1] A. Smith, \"Extending [4] to graphs,\" in Proc. KDD, pp. 1-9, 2021.\n\
                    [2] B. Jones, \"Graph Methods,\" in Proc. ICML, pp. 1-9, 2020.";
        let result = split_references(text);
        assert_eq!(result.entries.len(), 2);
        assert!(result.entries[0].text.contains("[4] to graphs"));
    }

    #[test]
    fn test_numbered_period_entries() {
        let text = "1. Smith, J. (2020). Learning theory. Journal of AI, 5(2), 100-120.\n\
                    2. Jones, K. (2019). Graph theory. Journal of Graphs, 3(1), 1-20.";
        let result = split_references(text);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[0].marker, MarkerKind::NumberedPeriod);
        assert_eq!(result.entries[1].number, Some(2));
    }

    #[test]
    fn test_author_led_entries() {
        let text = "Smith, J., Jones, K., and\n\
                    Brown, L. (2020). Learning theory. Journal of AI,\n\
                    5(2), 100-120.\n\
                    Doe, J. (2019). Graph theory. Journal of Graphs, 3(1), 1-20.\n\
                    \n\
                    World Health Organization (2021). Global report on health. WHO Press.";
        let result = split_references(text);
        assert_eq!(texts(&result).len(), 3, "{:?}", texts(&result));
        assert!(result.entries[0].text.starts_with("Smith, J., Jones, K., and Brown, L."));
        assert!(result.entries[1].text.starts_with("Doe, J."));
        assert!(result.entries.iter().all(|e| e.number.is_none()));
    }

    #[test]
    fn test_noise_filtered_and_counted() {
        let text = "[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans., vol. 12, 2021.\n\
                    12\n\
                    [2] N/A\n\
                    [3] To be determined pending the final camera-ready version.\n\
                    [4] B. Jones, \"Graph Methods,\" in Proc. ICML, pp. 1-9, 2020.";
        let result = split_references(text);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.stats.total_raw, 4);
        assert_eq!(result.stats.noise, 2);
        assert_eq!(result.entries[1].index, 1);
        assert_eq!(result.entries[1].number, Some(4));
    }

    #[test]
    fn test_leading_fragment_is_noise() {
        let text = "continued from previous page\n[1] A. Smith, \"Deep Learning,\" IEEE Trans., 2021.\n[2] B. Jones, \"Graphs,\" in Proc. ICML, 2020.";
        let result = split_references(text);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.stats.total_raw, 3);
        assert_eq!(result.stats.noise, 1);
    }

    #[test]
    fn test_numbers_in_wrapped_titles_do_not_split() {
        let text = "Smith, J. (2020). Learning models. In Proceedings of the\n\
                    3 Workshop on Models, pp. 100-120.\n\
                    Doe, A. (2019). Graph theory. In Proceedings of the\n\
                    5 Annual Graph Meeting, pp. 1-20.\n\
                    Kim, M. (2021). Deep models. Journal of AI, 6(1), 5-9.";
        let result = split_references(text);
        assert_eq!(texts(&result).len(), 3, "{:?}", texts(&result));
        assert!(result.entries.iter().all(|e| e.marker == MarkerKind::AuthorLed));
        assert!(result.entries[0].text.ends_with("3 Workshop on Models, pp. 100-120."));
        assert!(result.entries[1].text.starts_with("Doe, A. (2019)"));
        assert_eq!(result.stats.noise, 0);
    }

    #[test]
    fn test_plain_numbered_entries_after_fragment() {
        let text = "continued from previous page\n\
                    1 Smith, J. (2020). Learning theory. Journal of AI, 5(2), 100-120.\n\
                    2 Jones, K. (2019). Graph theory. Journal of Graphs, 3(1), 1-20.";
        let result = split_references(text);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[0].marker, MarkerKind::PlainNumber);
        assert_eq!(result.stats.noise, 1);
    }

    #[test]
    fn test_contains_phrase_word_boundaries() {
        assert!(contains_phrase("status: n/a", "n/a"));
        assert!(!contains_phrase("tbdx", "tbd"));
        assert!(contains_phrase("coming soon.", "coming soon"));
    }

    #[test]
    fn test_custom_noise_phrase() {
        let config = crate::ParsingConfigBuilder::new()
            .add_noise_phrase("forthcoming".to_string())
            .build()
            .unwrap();
        let text = "[1] A. Smith, \"Deep Learning,\" IEEE Trans., vol. 1, 2021.\n[2] B. Jones, Forthcoming, Journal of Graphs, 2024.";
        let result = split_references_with_config(text, &config);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.stats.noise, 1);
    }

    #[test]
    fn test_looks_like_entry_start() {
        assert!(looks_like_entry_start("[12] A. Smith"));
        assert!(looks_like_entry_start("3. Smith, J. (2020)."));
        assert!(looks_like_entry_start("Smith, J. (2020). Title."));
        assert!(looks_like_entry_start("A. Smith, \"Title,\""));
        assert!(!looks_like_entry_start("References to prior work are discussed below."));
        assert!(!looks_like_entry_start("Some discussion of results."));
    }
}
