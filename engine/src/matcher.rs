use regex::Regex;
use serde::{Deserialize, Serialize};

/// One line that satisfied the search predicate.
///
/// `document` is left empty by the matcher; the worker that scanned the file
/// stamps it before handing the match back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Content of the matching line, without the line terminator
    pub line: String,

    /// 1-based line number within the document
    #[serde(rename = "lineNum")]
    pub line_num: usize,

    /// Name of the document the line belongs to
    #[serde(rename = "documentName")]
    pub document: String,
}

/// Scan `content` line by line for case-insensitive substring containment of
/// `query`. Line numbers start at 1 and advance on every line, matching or
/// not. Performs no I/O and cannot fail; empty content yields no matches.
pub fn match_lines(content: &str, query: &str) -> Vec<Match> {
    let query = query.to_lowercase();
    scan(content, |line| line.to_lowercase().contains(&query))
}

/// Regex variant of [`match_lines`] with identical line numbering and output
/// shape. Used internally; the HTTP surface only exposes substring search.
pub fn match_lines_regex(content: &str, regex: &Regex) -> Vec<Match> {
    scan(content, |line| regex.is_match(line))
}

fn scan(content: &str, predicate: impl Fn(&str) -> bool) -> Vec<Match> {
    let mut matches = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if predicate(line) {
            matches.push(Match {
                line: line.to_string(),
                line_num: idx + 1,
                document: String::new(),
            });
        }
    }
    matches
}
