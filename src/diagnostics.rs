//! Token-level reports used to debug how a typing mode classifies a snippet.
//!
//! Whitespace should never be typeable; most of these reports exist to catch
//! tokenizer output that violates that.

use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::Result;
use crate::preset::Language;
use crate::snippet::{Category, Line, SnippetData, Token};

const SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenDiagnostic {
    pub index: usize,
    pub text: String,
    pub display_text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub categories: BTreeSet<Category>,
    pub typeable: bool,
    pub base_typeable: bool,
    pub start_col: usize,
    pub end_col: usize,
}

impl TokenDiagnostic {
    fn new(index: usize, token: &Token) -> Self {
        Self {
            index,
            text: token.text.clone(),
            display_text: visualize_whitespace(&token.text),
            kind: token.kind.clone(),
            categories: token.categories.clone(),
            typeable: token.typeable,
            base_typeable: token.base_typeable,
            start_col: token.start_col,
            end_col: token.end_col,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WhitespaceSummary {
    pub total: usize,
    pub typeable: usize,
    pub non_typeable: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineDiagnostic {
    pub line_number: usize,
    pub typing_sequence: String,
    pub typeable_tokens: Vec<TokenDiagnostic>,
    pub non_typeable_tokens: Vec<TokenDiagnostic>,
    pub whitespace: WhitespaceSummary,
}

/// A token found at `line`, position `index` in the line's token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenLocation {
    pub line: usize,
    pub index: usize,
    pub token: Token,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProblemTokens {
    pub typeable_whitespace: Vec<TokenLocation>,
    /// Typeable tokens carrying no category at all.
    pub uncategorized: Vec<TokenLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageReport {
    pub language: Language,
    pub total_tokens: usize,
    pub typeable_tokens: usize,
    pub whitespace_tokens: usize,
    pub typeable_whitespace: usize,
    pub samples: Vec<TokenDiagnostic>,
}

#[derive(Debug, Serialize)]
struct ExportedToken<'a> {
    text: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    categories: &'a BTreeSet<Category>,
}

#[derive(Debug, Serialize)]
struct ExportedLocation<'a> {
    line: usize,
    token: ExportedToken<'a>,
}

#[derive(Debug, Serialize)]
struct ExportedSnippet<'a> {
    language: Language,
    total_lines: usize,
    typeable_whitespace_count: usize,
    typeable_whitespace_locations: Vec<ExportedLocation<'a>>,
}

/// Space, tab and newline as `·`, `→` and `↵`.
pub fn visualize_whitespace(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' ' => '·',
            '\t' => '→',
            '\n' => '↵',
            other => other,
        })
        .collect()
}

pub fn line_diagnostics(line: &Line) -> LineDiagnostic {
    let (typeable_tokens, non_typeable_tokens): (Vec<_>, Vec<_>) = line
        .tokens
        .iter()
        .enumerate()
        .map(|(idx, token)| TokenDiagnostic::new(idx, token))
        .partition(|diag| diag.typeable);

    let mut whitespace = WhitespaceSummary::default();
    for token in line.tokens.iter().filter(|t| t.is_whitespace()) {
        whitespace.total += 1;
        if token.typeable {
            whitespace.typeable += 1;
            tracing::warn!(
                line = line.line_number,
                text = %visualize_whitespace(&token.text),
                "whitespace token is typeable"
            );
        } else {
            whitespace.non_typeable += 1;
        }
    }

    LineDiagnostic {
        line_number: line.line_number,
        typing_sequence: line.typing_sequence.clone(),
        typeable_tokens,
        non_typeable_tokens,
        whitespace,
    }
}

pub fn find_problem_tokens(snippet: &SnippetData) -> ProblemTokens {
    let mut problems = ProblemTokens::default();
    for line in &snippet.lines {
        for (index, token) in line.tokens.iter().enumerate() {
            let location = || TokenLocation {
                line: line.line_number,
                index,
                token: token.clone(),
            };
            if token.is_whitespace() && token.typeable {
                problems.typeable_whitespace.push(location());
            }
            if token.typeable && token.categories.is_empty() {
                problems.uncategorized.push(location());
            }
        }
    }

    if !problems.typeable_whitespace.is_empty() {
        tracing::error!(
            language = %snippet.language,
            count = problems.typeable_whitespace.len(),
            "typeable whitespace tokens found"
        );
    }
    problems
}

pub fn compare_languages(snippets: &[SnippetData]) -> Vec<LanguageReport> {
    let reports: Vec<LanguageReport> = snippets
        .iter()
        .map(|snippet| {
            let tokens = || snippet.lines.iter().flat_map(|line| line.tokens.iter());
            LanguageReport {
                language: snippet.language,
                total_tokens: tokens().count(),
                typeable_tokens: tokens().filter(|t| t.typeable).count(),
                whitespace_tokens: tokens().filter(|t| t.is_whitespace()).count(),
                typeable_whitespace: tokens()
                    .filter(|t| t.is_whitespace() && t.typeable)
                    .count(),
                samples: tokens()
                    .filter(|t| t.typeable)
                    .take(SAMPLE_SIZE)
                    .enumerate()
                    .map(|(idx, token)| TokenDiagnostic::new(idx, token))
                    .collect(),
            }
        })
        .collect();

    if !reports.iter().map(|r| r.typeable_whitespace).all_equal() {
        let offenders = reports
            .iter()
            .filter(|r| r.typeable_whitespace > 0)
            .map(|r| format!("{}={}", r.language, r.typeable_whitespace))
            .join(", ");
        tracing::warn!(%offenders, "languages disagree on typeable whitespace");
    }
    reports
}

/// Pretty JSON listing typeable whitespace per snippet.
pub fn export_diagnostics(snippets: &[SnippetData]) -> Result<String> {
    let problems: Vec<ProblemTokens> = snippets.iter().map(find_problem_tokens).collect();
    let exported: Vec<ExportedSnippet<'_>> = snippets
        .iter()
        .zip(&problems)
        .map(|(snippet, problems)| ExportedSnippet {
            language: snippet.language,
            total_lines: snippet.total_lines,
            typeable_whitespace_count: problems.typeable_whitespace.len(),
            typeable_whitespace_locations: problems
                .typeable_whitespace
                .iter()
                .map(|loc| ExportedLocation {
                    line: loc.line,
                    token: ExportedToken {
                        text: &loc.token.text,
                        kind: &loc.token.kind,
                        categories: &loc.token.categories,
                    },
                })
                .collect(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&exported)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion;
    use crate::preset::Preset;

    fn typeable(mut token: Token) -> Token {
        token.typeable = true;
        token
    }

    fn broken_line() -> Line {
        Line::new(
            4,
            0,
            vec![
                typeable(Token::new("x", "identifier", &[Category::Identifier], 0)),
                typeable(Token::new(" ", "whitespace", &[], 1)),
                Token::new("\t", "whitespace", &[], 2),
                typeable(Token::new("?", "unknown", &[], 3)),
            ],
        )
    }

    fn snippet(language: Language, lines: Vec<Line>) -> SnippetData {
        SnippetData {
            language,
            total_lines: lines.len(),
            lines,
        }
    }

    #[test]
    fn whitespace_is_made_visible() {
        assert_eq!(visualize_whitespace("a b\tc\n"), "a·b→c↵");
    }

    #[test]
    fn line_report_splits_tokens() {
        let report = line_diagnostics(&broken_line());
        assert_eq!(report.line_number, 4);
        assert_eq!(
            report.typeable_tokens.iter().map(|d| d.index).collect::<Vec<_>>(),
            vec![0, 1, 3]
        );
        assert_eq!(report.non_typeable_tokens[0].display_text, "→");
        assert_eq!(
            report.whitespace,
            WhitespaceSummary {
                total: 2,
                typeable: 1,
                non_typeable: 1
            }
        );
    }

    #[test]
    fn problem_tokens_found() {
        let problems = find_problem_tokens(&snippet(Language::Python, vec![broken_line()]));
        assert_eq!(problems.typeable_whitespace.len(), 1);
        assert_eq!(problems.typeable_whitespace[0].index, 1);
        // the typeable space has no categories either
        assert_eq!(
            problems.uncategorized.iter().map(|l| l.index).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    #[test]
    fn filtered_embedded_snippets_are_clean() {
        for language in Language::ALL {
            let raw = SnippetData::embedded(language).unwrap();
            let filtered = exclusion::apply_to_snippet(&raw, Preset::Full);
            assert!(find_problem_tokens(&filtered).typeable_whitespace.is_empty());
        }
    }

    #[test]
    fn comparison_counts_per_language() {
        let clean = Line::new(
            0,
            0,
            vec![typeable(Token::new("y", "identifier", &[Category::Identifier], 0))],
        );
        let reports = compare_languages(&[
            snippet(Language::Python, vec![broken_line()]),
            snippet(Language::Tsx, vec![clean]),
        ]);
        assert_eq!(reports[0].total_tokens, 4);
        assert_eq!(reports[0].typeable_tokens, 3);
        assert_eq!(reports[0].whitespace_tokens, 2);
        assert_eq!(reports[0].typeable_whitespace, 1);
        assert_eq!(reports[0].samples.len(), 3);
        assert_eq!(reports[1].typeable_whitespace, 0);
        assert_eq!(reports[1].samples[0].text, "y");
    }

    #[test]
    fn export_is_json() {
        let json = export_diagnostics(&[snippet(Language::Javascript, vec![broken_line()])]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["language"], "javascript");
        assert_eq!(value[0]["total_lines"], 1);
        assert_eq!(value[0]["typeable_whitespace_count"], 1);
        assert_eq!(value[0]["typeable_whitespace_locations"][0]["token"]["type"], "whitespace");
    }

    #[test]
    fn reports_keep_tokenizer_tags() {
        let tag = Category::Other("template_literal".into());
        let line = Line::new(
            0,
            0,
            vec![
                typeable(Token::new("`", "`", &[tag.clone()], 0)),
                typeable(Token::new(" ", "whitespace", &[tag], 1)),
            ],
        );
        let report = line_diagnostics(&line);
        let json = serde_json::to_value(&report.typeable_tokens[0]).unwrap();
        assert_eq!(json["categories"][0], "template_literal");

        let exported = export_diagnostics(&[snippet(Language::Javascript, vec![line])]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(
            value[0]["typeable_whitespace_locations"][0]["token"]["categories"][0],
            "template_literal"
        );
    }
}
