//! Turns tokenized lines into the character stream the user has to type.
//!
//! Every token is resolved against the active [`Preset`] in a fixed priority
//! order, then the typing sequence and the char map are rebuilt from the
//! tokens that ended up typeable. Nothing here keeps state: re-running on an
//! already filtered line gives the same result because only `base_typeable`,
//! the text and the categories feed the decision.

use std::collections::BTreeMap;

use crate::preset::{Preset, PresetRules};
use crate::snippet::{Category, CharPos, Line, SnippetData, Token};

/// Recompute typeable flags, typing sequence and char map of `line` for `preset`.
pub fn recompute(line: &Line, preset: Preset) -> Line {
    let rules = preset.rules();
    let tokens: Vec<Token> = line
        .tokens
        .iter()
        .enumerate()
        .map(|(idx, token)| Token {
            typeable: resolve_typeable(&line.tokens, idx, rules),
            ..token.clone()
        })
        .collect();

    let (typing_sequence, char_map) = build_sequence(&tokens);

    Line {
        line_number: line.line_number,
        indent_level: line.indent_level,
        tokens,
        typing_sequence,
        char_map,
    }
}

/// Filter every line of a snippet, producing a brand new snippet.
pub fn apply_to_snippet(snippet: &SnippetData, preset: Preset) -> SnippetData {
    let lines: Vec<Line> = snippet
        .lines
        .iter()
        .map(|line| recompute(line, preset))
        .collect();

    tracing::debug!(
        preset = %preset,
        lines = lines.len(),
        typeable_chars = lines.iter().map(Line::typing_len).sum::<usize>(),
        "applied typing mode"
    );

    SnippetData {
        language: snippet.language,
        total_lines: snippet.total_lines,
        lines,
    }
}

fn resolve_typeable(tokens: &[Token], idx: usize, rules: &PresetRules) -> bool {
    let token = &tokens[idx];

    if token.is_whitespace() {
        return false;
    }

    if !token.base_typeable {
        return false;
    }

    if is_tag_name(tokens, idx) && rules.excludes(&Category::AngleBracket) {
        return false;
    }

    if rules.includes_text(&token.text) {
        return true;
    }

    if token.categories.is_empty() {
        return true;
    }

    !token.categories.iter().any(|c| rules.excludes(c))
}

/// An identifier right after `<` or `</` whose tag is closed by `>` or `/>`
/// before any other `<` or `{` shows up on the same line.
fn is_tag_name(tokens: &[Token], idx: usize) -> bool {
    let Some(prev) = idx.checked_sub(1).map(|p| &tokens[p]) else {
        return false;
    };
    if prev.text != "<" && prev.text != "</" {
        return false;
    }
    if !is_identifier_like(&tokens[idx]) {
        return false;
    }

    for token in &tokens[idx + 1..] {
        match token.text.as_str() {
            ">" | "/>" => return true,
            "<" | "{" => return false,
            _ => {}
        }
    }
    false
}

fn is_identifier_like(token: &Token) -> bool {
    if token.has_category(Category::Identifier) || token.kind.contains("identifier") {
        return true;
    }

    let mut chars = token.text.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => chars
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '$')),
        _ => false,
    }
}

fn build_sequence(tokens: &[Token]) -> (String, BTreeMap<usize, CharPos>) {
    let mut typing_sequence = String::new();
    let mut char_map = BTreeMap::new();

    for (token_idx, token) in tokens.iter().enumerate().filter(|(_, t)| t.typeable) {
        for c in token.text.chars() {
            char_map.insert(
                char_map.len(),
                CharPos {
                    token_idx,
                    display_col: token.start_col,
                },
            );
            typing_sequence.push(c);
        }
    }

    (typing_sequence, char_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snippet::Category::*;

    fn ws(col: usize) -> Token {
        Token::new(" ", "whitespace", &[], col)
    }

    fn line(tokens: Vec<Token>) -> Line {
        Line::new(0, 0, tokens)
    }

    fn typeable_texts(line: &Line) -> Vec<&str> {
        line.tokens
            .iter()
            .filter(|t| t.typeable)
            .map(|t| t.text.as_str())
            .collect()
    }

    fn call_line() -> Line {
        // print(x, "hi")
        line(vec![
            Token::new("print", "identifier", &[Identifier], 0),
            Token::new("(", "(", &[Parenthesis, Punctuation], 5),
            Token::new("x", "identifier", &[Identifier], 6),
            Token::new(",", ",", &[Punctuation], 7),
            ws(8),
            Token::new("\"", "string_start", &[StringDelimiter], 9),
            Token::new("hi", "string_content", &[StringContent], 10),
            Token::new("\"", "string_end", &[StringDelimiter], 12),
            Token::new(")", ")", &[Parenthesis, Punctuation], 13),
        ])
    }

    #[test]
    fn whitespace_never_typeable() {
        let mut tab = Token::new("\t", "whitespace", &[], 0).with_base_typeable(true);
        tab.typeable = true;
        let mut paren_ws = Token::new("  ", "(", &[Parenthesis], 1).with_base_typeable(true);
        paren_ws.typeable = true;

        for preset in Preset::ALL {
            let out = recompute(&line(vec![tab.clone(), paren_ws.clone()]), preset);
            assert!(out.tokens.iter().all(|t| !t.typeable));
            assert_eq!(out.typing_sequence, "");
            assert!(out.char_map.is_empty());
        }
    }

    #[test]
    fn base_non_typeable_stays_off() {
        let tok = Token::new(":", ":", &[], 0).with_base_typeable(false);
        let out = recompute(&line(vec![tok]), Preset::Standard);
        assert!(!out.tokens[0].typeable);
    }

    #[test]
    fn standard_mode_types_call_punctuation_only() {
        let out = recompute(&call_line(), Preset::Standard);
        assert_eq!(typeable_texts(&out), vec!["print", "(", "x", ",", ")"]);
        assert_eq!(out.typing_sequence, "print(x,)");
    }

    #[test]
    fn minimal_mode_types_identifiers_only() {
        let out = recompute(&call_line(), Preset::Minimal);
        assert_eq!(out.typing_sequence, "printx");
    }

    #[test]
    fn full_mode_keeps_delimiters_but_drops_string_content() {
        let out = recompute(&call_line(), Preset::Full);
        assert_eq!(out.typing_sequence, "print(x,\"\")");
    }

    #[test]
    fn uncategorized_tokens_are_typeable() {
        let out = recompute(&line(vec![Token::new("42", "number", &[], 0)]), Preset::Minimal);
        assert_eq!(out.typing_sequence, "42");
    }

    #[test]
    fn comments_always_excluded() {
        let comment = Token::new("# note", "comment", &[Comment], 0);
        for preset in Preset::ALL {
            let out = recompute(&line(vec![comment.clone()]), preset);
            assert_eq!(out.typing_sequence, "", "{preset}");
        }
    }

    #[test]
    fn char_map_points_each_char_at_token_start() {
        let out = recompute(&call_line(), Preset::Standard);
        assert_eq!(out.char_map.len(), out.typing_len());
        assert_eq!(out.char_map[&0], CharPos { token_idx: 0, display_col: 0 });
        assert_eq!(out.char_map[&4], CharPos { token_idx: 0, display_col: 0 });
        assert_eq!(out.char_map[&5], CharPos { token_idx: 1, display_col: 5 });
        assert_eq!(out.char_map[&8], CharPos { token_idx: 8, display_col: 13 });
        let keys: Vec<usize> = out.char_map.keys().copied().collect();
        assert_eq!(keys, (0..out.typing_len()).collect::<Vec<_>>());
    }

    #[test]
    fn recompute_is_idempotent() {
        for preset in Preset::ALL {
            let once = recompute(&call_line(), preset);
            let twice = recompute(&once, preset);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn switching_presets_does_not_leak_state() {
        let full = recompute(&call_line(), Preset::Full);
        let back = recompute(&full, Preset::Minimal);
        assert_eq!(back, recompute(&call_line(), Preset::Minimal));
    }

    fn jsx_open_tag() -> Line {
        // <div className="x">
        line(vec![
            Token::new("<", "<", &[AngleBracket, Punctuation], 0),
            Token::new("div", "identifier", &[Identifier], 1),
            ws(4),
            Token::new("className", "property_identifier", &[Identifier], 5),
            Token::new("=", "=", &[Operator], 14),
            Token::new("\"", "string_start", &[StringDelimiter], 15),
            Token::new("x", "string_fragment", &[StringContent], 16),
            Token::new("\"", "string_end", &[StringDelimiter], 17),
            Token::new(">", ">", &[AngleBracket, Punctuation], 18),
        ])
    }

    #[test]
    fn tag_name_excluded_with_angle_brackets() {
        let out = recompute(&jsx_open_tag(), Preset::Standard);
        assert!(!out.tokens[1].typeable, "tag name should be skipped");
        assert!(out.tokens[3].typeable, "attribute name stays");
        assert_eq!(out.typing_sequence, "className=");
    }

    #[test]
    fn tag_name_typed_when_angle_brackets_are() {
        let out = recompute(&jsx_open_tag(), Preset::Full);
        assert!(out.tokens[1].typeable);
        assert_eq!(out.typing_sequence, "<divclassName=\"\">");
    }

    #[test]
    fn closing_tag_name_excluded() {
        let closing = line(vec![
            Token::new("</", "</", &[AngleBracket, Punctuation], 0),
            Token::new("span", "identifier", &[Identifier], 2),
            Token::new(">", ">", &[AngleBracket, Punctuation], 6),
        ]);
        let out = recompute(&closing, Preset::Minimal);
        assert_eq!(out.typing_sequence, "");
    }

    #[test]
    fn tag_scan_bails_on_brace_or_second_open() {
        // a < {b} > c : the brace stops the scan, so `a`-style names stay typeable
        let braced = line(vec![
            Token::new("<", "<", &[Operator], 0),
            Token::new("b", "identifier", &[Identifier], 1),
            Token::new("{", "{", &[CurlyBrace], 2),
            Token::new(">", ">", &[Operator], 3),
        ]);
        let out = recompute(&braced, Preset::Standard);
        assert!(out.tokens[1].typeable);

        let nested = line(vec![
            Token::new("<", "<", &[Operator], 0),
            Token::new("b", "identifier", &[Identifier], 1),
            Token::new("<", "<", &[Operator], 2),
            Token::new(">", ">", &[Operator], 3),
        ]);
        let out = recompute(&nested, Preset::Standard);
        assert!(out.tokens[1].typeable);
    }

    #[test]
    fn unclosed_tag_is_not_a_tag() {
        let cmp = line(vec![
            Token::new("a", "identifier", &[Identifier], 0),
            Token::new("<", "<", &[Operator], 1),
            Token::new("b", "identifier", &[Identifier], 2),
        ]);
        let out = recompute(&cmp, Preset::Standard);
        assert_eq!(out.typing_sequence, "a<b");
    }

    #[test]
    fn generic_argument_reads_as_tag_name() {
        // Array<string> looks like a tag to the scan; kept as-is.
        let generic = line(vec![
            Token::new("Array", "type_identifier", &[Identifier], 0),
            Token::new("<", "<", &[AngleBracket], 5),
            Token::new("string", "predefined_type", &[], 6),
            Token::new(">", ">", &[AngleBracket], 12),
        ]);
        let out = recompute(&generic, Preset::Standard);
        assert_eq!(out.typing_sequence, "Array");
    }

    #[test]
    fn include_specific_beats_category_exclusion() {
        let colon = Token::new(":", ":", &[Punctuation], 0);
        let out = recompute(&line(vec![colon]), Preset::Standard);
        assert!(out.tokens[0].typeable);
        assert_eq!(out.typing_sequence, ":");
    }

    #[test]
    fn apply_to_snippet_filters_every_line() {
        let snippet = SnippetData::embedded(crate::preset::Language::Python).unwrap();
        let filtered = apply_to_snippet(&snippet, Preset::Standard);
        assert_eq!(filtered.lines.len(), snippet.lines.len());
        assert_eq!(filtered.lines[1].typing_sequence, "defeven_squares(values):");
        assert_eq!(filtered.lines[0].typing_sequence, "");
    }
}
