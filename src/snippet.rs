use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::preset::Language;

static SNIPPET_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/snippets");

/// Tag classifying a token for exclusion rules.
///
/// Stored as the tokenizer's tag string. Tags no preset knows about are kept
/// verbatim in [`Category::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Parenthesis,
    CurlyBrace,
    SquareBracket,
    AngleBracket,
    Operator,
    Punctuation,
    StringContent,
    StringDelimiter,
    Comment,
    Keyword,
    Identifier,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Parenthesis => "parenthesis",
            Category::CurlyBrace => "curly_brace",
            Category::SquareBracket => "square_bracket",
            Category::AngleBracket => "angle_bracket",
            Category::Operator => "operator",
            Category::Punctuation => "punctuation",
            Category::StringContent => "string_content",
            Category::StringDelimiter => "string_delimiter",
            Category::Comment => "comment",
            Category::Keyword => "keyword",
            Category::Identifier => "identifier",
            Category::Other(tag) => tag,
        }
    }
}

impl From<String> for Category {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "parenthesis" => Category::Parenthesis,
            "curly_brace" => Category::CurlyBrace,
            "square_bracket" => Category::SquareBracket,
            "angle_bracket" => Category::AngleBracket,
            "operator" => Category::Operator,
            "punctuation" => Category::Punctuation,
            "string_content" => Category::StringContent,
            "string_delimiter" => Category::StringDelimiter,
            "comment" => Category::Comment,
            "keyword" => Category::Keyword,
            "identifier" => Category::Identifier,
            _ => Category::Other(tag),
        }
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// A lexical unit of a source line as produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub categories: BTreeSet<Category>,
    pub base_typeable: bool,
    #[serde(default)]
    pub typeable: bool,
    pub start_col: usize,
    pub end_col: usize,
}

impl Token {
    pub fn new(text: &str, kind: &str, categories: &[Category], start_col: usize) -> Self {
        Self {
            text: text.to_string(),
            kind: kind.to_string(),
            categories: categories.iter().cloned().collect(),
            base_typeable: !text.trim().is_empty(),
            typeable: false,
            start_col,
            end_col: start_col + text.chars().count(),
        }
    }

    pub fn with_base_typeable(mut self, base_typeable: bool) -> Self {
        self.base_typeable = base_typeable;
        self
    }

    pub fn is_whitespace(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

/// Back-reference from a typing-sequence position to the token it came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharPos {
    pub token_idx: usize,
    /// Start column of the owning token, shared by all of its characters.
    pub display_col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub line_number: usize,
    pub indent_level: usize,
    #[serde(rename = "display_tokens")]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub typing_sequence: String,
    #[serde(default)]
    pub char_map: BTreeMap<usize, CharPos>,
}

impl Line {
    pub fn new(line_number: usize, indent_level: usize, tokens: Vec<Token>) -> Self {
        Self {
            line_number,
            indent_level,
            tokens,
            typing_sequence: String::new(),
            char_map: BTreeMap::new(),
        }
    }

    /// Number of characters the user must type on this line.
    pub fn typing_len(&self) -> usize {
        self.typing_sequence.chars().count()
    }

    pub fn expected_char(&self, idx: usize) -> Option<char> {
        self.typing_sequence.chars().nth(idx)
    }

    pub fn is_typeable(&self) -> bool {
        !self.typing_sequence.is_empty()
    }
}

/// A tokenized snippet as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetData {
    pub language: Language,
    pub total_lines: usize,
    pub lines: Vec<Line>,
}

impl SnippetData {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Built-in default snippet for a language.
    pub fn embedded(language: Language) -> Result<Self> {
        let file_name = format!("{language}.json");
        let file = SNIPPET_DIR
            .get_file(&file_name)
            .ok_or_else(|| Error::SnippetNotFound(file_name.clone()))?;
        let json = file
            .contents_utf8()
            .ok_or_else(|| Error::SnippetNotFound(file_name.clone()))?;
        Self::from_json(json)
    }
}

/// Identity of the snippet being practiced, used to key practice stats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetInfo {
    pub path: Option<PathBuf>,
    pub id: Option<String>,
    pub language: Option<Language>,
}

impl SnippetInfo {
    /// `snippets/python/foo.json` becomes id `python-foo`.
    pub fn from_path<P: AsRef<Path>>(path: P, language: Language) -> Self {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = path
            .parent()
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy().into_owned());
        let id = match parent {
            Some(dir) if !dir.is_empty() => format!("{dir}-{stem}"),
            _ => stem,
        };

        Self {
            path: Some(path.to_path_buf()),
            id: Some(id),
            language: Some(language),
        }
    }

    pub fn embedded(language: Language) -> Self {
        Self {
            path: None,
            id: Some(format!("{language}-default")),
            language: Some(language),
        }
    }
}

/// Pick a random snippet file below `dir`.
pub fn random_snippet_path<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let mut found = Vec::new();
    collect_json_files(dir, &mut found)?;
    found.sort();

    let mut rng = rand::thread_rng();
    found
        .choose(&mut rng)
        .cloned()
        .ok_or_else(|| Error::EmptySnippetDir(dir.display().to_string()))
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json")
            && path.file_name().is_some_and(|name| name != "metadata.json")
        {
            out.push(path);
        }
    }
    Ok(())
}
