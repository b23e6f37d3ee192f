use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::snippet::Category;

/// Typing mode: a fixed rule set deciding which tokens must be typed.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Preset {
    Minimal,
    #[default]
    Standard,
    Full,
}

/// The exclusion rules behind a [`Preset`].
#[derive(Debug, PartialEq, Eq)]
pub struct PresetRules {
    pub name: &'static str,
    pub description: &'static str,
    pub excluded_categories: &'static [Category],
    /// Literal token texts that stay typeable even when a category would exclude them.
    pub include_specific: &'static [&'static str],
}

impl PresetRules {
    pub fn excludes(&self, category: &Category) -> bool {
        self.excluded_categories.contains(category)
    }

    pub fn includes_text(&self, text: &str) -> bool {
        self.include_specific.contains(&text)
    }
}

const MINIMAL: PresetRules = PresetRules {
    name: "Minimal",
    description: "Type only keywords and identifiers",
    excluded_categories: &[
        Category::Parenthesis,
        Category::CurlyBrace,
        Category::SquareBracket,
        Category::AngleBracket,
        Category::Operator,
        Category::Punctuation,
        Category::StringContent,
        Category::StringDelimiter,
        Category::Comment,
    ],
    include_specific: &[],
};

const STANDARD: PresetRules = PresetRules {
    name: "Standard",
    description: "Balanced practice without pinky strain (recommended)",
    excluded_categories: &[
        Category::CurlyBrace,
        Category::SquareBracket,
        Category::AngleBracket,
        Category::StringContent,
        Category::Punctuation,
        Category::StringDelimiter,
        Category::Comment,
    ],
    include_specific: &[":", ".", ",", "(", ")"],
};

const FULL: PresetRules = PresetRules {
    name: "Full",
    description: "Type everything except whitespace and comments",
    excluded_categories: &[Category::Comment, Category::StringContent],
    include_specific: &[],
};

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Minimal, Preset::Standard, Preset::Full];

    pub fn rules(self) -> &'static PresetRules {
        match self {
            Preset::Minimal => &MINIMAL,
            Preset::Standard => &STANDARD,
            Preset::Full => &FULL,
        }
    }

    pub fn display_name(self) -> &'static str {
        self.rules().name
    }

    /// Next preset in the minimal -> standard -> full cycle.
    pub fn next(self) -> Preset {
        match self {
            Preset::Minimal => Preset::Standard,
            Preset::Standard => Preset::Full,
            Preset::Full => Preset::Minimal,
        }
    }
}

/// Source languages the tokenizer produces snippets for.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Javascript,
    Typescript,
    Tsx,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::Javascript,
        Language::Typescript,
        Language::Tsx,
    ];

    /// Next language in [`Language::ALL`] order, wrapping around.
    pub fn next(self) -> Language {
        match self {
            Language::Python => Language::Javascript,
            Language::Javascript => Language::Typescript,
            Language::Typescript => Language::Tsx,
            Language::Tsx => Language::Python,
        }
    }
}
