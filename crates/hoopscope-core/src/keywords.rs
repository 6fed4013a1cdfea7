// Keyword table mapping play type labels to box-score categories.
//
// The feed only gives a free-text type label ("JumpShot", "Foul") and a
// free-text description. Each play lands in at most one category: the first
// rule in `PLAY_RULES` whose keyword appears in the lower-cased type label
// wins. Assists are not part of the table; they are read from the
// description separately, since an assist shares its play with the shot it
// set up.

use serde::{Deserialize, Serialize};

/// Box-score category a play counts toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatCategory {
    FieldGoal,
    FreeThrow,
    Rebound,
    Steal,
    Block,
    Turnover,
    Foul,
}

impl StatCategory {
    /// Field goals and free throws.
    pub fn is_shot(&self) -> bool {
        matches!(self, StatCategory::FieldGoal | StatCategory::FreeThrow)
    }
}

/// One row of the dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    /// Any of these (lower-case) substrings of the type label triggers the
    /// rule.
    pub keywords: &'static [&'static str],
    pub category: StatCategory,
}

impl KeywordRule {
    fn matches(&self, type_label: &str) -> bool {
        self.keywords.iter().any(|k| type_label.contains(k))
    }
}

/// Ordered dispatch table. Order is significant.
pub const PLAY_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["jumpshot", "layupshot", "dunkshot"],
        category: StatCategory::FieldGoal,
    },
    KeywordRule {
        keywords: &["freethrow"],
        category: StatCategory::FreeThrow,
    },
    KeywordRule {
        keywords: &["rebound"],
        category: StatCategory::Rebound,
    },
    KeywordRule {
        keywords: &["steal"],
        category: StatCategory::Steal,
    },
    KeywordRule {
        keywords: &["block"],
        category: StatCategory::Block,
    },
    KeywordRule {
        keywords: &["turnover"],
        category: StatCategory::Turnover,
    },
    KeywordRule {
        keywords: &["foul"],
        category: StatCategory::Foul,
    },
];

const MADE_KEYWORD: &str = "makes";
/// The feed writes "three point"; hand-entered and older descriptions use
/// the numeric spellings.
const THREE_KEYWORDS: &[&str] = &["three point", "three-point", "3-point", "3 point"];
const ASSIST_KEYWORD: &str = "assists";

/// First category in `PLAY_RULES` matching the type label, or `None` for
/// plays that carry no counted stat of their own (timeouts, substitutions,
/// period ends, standalone assist entries).
pub fn categorize(type_label: &str) -> Option<StatCategory> {
    let type_label = type_label.to_lowercase();
    PLAY_RULES
        .iter()
        .find(|rule| rule.matches(&type_label))
        .map(|rule| rule.category)
}

/// Whether the description reports a made shot.
pub fn is_made(text: &str) -> bool {
    text.to_lowercase().contains(MADE_KEYWORD)
}

/// Whether the description reports a three-point attempt.
pub fn is_three(text: &str) -> bool {
    let text = text.to_lowercase();
    THREE_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Whether the description credits an assist.
pub fn mentions_assist(text: &str) -> bool {
    text.to_lowercase().contains(ASSIST_KEYWORD)
}
