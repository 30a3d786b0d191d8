//! Post-processing of raw decoded model output.
//!
//! A generation call hands back the whole decoded sequence: the echoed
//! prompt, role tags, end-of-turn tokens and finally the completion itself.
//! [`ResponseCleaner`] recovers only the assistant's utterance from that text.
//!
//! Each [`TemplateVariant`] selects a [`CleanerProfile`]: the markers that
//! open and close an assistant turn, what happens when no assistant marker is
//! present, and how whitespace is normalised.  The profiles intentionally
//! differ in their newline threshold and fallback behaviour; see the profile
//! constructors for the exact rules.
//!
//! Cleaning never fails.  Garbled-but-present output degrades to the trimmed
//! raw text instead of an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Chat-template family of the model whose output is being cleaned.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum TemplateVariant {
    /// `<|system|>` / `<|user|>` / `<|assistant|>` role tags, answers closed
    /// by `<|endofanswer|>`.
    #[default]
    #[serde(rename = "generic")]
    #[strum(to_string = "generic", serialize = "generic_assistant_tag")]
    GenericAssistantTag,
    /// Gemma 2 turns: `<start_of_turn>model ... <end_of_turn>`.
    #[serde(rename = "gemma2")]
    #[strum(to_string = "gemma2", serialize = "gemma2_style")]
    Gemma2Style,
}

impl TemplateVariant {
    fn profile(self) -> &'static CleanerProfile {
        match self {
            TemplateVariant::GenericAssistantTag => &GENERIC_PROFILE,
            TemplateVariant::Gemma2Style => &GEMMA2_PROFILE,
        }
    }
}

/// Behaviour when the raw text contains no assistant marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    /// Treat the whole trimmed text as the reply and clean it.
    CleanWhole,
    /// Return the trimmed text as-is.
    TrimOnly,
}

/// Marker sets and normalisation thresholds for one template family.
#[derive(Debug)]
struct CleanerProfile {
    /// Assistant-role marker; the last match opens the reply.
    assistant: Regex,
    /// First match after the opening marker closes the reply.
    boundary: Regex,
    fallback: Fallback,
    /// Remove leftover special tokens from the reply.
    strip_markup: bool,
    /// Newline runs at or above the threshold...
    newline_run: Regex,
    /// ...are replaced with this.
    newline_collapsed: &'static str,
    /// Squash runs of spaces and tabs into one space.
    collapse_blanks: bool,
}

static GENERIC_PROFILE: LazyLock<CleanerProfile> = LazyLock::new(CleanerProfile::generic);
static GEMMA2_PROFILE: LazyLock<CleanerProfile> = LazyLock::new(CleanerProfile::gemma2);

/// `<|...|>` control tokens: role tags, `<|endofanswer|>`, `<|context|>`, ...
static SPECIAL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|[^|]*\|>").expect("valid special token pattern"));

/// Start/end-of-sequence markers.
static SEQUENCE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?s>|<eos>").expect("valid sequence token pattern"));

static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid blank run pattern"));

/// End-of-turn markers of other tokenizer families that leak into outputs.
const FOREIGN_END_TOKENS: [&str; 4] = ["<end_of_turn>", "<|end|>", "<|endoftext|>", "<|im_end|>"];

impl CleanerProfile {
    /// Reply runs from the last `<|assistant|>` to the earliest of
    /// `<|endofanswer|>`, the start of a user or system tag (closing `>`
    /// optional), another assistant tag, or the end of the text.  Without
    /// an assistant tag the whole text is cleaned.  Newline runs of 3+ become
    /// 2 and blank runs become one space.
    fn generic() -> Self {
        Self {
            assistant: compile(r"<\|assistant\|>\s*"),
            boundary: compile(r"<\|endofanswer\|>|<\|user\||<\|system\||<\|assistant\|>"),
            fallback: Fallback::CleanWhole,
            strip_markup: true,
            newline_run: compile(r"\n{3,}"),
            newline_collapsed: "\n\n",
            collapse_blanks: true,
        }
    }

    /// Reply runs from the last `<start_of_turn>model` (or `<|assistant|>`)
    /// to the first `<`, which covers `<end_of_turn>`, `<eos>` and `</s>`.
    /// Without an assistant marker the trimmed text is returned untouched.
    /// Newline runs of 2+ become 1.
    fn gemma2() -> Self {
        Self {
            assistant: compile(r"<start_of_turn>model|<\|assistant\|>"),
            boundary: compile(r"<end_of_turn>|<eos>|</s>|<"),
            fallback: Fallback::TrimOnly,
            strip_markup: false,
            newline_run: compile(r"\n{2,}"),
            newline_collapsed: "\n",
            collapse_blanks: false,
        }
    }

    /// Text between the last assistant marker and the first boundary after it.
    fn extract<'a>(&self, raw: &'a str) -> Option<&'a str> {
        let opening = self.assistant.find_iter(raw).last()?;
        let rest = &raw[opening.end()..];
        let end = self.boundary.find(rest).map_or(rest.len(), |m| m.start());
        Some(&rest[..end])
    }

    fn clean(&self, raw: &str) -> String {
        let candidate = match self.extract(raw) {
            Some(reply) => reply.trim(),
            None => match self.fallback {
                Fallback::CleanWhole => raw.trim(),
                Fallback::TrimOnly => return raw.trim().to_owned(),
            },
        };

        let mut text = if self.strip_markup {
            strip_markup(candidate)
        } else {
            candidate.to_owned()
        };

        text = self
            .newline_run
            .replace_all(&text, self.newline_collapsed)
            .into_owned();
        if self.collapse_blanks {
            text = BLANK_RUN.replace_all(&text, " ").into_owned();
        }

        text.trim().to_owned()
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid marker pattern")
}

/// Removes special, sequence and foreign end tokens until none remain.
///
/// Removing one token can splice the halves of another together, so the
/// passes repeat until the text stops changing.
fn strip_markup(text: &str) -> String {
    let mut current = text.to_owned();
    loop {
        let mut next = SPECIAL_TOKEN.replace_all(&current, "").into_owned();
        next = SEQUENCE_TOKEN.replace_all(&next, "").into_owned();
        for token in FOREIGN_END_TOKENS {
            next = next.replace(token, "");
        }
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Turns raw decoded model output into the assistant's reply.
///
/// Stateless apart from the selected variant; share it freely across tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseCleaner {
    variant: TemplateVariant,
}

impl ResponseCleaner {
    pub fn new(variant: TemplateVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> TemplateVariant {
        self.variant
    }

    /// Extract and normalise the assistant reply from `raw`.
    ///
    /// Deterministic and idempotent: cleaning a cleaned reply returns it
    /// unchanged.
    pub fn clean(&self, raw: &str) -> String {
        clean(raw, self.variant)
    }
}

/// Free-function form of [`ResponseCleaner::clean`].
pub fn clean(raw: &str, variant: TemplateVariant) -> String {
    variant.profile().clean(raw)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
