//! Thread composition
//!
//! `ThreadComposer` is the single owner of the ordered draft collection a
//! front end edits. Positions are always contiguous from 0, there is always
//! at least one draft, and editing the last non-empty draft appends a fresh
//! empty one (auto-expansion) until the thread size limit is reached.

use serde::Deserialize;

use super::validation::{CounterLevel, ValidationService};
use crate::error::{Result, ValidationError};
use crate::format::format_text;
use crate::types::{char_len, FormatStyle, PostDraft};

/// Tidy line breaks and spaces that end up in front of punctuation
///
/// - newlines before `.` or `,` are removed
/// - newlines before ` -` collapse into that space
/// - whitespace before `.` or `,` is removed
pub fn cleanup_line_breaks(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let joined = drop_runs(&chars, |c| c == '\n', |rest| rest.starts_with(&[' ', '-']));
    drop_runs(&joined, char::is_whitespace, |rest| {
        matches!(rest.first(), Some('.') | Some(','))
    })
    .into_iter()
    .collect()
}

/// Remove every maximal run of `in_run` characters that `followed_by` accepts
fn drop_runs(
    chars: &[char],
    in_run: impl Fn(char) -> bool,
    followed_by: impl Fn(&[char]) -> bool,
) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if !in_run(chars[i]) {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let end = chars[i..]
            .iter()
            .position(|c| !in_run(*c))
            .map_or(chars.len(), |p| i + p);
        if !followed_by(&chars[end..]) {
            out.extend_from_slice(&chars[i..end]);
        }
        i = end;
    }
    out
}

/// One entry of an imported thread file
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportEntry {
    Text(String),
    Draft(PostDraft),
}

pub struct ThreadComposer {
    drafts: Vec<PostDraft>,
    validation: ValidationService,
}

impl ThreadComposer {
    pub fn new(validation: ValidationService) -> Self {
        Self {
            drafts: vec![PostDraft::new(0, "")],
            validation,
        }
    }

    /// Rebuild the collection from saved drafts
    ///
    /// Saved positions are kept; gaps become empty drafts.
    pub fn from_drafts(validation: ValidationService, saved: Vec<PostDraft>) -> Self {
        let mut composer = Self::new(validation);
        composer.restore(saved);
        composer
    }

    fn restore(&mut self, mut saved: Vec<PostDraft>) {
        saved.sort_by_key(|d| d.index);
        let max = self.validation.max_posts();

        let mut drafts: Vec<PostDraft> = Vec::new();
        for draft in saved.into_iter().filter(|d| d.index < max) {
            while drafts.len() < draft.index {
                drafts.push(PostDraft::new(drafts.len(), ""));
            }
            if drafts.len() == draft.index {
                drafts.push(draft);
            }
        }

        self.drafts = drafts;
        if self.drafts.is_empty() {
            self.drafts.push(PostDraft::new(0, ""));
        }
        let last = self.drafts.len() - 1;
        self.expand_after(last);
    }

    pub fn drafts(&self) -> &[PostDraft] {
        &self.drafts
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.iter().all(PostDraft::is_blank)
    }

    pub fn get(&self, index: usize) -> Option<&PostDraft> {
        self.drafts.get(index)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.drafts.len() {
            Ok(())
        } else {
            Err(ValidationError::InvalidDrafts(format!("no post at position {}", index + 1)).into())
        }
    }

    fn check_capacity(&self) -> Result<()> {
        let max = self.validation.max_posts();
        if self.drafts.len() >= max {
            return Err(ValidationError::TooManyPosts {
                count: self.drafts.len() + 1,
                max,
            }
            .into());
        }
        Ok(())
    }

    fn renumber(&mut self) {
        for (i, draft) in self.drafts.iter_mut().enumerate() {
            draft.index = i;
        }
    }

    /// Insert an empty draft after `index` and return its position
    pub fn add_after(&mut self, index: usize) -> Result<usize> {
        self.check_index(index)?;
        self.check_capacity()?;
        let position = index + 1;
        self.drafts.insert(position, PostDraft::new(position, ""));
        self.renumber();
        Ok(position)
    }

    /// Append an empty draft and return its position
    pub fn push(&mut self) -> Result<usize> {
        self.add_after(self.drafts.len() - 1)
    }

    /// Remove a draft; the last remaining one is cleared instead
    pub fn remove(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if self.drafts.len() == 1 {
            self.drafts[0] = PostDraft::new(0, "");
        } else {
            self.drafts.remove(index);
            self.renumber();
        }
        Ok(())
    }

    /// Replace a draft's text, tidying line breaks and auto-expanding
    pub fn set_content(&mut self, index: usize, text: &str) -> Result<()> {
        self.check_index(index)?;
        self.drafts[index].content = cleanup_line_breaks(text);
        self.expand_after(index);
        Ok(())
    }

    pub fn set_style(&mut self, index: usize, style: FormatStyle) -> Result<()> {
        self.check_index(index)?;
        self.drafts[index].format_style = style;
        Ok(())
    }

    fn expand_after(&mut self, index: usize) {
        if self.drafts[index].is_blank() {
            return;
        }
        let next_is_empty = self.drafts.get(index + 1).is_some_and(PostDraft::is_blank);
        if !next_is_empty && self.drafts.len() < self.validation.max_posts() {
            self.drafts.insert(index + 1, PostDraft::new(index + 1, ""));
            self.renumber();
        }
    }

    /// Length of the draft as it will be posted (after formatting)
    pub fn character_count(&self, index: usize) -> usize {
        self.drafts
            .get(index)
            .map_or(0, |d| char_len(&format_text(&d.content, d.format_style)))
    }

    pub fn counter_level(&self, index: usize) -> CounterLevel {
        self.validation.counter_level(self.character_count(index))
    }

    /// Non-blank drafts formatted per their style, in order
    pub fn formatted_bodies(&self) -> Vec<String> {
        self.drafts
            .iter()
            .filter(|d| !d.is_blank())
            .map(|d| format_text(&d.content, d.format_style))
            .collect()
    }

    /// Back to a single empty draft
    pub fn reset(&mut self) {
        self.drafts = vec![PostDraft::new(0, "")];
    }

    /// Non-blank drafts as a pretty-printed JSON array
    pub fn export_json(&self) -> Result<String> {
        let kept: Vec<&PostDraft> = self.drafts.iter().filter(|d| !d.is_blank()).collect();
        serde_json::to_string_pretty(&kept)
            .map_err(|e| ValidationError::InvalidDrafts(e.to_string()).into())
    }

    /// Replace every draft with the contents of a JSON array
    ///
    /// Entries are draft objects or plain strings. Anything else, duplicate
    /// positions, or more posts than allowed is rejected and leaves the
    /// composer unchanged.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let entries: Vec<ImportEntry> = serde_json::from_str(json)
            .map_err(|e| ValidationError::InvalidDrafts(e.to_string()))?;

        let drafts = entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| match entry {
                ImportEntry::Text(text) => PostDraft::new(position, text),
                ImportEntry::Draft(draft) => draft,
            })
            .collect();
        self.replace_all(drafts)
    }

    /// Replace every draft with plain bodies, in order
    pub fn import_texts<I, S>(&mut self, texts: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let drafts = texts
            .into_iter()
            .enumerate()
            .map(|(position, text)| PostDraft::new(position, text))
            .collect();
        self.replace_all(drafts)
    }

    fn replace_all(&mut self, mut drafts: Vec<PostDraft>) -> Result<usize> {
        let mut positions: Vec<usize> = drafts.iter().map(|d| d.index).collect();
        positions.sort_unstable();
        if let Some(w) = positions.windows(2).find(|w| w[0] == w[1]) {
            return Err(ValidationError::InvalidDrafts(format!(
                "position {} appears more than once",
                w[0]
            ))
            .into());
        }

        drafts.retain(|d| !d.is_blank());
        let max = self.validation.max_posts();
        if drafts.len() > max {
            return Err(ValidationError::TooManyPosts {
                count: drafts.len(),
                max,
            }
            .into());
        }

        drafts.sort_by_key(|d| d.index);
        let imported = drafts.len();
        for (i, draft) in drafts.iter_mut().enumerate() {
            draft.index = i;
            draft.content = cleanup_line_breaks(&draft.content);
        }
        self.restore(drafts);
        Ok(imported)
    }
}
