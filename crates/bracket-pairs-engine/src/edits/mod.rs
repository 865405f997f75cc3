//! Edits in length space.
//!
//! Edits arrive as [`TextEditInfo`]s: a replaced range in the content before
//! the edit and the length of the inserted text. Edits queued between two
//! reparses are folded into one sorted, non-overlapping list with
//! [`combine_text_edit_infos`], and the parser then walks the new content
//! with a [`BeforeEditPositionMapper`] to find where the old tree still lines up.
//!
//! ## Modules
//!
//! - [`mapping`] - length mappings and edit composition
//! - [`mapper`] - translation from new offsets back to old ones

pub mod mapper;
pub mod mapping;

use std::fmt;

use crate::length::Length;
use crate::position::Position;

pub use mapper::BeforeEditPositionMapper;
pub use mapping::{LengthMapping, combine_text_edit_infos, to_length_mapping};

/// Replacement of `[start, end_before)` (in the content before the edit)
/// with text of length `new_length`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEditInfo {
    pub start: Length,
    pub end_before: Length,
    pub new_length: Length,
}

impl TextEditInfo {
    #[must_use]
    pub const fn new(start: Length, end_before: Length, new_length: Length) -> Self {
        Self {
            start,
            end_before,
            new_length,
        }
    }

    /// The edit that replaces `[start, end)` with `text`.
    #[must_use]
    pub fn replace(start: Position, end: Position, text: &str) -> Self {
        Self::new(start.into(), end.into(), Length::of_str(text))
    }

    /// End of the inserted text in the content after the edit.
    #[must_use]
    pub fn end_after(&self) -> Length {
        self.start + self.new_length
    }
}

impl fmt::Debug for TextEditInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}...{:?}) -> {:?}",
            self.start.to_position(),
            self.end_before.to_position(),
            self.new_length.to_position()
        )
    }
}
