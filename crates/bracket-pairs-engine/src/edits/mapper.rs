use crate::edits::TextEditInfo;
use crate::length::Length;
use crate::position::Position;

struct CachedEdit {
    offset: Position,
    end_offset_before: Position,
    end_offset_after: Position,
}

impl From<&TextEditInfo> for CachedEdit {
    fn from(edit: &TextEditInfo) -> Self {
        Self {
            offset: edit.start.to_position(),
            end_offset_before: edit.end_before.to_position(),
            end_offset_after: edit.end_after().to_position(),
        }
    }
}

/// Maps offsets in the edited content back to the content before the edits.
///
/// Queries must come with non-decreasing offsets; the mapper only moves forward.
pub struct BeforeEditPositionMapper {
    edits: Vec<CachedEdit>,
    next_edit_idx: usize,
    delta_old_to_new_line_count: i64,
    delta_old_to_new_column_count: i64,
    // Line (in old content) that the column delta applies to.
    delta_line_idx_in_old: Option<u32>,
    last_change_end: Option<Length>,
}

impl BeforeEditPositionMapper {
    /// `edits` must be sorted and non-overlapping.
    pub fn new(edits: &[TextEditInfo]) -> Self {
        Self {
            edits: edits.iter().map(CachedEdit::from).collect(),
            next_edit_idx: 0,
            delta_old_to_new_line_count: 0,
            delta_old_to_new_column_count: 0,
            delta_line_idx_in_old: None,
            last_change_end: None,
        }
    }

    pub fn offset_before_change(&mut self, offset: Length) -> Length {
        self.adjust_next_edit(offset);
        self.translate_cur_to_old(offset)
    }

    /// Distance from `offset` to the start of the next edit, or `None` when
    /// no edit remains.
    pub fn distance_to_next_change(&mut self, offset: Length) -> Option<Length> {
        self.adjust_next_edit(offset);
        let next = self.edits.get(self.next_edit_idx)?;
        let next_change = self.translate_old_to_cur(next.offset);
        Some(offset.diff_non_negative(next_change))
    }

    /// True if an edit ends exactly at `offset`. What follows may read
    /// differently there, for example a word bracket losing its boundary.
    pub fn is_right_after_change(&mut self, offset: Length) -> bool {
        self.adjust_next_edit(offset);
        self.last_change_end == Some(offset)
    }

    fn translate_old_to_cur(&self, old: Position) -> Length {
        let line = shift(old.line, self.delta_old_to_new_line_count);
        if self.delta_line_idx_in_old == Some(old.line) {
            Length::new(line, shift(old.column, self.delta_old_to_new_column_count))
        } else {
            Length::new(line, old.column)
        }
    }

    fn translate_cur_to_old(&self, cur: Length) -> Length {
        let line = shift(cur.line_count(), -self.delta_old_to_new_line_count);
        if self.delta_line_idx_in_old == Some(line) {
            Length::new(line, shift(cur.column_count(), -self.delta_old_to_new_column_count))
        } else {
            Length::new(line, cur.column_count())
        }
    }

    fn adjust_next_edit(&mut self, offset: Length) {
        while let Some(next) = self.edits.get(self.next_edit_idx) {
            let end_after_in_cur = self.translate_old_to_cur(next.end_offset_after);
            if end_after_in_cur > offset {
                break;
            }
            self.next_edit_idx += 1;
            self.last_change_end = Some(end_after_in_cur);

            let end_before_in_cur = self.translate_old_to_cur(next.end_offset_before);
            let line_delta = i64::from(end_after_in_cur.line_count()) - i64::from(end_before_in_cur.line_count());
            self.delta_old_to_new_line_count += line_delta;

            let previous_column_delta = if self.delta_line_idx_in_old == Some(next.end_offset_before.line) {
                self.delta_old_to_new_column_count
            } else {
                0
            };
            let column_delta =
                i64::from(end_after_in_cur.column_count()) - i64::from(end_before_in_cur.column_count());
            self.delta_old_to_new_column_count = previous_column_delta + column_delta;
            self.delta_line_idx_in_old = Some(next.end_offset_before.line);
        }
    }
}

fn shift(value: u32, delta: i64) -> u32 {
    (i64::from(value) + delta).clamp(0, i64::from(u32::MAX)) as u32
}
