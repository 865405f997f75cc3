use std::collections::VecDeque;
use std::fmt;

use crate::edits::TextEditInfo;
use crate::length::{Length, sum_lengths};

/// A run of content that is either copied unchanged or replaced.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LengthMapping {
    pub modified: bool,
    pub length_before: Length,
    pub length_after: Length,
}

impl LengthMapping {
    #[must_use]
    pub const fn new(modified: bool, length_before: Length, length_after: Length) -> Self {
        Self {
            modified,
            length_before,
            length_after,
        }
    }

    const fn unmodified(length: Length) -> Self {
        Self::new(false, length, length)
    }

    /// Splits at `length_after` in after-space. The second half is `None`
    /// when nothing remains.
    ///
    /// A modified mapping keeps its whole before-length in the first half.
    #[must_use]
    pub fn split_at(self, length_after: Length) -> (LengthMapping, Option<LengthMapping>) {
        let remaining = length_after.diff_non_negative(self.length_after);
        if remaining.is_zero() {
            (self, None)
        } else if self.modified {
            (
                LengthMapping::new(true, self.length_before, length_after),
                Some(LengthMapping::new(true, Length::ZERO, remaining)),
            )
        } else {
            (LengthMapping::unmodified(length_after), Some(LengthMapping::unmodified(remaining)))
        }
    }
}

impl fmt::Debug for LengthMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.modified { "M" } else { "U" };
        write!(
            f,
            "{prefix}:{:?} -> {:?}",
            self.length_before.to_position(),
            self.length_after.to_position()
        )
    }
}

/// Describes sorted, non-overlapping edits as alternating unchanged and
/// modified runs. The unchanged tail after the last edit is not included.
#[must_use]
pub fn to_length_mapping(edits: &[TextEditInfo]) -> Vec<LengthMapping> {
    let mut result = Vec::new();
    let mut last_offset = Length::ZERO;
    for edit in edits {
        let gap = last_offset.diff_non_negative(edit.start);
        if !gap.is_zero() {
            result.push(LengthMapping::unmodified(gap));
        }
        let length_before = edit.start.diff_non_negative(edit.end_before);
        result.push(LengthMapping::new(true, length_before, edit.new_length));
        last_offset = edit.end_before;
    }
    result
}

/// Composes two edit batches. `second` is expressed in the content produced
/// by `first`; the result is expressed in the content before `first`.
#[must_use]
pub fn combine_text_edit_infos(first: &[TextEditInfo], second: &[TextEditInfo]) -> Vec<TextEditInfo> {
    if first.is_empty() {
        return second.to_vec();
    }
    if second.is_empty() {
        return first.to_vec();
    }

    let mut s0_to_s1 = S0ToS1Cursor {
        items: to_length_mapping(first).into(),
        current: None,
    };
    s0_to_s1.current = s0_to_s1.items.pop_front();

    let mut s1_to_s2: Vec<(bool, Option<Length>, Length)> = to_length_mapping(second)
        .into_iter()
        .map(|m| (m.modified, Some(m.length_before), m.length_after))
        .collect();
    // Copies whatever is left of the first batch.
    s1_to_s2.push((false, None, Length::ZERO));

    let mut result: Vec<TextEditInfo> = Vec::new();
    let mut push_edit = |start: Length, end: Length, new_length: Length| match result.last_mut() {
        Some(last) if last.end_before == start => {
            *last = TextEditInfo::new(last.start, end, last.new_length + new_length);
        }
        _ => result.push(TextEditInfo::new(start, end, new_length)),
    };

    let mut s0_offset = Length::ZERO;
    for (modified, length_before, length_after) in s1_to_s2 {
        let items = s0_to_s1.take(length_before);
        if modified {
            let s0_end = s0_offset + sum_lengths(items.iter().map(|m| m.length_before));
            push_edit(s0_offset, s0_end, length_after);
            s0_offset = s0_end;
        } else {
            for item in items {
                let s0_start = s0_offset;
                s0_offset += item.length_before;
                if item.modified {
                    push_edit(s0_start, s0_offset, item.length_after);
                }
            }
        }
    }

    result
}

struct S0ToS1Cursor {
    items: VecDeque<LengthMapping>,
    current: Option<LengthMapping>,
}

impl S0ToS1Cursor {
    /// Takes mappings covering `s1_length` of intermediate content. `None`
    /// takes everything left. Content past the last mapping is unchanged.
    fn take(&mut self, s1_length: Option<Length>) -> Vec<LengthMapping> {
        let Some(s1_length) = s1_length else {
            return self.current.take().into_iter().chain(self.items.drain(..)).collect();
        };

        let mut result = Vec::new();
        let mut remaining = s1_length;
        while !remaining.is_zero() {
            let Some(current) = self.current else {
                break;
            };
            let (item, rest) = current.split_at(remaining);
            result.push(item);
            remaining = item.length_after.diff_non_negative(remaining);
            self.current = rest.or_else(|| self.items.pop_front());
        }
        if !remaining.is_zero() {
            result.push(LengthMapping::unmodified(remaining));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use pretty_assertions::assert_eq;

    fn edit(start: (u32, u32), end: (u32, u32), new_length: (u32, u32)) -> TextEditInfo {
        TextEditInfo::new(
            Length::new(start.0, start.1),
            Length::new(end.0, end.1),
            Length::new(new_length.0, new_length.1),
        )
    }

    /// Applies single-line edits to a one-line string, mostly to check composition.
    fn apply(text: &str, edits: &[(TextEditInfo, &str)]) -> String {
        let mut out = String::new();
        let mut last = 0usize;
        for (edit, insert) in edits {
            let start = edit.start.column_count() as usize;
            out.push_str(&text[last..start]);
            out.push_str(insert);
            last = edit.end_before.column_count() as usize;
        }
        out.push_str(&text[last..]);
        out
    }

    #[test]
    fn mapping_alternates_gaps_and_edits() {
        let mapping = to_length_mapping(&[edit((0, 2), (0, 4), (0, 1)), edit((1, 0), (1, 3), (0, 0))]);
        insta::assert_snapshot!(format!("{mapping:?}"), @"[U:(0,2) -> (0,2), M:(0,2) -> (0,1), U:(1,0) -> (1,0), M:(0,3) -> (0,0)]");
    }

    #[test]
    fn split_modified_keeps_before_length_in_head() {
        let mapping = LengthMapping::new(true, Length::new(0, 3), Length::new(0, 5));
        let (head, tail) = mapping.split_at(Length::new(0, 2));
        assert_eq!(head, LengthMapping::new(true, Length::new(0, 3), Length::new(0, 2)));
        assert_eq!(tail, Some(LengthMapping::new(true, Length::ZERO, Length::new(0, 3))));
        assert_eq!(mapping.split_at(Length::new(0, 5)), (mapping, None));
    }

    #[test]
    fn combining_with_nothing_is_identity() {
        let edits = vec![edit((0, 1), (0, 2), (0, 3))];
        assert_eq!(combine_text_edit_infos(&edits, &[]), edits);
        assert_eq!(combine_text_edit_infos(&[], &edits), edits);
    }

    #[test]
    fn disjoint_batches_keep_both_edits() {
        // "abcdefgh": replace "b" with "XY", then (in the new text) replace "g" with "".
        let first = [edit((0, 1), (0, 2), (0, 2))];
        let second = [edit((0, 7), (0, 8), (0, 0))];
        let combined = combine_text_edit_infos(&first, &second);
        assert_eq!(combined, vec![edit((0, 1), (0, 2), (0, 2)), edit((0, 6), (0, 7), (0, 0))]);

        let s1 = apply("abcdefgh", &[(first[0], "XY")]);
        let s2 = apply(&s1, &[(second[0], "")]);
        let direct = apply("abcdefgh", &[(combined[0], "XY"), (combined[1], "")]);
        assert_eq!(direct, s2);
    }

    #[test]
    fn edit_inside_inserted_text_merges() {
        // Insert "1234" at 2, then replace "23" inside it with "x".
        let first = [edit((0, 2), (0, 2), (0, 4))];
        let second = [edit((0, 3), (0, 5), (0, 1))];
        assert_eq!(combine_text_edit_infos(&first, &second), vec![edit((0, 2), (0, 2), (0, 3))]);
    }

    #[test]
    fn second_edit_after_first_batch_is_not_lost() {
        let first = [edit((0, 0), (0, 1), (0, 1))];
        let second = [edit((2, 0), (2, 4), (0, 2))];
        assert_eq!(
            combine_text_edit_infos(&first, &second),
            vec![edit((0, 0), (0, 1), (0, 1)), edit((2, 0), (2, 4), (0, 2))]
        );
    }

    #[test]
    fn first_batch_tail_survives_an_earlier_second_edit() {
        let first = [edit((3, 0), (3, 2), (0, 5))];
        let second = [edit((0, 0), (0, 0), (1, 0))];
        assert_eq!(
            combine_text_edit_infos(&first, &second),
            vec![edit((0, 0), (0, 0), (1, 0)), edit((3, 0), (3, 2), (0, 5))]
        );
    }

    #[test]
    fn replace_computes_text_length() {
        let info = TextEditInfo::replace(Position::new(1, 2), Position::new(1, 4), "a\nbc");
        assert_eq!(info.new_length, Length::new(1, 2));
        assert_eq!(info.end_after(), Length::new(2, 2));
    }
}
