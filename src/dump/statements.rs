// Spacecheck - CPU/GPU execution-space checks for cppcheck dumps
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Statement segmentation of the expanded token stream.
//!
//! The token list is split once on the boundary tokens `{`, `}` and `;`.
//! Checks then ask for the statement around a token, or for the
//! declaration prefix in front of a body, by binary search instead of
//! rescanning the token array.

use super::TokenIdx;

/// Whether a token text ends a statement.
pub fn is_boundary(text: &str) -> bool {
    matches!(text, "{" | "}" | ";")
}

/// A half-open range of tokens that contains no boundary token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementSpan {
    /// First token (inclusive).
    pub start: TokenIdx,
    /// One past the last token (exclusive).
    pub end: TokenIdx,
}

impl StatementSpan {
    /// Number of tokens in the span.
    pub fn len(&self) -> usize {
        (self.end.0 - self.start.0) as usize
    }

    /// Whether the span holds no token.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `tok` lies inside the span.
    pub fn contains(&self, tok: TokenIdx) -> bool {
        self.start <= tok && tok < self.end
    }

    /// Iterate over the token indices of the span.
    pub fn indices(&self) -> impl Iterator<Item = TokenIdx> {
        (self.start.0..self.end.0).map(TokenIdx)
    }
}

/// Sorted positions of every boundary token in a token list.
#[derive(Debug, Clone, Default)]
pub struct StatementIndex {
    boundaries: Vec<u32>,
    len: u32,
}

impl StatementIndex {
    /// Build the index from token texts in stream order.
    pub fn build<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut boundaries = Vec::new();
        let mut len = 0u32;
        for (i, text) in texts.into_iter().enumerate() {
            if is_boundary(text) {
                boundaries.push(i as u32);
            }
            len = i as u32 + 1;
        }
        Self { boundaries, len }
    }

    fn start_before(&self, pos: u32) -> u32 {
        let i = self.boundaries.partition_point(|&b| b < pos);
        if i == 0 {
            0
        } else {
            self.boundaries[i - 1] + 1
        }
    }

    /// Tokens between the previous boundary and `tok`, both excluded.
    ///
    /// For a body-opening `{` this is the declaration prefix.
    pub fn prefix_of(&self, tok: TokenIdx) -> StatementSpan {
        StatementSpan {
            start: TokenIdx(self.start_before(tok.0)),
            end: tok,
        }
    }

    /// The statement holding `tok`, without its terminating boundary.
    ///
    /// When `tok` is itself a boundary this is the statement it terminates.
    pub fn containing(&self, tok: TokenIdx) -> StatementSpan {
        let start = self.start_before(tok.0);
        let i = self.boundaries.partition_point(|&b| b < tok.0);
        let end = self.boundaries.get(i).copied().unwrap_or(self.len);
        StatementSpan {
            start: TokenIdx(start),
            end: TokenIdx(end),
        }
    }

    /// Lazily iterate over every non-empty statement.
    pub fn iter(&self) -> Statements<'_> {
        Statements {
            index: self,
            next_boundary: 0,
            start: 0,
            done: false,
        }
    }
}

/// Restartable iterator over the statements of a token list.
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    index: &'a StatementIndex,
    next_boundary: usize,
    start: u32,
    done: bool,
}

impl Iterator for Statements<'_> {
    type Item = StatementSpan;

    fn next(&mut self) -> Option<StatementSpan> {
        while !self.done {
            let end = match self.index.boundaries.get(self.next_boundary) {
                Some(&b) => {
                    self.next_boundary += 1;
                    b
                }
                None => {
                    self.done = true;
                    self.index.len
                }
            };
            let span = StatementSpan {
                start: TokenIdx(self.start),
                end: TokenIdx(end),
            };
            self.start = end + 1;
            if !span.is_empty() {
                return Some(span);
            }
        }
        None
    }
}
