//! Line-aware, character-budgeted pagination.
//!
//! All offsets are Unicode codepoint indices, not bytes. Pages are cut
//! from fixed-size character windows, but the window end snaps back to
//! the last line boundary inside it when one exists, so a page usually
//! ends at a newline. A page that begins mid-line is `continued`; one
//! that ends mid-line is `truncated`.

/// Codepoint offsets of the start of every line, computed in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// `starts[i]` is the char offset where 1-based line `i + 1` begins.
    starts: Vec<usize>,
    total_chars: usize,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = vec![0];
        let mut total_chars = 0;
        for ch in content.chars() {
            total_chars += 1;
            if ch == '\n' {
                starts.push(total_chars);
            }
        }
        // A trailing newline does not open a new line.
        if starts.len() > 1 && starts.last() == Some(&total_chars) {
            starts.pop();
        }
        Self {
            starts,
            total_chars,
        }
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    pub fn line_count(&self) -> usize {
        if self.total_chars == 0 {
            0
        } else {
            self.starts.len()
        }
    }

    /// Char span `[start, end)` of a 1-based line, newline-inclusive.
    pub fn line_span(&self, line: usize) -> Option<(usize, usize)> {
        if line == 0 || line > self.line_count() {
            return None;
        }
        let start = self.starts[line - 1];
        let end = self
            .starts
            .get(line)
            .copied()
            .unwrap_or(self.total_chars);
        Some((start, end))
    }

    /// 1-based line containing the given char offset.
    pub fn line_of_char(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    /// Whether a char offset falls exactly on a line start.
    pub fn is_line_start(&self, offset: usize) -> bool {
        self.starts.binary_search(&offset).is_ok()
    }

    /// Largest line start in `(after, upto]`, used to snap a window end.
    fn last_line_start_in(&self, after: usize, upto: usize) -> Option<usize> {
        let i = match self.starts.binary_search(&upto) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        self.starts[..i]
            .iter()
            .rev()
            .copied()
            .find(|&s| s > after)
    }
}

/// One page's char span and boundary flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start: usize,
    pub end: usize,
    /// The page begins mid-line.
    pub continued: bool,
    /// The page ends mid-line.
    pub truncated: bool,
}

/// Compute the full page table for a content/index pair. Pages partition
/// the char range exactly, so concatenating every page reproduces the
/// content. Empty content still yields one (empty) page so page 1 is
/// always addressable.
pub fn paginate(index: &LineIndex, page_size: usize) -> Vec<Page> {
    let total = index.total_chars();
    if total == 0 {
        return vec![Page {
            start: 0,
            end: 0,
            continued: false,
            truncated: false,
        }];
    }

    let mut pages = Vec::new();
    let mut pos = 0;
    while pos < total {
        let window_end = pos.saturating_add(page_size).min(total);
        let end = if window_end == total {
            total
        } else {
            // Snap back to the last line boundary inside the window; a
            // single line longer than the window cuts mid-line.
            index
                .last_line_start_in(pos, window_end)
                .unwrap_or(window_end)
        };
        pages.push(Page {
            start: pos,
            end,
            continued: !index.is_line_start(pos),
            truncated: end < total && !index.is_line_start(end),
        });
        pos = end;
    }
    pages
}

/// Slice a string by char offsets (`[start, end)`), clipped to content.
pub fn slice_chars(content: &str, start: usize, end: usize) -> &str {
    let mut iter = content.char_indices();
    let byte_start = iter
        .nth(start)
        .map(|(b, _)| b)
        .unwrap_or(content.len());
    let byte_end = if end > start {
        content
            .char_indices()
            .nth(end)
            .map(|(b, _)| b)
            .unwrap_or(content.len())
    } else {
        byte_start
    };
    &content[byte_start..byte_end]
}
