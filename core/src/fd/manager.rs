//! The file-descriptor store: handle table, reads, extraction, export.

use crate::fd::pagination::paginate;
use crate::fd::pagination::slice_chars;
use crate::fd::pagination::LineIndex;
use crate::fd::pagination::Page;
use chrono::DateTime;
use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

/// Thresholds and the default page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Tool output longer than this is stored behind a descriptor.
    #[serde(default = "default_max_direct_output_chars")]
    pub max_direct_output_chars: usize,
    /// User input longer than this is stored behind a reference handle.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_page_size() -> usize {
    4000
}

fn default_max_direct_output_chars() -> usize {
    8000
}

fn default_max_input_chars() -> usize {
    12_000
}

impl Default for FdConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_direct_output_chars: default_max_direct_output_chars(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl FdConfig {
    pub fn validate(&self) -> Result<(), FdError> {
        if self.page_size == 0 {
            return Err(FdError::InvalidRequest(
                "page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Volatile handles (`fd:`) die with the process; reference handles
/// (`ref:`) are copied into children when the conversation branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    Volatile,
    Reference,
}

#[derive(Debug, Clone)]
struct FdEntry {
    content: String,
    index: LineIndex,
    pages: Vec<Page>,
    kind: HandleKind,
    created_at: DateTime<Utc>,
}

/// Addressing mode for [`FdManager::read`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    #[default]
    Page,
    Line,
    Char,
}

/// Parameters of one read call.
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    pub mode: ReadMode,
    /// 1-based page/line number, or 0-based char offset. Defaults to the
    /// start of the descriptor.
    pub start: Option<usize>,
    /// Number of pages/lines/chars to read. Clamped at the end of the
    /// descriptor (the start position is never clamped).
    pub count: Option<usize>,
    /// Return the entire content, overriding all positioning.
    pub read_all: bool,
    /// Mint a new descriptor from the resolved slice instead of
    /// returning the content body.
    pub extract_to_new: bool,
}

/// Outcome of a read: either content with position metadata, or the
/// summary of a freshly minted descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutput {
    Content {
        fd: String,
        content: String,
        mode: ReadMode,
        /// 1-based line range the slice falls within.
        lines: (usize, usize),
        /// Page range for page mode.
        pages: Option<(usize, usize)>,
        /// First page of the range began mid-line.
        continued: bool,
        /// Last page of the range ended mid-line.
        truncated: bool,
    },
    Extracted {
        source_fd: String,
        new_fd: String,
        chars: usize,
    },
}

/// Outcome of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportStatus {
    pub fd: String,
    pub path: String,
    pub bytes_written: usize,
    pub mode: ExportMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    #[default]
    Write,
    Append,
}

#[derive(Debug, thiserror::Error)]
pub enum FdError {
    #[error("unknown file descriptor `{handle}`; live descriptors: [{}]", .live.join(", "))]
    UnknownHandle { handle: String, live: Vec<String> },

    #[error("{what} {start} out of range; valid range is {min}..={max}")]
    OutOfRange {
        what: &'static str,
        start: usize,
        min: usize,
        max: usize,
    },

    #[error("invalid read request: {0}")]
    InvalidRequest(String),

    #[error("export to `{path}` failed: {message}")]
    Io { path: String, message: String },
}

struct Inner {
    entries: IndexMap<String, FdEntry>,
    next_id: u64,
}

/// Stores oversized content under generated handles and serves
/// incremental reads. One manager per process; branching copies the
/// reference-class entries into the child's manager.
pub struct FdManager {
    config: FdConfig,
    inner: Mutex<Inner>,
}

impl FdManager {
    pub fn new(config: FdConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: IndexMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn config(&self) -> &FdConfig {
        &self.config
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Store content under a fresh volatile handle and return the
    /// descriptor summary (including a first-page preview) that stands
    /// in for the raw content.
    pub fn create(&self, content: &str) -> String {
        let handle = self.insert(content, HandleKind::Volatile);
        self.summary(&handle)
    }

    /// Store content under a fresh reference-class handle.
    pub fn create_reference(&self, content: &str) -> String {
        let handle = self.insert(content, HandleKind::Reference);
        self.summary(&handle)
    }

    fn insert(&self, content: &str, kind: HandleKind) -> String {
        let index = LineIndex::new(content);
        let pages = paginate(&index, self.config.page_size);
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let handle = match kind {
            HandleKind::Volatile => format!("fd:{id}"),
            HandleKind::Reference => format!("ref:{id}"),
        };
        inner.entries.insert(
            handle.clone(),
            FdEntry {
                content: content.to_string(),
                index,
                pages,
                kind,
                created_at: Utc::now(),
            },
        );
        handle
    }

    /// XML-ish descriptor summary with the first page as a preview.
    pub fn summary(&self, handle: &str) -> String {
        let inner = self.lock();
        let Some(entry) = inner.entries.get(handle) else {
            return format!("<fd_error fd=\"{handle}\">unknown descriptor</fd_error>");
        };
        let first = entry.pages[0];
        let preview = slice_chars(&entry.content, first.start, first.end);
        format!(
            "<fd_ref fd=\"{handle}\" pages=\"{}\" lines=\"{}\" chars=\"{}\">\n\
             <preview page=\"1\" truncated=\"{}\">\n{}\n</preview>\n</fd_ref>",
            entry.pages.len(),
            entry.index.line_count(),
            entry.index.total_chars(),
            first.truncated,
            preview,
        )
    }

    pub fn live_handles(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.lock().entries.contains_key(handle)
    }

    pub fn created_at(&self, handle: &str) -> Option<DateTime<Utc>> {
        self.lock().entries.get(handle).map(|e| e.created_at)
    }

    /// Read a slice of a descriptor by page, line or char addressing.
    pub fn read(&self, handle: &str, request: &ReadRequest) -> Result<ReadOutput, FdError> {
        let (content_slice, lines, pages, continued, truncated) = {
            let inner = self.lock();
            let entry = inner.entries.get(handle).ok_or_else(|| {
                FdError::UnknownHandle {
                    handle: handle.to_string(),
                    live: inner.entries.keys().cloned().collect(),
                }
            })?;
            resolve_slice(entry, request)?
        };

        if request.extract_to_new {
            let chars = content_slice.chars().count();
            let new_handle = self.insert(&content_slice, HandleKind::Volatile);
            return Ok(ReadOutput::Extracted {
                source_fd: handle.to_string(),
                new_fd: new_handle,
                chars,
            });
        }

        Ok(ReadOutput::Content {
            fd: handle.to_string(),
            content: content_slice,
            mode: request.mode,
            lines,
            pages,
            continued,
            truncated,
        })
    }

    /// Write descriptor content to disk with open-flag-like semantics.
    ///
    /// `create`/`exist_ok` combinations: `create` governs whether a
    /// missing file is acceptable, `exist_ok` whether an existing one is.
    pub fn export_to_file(
        &self,
        handle: &str,
        path: &Path,
        mode: ExportMode,
        create: bool,
        exist_ok: bool,
    ) -> Result<ExportStatus, FdError> {
        let content = {
            let inner = self.lock();
            let entry = inner.entries.get(handle).ok_or_else(|| {
                FdError::UnknownHandle {
                    handle: handle.to_string(),
                    live: inner.entries.keys().cloned().collect(),
                }
            })?;
            entry.content.clone()
        };

        let display = path.display().to_string();
        let io_err = |e: std::io::Error| FdError::Io {
            path: display.clone(),
            message: e.to_string(),
        };

        let exists = path.exists();
        if exists && !exist_ok {
            return Err(FdError::Io {
                path: display,
                message: "file already exists and exist_ok is false".to_string(),
            });
        }
        if !exists && !create {
            return Err(FdError::Io {
                path: display,
                message: "file does not exist and create is false".to_string(),
            });
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut file = match mode {
            ExportMode::Write => std::fs::File::create(path).map_err(io_err)?,
            ExportMode::Append => std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(io_err)?,
        };
        file.write_all(content.as_bytes()).map_err(io_err)?;

        Ok(ExportStatus {
            fd: handle.to_string(),
            path: display,
            bytes_written: content.len(),
            mode,
        })
    }

    /// A new manager holding deep copies of only the reference-class
    /// entries, for handing to a forked branch. The id counter carries
    /// over so child-minted handles never collide with inherited ones.
    pub fn fork_references(&self) -> FdManager {
        let inner = self.lock();
        let entries = inner
            .entries
            .iter()
            .filter(|(_, e)| e.kind == HandleKind::Reference)
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        FdManager {
            config: self.config,
            inner: Mutex::new(Inner {
                entries,
                next_id: inner.next_id,
            }),
        }
    }
}

impl std::fmt::Debug for FdManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FdManager")
            .field("handles", &self.live_handles())
            .finish()
    }
}

type Slice = (
    String,
    (usize, usize),
    Option<(usize, usize)>,
    bool,
    bool,
);

fn resolve_slice(entry: &FdEntry, request: &ReadRequest) -> Result<Slice, FdError> {
    let total_chars = entry.index.total_chars();

    if request.read_all {
        let lines = (1, entry.index.line_count().max(1));
        return Ok((entry.content.clone(), lines, None, false, false));
    }

    let count = request.count.unwrap_or(1);
    if count == 0 {
        return Err(FdError::InvalidRequest(
            "count must be at least 1".to_string(),
        ));
    }

    match request.mode {
        ReadMode::Page => {
            let total_pages = entry.pages.len();
            let start = request.start.unwrap_or(1);
            if start < 1 || start > total_pages {
                return Err(FdError::OutOfRange {
                    what: "page",
                    start,
                    min: 1,
                    max: total_pages,
                });
            }
            let end = (start + count - 1).min(total_pages);
            let first = entry.pages[start - 1];
            let last = entry.pages[end - 1];
            let content = slice_chars(&entry.content, first.start, last.end).to_string();
            let lines = (
                entry.index.line_of_char(first.start),
                line_of_last_char(&entry.index, last.end),
            );
            Ok((
                content,
                lines,
                Some((start, end)),
                first.continued,
                last.truncated,
            ))
        }
        ReadMode::Line => {
            let total_lines = entry.index.line_count();
            let start = request.start.unwrap_or(1);
            if start < 1 || start > total_lines {
                return Err(FdError::OutOfRange {
                    what: "line",
                    start,
                    min: 1,
                    max: total_lines.max(1),
                });
            }
            let end = (start + count - 1).min(total_lines);
            // line_span is infallible for validated line numbers
            let (char_start, _) = entry.index.line_span(start).ok_or_else(|| {
                FdError::InvalidRequest(format!("line {start} vanished"))
            })?;
            let (_, char_end) = entry.index.line_span(end).ok_or_else(|| {
                FdError::InvalidRequest(format!("line {end} vanished"))
            })?;
            let content = slice_chars(&entry.content, char_start, char_end).to_string();
            Ok((content, (start, end), None, false, false))
        }
        ReadMode::Char => {
            let start = request.start.unwrap_or(0);
            if total_chars == 0 || start >= total_chars {
                return Err(FdError::OutOfRange {
                    what: "char offset",
                    start,
                    min: 0,
                    max: total_chars.saturating_sub(1),
                });
            }
            let end = start.saturating_add(count).min(total_chars);
            let content = slice_chars(&entry.content, start, end).to_string();
            let lines = (
                entry.index.line_of_char(start),
                line_of_last_char(&entry.index, end),
            );
            Ok((content, lines, None, false, false))
        }
    }
}

/// 1-based line containing the last char before an exclusive end offset.
fn line_of_last_char(index: &LineIndex, end: usize) -> usize {
    index.line_of_char(end.saturating_sub(1).min(index.total_chars().saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manager_with(content: &str, page_size: usize) -> (FdManager, String) {
        let manager = FdManager::new(FdConfig {
            page_size,
            ..Default::default()
        });
        let summary = manager.create(content);
        let handle = manager.live_handles().pop().unwrap();
        assert!(summary.contains(&handle));
        (manager, handle)
    }

    fn read_content(manager: &FdManager, handle: &str, request: &ReadRequest) -> String {
        match manager.read(handle, request).unwrap() {
            ReadOutput::Content { content, .. } => content,
            other => panic!("expected content, got {other:?}"),
        }
    }

    const SAMPLE: &str = "one\ntwo\nthree\nfour\nfive\n";

    #[test]
    fn read_all_returns_everything() {
        let (manager, handle) = manager_with(SAMPLE, 7);
        let request = ReadRequest {
            read_all: true,
            // Positioning is ignored when read_all is set.
            mode: ReadMode::Page,
            start: Some(42),
            ..Default::default()
        };
        assert_eq!(read_content(&manager, &handle, &request), SAMPLE);
    }

    #[test]
    fn sequential_page_reads_reproduce_content() {
        let (manager, handle) = manager_with(SAMPLE, 7);
        let mut rebuilt = String::new();
        let mut page = 1;
        loop {
            let request = ReadRequest {
                mode: ReadMode::Page,
                start: Some(page),
                ..Default::default()
            };
            match manager.read(&handle, &request) {
                Ok(ReadOutput::Content { content, .. }) => rebuilt.push_str(&content),
                Ok(other) => panic!("unexpected {other:?}"),
                Err(FdError::OutOfRange { .. }) => break,
                Err(other) => panic!("unexpected error {other}"),
            }
            page += 1;
        }
        assert_eq!(rebuilt, SAMPLE);
    }

    #[test]
    fn line_mode_is_exact_for_every_line() {
        let (manager, handle) = manager_with(SAMPLE, 7);
        let expected = ["one\n", "two\n", "three\n", "four\n", "five\n"];
        for (i, line) in expected.iter().enumerate() {
            let request = ReadRequest {
                mode: ReadMode::Line,
                start: Some(i + 1),
                ..Default::default()
            };
            assert_eq!(&read_content(&manager, &handle, &request), line);
        }
    }

    #[test]
    fn char_mode_slices_and_clips() {
        let (manager, handle) = manager_with(SAMPLE, 7);
        let request = ReadRequest {
            mode: ReadMode::Char,
            start: Some(4),
            count: Some(3),
            ..Default::default()
        };
        assert_eq!(read_content(&manager, &handle, &request), "two");

        // Count past the end clips.
        let request = ReadRequest {
            mode: ReadMode::Char,
            start: Some(19),
            count: Some(1000),
            ..Default::default()
        };
        assert_eq!(read_content(&manager, &handle, &request), "five\n");
    }

    #[test]
    fn char_mode_reports_line_range() {
        let (manager, handle) = manager_with(SAMPLE, 7);
        let request = ReadRequest {
            mode: ReadMode::Char,
            start: Some(4),
            count: Some(10),
            ..Default::default()
        };
        match manager.read(&handle, &request).unwrap() {
            ReadOutput::Content { lines, .. } => assert_eq!(lines, (2, 3)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn out_of_range_start_is_an_error_with_bounds() {
        let (manager, handle) = manager_with(SAMPLE, 7);
        let request = ReadRequest {
            mode: ReadMode::Line,
            start: Some(99),
            ..Default::default()
        };
        let err = manager.read(&handle, &request).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("1..=5"), "message: {message}");

        let request = ReadRequest {
            mode: ReadMode::Page,
            start: Some(0),
            ..Default::default()
        };
        assert!(manager.read(&handle, &request).is_err());
    }

    #[test]
    fn unknown_handle_lists_live_handles() {
        let (manager, handle) = manager_with(SAMPLE, 7);
        let err = manager
            .read("fd:999", &ReadRequest::default())
            .unwrap_err();
        assert!(err.to_string().contains(&handle));
    }

    #[test]
    fn extraction_round_trips_through_new_handle() {
        let (manager, handle) = manager_with(SAMPLE, 7);
        let positional = ReadRequest {
            mode: ReadMode::Line,
            start: Some(2),
            count: Some(2),
            ..Default::default()
        };
        let direct = read_content(&manager, &handle, &positional);

        let extract = ReadRequest {
            extract_to_new: true,
            ..positional
        };
        let (new_fd, chars) = match manager.read(&handle, &extract).unwrap() {
            ReadOutput::Extracted {
                source_fd,
                new_fd,
                chars,
            } => {
                assert_eq!(source_fd, handle);
                (new_fd, chars)
            }
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(chars, direct.chars().count());

        let request = ReadRequest {
            read_all: true,
            ..Default::default()
        };
        assert_eq!(read_content(&manager, &new_fd, &request), direct);
    }

    #[test]
    fn multi_page_range_aggregates_boundary_flags() {
        // Single long line: every page boundary is mid-line.
        let content = "x".repeat(30);
        let (manager, handle) = manager_with(&content, 10);
        let request = ReadRequest {
            mode: ReadMode::Page,
            start: Some(2),
            count: Some(2),
            ..Default::default()
        };
        match manager.read(&handle, &request).unwrap() {
            ReadOutput::Content {
                continued,
                truncated,
                pages,
                ..
            } => {
                assert_eq!(pages, Some((2, 3)));
                assert!(continued); // first page of the range starts mid-line
                assert!(!truncated); // last page ends at content end
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn export_honors_create_and_exist_ok() {
        let (manager, handle) = manager_with(SAMPLE, 7);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");

        // create=false on a missing file fails.
        let err = manager
            .export_to_file(&handle, &path, ExportMode::Write, false, true)
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        // create=true writes, making parent dirs.
        let status = manager
            .export_to_file(&handle, &path, ExportMode::Write, true, true)
            .unwrap();
        assert_eq!(status.bytes_written, SAMPLE.len());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE);

        // exist_ok=false on an existing file fails.
        let err = manager
            .export_to_file(&handle, &path, ExportMode::Write, true, false)
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));

        // Append doubles the content.
        manager
            .export_to_file(&handle, &path, ExportMode::Append, false, true)
            .unwrap();
        let doubled = std::fs::read_to_string(&path).unwrap();
        assert_eq!(doubled.len(), SAMPLE.len() * 2);
    }

    #[test]
    fn fork_copies_only_reference_entries() {
        let manager = FdManager::new(FdConfig::default());
        manager.create("volatile content");
        manager.create_reference("shared content");
        let handles = manager.live_handles();
        assert_eq!(handles, vec!["fd:1".to_string(), "ref:2".to_string()]);

        let child = manager.fork_references();
        assert_eq!(child.live_handles(), vec!["ref:2".to_string()]);

        // Child-minted handles do not collide with inherited ids.
        child.create("new in child");
        assert!(child.contains("fd:3"));
    }
}
