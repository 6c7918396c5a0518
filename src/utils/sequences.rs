//! Image sequence detection
//!
//! Groups directory listings into numbered file sequences, and resolves
//! user-typed patterns (`render.####.exr`, `render.%04d.exr`, `render.*.exr`,
//! `render.1-100.exr`) into a single `FileInfo`.
//!
//! Names are split in parallel (rayon); grouping keeps first-seen order in an
//! `IndexMap` before the final sort.

use indexmap::IndexMap;
use log::{debug, info, warn};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use crate::entities::file_info::{FileInfo, FileType};
use crate::entities::sequence::Compress;
use crate::error::{ParseError, SeqError, SeqResult};

/// Sort key for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Name,
    #[default]
    StartFrame,
    Size,
    Time,
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "start" | "start_frame" | "frame" => Ok(Self::StartFrame),
            "size" => Ok(Self::Size),
            "time" => Ok(Self::Time),
            other => Err(format!("unknown sort key '{}' (name|start|size|time)", other)),
        }
    }
}

/// How names are grouped and ordered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    /// Extensions (lower-case, no dot) eligible for sequence grouping; empty = all
    pub sequence_extensions: Vec<String>,
    pub compress: Compress,
    pub sort: SortBy,
    pub reverse: bool,
    pub dirs_first: bool,
    /// List names starting with a dot
    pub show_hidden: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            sequence_extensions: Vec::new(),
            compress: Compress::Sparse,
            sort: SortBy::StartFrame,
            reverse: false,
            dirs_first: true,
            show_hidden: false,
        }
    }
}

impl ListOptions {
    fn groups_extension(&self, info: &FileInfo) -> bool {
        self.sequence_extensions.is_empty()
            || self
                .sequence_extensions
                .iter()
                .any(|ext| ext.trim_start_matches('.').eq_ignore_ascii_case(&info.extension_key()))
    }
}

/// Result of grouping a listing: items plus the names that were skipped
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub items: Vec<FileInfo>,
    pub errors: Vec<ParseError>,
}

impl ParseReport {
    /// Items that are multi-frame sequences
    pub fn sequences(&self) -> impl Iterator<Item = &FileInfo> {
        self.items.iter().filter(|i| i.file_type() == FileType::Sequence)
    }
}

/// Listing entry before parsing: full name plus stat data
struct Entry {
    name: String,
    size: u64,
    modified: Option<SystemTime>,
}

/// Group file names into sequences without touching the file system.
///
/// Unparseable names (negative or out-of-range frames) land in
/// `ParseReport::errors` and are skipped.
pub fn parse_listing<I, S>(names: I, opts: &ListOptions) -> ParseReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let entries: Vec<Entry> = names
        .into_iter()
        .map(|n| Entry {
            name: n.as_ref().to_string(),
            size: 0,
            modified: None,
        })
        .collect();
    group_entries(entries, Vec::new(), opts)
}

fn group_entries(mut entries: Vec<Entry>, dirs: Vec<FileInfo>, opts: &ListOptions) -> ParseReport {
    // Deterministic folding regardless of listing order
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let parsed: Vec<Result<FileInfo, ParseError>> = entries
        .par_iter()
        .map(|e| FileInfo::parse(&e.name).map(|info| info.with_stat(e.size, e.modified)))
        .collect();

    let mut report = ParseReport::default();
    let mut groups: IndexMap<(String, String, String), Vec<FileInfo>> = IndexMap::new();
    let mut singles: Vec<FileInfo> = Vec::new();

    for result in parsed {
        let info = match result {
            Ok(info) => info,
            Err(e) => {
                warn!("Skipping entry: {}", e);
                report.errors.push(e);
                continue;
            }
        };
        if opts.compress == Compress::Off || !info.is_sequence_valid() || !opts.groups_extension(&info) {
            singles.push(info);
            continue;
        }
        let key = (
            info.dir().to_string(),
            info.base().to_string(),
            info.extension_key(),
        );
        let bucket = groups.entry(key).or_default();
        if !bucket.iter_mut().any(|seq| seq.add_to_sequence(&info)) {
            bucket.push(info);
        }
    }

    report.items = dirs;
    report.items.extend(groups.into_values().flatten());
    report.items.extend(singles);

    if opts.compress == Compress::Range {
        for item in &mut report.items {
            if let Err(e) = item.compress_range() {
                warn!("Frame range too long to fill, keeping gaps: {}", e);
                report.errors.push(e);
            }
        }
    }

    sort_items(&mut report.items, opts);
    debug!(
        "Grouped listing: {} items, {} errors",
        report.items.len(),
        report.errors.len()
    );
    report
}

fn compare(a: &FileInfo, b: &FileInfo, sort: SortBy) -> Ordering {
    let by_name = || a.file_name(None, false).cmp(&b.file_name(None, false));
    match sort {
        SortBy::Name => by_name(),
        SortBy::StartFrame => {
            let start = |i: &FileInfo| i.sequence().start().unwrap_or(-1);
            start(a).cmp(&start(b)).then_with(by_name)
        }
        SortBy::Size => a.size().cmp(&b.size()).then_with(by_name),
        SortBy::Time => a.modified().cmp(&b.modified()).then_with(by_name),
    }
}

/// Sort a listing in place according to `opts`
pub fn sort_items(items: &mut [FileInfo], opts: &ListOptions) {
    items.sort_by(|a, b| {
        let ord = compare(a, b, opts.sort);
        if opts.reverse { ord.reverse() } else { ord }
    });
    if opts.dirs_first {
        // Stable sort keeps the order established above
        items.sort_by_key(|i| i.file_type() != FileType::Directory);
    }
}

fn dir_prefix(dir: &Path) -> String {
    let mut prefix = dir.to_string_lossy().to_string();
    if !prefix.is_empty() && !prefix.ends_with(['/', '\\']) {
        prefix.push(std::path::MAIN_SEPARATOR);
    }
    prefix
}

/// Read `read_path`, naming entries `prefix + file_name`
fn read_entries(read_path: &Path, prefix: &str, opts: &ListOptions) -> SeqResult<(Vec<Entry>, Vec<FileInfo>)> {
    let read = fs::read_dir(read_path).map_err(|source| SeqError::ReadDir {
        path: read_path.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in read {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", read_path.display(), e);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') && !opts.show_hidden {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("Cannot stat {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let full = format!("{}{}", prefix, name);
        if meta.is_dir() {
            dirs.push(FileInfo::directory(&full).with_stat(0, meta.modified().ok()));
        } else {
            files.push(Entry {
                name: full,
                size: meta.len(),
                modified: meta.modified().ok(),
            });
        }
    }
    Ok((files, dirs))
}

/// List a directory, grouping numbered files into sequences
pub fn directory_list(dir: impl AsRef<Path>, opts: &ListOptions) -> SeqResult<ParseReport> {
    let dir = dir.as_ref();
    let (files, dirs) = read_entries(dir, &dir_prefix(dir), opts)?;
    let report = group_entries(files, dirs, opts);
    info!(
        "Listed {}: {} items ({} sequences)",
        dir.display(),
        report.items.len(),
        report.sequences().count()
    );
    Ok(report)
}

/// The sequence a single file on disk belongs to.
///
/// Files without a frame number come back unchanged.
pub fn file_sequence(path: impl AsRef<Path>, opts: &ListOptions) -> SeqResult<FileInfo> {
    let info = FileInfo::parse(path.as_ref())?;
    if !info.is_sequence_valid() {
        return Ok(info);
    }
    let read_path = if info.dir().is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(info.dir())
    };
    let (files, _) = read_entries(&read_path, info.dir(), opts)?;
    let grouping = ListOptions {
        compress: Compress::Sparse,
        sequence_extensions: Vec::new(),
        ..opts.clone()
    };
    let report = group_entries(files, Vec::new(), &grouping);
    let own_name = info.file_name(None, true);
    let frame = info.sequence().start();
    Ok(report
        .items
        .into_iter()
        .find(|item| item.is_compatible(&info) && item.file_name(frame, true) == own_name)
        .unwrap_or(info))
}

fn printf_regex() -> Result<Regex, ParseError> {
    Regex::new(r"%0?(\d*)d").map_err(|e| ParseError::pattern("%d", e.to_string()))
}

fn glob_paths(pattern: &str) -> Result<Vec<PathBuf>, ParseError> {
    let mut paths = Vec::new();
    let entries = glob::glob(pattern).map_err(|e| ParseError::pattern(pattern, e.to_string()))?;
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!("Glob entry error: {}", e),
        }
    }
    Ok(paths)
}

/// Resolve `render.####.exr` against the file system
fn resolve_wildcard(text: &str, wildcard: &FileInfo, opts: &ListOptions) -> SeqResult<FileInfo> {
    let pad = match wildcard.number().len() {
        1 => None,
        n => Some(n),
    };
    let pattern = format!(
        "{}{}*{}",
        glob::Pattern::escape(wildcard.dir()),
        glob::Pattern::escape(wildcard.base()),
        glob::Pattern::escape(wildcard.extension())
    );

    let mut result: Option<FileInfo> = None;
    for path in glob_paths(&pattern)? {
        let Ok(candidate) = FileInfo::parse(&path) else {
            continue;
        };
        if !candidate.is_sequence_valid()
            || !candidate.is_compatible(wildcard)
            || !candidate.number().bytes().all(|b| b.is_ascii_digit())
        {
            continue;
        }
        if pad.is_some_and(|p| candidate.number().len() != p) {
            continue;
        }
        let candidate = match fs::metadata(&path) {
            Ok(meta) => candidate.with_stat(meta.len(), meta.modified().ok()),
            Err(_) => candidate,
        };
        match result.as_mut() {
            None => result = Some(candidate),
            Some(seq) => {
                if !seq.add_to_sequence(&candidate) {
                    debug!("Padding mismatch, skipping {}", path.display());
                }
            }
        }
    }

    let mut found = result.ok_or_else(|| ParseError::NoMatch(text.to_string()))?;
    found.set_type(FileType::Sequence);
    if opts.compress == Compress::Range
        && let Err(e) = found.compress_range()
    {
        warn!("Frame range too long to fill, keeping gaps: {}", e);
    }
    Ok(found)
}

/// Resolve a user-supplied file, wildcard, printf, glob or frame-list pattern
pub fn parse_pattern(text: &str, opts: &ListOptions) -> SeqResult<FileInfo> {
    // printf style becomes a # wildcard of the same width
    let re = printf_regex()?;
    let text = if re.is_match(text) {
        re.replace_all(text, |caps: &regex::Captures| {
            let width = caps[1].parse::<usize>().unwrap_or(1).max(1);
            "#".repeat(width)
        })
        .to_string()
    } else {
        text.to_string()
    };

    let info = FileInfo::parse(&text)?;
    if info.is_sequence_wildcard() {
        return resolve_wildcard(&text, &info, opts);
    }

    if text.contains(['*', '?', '[']) {
        let files: Vec<Entry> = glob_paths(&text)?
            .into_iter()
            .map(|p| {
                let meta = fs::metadata(&p).ok();
                Entry {
                    name: p.to_string_lossy().to_string(),
                    size: meta.as_ref().map_or(0, |m| m.len()),
                    modified: meta.and_then(|m| m.modified().ok()),
                }
            })
            .collect();
        let report = group_entries(files, Vec::new(), opts);
        // Largest group wins
        return report
            .items
            .into_iter()
            .max_by_key(|i| i.sequence().len())
            .ok_or_else(|| ParseError::NoMatch(text.clone()).into());
    }

    if info.number().contains(['-', ',']) {
        let mut explicit = info;
        explicit.set_type(FileType::Sequence);
        return Ok(explicit);
    }

    if info.is_sequence_valid() && Path::new(&text).exists() {
        return file_sequence(&text, opts);
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_groups_padded_sequence() {
        let listing: Vec<String> = (1..=10).map(|i| format!("img.{:04}.tif", i)).collect();
        let report = parse_listing(&listing, &ListOptions::default());
        assert!(report.errors.is_empty());
        assert_eq!(report.items.len(), 1);
        let seq = &report.items[0];
        assert_eq!(seq.file_type(), FileType::Sequence);
        assert_eq!(seq.sequence().frames(), (1..=10).collect::<Vec<_>>().as_slice());
        assert_eq!(seq.sequence().pad(), 4);
        assert_eq!(seq.file_name(None, false), "img.0001-0010.tif");
    }

    #[test]
    fn test_inconsistent_padding_splits() {
        let report = parse_listing(
            names(&["a.0001.exr", "a.0002.exr", "a.3.exr", "a.4.exr"]),
            &ListOptions::default(),
        );
        assert_eq!(report.items.len(), 2);
        let pads: Vec<usize> = report.items.iter().map(|i| i.sequence().pad()).collect();
        assert!(pads.contains(&4) && pads.contains(&0));
    }

    #[test]
    fn test_singles_and_errors() {
        let report = parse_listing(
            names(&["notes.txt", "shot.-0001.exr", "shot.0001.exr", "plate.99999999999.dpx"]),
            &ListOptions::default(),
        );
        assert_eq!(report.errors.len(), 2);
        let listed: Vec<String> = report.items.iter().map(|i| i.file_name(None, false)).collect();
        assert_eq!(listed, vec!["notes.txt".to_string(), "shot.0001.exr".to_string()]);
        assert_eq!(report.items[0].file_type(), FileType::File);
    }

    #[test]
    fn test_compress_modes() {
        let list = names(&["r.1.png", "r.2.png", "r.4.png"]);

        let off = ListOptions {
            compress: Compress::Off,
            ..Default::default()
        };
        assert_eq!(parse_listing(&list, &off).items.len(), 3);

        let sparse = parse_listing(&list, &ListOptions::default());
        assert_eq!(sparse.items[0].file_name(None, false), "r.1-2,4.png");

        let range = ListOptions {
            compress: Compress::Range,
            ..Default::default()
        };
        let range = parse_listing(&list, &range);
        assert_eq!(range.items[0].file_name(None, false), "r.1-4.png");
    }

    #[test]
    fn test_range_fill_too_long_keeps_gaps() {
        let opts = ListOptions {
            compress: Compress::Range,
            ..Default::default()
        };
        let report = parse_listing(names(&["img.1.exr", "img.2000000000.exr"]), &opts);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], ParseError::InvalidFrameList(_)));
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].sequence().frames(), &[1, 2_000_000_000]);
        assert_eq!(report.items[0].file_name(None, false), "img.1,2000000000.exr");
    }

    #[test]
    fn test_sequence_extensions_filter() {
        let opts = ListOptions {
            sequence_extensions: vec!["exr".into()],
            ..Default::default()
        };
        let report = parse_listing(names(&["a.1.exr", "a.2.exr", "b.1.txt", "b.2.txt"]), &opts);
        assert_eq!(report.items.len(), 3);
        assert_eq!(report.sequences().count(), 1);
    }

    #[test]
    fn test_sort_start_frame_and_reverse() {
        let list = names(&["late.100.png", "late.101.png", "early.5.png", "early.6.png"]);
        let report = parse_listing(&list, &ListOptions::default());
        assert_eq!(report.items[0].base(), "early.");

        let opts = ListOptions {
            sort: SortBy::Name,
            reverse: true,
            ..Default::default()
        };
        let report = parse_listing(&list, &opts);
        assert_eq!(report.items[0].base(), "late.");
    }

    #[test]
    fn test_sort_by_from_str() {
        assert_eq!("Size".parse::<SortBy>().unwrap(), SortBy::Size);
        assert_eq!("start".parse::<SortBy>().unwrap(), SortBy::StartFrame);
        assert!("color".parse::<SortBy>().is_err());
    }

    #[test]
    fn test_explicit_frame_list_pattern() {
        let info = parse_pattern("/no/such/dir/render.1-3,7.exr", &ListOptions::default()).unwrap();
        assert_eq!(info.file_type(), FileType::Sequence);
        assert_eq!(info.sequence().frames(), &[1, 2, 3, 7]);
        assert_eq!(info.frame_path(7), PathBuf::from("/no/such/dir/render.7.exr"));
    }

    #[test]
    fn test_wildcard_without_matches() {
        let err = parse_pattern("/no/such/dir/render.%04d.exr", &ListOptions::default()).unwrap_err();
        assert!(matches!(err, SeqError::Parse(ParseError::NoMatch(_))));
    }
}
