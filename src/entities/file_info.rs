//! File names split into sequence components
//!
//! `render.0001.exr` becomes directory `""`, base `render.`, number `0001`,
//! extension `.exr`. Files sharing directory, base and extension with
//! compatible padding fold into a single `FileInfo` of type `Sequence`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::entities::sequence::{parse_frame, token_pad, Sequence};
use crate::error::ParseError;

/// Components of a file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub dir: String,
    pub base: String,
    pub number: String,
    pub extension: String,
}

fn is_path_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn is_sequence_char(c: char) -> bool {
    c.is_ascii_digit() || c == '-' || c == '#'
}

fn is_list_separator(c: char) -> bool {
    c == '-' || c == ','
}

/// Two number words belong to one list only if their padding agrees
fn match_padding(a: &[char], b: &[char]) -> bool {
    let padded = |w: &[char]| w.len() > 1 && w[0] == '0';
    if padded(a) || padded(b) {
        a.len() == b.len()
    } else {
        true
    }
}

/// Split a file name into directory, base, number and extension.
///
/// The number is the trailing run of digits, `#` and list separators in
/// front of the extension. Words of a list (`001-100`) must agree on padding,
/// otherwise the run is cut. A leading separator belongs to the base, so
/// `movie-.mov` has no number.
pub fn split(input: &str) -> Split {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Split::default();
    if chars.is_empty() {
        return out;
    }
    let mid = |start: isize, len: isize| -> String {
        chars[start as usize..(start + len) as usize].iter().collect()
    };

    let length = chars.len() as isize;

    // Extension
    let mut i = length - 1;
    let mut tmp = i;
    while i > 0 && chars[i as usize] != '.' && !is_path_separator(chars[i as usize]) {
        i -= 1;
    }
    if i > 0 && chars[i as usize] == '.' && !is_path_separator(chars[(i - 1) as usize]) {
        out.extension = mid(i, tmp - i + 1);
        i -= 1;
    } else {
        i = length - 1;
    }

    // Number
    if i >= 0 && is_sequence_char(chars[i as usize]) {
        tmp = i;
        let mut separator: isize = -1;
        let mut word: Vec<char> = Vec::new();
        while i > 0 {
            let prev = chars[(i - 1) as usize];
            if !is_sequence_char(prev) || is_list_separator(prev) {
                let candidate: &[char] = if separator != -1 {
                    &chars[i as usize..separator as usize]
                } else {
                    &[]
                };
                if separator != -1 && !match_padding(candidate, &word) {
                    i = separator + 1;
                    break;
                }
                let end = if separator == -1 { tmp + 1 } else { separator };
                word = chars[i as usize..end as usize].to_vec();
                separator = i - 1;
            }
            if !(is_sequence_char(prev) || is_list_separator(prev)) {
                break;
            }
            i -= 1;
        }
        let mut number = mid(i, tmp - i + 1);
        // Leading separators stay with the base ("movie-.mov", "shot_-01")
        let stripped = number.trim_start_matches(is_list_separator).len();
        let moved = number.len() - stripped;
        if moved > 0 {
            number = number[moved..].to_string();
            i += moved as isize;
        }
        if number.chars().any(|c| c.is_ascii_digit() || c == '#') {
            out.number = number;
            i -= 1;
        } else {
            // Only separators: everything up to tmp is base material
            i = tmp;
        }
    }

    // Base
    if i >= 0 && !is_path_separator(chars[i as usize]) {
        tmp = i;
        while i > 0 && !is_path_separator(chars[(i - 1) as usize]) {
            i -= 1;
        }
        out.base = mid(i, tmp - i + 1);
        i -= 1;
    }

    // Directory
    if i >= 0 {
        out.dir = mid(0, i + 1);
    }

    out
}

/// What kind of entry a `FileInfo` describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Sequence,
    Directory,
}

/// A file, directory or numbered file sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    dir: String,
    base: String,
    number: String,
    extension: String,
    file_type: FileType,
    sequence: Sequence,
    size: u64,
    #[serde(skip)]
    modified: Option<SystemTime>,
}

impl FileInfo {
    /// Split a path without validating the number token.
    ///
    /// Use [`FileInfo::parse`] when malformed numbers must be reported.
    pub fn new(path: impl AsRef<Path>) -> Self {
        match Self::parse(path.as_ref()) {
            Ok(info) => info,
            Err(_) => {
                let parts = split(&path.as_ref().to_string_lossy());
                Self::from_split(parts, Sequence::new())
            }
        }
    }

    /// Split a path, seeding the sequence from its number token.
    ///
    /// Fails for negative (`shot.-0005.exr`) or out-of-range frame numbers.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let text = path.as_ref().to_string_lossy().to_string();
        let parts = split(&text);

        let base_marks_negative = parts.base == "-"
            || parts.base.ends_with(".-")
            || parts.base.ends_with("_-");
        let sequence = if parts.number.is_empty() || parts.number.contains('#') {
            Sequence::new()
        } else if parts.number.bytes().all(|b| b.is_ascii_digit()) {
            if base_marks_negative {
                return Err(ParseError::NegativeFrame(text));
            }
            let frame = parse_frame(&parts.number, &text)?;
            Sequence::from_frames([frame], token_pad(&parts.number))
        } else {
            parts.number.parse::<Sequence>()?
        };

        Ok(Self::from_split(parts, sequence))
    }

    /// Directory entry; never part of a sequence
    pub fn directory(path: impl AsRef<Path>) -> Self {
        let text = path.as_ref().to_string_lossy().to_string();
        let trimmed = text.trim_end_matches(is_path_separator);
        let (dir, base) = match trimmed.rfind(is_path_separator) {
            Some(pos) => (trimmed[..=pos].to_string(), trimmed[pos + 1..].to_string()),
            None => (String::new(), trimmed.to_string()),
        };
        Self {
            dir,
            base,
            number: String::new(),
            extension: String::new(),
            file_type: FileType::Directory,
            sequence: Sequence::new(),
            size: 0,
            modified: None,
        }
    }

    fn from_split(parts: Split, sequence: Sequence) -> Self {
        Self {
            dir: parts.dir,
            base: parts.base,
            number: parts.number,
            extension: parts.extension,
            file_type: FileType::File,
            sequence,
            size: 0,
            modified: None,
        }
    }

    /// Attach file-system metadata gathered by a listing
    pub fn with_stat(mut self, size: u64, modified: Option<SystemTime>) -> Self {
        self.size = size;
        self.modified = modified;
        self
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn set_type(&mut self, file_type: FileType) {
        self.file_type = file_type;
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Replace the sequence and the number token that names it
    pub fn set_sequence(&mut self, sequence: Sequence) {
        self.number = sequence.to_string();
        self.sequence = sequence;
    }

    /// Extension without the dot, lower-cased ("exr")
    pub fn extension_key(&self) -> String {
        self.extension.trim_start_matches('.').to_ascii_lowercase()
    }

    /// Has a frame number that could join a sequence
    pub fn is_sequence_valid(&self) -> bool {
        self.file_type != FileType::Directory
            && !self.number.is_empty()
            && !self.sequence.is_empty()
    }

    /// Number token is a `#` placeholder ("render.####.exr")
    pub fn is_sequence_wildcard(&self) -> bool {
        self.file_type != FileType::Directory
            && !self.number.is_empty()
            && self.number.chars().all(|c| c == '#')
    }

    /// Names starting with a dot
    pub fn is_dot_file(&self) -> bool {
        self.base.starts_with('.')
    }

    /// Same directory, base and extension; both carry frame numbers
    pub fn is_compatible(&self, other: &FileInfo) -> bool {
        self.file_type != FileType::Directory
            && other.file_type != FileType::Directory
            && self.dir == other.dir
            && self.base == other.base
            && self.extension.eq_ignore_ascii_case(&other.extension)
    }

    /// Fold `other` into this sequence.
    ///
    /// Returns false (and changes nothing) when names or padding disagree.
    pub fn add_to_sequence(&mut self, other: &FileInfo) -> bool {
        if !self.is_sequence_valid() || !other.is_sequence_valid() || !self.is_compatible(other) {
            return false;
        }
        if !pads_match(&self.sequence, &other.sequence) {
            return false;
        }
        self.sequence.merge(&other.sequence);
        self.file_type = FileType::Sequence;
        self.number = self.sequence.to_string();
        self.size += other.size;
        self.modified = match (self.modified, other.modified) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        true
    }

    /// File name with the given frame substituted into the number.
    ///
    /// `None` keeps the full frame list ("render.0001-0010.exr").
    pub fn file_name(&self, frame: Option<i64>, with_dir: bool) -> String {
        let mut out = String::new();
        if with_dir {
            out.push_str(&self.dir);
        }
        out.push_str(&self.base);
        match (self.file_type, frame) {
            (FileType::Sequence, Some(frame)) if !self.sequence.is_empty() => {
                out.push_str(&self.sequence.format_frame(frame));
            }
            (FileType::Sequence, None) if !self.sequence.is_empty() => {
                out.push_str(&self.sequence.to_string());
            }
            _ => out.push_str(&self.number),
        }
        out.push_str(&self.extension);
        out
    }

    /// Full path of the entry (frame list kept for sequences)
    pub fn path(&self) -> PathBuf {
        PathBuf::from(self.file_name(None, true))
    }

    /// Path of one frame of the sequence
    pub fn frame_path(&self, frame: i64) -> PathBuf {
        PathBuf::from(self.file_name(Some(frame), true))
    }

    /// One path per frame for sequences, the entry itself otherwise
    pub fn expand(&self) -> Vec<PathBuf> {
        if self.file_type == FileType::Sequence && !self.sequence.is_empty() {
            self.sequence
                .frames()
                .iter()
                .map(|&frame| self.frame_path(frame))
                .collect()
        } else {
            vec![self.path()]
        }
    }

    /// Fill the gaps of a sequence; on error the sparse list is kept
    pub(crate) fn compress_range(&mut self) -> Result<(), ParseError> {
        if self.file_type == FileType::Sequence {
            self.sequence
                .fill()
                .map_err(|_| ParseError::InvalidFrameList(self.file_name(None, true)))?;
            self.number = self.sequence.to_string();
        }
        Ok(())
    }
}

fn digits(frame: i64) -> usize {
    frame.max(0).to_string().len()
}

/// Frames with `pad == 0` must all have exactly `width` digits to join a padded run
fn all_have_width(seq: &Sequence, width: usize) -> bool {
    match (seq.start(), seq.end()) {
        (Some(lo), Some(hi)) => digits(lo) == width && digits(hi) == width,
        _ => true,
    }
}

fn pads_match(a: &Sequence, b: &Sequence) -> bool {
    match (a.pad(), b.pad()) {
        (0, 0) => true,
        (p, 0) => all_have_width(b, p),
        (0, q) => all_have_width(a, q),
        (p, q) => p == q,
    }
}
