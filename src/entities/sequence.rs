//! Frame-number sequences
//!
//! A `Sequence` is the ordered set of frame numbers found for one shot,
//! plus the zero-padding width used in its file names and a nominal speed.
//!
//! # String form
//!
//! Frame lists are written the way artists type them on the command line:
//! `1-10`, `1,3-4`, `0001-0100`. Padding is taken from zero-prefixed tokens.
//!
//! # Invariants
//!
//! - `frames` is always sorted ascending and free of duplicates
//! - every frame is in `0..=MAX_FRAME`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entities::speed::Speed;
use crate::error::ParseError;

/// Largest frame number accepted from file names or frame lists
pub const MAX_FRAME: i64 = i32::MAX as i64;

/// Upper bound on frames produced by expanding a single "a-b" token
pub const MAX_EXPANDED_FRAMES: i64 = 10_000_000;

/// How a directory listing folds numbered files together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compress {
    /// Every file is listed on its own
    Off,
    /// Sequences keep their gaps: `1,3-4`
    #[default]
    Sparse,
    /// Sequences collapse to first-last: `1-4`
    Range,
}

impl FromStr for Compress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "sparse" => Ok(Self::Sparse),
            "range" => Ok(Self::Range),
            other => Err(format!("unknown compress mode '{}' (off|sparse|range)", other)),
        }
    }
}

/// Ordered frame numbers with padding and speed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sequence {
    frames: Vec<i64>,
    pad: usize,
    #[serde(default)]
    speed: Speed,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contiguous sequence `start..=end`
    pub fn from_range(start: i64, end: i64, pad: usize) -> Self {
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
        Self {
            frames: (lo..=hi).collect(),
            pad,
            speed: Speed::default(),
        }
    }

    /// Sequence from arbitrary frames (sorted and de-duplicated here)
    pub fn from_frames(frames: impl IntoIterator<Item = i64>, pad: usize) -> Self {
        let mut frames: Vec<i64> = frames.into_iter().collect();
        frames.sort_unstable();
        frames.dedup();
        Self {
            frames,
            pad,
            speed: Speed::default(),
        }
    }

    pub fn frames(&self) -> &[i64] {
        &self.frames
    }

    pub fn pad(&self) -> usize {
        self.pad
    }

    pub fn set_pad(&mut self, pad: usize) {
        self.pad = pad;
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Speed) {
        self.speed = speed;
    }

    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub fn start(&self) -> Option<i64> {
        self.frames.first().copied()
    }

    pub fn end(&self) -> Option<i64> {
        self.frames.last().copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn contains(&self, frame: i64) -> bool {
        self.frames.binary_search(&frame).is_ok()
    }

    /// Position of a frame in playback order
    pub fn index_of(&self, frame: i64) -> Option<usize> {
        self.frames.binary_search(&frame).ok()
    }

    pub fn frame_at(&self, index: usize) -> Option<i64> {
        self.frames.get(index).copied()
    }

    /// Insert keeping order; returns false for duplicates
    pub fn insert(&mut self, frame: i64) -> bool {
        match self.frames.binary_search(&frame) {
            Ok(_) => false,
            Err(pos) => {
                self.frames.insert(pos, frame);
                true
            }
        }
    }

    /// Merge another sequence's frames into this one
    pub fn merge(&mut self, other: &Sequence) {
        self.frames.extend_from_slice(&other.frames);
        self.frames.sort_unstable();
        self.frames.dedup();
        self.pad = self.pad.max(other.pad);
    }

    /// Contiguous runs as inclusive `(first, last)` pairs
    pub fn ranges(&self) -> Vec<(i64, i64)> {
        let mut out: Vec<(i64, i64)> = Vec::new();
        for &frame in &self.frames {
            match out.last_mut() {
                Some((_, last)) if *last + 1 == frame => *last = frame,
                _ => out.push((frame, frame)),
            }
        }
        out
    }

    /// Missing runs between first and last frame as inclusive pairs
    pub fn gaps(&self) -> Vec<(i64, i64)> {
        self.frames
            .windows(2)
            .filter(|w| w[1] - w[0] > 1)
            .map(|w| (w[0] + 1, w[1] - 1))
            .collect()
    }

    /// Replace the frame list by `start..=end` (Compress::Range).
    ///
    /// Spans of `MAX_EXPANDED_FRAMES` or more are refused and the frame list
    /// is left untouched.
    pub fn fill(&mut self) -> Result<(), ParseError> {
        if let (Some(start), Some(end)) = (self.start(), self.end()) {
            if end - start >= MAX_EXPANDED_FRAMES {
                return Err(ParseError::InvalidFrameList(self.to_string()));
            }
            self.frames = (start..=end).collect();
        }
        Ok(())
    }

    /// Frame number formatted with this sequence's padding
    pub fn format_frame(&self, frame: i64) -> String {
        format!("{:0width$}", frame, width = self.pad)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (start, end) in self.ranges() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{}", self.format_frame(start))?;
            } else {
                write!(f, "{}-{}", self.format_frame(start), self.format_frame(end))?;
            }
        }
        Ok(())
    }
}

/// Parse one unsigned frame token, rejecting values beyond `MAX_FRAME`
pub(crate) fn parse_frame(token: &str, context: &str) -> Result<i64, ParseError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidFrameList(context.to_string()));
    }
    match token.parse::<u64>() {
        Ok(v) if v <= MAX_FRAME as u64 => Ok(v as i64),
        _ => Err(ParseError::FrameOutOfRange(context.to_string())),
    }
}

/// Padding implied by a single token ("0010" -> 4, "10" -> 0)
pub(crate) fn token_pad(token: &str) -> usize {
    if token.len() > 1 && token.starts_with('0') {
        token.len()
    } else {
        0
    }
}

impl FromStr for Sequence {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Ok(Self::new());
        }
        if text.starts_with('-') {
            return Err(ParseError::NegativeFrame(text.to_string()));
        }

        let mut frames = Vec::new();
        let mut pad = 0usize;
        for piece in text.split(',') {
            let piece = piece.trim();
            if piece.starts_with('-') {
                return Err(ParseError::NegativeFrame(text.to_string()));
            }
            match piece.split_once('-') {
                Some((a, b)) => {
                    if b.starts_with('-') {
                        return Err(ParseError::NegativeFrame(text.to_string()));
                    }
                    let start = parse_frame(a, text)?;
                    let end = parse_frame(b, text)?;
                    pad = pad.max(token_pad(a)).max(token_pad(b));
                    let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
                    if hi - lo >= MAX_EXPANDED_FRAMES {
                        return Err(ParseError::InvalidFrameList(text.to_string()));
                    }
                    frames.extend(lo..=hi);
                }
                None => {
                    frames.push(parse_frame(piece, text)?);
                    pad = pad.max(token_pad(piece));
                }
            }
        }
        Ok(Self::from_frames(frames, pad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_sparse_and_padded() {
        let seq = Sequence::from_frames([4, 1, 3], 0);
        assert_eq!(seq.to_string(), "1,3-4");

        let seq = Sequence::from_range(1, 100, 4);
        assert_eq!(seq.to_string(), "0001-0100");
    }

    #[test]
    fn test_parse_frame_lists() {
        let seq: Sequence = "1-3,5".parse().unwrap();
        assert_eq!(seq.frames(), &[1, 2, 3, 5]);
        assert_eq!(seq.pad(), 0);

        let seq: Sequence = "0001-0003".parse().unwrap();
        assert_eq!(seq.frames(), &[1, 2, 3]);
        assert_eq!(seq.pad(), 4);

        // Reversed range is accepted, output stays ascending
        let seq: Sequence = "5-3".parse().unwrap();
        assert_eq!(seq.frames(), &[3, 4, 5]);
    }

    #[test]
    fn test_parse_rejects_negative_and_out_of_range() {
        assert!(matches!("-5-10".parse::<Sequence>(), Err(ParseError::NegativeFrame(_))));
        assert!(matches!("1,-3".parse::<Sequence>(), Err(ParseError::NegativeFrame(_))));
        assert!(matches!("3--1".parse::<Sequence>(), Err(ParseError::NegativeFrame(_))));
        assert!(matches!(
            "99999999999".parse::<Sequence>(),
            Err(ParseError::FrameOutOfRange(_))
        ));
        assert!(matches!("1-a".parse::<Sequence>(), Err(ParseError::InvalidFrameList(_))));
        assert!(matches!(
            "0-2000000000".parse::<Sequence>(),
            Err(ParseError::InvalidFrameList(_))
        ));
    }

    #[test]
    fn test_gaps_and_ranges() {
        let seq = Sequence::from_frames([1, 2, 3, 7, 8, 10], 0);
        assert_eq!(seq.ranges(), vec![(1, 3), (7, 8), (10, 10)]);
        assert_eq!(seq.gaps(), vec![(4, 6), (9, 9)]);

        let mut filled = seq.clone();
        filled.fill().unwrap();
        assert_eq!(filled.len(), 10);
        assert!(filled.gaps().is_empty());
    }

    #[test]
    fn test_fill_refuses_huge_span() {
        let mut seq = Sequence::from_frames([1, 2_000_000_000], 0);
        assert!(matches!(seq.fill(), Err(ParseError::InvalidFrameList(_))));
        assert_eq!(seq.frames(), &[1, 2_000_000_000]);

        let mut seq = Sequence::from_frames([0, MAX_EXPANDED_FRAMES - 1], 0);
        assert!(seq.fill().is_ok());
        assert_eq!(seq.len() as i64, MAX_EXPANDED_FRAMES);
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut seq = Sequence::new();
        assert!(seq.insert(5));
        assert!(seq.insert(1));
        assert!(!seq.insert(5));
        assert_eq!(seq.frames(), &[1, 5]);
        assert_eq!(seq.index_of(5), Some(1));
        assert_eq!(seq.frame_at(0), Some(1));
    }

    #[test]
    fn test_compress_from_str() {
        assert_eq!("RANGE".parse::<Compress>().unwrap(), Compress::Range);
        assert!("dense".parse::<Compress>().is_err());
    }
}
