//! Utility modules
//!
//! `sequences`: directory listing and pattern resolution on top of `FileInfo`.

pub mod sequences;
