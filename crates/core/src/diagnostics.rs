//! Per-page diagnostic dumps.
//!
//! Two plain-text files per page: the extracted words and the redact set.
//! Failures here are logged and never reach the caller.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::document::WordRecord;
use crate::entities::RedactSet;

pub fn word_list_path(dir: &Path, page: u32) -> PathBuf {
    dir.join(format!("word_list_page_{page}.txt"))
}

pub fn redact_set_path(dir: &Path, page: u32) -> PathBuf {
    dir.join(format!("redact_set_page_{page}.txt"))
}

fn write_lines<I, T>(path: &Path, lines: I) -> io::Result<()>
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    let mut out = io::BufWriter::new(fs::File::create(path)?);
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Writes both dump files for `page` into `dir`.
pub fn dump_page(dir: &Path, page: u32, words: &[WordRecord], redact_set: &RedactSet) {
    if let Err(e) = fs::create_dir_all(dir) {
        log::warn!("[Diagnostics] cannot create {}: {}", dir.display(), e);
        return;
    }

    let words_path = word_list_path(dir, page);
    if let Err(e) = write_lines(&words_path, words) {
        log::warn!("[Diagnostics] writing {} failed: {}", words_path.display(), e);
    }

    let set_path = redact_set_path(dir, page);
    if let Err(e) = write_lines(&set_path, redact_set.iter()) {
        log::warn!("[Diagnostics] writing {} failed: {}", set_path.display(), e);
    }
}
