use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, UtcOffset};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

pub const DEFAULT_REPLACEMENT: char = '_';

const SAFE_PUNCTUATION: &str = "_,.-=+!@$()";

// YYYYMMDD_HHMMSS_mmm: sorts lexically and stays readable.
const STAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]_[subsecond digits:3]");

/// Replace every character that is not an ASCII letter, digit or one of
/// `_,.-=+!@$()` with `replacement`. The result has as many characters as the
/// input.
pub fn safe_file_name_part(user_input: &str, replacement: char) -> String {
    user_input
        .chars()
        .map(|c| if is_safe(c) { c } else { replacement })
        .collect()
}

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || SAFE_PUNCTUATION.contains(c)
}

pub fn timestamp_stem(now: OffsetDateTime) -> Result<String> {
    now.format(STAMP_FORMAT)
        .with_context(|| format!("formatting timestamp {now}"))
}

/// The PDF a conversion writes to. Unique per millisecond and title; two jobs
/// with the same title started in the same millisecond get the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    path: PathBuf,
}

impl OutputTarget {
    pub fn new(output_dir: &Path, title: Option<&str>, now: OffsetDateTime) -> Result<Self> {
        let stem = timestamp_stem(now)?;
        let file_name = match title.filter(|t| !t.is_empty()) {
            Some(title) => format!(
                "{stem}-{}.pdf",
                safe_file_name_part(title, DEFAULT_REPLACEMENT)
            ),
            None => format!("{stem}.pdf"),
        };
        Ok(Self {
            path: output_dir.join(file_name),
        })
    }

    pub fn now(output_dir: &Path, title: Option<&str>, offset: UtcOffset) -> Result<Self> {
        Self::new(output_dir, title, OffsetDateTime::now_utc().to_offset(offset))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}
