//! Live mount table inspection.

use std::fs;
use std::path::{Path, PathBuf};

use strata_common::StrataResult;

/// One line of `/proc/<pid>/mountinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mount point.
    pub target: PathBuf,
    /// Filesystem type.
    pub fstype: String,
    /// Mount source (usually the device).
    pub source: String,
}

/// Parse mountinfo content, skipping malformed lines.
#[must_use]
pub fn parse(content: &str) -> Vec<MountEntry> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<MountEntry> {
    // id parent major:minor root target options [optional...] - fstype source superopts
    let (left, right) = line.split_once(" - ")?;
    let target = left.split_whitespace().nth(4)?;
    let mut right = right.split_whitespace();

    Some(MountEntry {
        target: PathBuf::from(unescape(target)),
        fstype: right.next()?.to_string(),
        source: unescape(right.next()?),
    })
}

/// Undo the octal escaping of whitespace and backslashes.
fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut rest = field;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 4);
        match code.and_then(|c| u8::from_str_radix(c, 8).ok()) {
            Some(byte) => {
                out.push(char::from(byte));
                rest = &rest[pos + 4..];
            }
            None => {
                out.push('\\');
                rest = &rest[pos + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Whether something is mounted on `target` according to `mountinfo`.
pub fn is_mounted(mountinfo: &Path, target: &Path) -> StrataResult<bool> {
    let content = fs::read_to_string(mountinfo)?;
    Ok(parse(&content).iter().any(|entry| entry.target == target))
}
