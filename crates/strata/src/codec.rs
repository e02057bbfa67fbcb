//! Path to identifier name codecs.
//!
//! A managed path has to be expressed in two foreign namespaces: the LVM
//! logical volume names and the systemd unit names. Both codecs share one
//! algorithm (separators become single dashes, literal dashes are escaped)
//! and differ only in how a literal dash is escaped and in the constraints
//! of the target namespace.
//!
//! The path domain is restricted so that the encoding is bijective: a
//! component may not start with `.` or `-` and may not end with `-`. With
//! that rule every dash run in an encoded name is either a single separator
//! or an escaped literal, never both.

use std::path::{Path, PathBuf};

use strata_common::{StrataError, StrataResult};

/// How a literal dash inside a path component is escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashEscape {
    /// `-` becomes `--` (LVM names, legacy unit names).
    Double,
    /// `-` becomes `\x2d` (systemd path escaping).
    Hex,
}

impl DashEscape {
    const fn escaped(self) -> &'static str {
        match self {
            Self::Double => "--",
            Self::Hex => "\\x2d",
        }
    }
}

/// Constraints of a target namespace.
#[derive(Debug, Clone, Copy)]
struct Namespace {
    name: &'static str,
    dash: DashEscape,
    suffix: &'static str,
    max_len: usize,
    reserved_prefixes: &'static [&'static str],
    reserved_infixes: &'static [&'static str],
}

/// Bidirectional mapping between an absolute path and a namespace-safe name.
#[derive(Debug, Clone, Copy)]
pub struct NameCodec {
    ns: Namespace,
}

impl NameCodec {
    /// Codec for LVM logical volume names.
    #[must_use]
    pub const fn lvm() -> Self {
        Self {
            ns: Namespace {
                name: "lvm",
                dash: DashEscape::Double,
                suffix: "",
                // NAME_LEN is 128 including the terminating NUL.
                max_len: 127,
                reserved_prefixes: &["snapshot", "pvmove"],
                reserved_infixes: &[
                    "_cdata", "_cmeta", "_corig", "_mimage", "_mlog", "_rimage", "_rmeta",
                    "_tdata", "_tmeta", "_vorigin",
                ],
            },
        }
    }

    /// Codec for systemd mount unit file names.
    ///
    /// The name matches `systemd-escape --path --suffix=mount` for every
    /// valid path, so systemd accepts the unit for its `Where=`.
    #[must_use]
    pub const fn systemd_mount() -> Self {
        Self {
            ns: Namespace {
                name: "systemd",
                dash: DashEscape::Hex,
                suffix: ".mount",
                max_len: 255,
                reserved_prefixes: &[],
                reserved_infixes: &[],
            },
        }
    }

    /// Codec producing unit names with the LVM dash escaping.
    #[must_use]
    pub const fn legacy_mount() -> Self {
        Self {
            ns: Namespace {
                name: "legacy-unit",
                dash: DashEscape::Double,
                suffix: ".mount",
                max_len: 255,
                reserved_prefixes: &[],
                reserved_infixes: &[],
            },
        }
    }

    /// Name of the target namespace.
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        self.ns.name
    }

    /// Encode an absolute path into an identifier.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if the path is relative, contains
    /// characters outside the supported set, or does not fit the namespace.
    pub fn encode(&self, path: &Path) -> StrataResult<String> {
        let components = components(path)?;

        let mut name = components
            .iter()
            .map(|c| c.replace('-', self.ns.dash.escaped()))
            .collect::<Vec<_>>()
            .join("-");
        name.push_str(self.ns.suffix);

        let invalid = |reason: String| StrataError::InvalidPath {
            path: path.to_path_buf(),
            reason,
        };

        if name.len() > self.ns.max_len {
            return Err(invalid(format!(
                "{} name is {} characters long, at most {} allowed",
                self.ns.name,
                name.len(),
                self.ns.max_len
            )));
        }
        if let Some(prefix) = self
            .ns
            .reserved_prefixes
            .iter()
            .find(|p| name.starts_with(*p))
        {
            return Err(invalid(format!(
                "{} names must not start with '{prefix}'",
                self.ns.name
            )));
        }
        if let Some(infix) = self.ns.reserved_infixes.iter().find(|i| name.contains(*i)) {
            return Err(invalid(format!(
                "{} names must not contain '{infix}'",
                self.ns.name
            )));
        }

        Ok(name)
    }

    /// Decode an identifier back into the absolute path it was encoded from.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidIdentifier`] when the identifier could
    /// not have been produced by [`NameCodec::encode`].
    pub fn decode(&self, identifier: &str) -> StrataResult<PathBuf> {
        let invalid = || StrataError::InvalidIdentifier {
            namespace: self.ns.name.to_string(),
            identifier: identifier.to_string(),
        };

        let body = identifier.strip_suffix(self.ns.suffix).ok_or_else(invalid)?;
        let escaped = self.ns.dash.escaped();

        let mut path = String::with_capacity(body.len() + 1);
        path.push('/');
        let mut rest = body;
        while let Some(c) = rest.chars().next() {
            if let Some(tail) = rest.strip_prefix(escaped) {
                path.push('-');
                rest = tail;
            } else if c == '-' {
                path.push('/');
                rest = &rest[1..];
            } else {
                path.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }

        let path = PathBuf::from(path);
        match self.encode(&path) {
            Ok(reencoded) if reencoded == identifier => Ok(path),
            _ => Err(invalid()),
        }
    }
}

/// Normalize a volume path: validate it and drop redundant separators.
///
/// # Errors
///
/// Returns a precondition error if the path is not a valid volume path.
pub fn normalize(path: &Path) -> StrataResult<PathBuf> {
    let components = components(path)?;
    Ok(PathBuf::from(format!("/{}", components.join("/"))))
}

/// Validate a volume path and split it into its components.
fn components(path: &Path) -> StrataResult<Vec<&str>> {
    let invalid = |reason: &str| StrataError::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let raw = path.to_str().ok_or_else(|| invalid("path is not valid UTF-8"))?;
    if !raw.starts_with('/') {
        return Err(StrataError::RelativePath {
            path: path.to_path_buf(),
        });
    }

    let components: Vec<&str> = raw.split('/').filter(|c| !c.is_empty()).collect();
    if components.is_empty() {
        return Err(invalid("the root directory cannot be a volume"));
    }

    for component in &components {
        if *component == "." || *component == ".." {
            return Err(invalid("'.' and '..' components are not allowed"));
        }
        if !component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(invalid("unsupported character in path component"));
        }
        if component.starts_with('.') || component.starts_with('-') {
            return Err(invalid("a path component must not start with '.' or '-'"));
        }
        if component.ends_with('-') {
            return Err(invalid("a path component must not end with '-'"));
        }
    }

    Ok(components)
}
