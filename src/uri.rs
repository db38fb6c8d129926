//! URI helpers shared by the protocols.
//!
//! A protocol turns a URI into a filesystem rooted at scheme and authority
//! plus a relative path:
//!
//! | URI | Base | Path |
//! |-----|------|------|
//! | `https://host` | `https://host/` | `.` |
//! | `https://host/a/b.json?checksum=ff` | `https://host/` | `a/b.json?checksum=ff` |
//! | `file:///etc/hosts` | `file:///` | `etc/hosts` |
//! | `etc/hosts` (bare) | `file:///` | `etc/hosts` |
//!
//! [`uri_join`] reverses [`uri_split`].

use std::fmt;

use url::Url;

use crate::path::clean;
use crate::{FsError, FsRef, Protocol};

/// Parse `uri` and resolve it with `protocol`.
///
/// A string without `://` is treated as a local path and resolved as
/// `file:///<path>`.
///
/// # Errors
///
/// - [`FsError::InvalidUri`] if the string is not a valid URI
/// - whatever the protocol reports for the parsed URI
///
/// # Example
///
/// ```rust
/// use layerfs::{parse_uri, FileProto};
///
/// let (_fs, path) = parse_uri(&FileProto::default(), "etc/hosts").unwrap();
/// assert_eq!(path, "etc/hosts");
/// ```
pub fn parse_uri<P: Protocol + ?Sized>(protocol: &P, uri: &str) -> Result<(FsRef, String), FsError> {
    let parsed = if uri.contains("://") {
        Url::parse(uri)
    } else {
        Url::parse(&format!("file:///{}", uri.trim_start_matches('/')))
    }
    .map_err(|e| FsError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;
    protocol.file_system(&parsed)
}

/// The relative path addressed by `uri`.
///
/// The leading slash is stripped, an empty path becomes `.`, and the path is
/// cleaned. With `with_query` the query and fragment are appended unchanged.
///
/// ```rust
/// use layerfs::uri::uri_path;
/// use url::Url;
///
/// let uri = Url::parse("https://example.com/a/./b.json?checksum=ff").unwrap();
/// assert_eq!(uri_path(&uri, false), "a/b.json");
/// assert_eq!(uri_path(&uri, true), "a/b.json?checksum=ff");
/// ```
pub fn uri_path(uri: &Url, with_query: bool) -> String {
    let path = uri.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut out = match path {
        "" | "/" => ".".to_string(),
        path => clean(path),
    };
    if with_query {
        if let Some(query) = uri.query() {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = uri.fragment().filter(|f| !f.is_empty()) {
            out.push('#');
            out.push_str(fragment);
        }
    }
    out
}

/// Split `uri` into its base (path, query and fragment removed) and the
/// relative path with query and fragment.
pub fn uri_split(uri: &Url) -> (Url, String) {
    let path = uri_path(uri, true);
    let mut base = uri.clone();
    base.set_path("");
    base.set_query(None);
    base.set_fragment(None);
    (base, path)
}

/// Join a relative path, with its query, onto `base`.
///
/// Fragments in `path` are dropped since they are never sent to a server.
///
/// # Errors
///
/// - [`FsError::InvalidUri`] if `base` cannot carry a path
pub fn uri_join(base: &Url, path: &str) -> Result<Url, FsError> {
    if base.cannot_be_a_base() {
        return Err(FsError::InvalidUri {
            uri: base.to_string(),
            reason: "opaque URI cannot be a base".into(),
        });
    }
    let rel = RelativeUri::parse(path);
    let mut uri = base.clone();
    let base_path = base.path().trim_end_matches('/');
    if rel.path == "." {
        uri.set_path(if base_path.is_empty() { "/" } else { base_path });
    } else {
        uri.set_path(&format!("{base_path}/{}", rel.path));
    }
    uri.set_query(rel.query.as_deref());
    uri.set_fragment(None);
    Ok(uri)
}

/// A relative name split into path, query and fragment.
///
/// Adapters that act on side-channel parameters (checksum) or on the bare
/// path (gzip extension, rename) parse names with this type.
///
/// ```rust
/// use layerfs::RelativeUri;
///
/// let name = RelativeUri::parse("data/file.json.gz?checksum=ff#top");
/// assert_eq!(name.path, "data/file.json.gz");
/// assert_eq!(name.query.as_deref(), Some("checksum=ff"));
/// assert_eq!(name.fragment.as_deref(), Some("top"));
/// assert_eq!(name.to_string(), "data/file.json.gz?checksum=ff#top");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelativeUri {
    /// Path without query or fragment.
    pub path: String,
    /// Raw query after `?`, if present (possibly empty).
    pub query: Option<String>,
    /// Raw fragment after `#`, if present.
    pub fragment: Option<String>,
}

impl RelativeUri {
    /// Split `name` at the first `#` and then at the first `?`.
    pub fn parse(name: &str) -> Self {
        let (rest, fragment) = match name.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (name, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (rest, None),
        };
        Self {
            path: path.to_string(),
            query,
            fragment,
        }
    }

    /// Final path element.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl fmt::Display for RelativeUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}
