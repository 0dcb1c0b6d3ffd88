use std::fmt;
use std::path::{Path, PathBuf};

use super::error::StorageError;

/// Physical reference of a stored file, relative to the blob root.
///
/// Always `namespace/segment/.../filename`: the owner's namespace first, then
/// the directory segments of the logical path, then the filename. Every
/// component is non-empty and free of separators and `.`/`..`, so a location
/// can never escape its namespace.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BlobLocation {
    relative: String,
}

impl BlobLocation {
    /// Derive the location for `filename` under the directory path `dir`
    /// (`""` for the namespace root, otherwise `a/b/` form).
    pub fn new(namespace: &str, dir: &str, filename: &str) -> Result<Self, StorageError> {
        let mut components = Vec::with_capacity(2 + dir.matches('/').count());
        components.push(check_namespace(namespace)?);
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            components.push(check_component(segment)?);
        }
        components.push(check_component(filename)?);

        Ok(Self {
            relative: components.join("/"),
        })
    }

    /// Parse a physical reference previously produced by [`BlobLocation::as_str`].
    pub fn parse(relative: &str) -> Result<Self, StorageError> {
        let components = relative
            .split('/')
            .map(check_component)
            .collect::<Result<Vec<_>, _>>()?;
        if components.len() < 2 {
            return Err(StorageError::InvalidLocation(format!(
                "'{relative}' has no namespace"
            )));
        }
        check_namespace(components[0])?;
        Ok(Self {
            relative: relative.to_string(),
        })
    }

    /// The same directory with a different filename.
    pub fn with_filename(&self, filename: &str) -> Result<Self, StorageError> {
        let name = check_component(filename)?;
        let dir = self.dir();
        Ok(Self {
            relative: format!("{dir}/{name}"),
        })
    }

    pub fn namespace(&self) -> &str {
        self.relative
            .split_once('/')
            .map(|(ns, _)| ns)
            .unwrap_or(&self.relative)
    }

    pub fn filename(&self) -> &str {
        self.relative
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.relative)
    }

    fn dir(&self) -> &str {
        self.relative
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.relative
    }

    /// Absolute filesystem path below `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.relative
            .split('/')
            .fold(root.to_path_buf(), |path, component| path.join(component))
    }
}

/// Dot-prefixed top-level directories are reserved for the store itself.
fn check_namespace(namespace: &str) -> Result<&str, StorageError> {
    let namespace = check_component(namespace)?;
    if namespace.starts_with('.') {
        return Err(StorageError::InvalidLocation(format!(
            "namespace '{namespace}' is reserved"
        )));
    }
    Ok(namespace)
}

fn check_component(component: &str) -> Result<&str, StorageError> {
    if component.is_empty() || component == "." || component == ".." {
        return Err(StorageError::InvalidLocation(format!(
            "invalid path component '{component}'"
        )));
    }
    if component.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidLocation(format!(
            "path component '{}' contains a separator or NUL",
            component.escape_debug()
        )));
    }
    Ok(component)
}

impl fmt::Debug for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobLocation({})", self.relative)
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative)
    }
}
