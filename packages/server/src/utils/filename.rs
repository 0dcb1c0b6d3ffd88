/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 100;
/// Longest accepted directory path, in characters.
pub const MAX_PATH_LEN: usize = 300;

/// Result of validating a flat filename.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    /// Filename is empty or whitespace-only.
    Empty,
    /// Filename contains path separators (`/` or `\`).
    ContainsPathSeparator,
    /// Filename is `.` or `..`.
    PathTraversal,
    /// Filename contains null bytes.
    NullByte,
    /// Filename contains control characters (CR, LF, etc.).
    ControlCharacter,
    /// Filename is longer than [`MAX_NAME_LEN`].
    TooLong,
}

impl FilenameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::ContainsPathSeparator => "Invalid filename: path separators are not allowed",
            Self::PathTraversal => "Invalid filename: '.' and '..' are not allowed",
            Self::NullByte => "Invalid filename: null bytes are not allowed",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
            Self::TooLong => "Invalid filename: at most 100 characters are allowed",
        }
    }
}

/// Validates a flat filename (no directory components allowed).
pub fn validate_flat_filename(filename: &str) -> Result<&str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }

    if trimmed.contains('\0') {
        return Err(FilenameError::NullByte);
    }

    // Reject ASCII control characters to prevent
    // HTTP header injection (e.g. CRLF in Content-Disposition).
    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(FilenameError::ControlCharacter);
    }

    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }

    if trimmed == "." || trimmed == ".." {
        return Err(FilenameError::PathTraversal);
    }

    Ok(trimmed)
}

/// Validates the display name of a stored file. It becomes the last
/// component of the blob location, so it must be a flat filename.
pub fn validate_display_name(name: &str) -> Result<&str, FilenameError> {
    let name = validate_flat_filename(name)?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(FilenameError::TooLong);
    }
    Ok(name)
}

/// Rejection reasons for a directory path.
#[derive(Debug, PartialEq, Eq)]
pub enum PathError {
    /// Non-empty path that does not end with `/`.
    MissingTrailingSlash,
    /// `//`, or a leading `/`.
    EmptySegment,
    /// A segment contains `.`.
    Dot,
    /// A segment contains `\`.
    Backslash,
    /// NUL or another control character.
    ControlCharacter,
    TooLong,
}

impl PathError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingTrailingSlash => "Path must be empty or end with '/'",
            Self::EmptySegment => "Path must not contain empty segments",
            Self::Dot => "Path segments must not contain '.'",
            Self::Backslash => "Path segments must not contain '\\'",
            Self::ControlCharacter => "Path must not contain control characters",
            Self::TooLong => "Path exceeds maximum length of 300 characters",
        }
    }
}

/// Validates a directory path of the form `""` (root) or `seg/seg/.../`.
///
/// Every segment is at least one character long and contains neither `.`
/// nor `\`. Returns the path unchanged on success.
pub fn validate_directory_path(path: &str) -> Result<&str, PathError> {
    if path.is_empty() {
        return Ok(path);
    }

    if path.chars().count() > MAX_PATH_LEN {
        return Err(PathError::TooLong);
    }

    let Some(body) = path.strip_suffix('/') else {
        return Err(PathError::MissingTrailingSlash);
    };

    for segment in body.split('/') {
        if segment.is_empty() {
            return Err(PathError::EmptySegment);
        }
        if segment.contains('.') {
            return Err(PathError::Dot);
        }
        if segment.contains('\\') {
            return Err(PathError::Backslash);
        }
        if segment.chars().any(char::is_control) {
            return Err(PathError::ControlCharacter);
        }
    }

    Ok(path)
}
