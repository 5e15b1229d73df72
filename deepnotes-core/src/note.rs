//! Note identifiers.

/// Identifies a saved note: the Unix time, in milliseconds, at which it was first saved.
///
/// Formats as the bare decimal number, which is also how it appears in file names.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NoteId(i64);
impl NoteId {
    /// An identifier for a note being saved for the first time.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }
    /// When the note was created, if representable.
    #[must_use]
    pub fn created(self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.0)
    }
    /// Parse the identifier out of a file name such as `1316426592000.jpg`.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
        stem.parse().ok()
    }
}
impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::str::FromStr for NoteId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}
