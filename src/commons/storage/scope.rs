use std::fmt::{Display, Formatter};

use crate::commons::storage::SegmentBuf;

/// Used to scope a [`Key`]. Consists of a vector of zero or more
/// [`SegmentBuf`]s.
///
/// Scopes are also the unit of locking in the key-value store: operations
/// executed for different scopes do not block each other.
///
/// [`Key`]: crate::commons::storage::Key
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Scope {
    segments: Vec<SegmentBuf>,
}

impl Scope {
    /// Character used to split on when parsing a Scope from a string.
    pub const SEPARATOR: char = '/';

    /// Create a `Scope` from a single segment.
    pub fn from_segment(segment: impl Into<SegmentBuf>) -> Self {
        Scope::new(vec![segment.into()])
    }

    /// Create an empty `Scope`.
    pub fn global() -> Self {
        Scope::new(Vec::new())
    }

    /// Create a `Scope` from a vector of [`SegmentBuf`]s.
    pub fn new(segments: Vec<SegmentBuf>) -> Self {
        Scope { segments }
    }

    pub fn segments(&self) -> &[SegmentBuf] {
        &self.segments
    }

    /// Returns whether this is the global (empty) scope.
    pub fn is_global(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns whether the encapsulated vector starts with a certain prefix.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Returns a vector of all non-global prefixes of the scope.
    pub fn sub_scopes(&self) -> Vec<Scope> {
        self.segments
            .iter()
            .scan(Scope::default(), |state, segment| {
                state.segments.push(segment.clone());
                Some(state.clone())
            })
            .collect()
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "{}", Self::SEPARATOR)?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Scope {
    type Item = &'a SegmentBuf;
    type IntoIter = std::slice::Iter<'a, SegmentBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
