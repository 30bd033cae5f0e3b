use std::fmt::{Display, Formatter};

use crate::commons::storage::{Scope, SegmentBuf};

/// Represents the key used in the key-value store. Consists of a `scope` of
/// type [`Scope`] and a `name` of type [`SegmentBuf`].
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Key {
    scope: Scope,
    name: SegmentBuf,
}

impl Key {
    /// Create a `Key` from a [`Scope`] and a name.
    pub fn new_scoped(scope: Scope, name: impl Into<SegmentBuf>) -> Key {
        Key {
            name: name.into(),
            scope,
        }
    }

    /// Create a `Key` in the global scope.
    pub fn new_global(name: impl Into<SegmentBuf>) -> Key {
        Key::new_scoped(Scope::global(), name)
    }

    /// Returns the name of a `Key` (without its scope).
    pub fn name(&self) -> &SegmentBuf {
        &self.name
    }

    /// Returns the scope of a `Key` (without its name).
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.scope.is_global() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}{}", self.scope, Scope::SEPARATOR, self.name)
        }
    }
}
