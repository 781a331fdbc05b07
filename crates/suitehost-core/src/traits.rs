//! Collaborator traits consumed by the host components.

use crate::id::ZStringRef;

/// Resolves opaque string references to text.
///
/// Implemented by the string-table suite; the error channel uses it to
/// decode messages a plugin reports by reference.
pub trait StringResolver {
    /// Text behind `reference`, or `None` if the reference is unknown.
    fn resolve(&self, reference: ZStringRef) -> Option<String>;
}

/// A resolver that knows no strings. Used when the string table has not
/// been built yet in this session.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStrings;

impl StringResolver for NoStrings {
    fn resolve(&self, _reference: ZStringRef) -> Option<String> {
        None
    }
}
