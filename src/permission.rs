//! Permission-string checks for UI gating.
//!
//! Permission strings are colon-delimited (`module:action:scope`). A held list
//! consisting of exactly [`ALL_PERMISSIONS`] grants everything.

/// Wildcard permission granting every check.
pub const ALL_PERMISSIONS: &str = "*:*:*";

/// Something that can be checked against a held permission list.
///
/// A single string is granted if it is held; a collection is granted only if
/// every element is held.
pub trait PermissionQuery {
    /// `true` for an empty string or an empty collection.
    fn is_empty_query(&self) -> bool;

    fn is_granted_by<H: AsRef<str>>(&self, held: &[H]) -> bool;
}

impl PermissionQuery for str {
    fn is_empty_query(&self) -> bool {
        self.is_empty()
    }

    fn is_granted_by<H: AsRef<str>>(&self, held: &[H]) -> bool {
        held.iter().any(|h| h.as_ref() == self)
    }
}

impl PermissionQuery for String {
    fn is_empty_query(&self) -> bool {
        self.as_str().is_empty_query()
    }

    fn is_granted_by<H: AsRef<str>>(&self, held: &[H]) -> bool {
        self.as_str().is_granted_by(held)
    }
}

impl<S: AsRef<str>> PermissionQuery for [S] {
    fn is_empty_query(&self) -> bool {
        self.is_empty()
    }

    fn is_granted_by<H: AsRef<str>>(&self, held: &[H]) -> bool {
        self.iter().all(|p| p.as_ref().is_granted_by(held))
    }
}

impl<S: AsRef<str>> PermissionQuery for Vec<S> {
    fn is_empty_query(&self) -> bool {
        self.as_slice().is_empty_query()
    }

    fn is_granted_by<H: AsRef<str>>(&self, held: &[H]) -> bool {
        self.as_slice().is_granted_by(held)
    }
}

impl<S: AsRef<str>, const N: usize> PermissionQuery for [S; N] {
    fn is_empty_query(&self) -> bool {
        self.as_slice().is_empty_query()
    }

    fn is_granted_by<H: AsRef<str>>(&self, held: &[H]) -> bool {
        self.as_slice().is_granted_by(held)
    }
}

/// Checks `required` against the `held` permission list.
///
/// Returns `false` for an empty query or an empty held list. A held list of
/// exactly `["*:*:*"]` grants any non-empty query.
#[must_use]
pub fn has_permission<Q, H>(required: &Q, held: &[H]) -> bool
where
    Q: PermissionQuery + ?Sized,
    H: AsRef<str>,
{
    if required.is_empty_query() || held.is_empty() {
        return false;
    }
    if held.len() == 1 && held[0].as_ref() == ALL_PERMISSIONS {
        return true;
    }
    required.is_granted_by(held)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    #[test]
    fn wildcard_grants_everything() {
        let held = ["*:*:*"];
        assert!(has_permission("any:thing", &held));
        assert!(has_permission(&["a", "b"], &held));
        assert!(has_permission(&vec!["x:y:z".to_string()], &held));
    }

    #[test]
    fn wildcard_does_not_grant_empty_query() {
        let held = ["*:*:*"];
        assert!(!has_permission("", &held));
        assert!(!has_permission(&NONE, &held));
    }

    #[test]
    fn wildcard_among_others_is_not_a_wildcard() {
        let held = ["*:*:*", "a:b:c"];
        assert!(!has_permission("x:y:z", &held));
        assert!(has_permission("a:b:c", &held));
    }

    #[test]
    fn empty_held_denies() {
        assert!(!has_permission("a:b:c", &NONE));
        let held: Vec<String> = Vec::new();
        assert!(!has_permission(&["a"], &held));
    }

    #[test]
    fn single_membership() {
        assert!(has_permission("a:b:c", &["a:b:c"]));
        assert!(!has_permission("a:b:d", &["a:b:c"]));
        assert!(has_permission(&"a:b:c".to_string(), &["a:b:c"]));
    }

    #[test]
    fn collection_is_all_of() {
        assert!(has_permission(&["a", "b"], &["a", "b", "c"]));
        assert!(!has_permission(&["a", "x"], &["a", "b"]));
    }

    #[test]
    fn repeated_calls_are_stable() {
        let held = vec!["system:user:list".to_string()];
        for _ in 0..3 {
            assert!(has_permission("system:user:list", &held));
            assert!(!has_permission(&["system:user:list", "system:user:add"], &held));
        }
    }
}
