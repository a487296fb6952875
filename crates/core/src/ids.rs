//! Client-generated entity identifiers.
//!
//! Ids only need to be unique within one collection of one user's document,
//! so a prefixed v4 UUID is more than enough.

use uuid::Uuid;

/// Generate a collection-unique id with a readable prefix, e.g. `exp_…`.
pub fn uid(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::uid;

    #[test]
    fn uid_carries_prefix_and_is_unique() {
        let a = uid("exp");
        let b = uid("exp");
        assert!(a.starts_with("exp_"));
        assert_ne!(a, b);
    }
}
