//! Versioned cache container names.
//!
//! Every container is `{namespace}-{logical}-{version}`, except the generic
//! precache which is `{namespace}-{version}`. Activation uses the prefix to
//! tell our containers from anyone else's, and the full expected set to tell
//! current from stale.

/// Container names for one namespace and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    namespace: String,
    version: String,
}

impl CacheNames {
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), version: version.into() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn logical(&self, logical: &str) -> String {
        format!("{}-{}-{}", self.namespace, logical, self.version)
    }

    /// Generic precache populated from the build manifest.
    pub fn precache(&self) -> String {
        format!("{}-{}", self.namespace, self.version)
    }

    pub fn shell(&self) -> String {
        self.logical("shell")
    }

    pub fn assets(&self) -> String {
        self.logical("assets")
    }

    pub fn images(&self) -> String {
        self.logical("images")
    }

    pub fn user_images(&self) -> String {
        self.logical("user-images")
    }

    /// Every container the current version uses.
    pub fn expected(&self) -> Vec<String> {
        vec![self.shell(), self.precache(), self.assets(), self.images(), self.user_images()]
    }

    /// Whether `name` belongs to this application's namespace, any version.
    pub fn owns(&self, name: &str) -> bool {
        name.strip_prefix(self.namespace.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Whether `name` is ours but not part of the current version.
    pub fn is_stale(&self, name: &str) -> bool {
        self.owns(name) && !self.expected().iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let names = CacheNames::new("pictoh", "v1");
        assert_eq!(names.precache(), "pictoh-v1");
        assert_eq!(names.shell(), "pictoh-shell-v1");
        assert_eq!(names.assets(), "pictoh-assets-v1");
        assert_eq!(names.images(), "pictoh-images-v1");
        assert_eq!(names.user_images(), "pictoh-user-images-v1");
        assert_eq!(names.expected().len(), 5);
    }

    #[test]
    fn test_owns() {
        let names = CacheNames::new("pictoh", "v2");
        assert!(names.owns("pictoh-shell-v1"));
        assert!(names.owns("pictoh-v1"));
        assert!(!names.owns("pictohx-shell-v1"));
        assert!(!names.owns("workbox-precache-v2"));
        assert!(!names.owns("pictoh"));
    }

    #[test]
    fn test_is_stale() {
        let names = CacheNames::new("pictoh", "v2");
        assert!(names.is_stale("pictoh-shell-v1"));
        assert!(names.is_stale("pictoh-images-v1"));
        assert!(!names.is_stale("pictoh-images-v2"));
        assert!(!names.is_stale("pictoh-v2"));
        assert!(!names.is_stale("third-party-v1"));
    }
}
