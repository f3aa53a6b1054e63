use kube::ResourceExt;
use std::fmt;

/// Identifies a namespaced resource by its namespace and name.
///
/// Ordering is by namespace, then name, so that collections keyed by
/// `ResourceId` iterate deterministically.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns the identity of a resource, or `None` if the resource's metadata lacks a name or
    /// a namespace.
    pub fn of<T: ResourceExt>(resource: &T) -> Option<Self> {
        let namespace = resource.namespace()?;
        let name = resource.meta().name.clone()?;
        Some(Self { namespace, name })
    }

    /// Resolves a reference that may omit its namespace, defaulting to `namespace`.
    pub fn resolve(namespace: &str, override_ns: Option<&str>, name: &str) -> Self {
        Self::new(override_ns.unwrap_or(namespace), name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
