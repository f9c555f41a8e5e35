use std::fmt;

use serde::{Deserialize, Serialize};

/// Metaclass descriptor: the (name, namespace URI) pair of an object's type.
///
/// A `ClassBean` never holds a live schema reference. It is resolved back to
/// a class definition through a schema registry when needed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassBean {
    name: String,
    uri: String,
}

impl ClassBean {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl fmt::Display for ClassBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.uri, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_uses_both_parts() {
        let a = ClassBean::new("Node", "http://a");
        assert_eq!(a, ClassBean::new("Node", "http://a"));
        assert_ne!(a, ClassBean::new("Node", "http://b"));
        assert_ne!(a, ClassBean::new("Leaf", "http://a"));
    }

    #[test]
    fn display_is_qualified() {
        assert_eq!(ClassBean::new("Node", "urn:tree").to_string(), "urn:tree#Node");
    }
}
