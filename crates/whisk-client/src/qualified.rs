/// Namespace used when a qualified name does not carry one.
pub const DEFAULT_NAMESPACE: &str = "_";

const DELIMITER: char = '/';

/// A `[/namespace/]package/name` identifier split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub namespace: String,
    pub name: String,
}

impl QualifiedName {
    /// Split a qualified name.
    ///
    /// - 3+ segments: the second segment is the namespace, the rest the name
    /// - 2 segments: `/action` names `action`, `package/action` stays whole;
    ///   both use the default namespace
    /// - 1 segment: the whole string is the name
    pub fn parse(qualified: &str) -> Self {
        let segments: Vec<&str> = qualified.split(DELIMITER).collect();

        match segments.len() {
            n if n > 2 => Self {
                namespace: segments[1].to_string(),
                name: segments[2..].join("/"),
            },
            2 => {
                let name = if qualified.starts_with(DELIMITER) {
                    segments[1].to_string()
                } else {
                    qualified.to_string()
                };
                Self {
                    namespace: DEFAULT_NAMESPACE.into(),
                    name,
                }
            }
            _ => Self {
                namespace: DEFAULT_NAMESPACE.into(),
                name: qualified.to_string(),
            },
        }
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.namespace, self.name)
    }
}
