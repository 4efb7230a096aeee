//! Replica planning for `count`-expanded resources.

/// Marker the backend substitutes with the replica index.
pub const COUNT_INDEX: &str = "${count.index}";

/// The replicas one resource expands into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaPlan {
    resource: String,
    count: usize,
}

impl ReplicaPlan {
    /// Plan `count` replicas of `resource`. Counts below one mean one.
    pub fn new(resource: impl Into<String>, count: usize) -> Self {
        Self {
            resource: resource.into(),
            count: count.max(1),
        }
    }

    /// Resource name
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Number of replicas
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the resource is expanded by the backend's `count`.
    pub fn is_replicated(&self) -> bool {
        self.count > 1
    }

    /// Issuance labels in index order: `web` for a single replica,
    /// `web.0`, `web.1`, ... otherwise.
    pub fn labels(&self) -> Vec<String> {
        if !self.is_replicated() {
            return vec![self.resource.clone()];
        }
        (0..self.count)
            .map(|i| format!("{}.{}", self.resource, i))
            .collect()
    }

    /// Name with a per-replica marker, if one has to be added.
    ///
    /// Only the declared name is inspected; a name that already carries
    /// `${count.index}` is left as it is.
    pub fn unique_name(&self, declared: &str) -> Option<String> {
        if self.is_replicated() && !declared.contains(COUNT_INDEX) {
            Some(format!("{declared}-{COUNT_INDEX}"))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_replica() {
        let plan = ReplicaPlan::new("web", 1);
        assert!(!plan.is_replicated());
        assert_eq!(plan.labels(), vec!["web"]);
        assert_eq!(plan.unique_name("web"), None);
    }

    #[test]
    fn test_zero_is_one() {
        assert_eq!(ReplicaPlan::new("web", 0).count(), 1);
    }

    #[test]
    fn test_multiple_replicas() {
        let plan = ReplicaPlan::new("web", 3);
        assert_eq!(plan.labels(), vec!["web.0", "web.1", "web.2"]);
        assert_eq!(plan.unique_name("web").as_deref(), Some("web-${count.index}"));
    }

    #[test]
    fn test_existing_marker_kept() {
        let plan = ReplicaPlan::new("web", 2);
        assert_eq!(plan.unique_name("web-${count.index}-eu"), None);
    }
}
