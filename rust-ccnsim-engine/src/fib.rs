//! Static FIB: one route per top-level prefix, seeded from shortest paths.

use rust_ccnsim_common::ndn::Name;
use rust_ccnsim_common::types::FaceId;
use serde::Serialize;
use std::collections::HashMap;

/// Next hop toward the producer of a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StaticRoute {
    pub face: FaceId,
    /// Hop distance to the producer.
    pub metric: f32,
}

#[derive(Debug, Clone, Default)]
pub struct StaticFib {
    routes: HashMap<Name, StaticRoute>,
}

impl StaticFib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the route for `prefix`.
    pub fn insert(&mut self, prefix: Name, face: FaceId, metric: f32) {
        self.routes.insert(prefix, StaticRoute { face, metric });
    }

    pub fn query(&self, prefix: &Name) -> Option<StaticRoute> {
        self.routes.get(prefix).copied()
    }

    /// Route for the top-level prefix of `name`.
    pub fn query_name(&self, name: &Name) -> Option<StaticRoute> {
        self.query(&name.top_level()?)
    }

    pub fn remove(&mut self, prefix: &Name) -> Option<StaticRoute> {
        self.routes.remove(prefix)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes sorted by prefix.
    pub fn routes(&self) -> Vec<(Name, StaticRoute)> {
        let mut routes: Vec<_> = self.routes.iter().map(|(n, r)| (n.clone(), *r)).collect();
        routes.sort_by(|a, b| a.0.cmp(&b.0));
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ccnsim_common::types::NodeId;

    #[test]
    fn test_insert_replaces() {
        let mut fib = StaticFib::new();
        let prefix = Name::from_string("p");

        assert!(fib.query(&prefix).is_none());

        fib.insert(prefix.clone(), NodeId(1), 3.0);
        fib.insert(prefix.clone(), NodeId(2), 5.0);
        assert_eq!(fib.len(), 1);
        assert_eq!(
            fib.query(&prefix),
            Some(StaticRoute {
                face: NodeId(2),
                metric: 5.0
            })
        );
    }

    #[test]
    fn test_query_name_uses_top_level() {
        let mut fib = StaticFib::new();
        fib.insert(Name::from_string("p"), NodeId(1), 2.0);

        assert_eq!(fib.query_name(&Name::from_string("p/x/3")).map(|r| r.face), Some(NodeId(1)));
        assert!(fib.query_name(&Name::from_string("q/x/3")).is_none());
        assert!(fib.query_name(&Name::new()).is_none());
    }

    #[test]
    fn test_remove() {
        let mut fib = StaticFib::new();
        fib.insert(Name::from_string("p"), NodeId(1), 2.0);
        assert!(fib.remove(&Name::from_string("p")).is_some());
        assert!(fib.is_empty());
    }
}
