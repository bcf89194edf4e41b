//! Topology builders and shortest-path seeding of static FIBs.

use crate::fib::StaticRoute;
use log::info;
use rust_ccnsim_common::ndn::Name;
use rust_ccnsim_common::types::{FaceId, NodeId, NodeRole};
use rust_ccnsim_common::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A validated link graph with a role per node.
#[derive(Debug, Clone)]
pub struct Topology {
    roles: Vec<NodeRole>,
    links: Vec<(NodeId, NodeId)>,
    prefixes: BTreeMap<NodeId, Name>,
    /// Neighbors per node, ascending.
    adjacency: Vec<Vec<NodeId>>,
}

impl Topology {
    /// Builds a topology from an explicit description. Nodes that are neither
    /// producers nor users are routers.
    pub fn explicit(
        node_count: usize,
        links: &[(NodeId, NodeId)],
        producers: &[(NodeId, Name)],
        users: &[NodeId],
    ) -> Result<Self> {
        let mut roles = vec![NodeRole::Router; node_count];
        let mut prefixes = BTreeMap::new();

        for (id, prefix) in producers {
            let slot = roles
                .get_mut(id.index())
                .ok_or_else(|| Error::Topology(format!("producer {} does not exist", id)))?;
            if prefix.is_empty() {
                return Err(Error::Topology(format!("producer {} has an empty prefix", id)));
            }
            *slot = NodeRole::Producer;
            prefixes.insert(*id, prefix.clone());
        }
        for id in users {
            let slot = roles
                .get_mut(id.index())
                .ok_or_else(|| Error::Topology(format!("user {} does not exist", id)))?;
            if *slot == NodeRole::Producer {
                return Err(Error::Topology(format!("{} is both producer and user", id)));
            }
            *slot = NodeRole::User;
        }

        let mut adjacency = vec![Vec::new(); node_count];
        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(links.len());
        for &(a, b) in links {
            if a == b {
                return Err(Error::Topology(format!("self-loop on {}", a)));
            }
            if a.index() >= node_count || b.index() >= node_count {
                return Err(Error::Topology(format!("link {}-{} names an unknown node", a, b)));
            }
            let key = if a < b { (a, b) } else { (b, a) };
            if !seen.insert(key) {
                continue;
            }
            unique.push(key);
            adjacency[a.index()].push(b);
            adjacency[b.index()].push(a);
        }
        for neighbors in adjacency.iter_mut() {
            neighbors.sort();
        }

        Ok(Self {
            roles,
            links: unique,
            prefixes,
            adjacency,
        })
    }

    /// A complete `k`-ary tree of height `h`. Node 0 is the producer of
    /// `prefix` and the leaves are users.
    pub fn kary_tree(k: usize, h: u32, prefix: &Name) -> Result<Self> {
        let total = tree_size(k, h)?;
        let leaves = k.pow(h - 1);
        let links = tree_links(k, total);
        let users: Vec<NodeId> = (total - leaves..total).map(NodeId::from).collect();

        let topology = Self::explicit(total, &links, &[(NodeId(0), prefix.clone())], &users)?;
        info!(
            "Built {}-ary tree of height {}: {} nodes, {} users",
            k, h, total, leaves
        );
        Ok(topology)
    }

    /// A `k`-ary router tree of height `h` rooted at the producer, with `m`
    /// users hanging off every leaf router.
    pub fn heavy_edge(k: usize, h: u32, m: usize, prefix: &Name) -> Result<Self> {
        if h < 2 {
            return Err(Error::Config("heavy-edge tree needs height of at least 2".into()));
        }
        if m == 0 {
            return Err(Error::Config("heavy-edge tree needs at least one user per leaf".into()));
        }
        let routers = tree_size(k, h)?;
        let leaves = k.pow(h - 1);
        let mut links = tree_links(k, routers);
        let mut users = Vec::with_capacity(leaves * m);

        for leaf in routers - leaves..routers {
            for _ in 0..m {
                let user = NodeId::from(routers + users.len());
                links.push((NodeId::from(leaf), user));
                users.push(user);
            }
        }

        let total = routers + users.len();
        let topology = Self::explicit(total, &links, &[(NodeId(0), prefix.clone())], &users)?;
        info!(
            "Built heavy-edge tree ({}-ary, height {}, {} users per leaf): {} nodes",
            k, h, m, total
        );
        Ok(topology)
    }

    pub fn node_count(&self) -> usize {
        self.roles.len()
    }

    pub fn roles(&self) -> &[NodeRole] {
        &self.roles
    }

    pub fn role(&self, id: NodeId) -> Option<NodeRole> {
        self.roles.get(id.index()).copied()
    }

    /// Deduplicated links, lower id first.
    pub fn links(&self) -> &[(NodeId, NodeId)] {
        &self.links
    }

    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.adjacency.get(id.index()).map_or(&[], |n| n.as_slice())
    }

    pub fn prefixes(&self) -> &BTreeMap<NodeId, Name> {
        &self.prefixes
    }

    pub fn nodes_with_role(&self, role: NodeRole) -> Vec<NodeId> {
        self.roles
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == role)
            .map(|(i, _)| NodeId::from(i))
            .collect()
    }

    /// First hop and hop distance from `source` to every node, by BFS with
    /// neighbors visited in ascending id. Users only ever originate paths.
    pub fn shortest_paths(&self, source: NodeId) -> Vec<Option<(FaceId, u32)>> {
        let mut paths = vec![None; self.node_count()];
        if source.index() >= self.node_count() {
            return paths;
        }

        let mut visited = vec![false; self.node_count()];
        visited[source.index()] = true;
        let mut queue = VecDeque::new();
        queue.push_back(source);

        while let Some(current) = queue.pop_front() {
            if current != source && self.roles[current.index()] == NodeRole::User {
                continue;
            }
            let (first, dist) = match paths[current.index()] {
                Some((face, dist)) => (Some(face), dist),
                None => (None, 0),
            };
            for &next in self.neighbors(current) {
                if visited[next.index()] {
                    continue;
                }
                visited[next.index()] = true;
                paths[next.index()] = Some((first.unwrap_or(next), dist + 1));
                queue.push_back(next);
            }
        }
        paths
    }

    /// Static FIB seed for `node`: one route per reachable producer prefix.
    pub fn static_routes(&self, node: NodeId) -> Vec<(Name, StaticRoute)> {
        if self.role(node) == Some(NodeRole::Producer) {
            return Vec::new();
        }
        let paths = self.shortest_paths(node);
        self.prefixes
            .iter()
            .filter_map(|(producer, prefix)| {
                let (face, dist) = paths.get(producer.index()).copied().flatten()?;
                Some((
                    prefix.clone(),
                    StaticRoute {
                        face,
                        metric: dist as f32,
                    },
                ))
            })
            .collect()
    }
}

/// Node count of a complete `k`-ary tree of height `h`.
fn tree_size(k: usize, h: u32) -> Result<usize> {
    if k < 2 {
        return Err(Error::Config(format!("tree arity must be at least 2, got {}", k)));
    }
    if h < 2 {
        return Err(Error::Config(format!("tree height must be at least 2, got {}", h)));
    }
    k.checked_pow(h)
        .map(|n| (n - 1) / (k - 1))
        .ok_or_else(|| Error::Config(format!("{}-ary tree of height {} is too large", k, h)))
}

fn tree_links(k: usize, total: usize) -> Vec<(NodeId, NodeId)> {
    (1..total)
        .map(|child| (NodeId::from((child - 1) / k), NodeId::from(child)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> Name {
        Name::from_string("p")
    }

    #[test]
    fn test_binary_tree_shape() {
        let topo = Topology::kary_tree(2, 3, &p()).unwrap();
        assert_eq!(topo.node_count(), 7);
        assert_eq!(topo.links().len(), 6);
        assert_eq!(topo.role(NodeId(0)), Some(NodeRole::Producer));
        assert_eq!(topo.nodes_with_role(NodeRole::Router), vec![NodeId(1), NodeId(2)]);
        assert_eq!(topo.nodes_with_role(NodeRole::User).len(), 4);
        assert_eq!(topo.neighbors(NodeId(1)), &[NodeId(0), NodeId(3), NodeId(4)]);
    }

    #[test]
    fn test_heavy_edge_shape() {
        let topo = Topology::heavy_edge(2, 2, 3, &p()).unwrap();
        // producer, two leaf routers, three users each
        assert_eq!(topo.node_count(), 9);
        assert_eq!(topo.nodes_with_role(NodeRole::Router), vec![NodeId(1), NodeId(2)]);
        assert_eq!(topo.neighbors(NodeId(2)), &[NodeId(0), NodeId(6), NodeId(7), NodeId(8)]);
    }

    #[test]
    fn test_invalid_trees() {
        assert!(matches!(Topology::kary_tree(1, 3, &p()), Err(Error::Config(_))));
        assert!(matches!(Topology::kary_tree(2, 1, &p()), Err(Error::Config(_))));
        assert!(matches!(Topology::heavy_edge(2, 3, 0, &p()), Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_validation() {
        let producers = [(NodeId(0), p())];
        assert!(matches!(
            Topology::explicit(2, &[(NodeId(1), NodeId(1))], &producers, &[]),
            Err(Error::Topology(_))
        ));
        assert!(matches!(
            Topology::explicit(2, &[(NodeId(0), NodeId(5))], &producers, &[]),
            Err(Error::Topology(_))
        ));
        assert!(matches!(
            Topology::explicit(2, &[(NodeId(0), NodeId(1))], &producers, &[NodeId(0)]),
            Err(Error::Topology(_))
        ));
        assert!(matches!(
            Topology::explicit(2, &[(NodeId(0), NodeId(1))], &[(NodeId(0), Name::new())], &[]),
            Err(Error::Topology(_))
        ));
    }

    #[test]
    fn test_duplicate_links_collapse() {
        let links = [(NodeId(0), NodeId(1)), (NodeId(1), NodeId(0))];
        let topo = Topology::explicit(2, &links, &[(NodeId(0), p())], &[]).unwrap();
        assert_eq!(topo.links().len(), 1);
        assert_eq!(topo.neighbors(NodeId(0)), &[NodeId(1)]);
    }

    #[test]
    fn test_links_keep_first_seen_order() {
        let links = [
            (NodeId(2), NodeId(1)),
            (NodeId(0), NodeId(1)),
            (NodeId(1), NodeId(2)),
            (NodeId(3), NodeId(2)),
            (NodeId(1), NodeId(0)),
        ];
        let topo = Topology::explicit(4, &links, &[(NodeId(0), p())], &[]).unwrap();
        assert_eq!(
            topo.links(),
            &[
                (NodeId(1), NodeId(2)),
                (NodeId(0), NodeId(1)),
                (NodeId(2), NodeId(3)),
            ]
        );
        assert_eq!(topo.neighbors(NodeId(1)), &[NodeId(0), NodeId(2)]);
    }

    #[test]
    fn test_static_routes_from_leaf() {
        let topo = Topology::kary_tree(2, 3, &p()).unwrap();
        let routes = topo.static_routes(NodeId(5));
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].0, p());
        assert_eq!(routes[0].1.face, NodeId(2));
        assert_eq!(routes[0].1.metric, 2.0);
        assert!(topo.static_routes(NodeId(0)).is_empty());
    }

    #[test]
    fn test_bfs_prefers_lower_neighbor() {
        // square 0-1-3, 0-2-3
        let links = [
            (NodeId(0), NodeId(1)),
            (NodeId(0), NodeId(2)),
            (NodeId(1), NodeId(3)),
            (NodeId(2), NodeId(3)),
        ];
        let topo = Topology::explicit(4, &links, &[(NodeId(0), p())], &[]).unwrap();
        let routes = topo.static_routes(NodeId(3));
        assert_eq!(routes[0].1.face, NodeId(1));
        assert_eq!(routes[0].1.metric, 2.0);
    }

    #[test]
    fn test_paths_do_not_transit_users() {
        // 0 - 1(user) - 2
        let links = [(NodeId(0), NodeId(1)), (NodeId(1), NodeId(2))];
        let topo = Topology::explicit(3, &links, &[(NodeId(0), p())], &[NodeId(1)]).unwrap();
        assert!(topo.static_routes(NodeId(2)).is_empty());
        assert_eq!(topo.static_routes(NodeId(1)).len(), 1);
    }
}
