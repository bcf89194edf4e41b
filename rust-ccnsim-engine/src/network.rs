//! Node registry.
//!
//! The network is an arena of nodes addressed by [`NodeId`]. Every cross-node
//! effect a node produces, whether a message hand-off or a remote dynamic FIB
//! cleanup, comes back as an [`Outbox`] and is applied here, so a node never
//! holds a reference to another node.

use crate::context::SimContext;
use crate::cs::ContentStoreStat;
use crate::node::{Node, NodeOptions};
use crate::outbox::{Envelope, Outbox};
use crate::topology::Topology;
use log::{info, trace, warn};
use rust_ccnsim_common::ndn::{DataMessage, InterestMessage, Name};
use rust_ccnsim_common::types::{NodeId, NodeRole, PacketId};
use rust_ccnsim_common::{Error, Result};
use std::collections::VecDeque;

#[derive(Default)]
pub struct Network {
    nodes: Vec<Node>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every node of `topology`, seeds static FIBs from shortest
    /// paths and records producer prefixes in `ctx`. Only routers get the
    /// configured content store capacity.
    pub fn build(topology: &Topology, options: NodeOptions, ctx: &mut SimContext) -> Result<Self> {
        let mut network = Self::new();
        for (index, &role) in topology.roles().iter().enumerate() {
            let id = NodeId::from(index);
            let node_options = NodeOptions {
                capacity: if role == NodeRole::Router { options.capacity } else { 0 },
                ..options
            };
            network.add_node(role, topology.neighbors(id).to_vec(), node_options);
        }

        let mut seeded = 0;
        for node in network.nodes.iter_mut() {
            for (prefix, route) in topology.static_routes(node.id()) {
                node.insert_static_route(prefix, route.face, route.metric);
                seeded += 1;
            }
        }
        for (producer, prefix) in topology.prefixes() {
            ctx.set_producer_prefix(*producer, prefix.clone());
        }

        info!(
            "Registered {} nodes, seeded {} static routes",
            network.len(),
            seeded
        );
        Ok(network)
    }

    /// Appends a node and returns its id.
    pub fn add_node(&mut self, role: NodeRole, links: Vec<NodeId>, options: NodeOptions) -> NodeId {
        let id = NodeId::from(self.nodes.len());
        self.nodes.push(Node::new(id, role, links, options));
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(Error::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.index()).ok_or(Error::UnknownNode(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId::from).collect()
    }

    pub fn ids_with_role(&self, role: NodeRole) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.role() == role)
            .map(|n| n.id())
            .collect()
    }

    /* ---------------------------------------------------------------- *
     * Per-node entry points
     * ---------------------------------------------------------------- */

    pub fn pend_interest(&mut self, id: NodeId, interest: InterestMessage) -> Result<()> {
        self.node_mut(id)?.pend_interest(interest);
        Ok(())
    }

    pub fn pend_data(&mut self, id: NodeId, data: DataMessage) -> Result<()> {
        self.node_mut(id)?.pend_data(data);
        Ok(())
    }

    pub fn process_interests(&mut self, id: NodeId, ctx: &mut SimContext) -> Result<()> {
        let mut out = Outbox::new();
        self.node_mut(id)?.process_interests(ctx, &mut out);
        self.deliver(out, ctx);
        Ok(())
    }

    pub fn process_data(&mut self, id: NodeId, ctx: &mut SimContext) -> Result<()> {
        let mut out = Outbox::new();
        self.node_mut(id)?.process_data(ctx, &mut out);
        self.deliver(out, ctx);
        Ok(())
    }

    pub fn producer_operation(&mut self, id: NodeId, ctx: &mut SimContext) -> Result<()> {
        let mut out = Outbox::new();
        self.node_mut(id)?.producer_operation(ctx, &mut out);
        self.deliver(out, ctx);
        Ok(())
    }

    pub fn user_operation(&mut self, id: NodeId, ctx: &mut SimContext) -> Result<()> {
        let mut out = Outbox::new();
        self.node_mut(id)?.user_operation(ctx, &mut out);
        self.deliver(out, ctx);
        Ok(())
    }

    /// Has user `id` request `name` directly, bypassing the catalog.
    pub fn express_interest(
        &mut self,
        id: NodeId,
        name: Name,
        ctx: &mut SimContext,
    ) -> Result<Option<PacketId>> {
        let mut out = Outbox::new();
        let packet = self.node_mut(id)?.express_interest(name, ctx, &mut out);
        self.deliver(out, ctx);
        Ok(packet)
    }

    pub fn cache_data_packet(
        &mut self,
        id: NodeId,
        data: DataMessage,
        ctx: &mut SimContext,
    ) -> Result<bool> {
        let mut out = Outbox::new();
        let cached = self.node_mut(id)?.cache_data_packet(data, ctx, &mut out);
        self.deliver(out, ctx);
        Ok(cached)
    }

    pub fn drop_data_packet(&mut self, id: NodeId, ctx: &mut SimContext) -> Result<Option<Name>> {
        let mut out = Outbox::new();
        let dropped = self.node_mut(id)?.drop_data_packet(ctx, &mut out);
        self.deliver(out, ctx);
        Ok(dropped)
    }

    pub fn set_capacity(&mut self, id: NodeId, capacity: i64) -> Result<()> {
        self.node_mut(id)?.set_capacity(capacity);
        Ok(())
    }

    /// One scheduler turn for `id`: producers drain Interests, routers drain
    /// Interests then Data, users run `user_ops` request cycles.
    pub fn step(&mut self, id: NodeId, user_ops: u32, ctx: &mut SimContext) -> Result<()> {
        match self.node(id)?.role() {
            NodeRole::Producer => self.producer_operation(id, ctx),
            NodeRole::Router => {
                self.process_interests(id, ctx)?;
                self.process_data(id, ctx)
            }
            NodeRole::User => {
                for _ in 0..user_ops {
                    self.user_operation(id, ctx)?;
                }
                Ok(())
            }
        }
    }

    /// Ages every dynamic FIB by `deviation`.
    pub fn tick_dynamic_fibs(&mut self, deviation: u32) {
        for node in self.nodes.iter_mut() {
            node.dynamic_fib_mut().tick(deviation);
        }
    }

    /// Applies a node's outbox. Messages land in the target's queues; cache
    /// requests run immediately and their own effects are applied in turn.
    pub fn deliver(&mut self, out: Outbox, ctx: &mut SimContext) {
        let mut queue: VecDeque<Envelope> = out.into_envelopes().into();

        while let Some(envelope) = queue.pop_front() {
            match envelope {
                Envelope::Interest { to, interest } => {
                    if ctx.in_window(interest.id) {
                        ctx.metrics.measured_hops.increment();
                    }
                    match self.nodes.get_mut(to.index()) {
                        Some(node) => {
                            trace!("{} -> {}: Interest {}", interest.arrival_face, to, interest.name);
                            ctx.metrics.interests_received.increment();
                            node.pend_interest(interest);
                        }
                        None => warn!("Dropping Interest {} for unknown {}", interest.name, to),
                    }
                }
                Envelope::Data { to, data } => {
                    if ctx.in_window(data.id) {
                        ctx.metrics.measured_hops.increment();
                    }
                    match self.nodes.get_mut(to.index()) {
                        Some(node) => {
                            trace!("{} -> {}: Data {} ({:?})", data.arrival_face, to, data.name, data.data_type);
                            ctx.metrics.data_received.increment();
                            node.pend_data(data);
                        }
                        None => warn!("Dropping Data {} for unknown {}", data.name, to),
                    }
                }
                Envelope::EraseRoutingInfo {
                    router,
                    prefix,
                    faces,
                    metric,
                } => match self.nodes.get_mut(router.index()) {
                    Some(node) => {
                        trace!("Erasing {} {:?} on {}", prefix, faces, router);
                        node.dynamic_fib_mut().erase_routing_info(&prefix, &faces, metric);
                    }
                    None => warn!("Cannot erase routing info on unknown {}", router),
                },
                Envelope::CacheAt { router, data } => match self.nodes.get_mut(router.index()) {
                    Some(node) => {
                        let mut nested = Outbox::new();
                        node.cache_data_packet(data, ctx, &mut nested);
                        queue.extend(nested.into_envelopes());
                    }
                    None => warn!("Cannot cache {} on unknown {}", data.name, router),
                },
            }
        }
    }

    /* ---------------------------------------------------------------- *
     * Introspection
     * ---------------------------------------------------------------- */

    pub fn content_store_stat(&self, id: NodeId) -> Result<ContentStoreStat> {
        Ok(self.node(id)?.content_store_stat())
    }

    pub fn pit_size(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.pit_size())
    }

    pub fn static_fib_size(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.static_fib_size())
    }

    pub fn dynamic_fib_size(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.dynamic_fib_size())
    }

    /// Records the reuse counter of every object still cached anywhere.
    pub fn record_resident_reuse(&self, ctx: &SimContext) {
        for node in &self.nodes {
            node.record_resident_reuse(ctx);
        }
    }

    /// True while any node still has queued or waiting messages.
    pub fn has_pending_messages(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| n.pending_interests() > 0 || n.pending_data() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn line() -> (Network, SimContext) {
        let mut ctx = SimContext::new(0);
        let links = [(NodeId(0), NodeId(1)), (NodeId(1), NodeId(2))];
        let topo = Topology::explicit(3, &links, &[(NodeId(0), Name::from_string("p"))], &[NodeId(2)]).unwrap();
        let options = NodeOptions {
            capacity: 4096,
            ..Default::default()
        };
        let network = Network::build(&topo, options, &mut ctx).unwrap();
        (network, ctx)
    }

    #[test]
    fn test_build_seeds_tables() {
        let (network, ctx) = line();
        assert_eq!(network.len(), 3);
        assert_eq!(network.static_fib_size(NodeId(1)).unwrap(), 1);
        assert_eq!(network.static_fib_size(NodeId(2)).unwrap(), 1);
        assert_eq!(network.static_fib_size(NodeId(0)).unwrap(), 0);
        assert_eq!(network.content_store_stat(NodeId(1)).unwrap().capacity, 4096);
        assert_eq!(network.content_store_stat(NodeId(2)).unwrap().capacity, 0);
        assert_eq!(ctx.producer_prefix(NodeId(0)), Some(&Name::from_string("p")));
    }

    #[test]
    fn test_unknown_node() {
        let (mut network, mut ctx) = line();
        assert!(matches!(network.pit_size(NodeId(9)), Err(Error::UnknownNode(NodeId(9)))));
        assert!(matches!(
            network.process_interests(NodeId(9), &mut ctx),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn test_delivery_to_unknown_node_is_dropped() {
        let (mut network, mut ctx) = line();
        let mut out = Outbox::new();
        out.send_interest(NodeId(42), InterestMessage::new(Name::from_string("p/a/1/0"), NodeId(1)));
        network.deliver(out, &mut ctx);
        assert!(!network.has_pending_messages());
    }

    #[test]
    fn test_measured_hops_follow_window() {
        let (mut network, mut ctx) = line();
        let id = network
            .express_interest(NodeId(2), Name::from_string("p/a/1/0"), &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(id, PacketId(1));
        assert_eq!(ctx.metrics.measured_hops.value(), 1);
        // 2 * static metric of the user (two hops to the producer)
        assert_eq!(ctx.metrics.required_hops.value(), 4);

        ctx.window.lower = 10;
        network
            .express_interest(NodeId(2), Name::from_string("p/a/1/1"), &mut ctx)
            .unwrap();
        assert_eq!(ctx.metrics.measured_hops.value(), 1);
    }

    #[test]
    fn test_cache_at_reaches_router() {
        let (mut network, mut ctx) = line();
        let data = DataMessage::new(Name::from_string("p/a/1/0"), Bytes::new(), NodeId(0)).with_size(100);
        let mut out = Outbox::new();
        out.cache_at(NodeId(1), data);
        network.deliver(out, &mut ctx);
        assert_eq!(network.content_store_stat(NodeId(1)).unwrap().entries, 1);
    }

    #[test]
    fn test_erase_routing_info_reaches_router() {
        let (mut network, mut ctx) = line();
        let prefix = Name::from_string("p/a/1");
        network
            .node_mut(NodeId(1))
            .unwrap()
            .dynamic_fib_mut()
            .add_routing_info(&prefix, &[NodeId(2)], 1.0);
        assert_eq!(network.dynamic_fib_size(NodeId(1)).unwrap(), 1);

        let mut out = Outbox::new();
        out.erase_routing_info(NodeId(1), prefix, vec![NodeId(2)], 1.0);
        network.deliver(out, &mut ctx);
        assert_eq!(network.dynamic_fib_size(NodeId(1)).unwrap(), 0);
    }
}
