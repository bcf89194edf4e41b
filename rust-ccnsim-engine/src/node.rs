//! Simulated node.
//!
//! A node owns its content store, PIT, static FIB and dynamic FIB, plus the
//! inbound Interest and Data queues the registry fills. Each entry point
//! drains the relevant queue to empty and leaves everything addressed to
//! other nodes in an [`Outbox`].

use crate::context::SimContext;
use crate::cs::{ContentStore, ContentStoreStat};
use crate::dynamic_fib::DynamicFib;
use crate::fib::{StaticFib, StaticRoute};
use crate::outbox::Outbox;
use crate::pit::{Pit, PitInfo};
use crate::strategy::{select_face, Strategy};
use crate::tiebreak::{node_salt, node_weight, outbids, router_hash};
use crate::workload::chunks_of;
use bytes::Bytes;
use log::{debug, trace, warn};
use rand::Rng;
use rust_ccnsim_common::ndn::{
    DataMessage, DataType, InterestMessage, InterestType, Name, RelevantRouter,
    MIN_ROUTABLE_COMPONENTS,
};
use rust_ccnsim_common::types::{
    FaceId, NodeId, NodeRole, PacketId, DEFAULT_CHUNKS_PER_FILE, FIB_FACE_LIFETIME,
};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Construction parameters shared by every node of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeOptions {
    pub strategy: Strategy,
    /// Content store capacity in bytes.
    pub capacity: i64,
    pub fib_face_lifetime: u32,
    /// Chunks requested per file when the file name does not say.
    pub chunks_per_file: u32,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::DoMyBest,
            capacity: 0,
            fib_face_lifetime: FIB_FACE_LIFETIME,
            chunks_per_file: DEFAULT_CHUNKS_PER_FILE,
        }
    }
}

/// Per-node tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeCounters {
    pub interests_received: u64,
    pub data_received: u64,
    /// User only.
    pub requests_sent: u64,
    /// User only.
    pub requests_satisfied: u64,
    /// User only.
    pub requests_nacked: u64,
    /// Objects newly cached by this node.
    pub packets_cached: u64,
}

#[derive(Debug, Clone, Default)]
struct UserState {
    file: Option<Name>,
    seq: u32,
    chunks: u32,
    outstanding: Vec<Name>,
}

/// How an Interest for an already pending name is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingArrival {
    /// Another requester for the same name; share the upstream Interest.
    Aggregate,
    /// The Interest came back from the face it was sent out on; retry elsewhere.
    LoopFromDownstream,
    /// Same loop, but through the producer-ward face; the peer re-routes.
    LoopFromUpstream,
}

pub struct Node {
    id: NodeId,
    role: NodeRole,
    strategy: Strategy,
    links: Vec<NodeId>,
    content_store: ContentStore,
    pit: Pit,
    static_fib: StaticFib,
    dynamic_fib: DynamicFib,
    interests: VecDeque<InterestMessage>,
    data: VecDeque<DataMessage>,
    /// Interests forwarded upstream and not yet answered.
    waiting: Vec<InterestMessage>,
    salt: String,
    weight: f64,
    default_chunks: u32,
    user: UserState,
    counters: NodeCounters,
}

impl Node {
    pub fn new(id: NodeId, role: NodeRole, links: Vec<NodeId>, options: NodeOptions) -> Self {
        let weight = node_weight(options.capacity, links.len());
        Self {
            id,
            role,
            strategy: options.strategy,
            links,
            content_store: ContentStore::new(options.capacity),
            pit: Pit::new(),
            static_fib: StaticFib::new(),
            dynamic_fib: DynamicFib::new(options.fib_face_lifetime),
            interests: VecDeque::new(),
            data: VecDeque::new(),
            waiting: Vec::new(),
            salt: node_salt(id),
            weight,
            default_chunks: options.chunks_per_file,
            user: UserState::default(),
            counters: NodeCounters::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn links(&self) -> &[NodeId] {
        &self.links
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn counters(&self) -> &NodeCounters {
        &self.counters
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.content_store
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn static_fib(&self) -> &StaticFib {
        &self.static_fib
    }

    pub fn dynamic_fib(&self) -> &DynamicFib {
        &self.dynamic_fib
    }

    pub fn dynamic_fib_mut(&mut self) -> &mut DynamicFib {
        &mut self.dynamic_fib
    }

    pub fn insert_static_route(&mut self, prefix: Name, face: FaceId, metric: f32) {
        self.static_fib.insert(prefix, face, metric);
    }

    /// Resizes the content store and recomputes the tie-break weight.
    pub fn set_capacity(&mut self, capacity: i64) {
        self.content_store.set_capacity(capacity);
        self.weight = node_weight(capacity, self.links.len());
    }

    pub fn content_store_stat(&self) -> ContentStoreStat {
        self.content_store.stat()
    }

    pub fn pit_size(&self) -> usize {
        self.pit.len()
    }

    pub fn static_fib_size(&self) -> usize {
        self.static_fib.len()
    }

    pub fn dynamic_fib_size(&self) -> usize {
        self.dynamic_fib.len()
    }

    pub fn pending_interests(&self) -> usize {
        self.interests.len()
    }

    pub fn pending_data(&self) -> usize {
        self.data.len()
    }

    pub fn waiting_interests(&self) -> usize {
        self.waiting.len()
    }

    /// Names a user has requested and not yet received.
    pub fn outstanding(&self) -> &[Name] {
        &self.user.outstanding
    }

    pub fn pend_interest(&mut self, interest: InterestMessage) {
        self.counters.interests_received += 1;
        self.interests.push_back(interest);
    }

    pub fn pend_data(&mut self, data: DataMessage) {
        self.counters.data_received += 1;
        self.data.push_back(data);
    }

    /* ---------------------------------------------------------------- *
     * Entry points
     * ---------------------------------------------------------------- */

    /// Drains the Interest queue according to this node's role.
    pub fn process_interests(&mut self, ctx: &mut SimContext, out: &mut Outbox) {
        while let Some(interest) = self.interests.pop_front() {
            match (self.role, self.strategy) {
                (NodeRole::Producer, _) => self.produce(interest, ctx, out),
                (NodeRole::User, _) => self.refuse(interest, ctx, out),
                (NodeRole::Router, Strategy::DoMyBest) => match interest.interest_type {
                    InterestType::Normal => self.on_interest(interest, ctx, out),
                    InterestType::Nack => self.on_retry(interest, ctx, out),
                },
                (NodeRole::Router, Strategy::StaticOnly { .. }) => {
                    self.on_interest_static(interest, ctx, out)
                }
            }
        }
    }

    /// Drains the Data queue according to this node's role.
    pub fn process_data(&mut self, ctx: &mut SimContext, out: &mut Outbox) {
        match self.role {
            NodeRole::Router => {}
            NodeRole::User => return self.consume(ctx, out),
            NodeRole::Producer => {
                if !self.data.is_empty() {
                    trace!("Producer {} discards {} Data", self.id, self.data.len());
                }
                self.data.clear();
                return;
            }
        }

        while let Some(data) = self.data.pop_front() {
            match self.strategy {
                Strategy::DoMyBest => match data.data_type {
                    DataType::Normal => self.on_data(data, ctx, out),
                    DataType::NoCache => self.on_nocache_data(data, ctx, out),
                    DataType::Nack => self.on_nack_data(data),
                },
                Strategy::StaticOnly { cache_probability } => {
                    self.on_data_static(data, cache_probability, ctx, out)
                }
            }
        }
    }

    pub fn producer_operation(&mut self, ctx: &mut SimContext, out: &mut Outbox) {
        self.process_interests(ctx, out);
        self.process_data(ctx, out);
    }

    /// One request/response cycle: refuse stray Interests, issue the next
    /// chunk request and consume every arrived Data.
    pub fn user_operation(&mut self, ctx: &mut SimContext, out: &mut Outbox) {
        self.process_interests(ctx, out);
        self.request_next_chunk(ctx, out);
        self.consume(ctx, out);
    }

    /// Sends a request for `name` through the user's first link.
    pub fn express_interest(
        &mut self,
        name: Name,
        ctx: &mut SimContext,
        out: &mut Outbox,
    ) -> Option<PacketId> {
        let Some(&link) = self.links.first() else {
            warn!("User {} has no link to request {}", self.id, name);
            return None;
        };

        let id = ctx.next_packet_id();
        if ctx.window.contains(id) {
            if let Some(route) = self.static_fib.query_name(&name) {
                ctx.metrics.required_hops.add((2.0 * route.metric).round() as u64);
            }
        }

        let interest = InterestMessage::new(name.clone(), self.id)
            .with_unavailable_face(link)
            .with_id(id);
        trace!("User {} requests {} ({})", self.id, name, id);

        self.counters.requests_sent += 1;
        self.user.outstanding.push(name);
        out.send_interest(link, interest);
        Some(id)
    }

    /// Caches `data`, releasing whatever it pushes out. Returns true when the
    /// object is resident afterwards.
    pub fn cache_data_packet(
        &mut self,
        data: DataMessage,
        ctx: &mut SimContext,
        out: &mut Outbox,
    ) -> bool {
        let name = data.name.clone();
        let owed = data.relevant_routers.clone();
        let outcome = self.content_store.insert(data);

        if !outcome.cached {
            debug!("Router {} declined {}", self.id, name);
            self.erase_remote_routes(&name.trim_last(), owed, ctx, out);
        } else if !outcome.refreshed {
            ctx.metrics.cs_inserts.increment();
            ctx.metrics.cached_objects.increment();
            self.counters.packets_cached += 1;
            debug!("Router {} cached {}", self.id, name);
        }
        for evicted in outcome.evicted {
            self.release(evicted, ctx, out);
        }
        outcome.cached
    }

    /// Evicts the tail of the content store, cleaning up after it.
    pub fn drop_data_packet(&mut self, ctx: &mut SimContext, out: &mut Outbox) -> Option<Name> {
        let evicted = self.content_store.evict_tail()?;
        let name = evicted.name.clone();
        self.release(evicted, ctx, out);
        Some(name)
    }

    /// Records reuse of every resident object, e.g. at the end of a run.
    pub fn record_resident_reuse(&self, ctx: &SimContext) {
        for data in self.content_store.entries() {
            ctx.metrics.reuse.observe(data.reuse_count);
        }
    }

    /* ---------------------------------------------------------------- *
     * Cache-aware Interest path
     * ---------------------------------------------------------------- */

    fn on_interest(&mut self, mut interest: InterestMessage, ctx: &mut SimContext, out: &mut Outbox) {
        interest.increase_hop_count();

        if let Some(hit) = self.content_store.lookup(&interest.name) {
            ctx.metrics.cs_hits.increment();
            let current = interest.current_router_dist + 1;
            let data = self.answer_from_cache(hit, &interest, current, ctx);
            debug!("Router {} answers {} from cache ({:?})", self.id, interest.name, data.data_type);
            self.send_data(interest.arrival_face, data, ctx, out);
            return;
        }
        ctx.metrics.cs_misses.increment();

        let info = PitInfo {
            distance: interest.current_router_dist + 1,
            hop_count: interest.hop_count,
            arrival_face: interest.arrival_face,
            interest_id: interest.id,
        };

        if self.pit.exists(&interest.name) {
            let arrival = self.classify_pending(&interest);
            self.pit.insert_or_merge(&interest.name, info, None);
            match arrival {
                PendingArrival::LoopFromDownstream => {
                    ctx.metrics.loop_resolutions.increment();
                    debug!(
                        "Router {} saw {} loop back from {}",
                        self.id, interest.name, interest.arrival_face
                    );
                    self.wake_waiting(&interest.name);
                }
                PendingArrival::LoopFromUpstream | PendingArrival::Aggregate => {
                    ctx.metrics.interests_aggregated.increment();
                }
            }
            return;
        }

        match self.next_hop(&interest) {
            Some(face) => self.forward(interest, face, ctx, out),
            None => self.nack(&interest, ctx, out),
        }
    }

    fn on_retry(&mut self, mut interest: InterestMessage, ctx: &mut SimContext, out: &mut Outbox) {
        if !self.pit.exists(&interest.name) {
            debug!("Router {} drops stale retry for {}", self.id, interest.name);
            return;
        }
        ctx.metrics.interests_retried.increment();

        if let Some(hit) = self.content_store.lookup(&interest.name) {
            ctx.metrics.cs_hits.increment();
            let current = interest.current_router_dist;
            let data = self.answer_from_cache(hit, &interest, current, ctx);
            let pending = self.pit.take_and_drop(&interest.name);
            self.purge_pending(&interest.name);
            self.forward_data(&data, &pending, ctx, out);
            return;
        }
        ctx.metrics.cs_misses.increment();

        match self.next_hop(&interest) {
            Some(face) => {
                interest.unavailable_faces.insert(face);
                debug!("Router {} retries {} via {}", self.id, interest.name, face);
                self.send_interest_copy(&interest, face, ctx, out);
                self.pit.set_forwarding_face(&interest.name, face);
                self.waiting.push(interest);
            }
            None => {
                let pending = self.pit.take_and_drop(&interest.name);
                debug!(
                    "Router {} gives up on {}, NACKing {} arrivals",
                    self.id,
                    interest.name,
                    pending.len()
                );
                for info in pending {
                    let nack = DataMessage::nack(
                        interest.name.clone(),
                        self.id,
                        interest.hop_count,
                        info.interest_id,
                    );
                    ctx.metrics.nacks_sent.increment();
                    self.send_data(info.arrival_face, nack, ctx, out);
                }
            }
        }
    }

    fn classify_pending(&self, interest: &InterestMessage) -> PendingArrival {
        let loops_back = self.pit.forwarding_face(&interest.name) == Some(interest.arrival_face);
        if !loops_back {
            return PendingArrival::Aggregate;
        }
        let upstream = self.static_fib.query_name(&interest.name).map(|r| r.face);
        if upstream == Some(interest.arrival_face) {
            PendingArrival::LoopFromUpstream
        } else {
            PendingArrival::LoopFromDownstream
        }
    }

    /// Re-queues the waiting Interest for `name` as a retry.
    fn wake_waiting(&mut self, name: &Name) {
        if let Some(pos) = self.waiting.iter().position(|i| &i.name == name) {
            let mut interest = self.waiting.remove(pos);
            interest.interest_type = InterestType::Nack;
            self.interests.push_back(interest);
        }
    }

    fn next_hop(&self, interest: &InterestMessage) -> Option<FaceId> {
        select_face(
            &interest.name,
            &interest.unavailable_faces,
            &self.static_fib,
            &self.dynamic_fib,
        )
        .filter(|&face| face != interest.arrival_face)
    }

    fn forward(&mut self, mut interest: InterestMessage, face: FaceId, ctx: &mut SimContext, out: &mut Outbox) {
        interest.unavailable_faces.insert(face);
        interest.increase_current_router_dist();
        self.bid_for_caching(&mut interest);

        self.send_interest_copy(&interest, face, ctx, out);
        self.pit.insert_or_merge(
            &interest.name,
            PitInfo {
                distance: interest.current_router_dist,
                hop_count: interest.hop_count,
                arrival_face: interest.arrival_face,
                interest_id: interest.id,
            },
            Some(face),
        );
        self.waiting.push(interest);
    }

    /// Makes this router the designated caching point if it outbids the one carried.
    fn bid_for_caching(&self, interest: &mut InterestMessage) {
        let hash = router_hash(&self.salt, &interest.name);
        if outbids(
            interest.caching_router_hash,
            interest.caching_router_weight,
            hash,
            self.weight,
        ) {
            interest.caching_router_dist = interest.current_router_dist;
            interest.caching_router_hash = hash;
            interest.caching_router_weight = self.weight;
        }
    }

    fn answer_from_cache(
        &self,
        hit: DataMessage,
        interest: &InterestMessage,
        current: i32,
        ctx: &SimContext,
    ) -> DataMessage {
        let mut data = hit;
        data.current_router_dist = current;
        data.caching_router_dist = interest.caching_router_dist;
        data.arrival_face = self.id;
        data.hop_count = interest.hop_count;
        data.clear_relevant_routers();
        data.caching_router_id = None;
        data.id = interest.id;
        data.data_type = ctx
            .cache_policy
            .classify_hit(current, interest.caching_router_dist);
        data
    }

    /* ---------------------------------------------------------------- *
     * Cache-aware Data path
     * ---------------------------------------------------------------- */

    fn on_data(&mut self, mut data: DataMessage, ctx: &mut SimContext, out: &mut Outbox) {
        let upstream = data.arrival_face;
        data.arrival_face = self.id;
        data.increase_hop_count();
        let pending = self.pit.take_and_drop(&data.name);
        if pending.is_empty() {
            warn!("Router {} has no PIT entry for {}", self.id, data.name);
        }

        data.decrease_current_router_dist();
        let prefix = data.name.trim_last();

        match data.current_router_dist.cmp(&data.caching_router_dist) {
            Ordering::Equal => {
                if self.cache_data_packet(data.clone(), ctx, out) {
                    data.caching_router_id = Some(self.id);
                } else {
                    // no copy here, so nothing downstream may route to one
                    data.caching_router_id = None;
                    data.data_type = DataType::NoCache;
                }
                data.clear_relevant_routers();
                self.forward_data(&data, &pending, ctx, out);
            }
            Ordering::Less => {
                // the copy lives upstream
                let metric = (data.caching_router_dist - data.current_router_dist) as f32;
                let faces = vec![upstream];
                self.dynamic_fib.add_routing_info(&prefix, &faces, metric);
                ctx.metrics.dfib_installs.increment();
                data.insert_relevant_router(self.id, faces, metric);
                self.forward_data(&data, &pending, ctx, out);
            }
            Ordering::Greater => {
                // the copy will live downstream of each arrival
                let metric = (data.current_router_dist - data.caching_router_dist) as f32;
                for info in &pending {
                    let faces = vec![info.arrival_face];
                    self.dynamic_fib.add_routing_info(&prefix, &faces, metric);
                    ctx.metrics.dfib_installs.increment();

                    let mut copy = data.clone();
                    copy.id = info.interest_id;
                    copy.insert_relevant_router(self.id, faces, metric);
                    self.send_data(info.arrival_face, copy, ctx, out);
                }
            }
        }

        self.purge_pending(&data.name);
    }

    fn on_nocache_data(&mut self, mut data: DataMessage, ctx: &mut SimContext, out: &mut Outbox) {
        data.arrival_face = self.id;
        data.increase_hop_count();
        let pending = self.pit.take_and_drop(&data.name);
        self.purge_pending(&data.name);
        self.forward_data(&data, &pending, ctx, out);
    }

    fn on_nack_data(&mut self, data: DataMessage) {
        match self.waiting.iter().position(|i| i.name == data.name) {
            Some(pos) => {
                let mut interest = self.waiting.remove(pos);
                interest.interest_type = InterestType::Nack;
                interest.hop_count = data.hop_count + 1;
                debug!("Router {} got NACK for {}, will retry", self.id, data.name);
                self.interests.push_back(interest);
            }
            None => debug!("Router {} ignores NACK for {}", self.id, data.name),
        }
    }

    /// Forgets waiting Interests and queued retries for an answered name.
    fn purge_pending(&mut self, name: &Name) {
        self.waiting.retain(|i| &i.name != name);
        self.interests.retain(|i| !(&i.name == name && i.is_nack()));
    }

    /* ---------------------------------------------------------------- *
     * Static-only strategy
     * ---------------------------------------------------------------- */

    fn on_interest_static(&mut self, mut interest: InterestMessage, ctx: &mut SimContext, out: &mut Outbox) {
        interest.increase_hop_count();

        if let Some(hit) = self.content_store.lookup(&interest.name) {
            ctx.metrics.cs_hits.increment();
            let current = interest.current_router_dist + 1;
            let mut data = self.answer_from_cache(hit, &interest, current, ctx);
            data.data_type = DataType::Normal;
            self.send_data(interest.arrival_face, data, ctx, out);
            return;
        }
        ctx.metrics.cs_misses.increment();

        let info = PitInfo {
            distance: interest.current_router_dist + 1,
            hop_count: interest.hop_count,
            arrival_face: interest.arrival_face,
            interest_id: interest.id,
        };
        if self.pit.exists(&interest.name) {
            self.pit.insert_or_merge(&interest.name, info, None);
            ctx.metrics.interests_aggregated.increment();
            return;
        }

        match self.static_route(&interest) {
            Some(route) => {
                interest.increase_current_router_dist();
                self.send_interest_copy(&interest, route.face, ctx, out);
                self.pit.insert_or_merge(&interest.name, info, Some(route.face));
            }
            None => self.nack(&interest, ctx, out),
        }
    }

    fn static_route(&self, interest: &InterestMessage) -> Option<StaticRoute> {
        if interest.name.len() < MIN_ROUTABLE_COMPONENTS {
            return None;
        }
        self.static_fib
            .query_name(&interest.name)
            .filter(|route| route.face != interest.arrival_face)
    }

    fn on_data_static(
        &mut self,
        mut data: DataMessage,
        cache_probability: f64,
        ctx: &mut SimContext,
        out: &mut Outbox,
    ) {
        data.arrival_face = self.id;
        data.increase_hop_count();
        let pending = self.pit.take_and_drop(&data.name);

        if !data.is_nack() && ctx.rng.gen::<f64>() < cache_probability {
            self.cache_data_packet(data.clone(), ctx, out);
        }
        self.forward_data(&data, &pending, ctx, out);
    }

    /* ---------------------------------------------------------------- *
     * Producer and user roles
     * ---------------------------------------------------------------- */

    fn produce(&mut self, mut interest: InterestMessage, ctx: &mut SimContext, out: &mut Outbox) {
        interest.increase_hop_count();
        interest.increase_current_router_dist();

        let serves = match (ctx.producer_prefix(self.id), interest.name.top_level()) {
            (Some(own), Some(requested)) => *own == requested,
            _ => false,
        };
        if !serves {
            debug!("Producer {} does not serve {}", self.id, interest.name);
            self.nack(&interest, ctx, out);
            return;
        }

        let mut data = DataMessage::new(interest.name.clone(), Bytes::new(), self.id)
            .with_size(ctx.data_size)
            .with_distances(interest.current_router_dist, interest.caching_router_dist)
            .with_type(DataType::Normal);
        data.hop_count = interest.hop_count;
        data.id = interest.id;
        trace!("Producer {} serves {}", self.id, interest.name);
        self.send_data(interest.arrival_face, data, ctx, out);
    }

    /// Users hold no content; anything routed to them is refused.
    fn refuse(&mut self, mut interest: InterestMessage, ctx: &mut SimContext, out: &mut Outbox) {
        interest.increase_hop_count();
        debug!("User {} refuses {}", self.id, interest.name);
        self.nack(&interest, ctx, out);
    }

    fn request_next_chunk(&mut self, ctx: &mut SimContext, out: &mut Outbox) {
        if self.user.file.is_none() || self.user.seq >= self.user.chunks {
            let Some(file) = ctx.catalog.draw(&mut ctx.rng).cloned() else {
                return;
            };
            self.user.chunks = chunks_of(&file).unwrap_or(self.default_chunks);
            self.user.seq = 0;
            self.user.file = Some(file);
        }

        let Some(file) = self.user.file.as_ref() else {
            return;
        };
        let name = file.child(self.user.seq);
        self.user.seq += 1;
        self.express_interest(name, ctx, out);
    }

    fn consume(&mut self, ctx: &mut SimContext, out: &mut Outbox) {
        while let Some(mut data) = self.data.pop_front() {
            data.increase_hop_count();
            let pos = self.user.outstanding.iter().position(|n| *n == data.name);

            if data.is_nack() {
                self.counters.requests_nacked += 1;
                if let Some(pos) = pos {
                    self.user.outstanding.remove(pos);
                }
                debug!("User {} request for {} failed", self.id, data.name);
                continue;
            }

            let Some(pos) = pos else {
                warn!("User {} received unrequested {}", self.id, data.name);
                continue;
            };
            self.user.outstanding.remove(pos);
            self.counters.requests_satisfied += 1;
            ctx.metrics.responses.increment();

            if let Some(route) = self.static_fib.query_name(&data.name) {
                let origin = 2.0 * route.metric as f64;
                if origin > 0.0 {
                    let stretch = (data.hop_count as f64 * 100.0 / origin).round() as u64;
                    ctx.metrics.stretch_percent.observe(stretch);
                }
            }

            if let Some(router) = data.caching_router_id {
                out.cache_at(router, data);
            }
        }
    }

    /* ---------------------------------------------------------------- *
     * Helpers
     * ---------------------------------------------------------------- */

    fn nack(&mut self, interest: &InterestMessage, ctx: &mut SimContext, out: &mut Outbox) {
        let nack = DataMessage::nack(interest.name.clone(), self.id, interest.hop_count, interest.id);
        ctx.metrics.nacks_sent.increment();
        debug!("Node {} NACKs {} to {}", self.id, interest.name, interest.arrival_face);
        self.send_data(interest.arrival_face, nack, ctx, out);
    }

    fn send_interest_copy(&self, interest: &InterestMessage, face: FaceId, ctx: &mut SimContext, out: &mut Outbox) {
        let mut copy = interest.clone();
        copy.arrival_face = self.id;
        copy.interest_type = InterestType::Normal;
        ctx.metrics.interests_forwarded.increment();
        out.send_interest(face, copy);
    }

    /// One copy per pending arrival, tagged with that arrival's Interest id.
    fn forward_data(&self, data: &DataMessage, pending: &[PitInfo], ctx: &mut SimContext, out: &mut Outbox) {
        for info in pending {
            let mut copy = data.clone();
            copy.id = info.interest_id;
            self.send_data(info.arrival_face, copy, ctx, out);
        }
    }

    fn send_data(&self, to: FaceId, data: DataMessage, ctx: &mut SimContext, out: &mut Outbox) {
        ctx.metrics.data_forwarded.increment();
        out.send_data(to, data);
    }

    /// Accounts for an evicted object and undoes the FIB entries it owes.
    fn release(&self, evicted: DataMessage, ctx: &mut SimContext, out: &mut Outbox) {
        ctx.metrics.cs_evictions.increment();
        ctx.metrics.cached_objects.decrement();
        ctx.metrics.reuse.observe(evicted.reuse_count);

        let prefix = evicted.name.trim_last();
        self.erase_remote_routes(&prefix, evicted.relevant_routers, ctx, out);
    }

    fn erase_remote_routes(
        &self,
        prefix: &Name,
        routers: Vec<RelevantRouter>,
        ctx: &mut SimContext,
        out: &mut Outbox,
    ) {
        for rr in routers {
            ctx.metrics.dfib_remote_erasures.increment();
            out.erase_routing_info(rr.router, prefix.clone(), rr.faces, rr.metric);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::Envelope;
    use rust_ccnsim_common::types::PacketId;

    fn router(id: u32, links: &[u32]) -> Node {
        let options = NodeOptions {
            capacity: 10_000,
            ..Default::default()
        };
        let mut node = Node::new(
            NodeId(id),
            NodeRole::Router,
            links.iter().map(|&l| NodeId(l)).collect(),
            options,
        );
        node.insert_static_route(Name::from_string("p"), NodeId(0), 2.0);
        node
    }

    fn interest(name: &str, from: u32, id: u64) -> InterestMessage {
        InterestMessage::new(Name::from_string(name), NodeId(from))
            .with_id(PacketId(id))
            .with_unavailable_face(NodeId(1))
    }

    fn sent_interests(out: &mut Outbox) -> Vec<(NodeId, InterestMessage)> {
        out.drain()
            .filter_map(|e| match e {
                Envelope::Interest { to, interest } => Some((to, interest)),
                _ => None,
            })
            .collect()
    }

    fn sent_data(out: &mut Outbox) -> Vec<(NodeId, DataMessage)> {
        out.drain()
            .filter_map(|e| match e {
                Envelope::Data { to, data } => Some((to, data)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_forward_records_pit_and_waiting() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);

        node.pend_interest(interest("p/f/10/1", 2, 1));
        node.process_interests(&mut ctx, &mut out);

        let sent = sent_interests(&mut out);
        assert_eq!(sent.len(), 1);
        let (to, copy) = &sent[0];
        assert_eq!(*to, NodeId(0));
        assert_eq!(copy.arrival_face, NodeId(1));
        assert_eq!(copy.current_router_dist, 1);
        // first router always designates itself
        assert_eq!(copy.caching_router_dist, 1);
        assert!(copy.unavailable_faces.contains(&NodeId(0)));

        assert_eq!(node.pit().forwarding_face(&Name::from_string("p/f/10/1")), Some(NodeId(0)));
        assert_eq!(node.waiting_interests(), 1);
    }

    #[test]
    fn test_aggregation_sends_once() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2, 3]);

        node.pend_interest(interest("p/f/10/1", 2, 1));
        node.pend_interest(interest("p/f/10/1", 3, 2));
        node.process_interests(&mut ctx, &mut out);

        assert_eq!(sent_interests(&mut out).len(), 1);
        let entry = node.pit().get(&Name::from_string("p/f/10/1")).unwrap();
        assert_eq!(entry.infos().len(), 2);
        assert_eq!(ctx.metrics.interests_aggregated.value(), 1);
    }

    #[test]
    fn test_no_route_nacks_arrival() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);

        node.pend_interest(interest("q/f/10/1", 2, 7));
        node.pend_interest(interest("p/short", 2, 8));
        node.process_interests(&mut ctx, &mut out);

        let sent = sent_data(&mut out);
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(to, d)| *to == NodeId(2) && d.is_nack()));
        assert_eq!(sent[0].1.id, Some(PacketId(7)));
        assert_eq!(node.pit_size(), 0);
    }

    #[test]
    fn test_route_back_to_arrival_is_nacked() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0]);

        node.pend_interest(interest("p/f/10/1", 0, 1));
        node.process_interests(&mut ctx, &mut out);

        let sent = sent_data(&mut out);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.is_nack());
    }

    #[test]
    fn test_loop_wakes_waiting_interest() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2, 3]);
        let name = Name::from_string("p/f/2/1");
        // cached copy two hops behind face 3
        node.dynamic_fib_mut().add_routing_info(&name.trim_last(), &[NodeId(3)], 0.5);

        node.pend_interest(interest("p/f/2/1", 2, 1));
        node.process_interests(&mut ctx, &mut out);
        let sent = sent_interests(&mut out);
        assert_eq!(sent[0].0, NodeId(3));

        // the neighbor sends the same name back
        node.pend_interest(interest("p/f/2/1", 3, 2));
        node.process_interests(&mut ctx, &mut out);

        assert_eq!(ctx.metrics.loop_resolutions.value(), 1);
        // the retry leaves through the static face
        let sent = sent_interests(&mut out);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, NodeId(0));
        assert_eq!(node.pit().forwarding_face(&name), Some(NodeId(0)));
        assert_eq!(node.pit().get(&name).unwrap().infos().len(), 2);
    }

    #[test]
    fn test_loop_from_upstream_only_merges() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);

        node.pend_interest(interest("p/f/10/1", 2, 1));
        node.process_interests(&mut ctx, &mut out);
        out.drain();

        node.pend_interest(interest("p/f/10/1", 0, 2));
        node.process_interests(&mut ctx, &mut out);

        assert!(out.is_empty());
        assert_eq!(ctx.metrics.loop_resolutions.value(), 0);
        assert_eq!(node.waiting_interests(), 1);
    }

    #[test]
    fn test_nack_data_triggers_retry_then_gives_up() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);
        let name = Name::from_string("p/f/10/1");

        node.pend_interest(interest("p/f/10/1", 2, 1));
        node.process_interests(&mut ctx, &mut out);
        out.drain();

        node.pend_data(DataMessage::nack(name.clone(), NodeId(0), 3, Some(PacketId(1))));
        node.process_data(&mut ctx, &mut out);
        assert_eq!(node.pending_interests(), 1);
        assert_eq!(node.waiting_interests(), 0);

        // static face already tried, nothing else known
        node.process_interests(&mut ctx, &mut out);
        let sent = sent_data(&mut out);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, NodeId(2));
        assert!(sent[0].1.is_nack());
        assert!(!node.pit().exists(&name));
    }

    #[test]
    fn test_designated_cache_point() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);
        let name = Name::from_string("p/f/10/1");

        node.pend_interest(interest("p/f/10/1", 2, 5));
        node.process_interests(&mut ctx, &mut out);
        out.drain();

        let data = DataMessage::new(name.clone(), Bytes::new(), NodeId(0))
            .with_size(100)
            .with_distances(2, 1);
        node.pend_data(data);
        node.process_data(&mut ctx, &mut out);

        assert!(node.content_store().contains(&name));
        let sent = sent_data(&mut out);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, NodeId(2));
        assert_eq!(sent[0].1.caching_router_id, Some(NodeId(1)));
        assert_eq!(sent[0].1.id, Some(PacketId(5)));
        assert_eq!(sent[0].1.current_router_dist, 1);
        assert_eq!(node.waiting_interests(), 0);
        assert_eq!(node.pit_size(), 0);
    }

    #[test]
    fn test_copy_upstream_installs_route_toward_it() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);
        let name = Name::from_string("p/f/10/1");

        node.pend_interest(interest("p/f/10/1", 2, 5));
        node.process_interests(&mut ctx, &mut out);
        out.drain();

        // cached two hops further up than this router
        let data = DataMessage::new(name.clone(), Bytes::new(), NodeId(0)).with_distances(2, 3);
        node.pend_data(data);
        node.process_data(&mut ctx, &mut out);

        let faces = node.dynamic_fib().query(&name.trim_last());
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].face, NodeId(0));
        assert_eq!(faces[0].metric, 2.0);

        let sent = sent_data(&mut out);
        assert_eq!(sent[0].1.relevant_routers.len(), 1);
        assert_eq!(sent[0].1.relevant_routers[0].router, NodeId(1));
        assert!(!node.content_store().contains(&name));
    }

    #[test]
    fn test_copy_downstream_installs_route_per_arrival() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2, 3]);
        let name = Name::from_string("p/f/10/1");

        node.pend_interest(interest("p/f/10/1", 2, 5));
        node.pend_interest(interest("p/f/10/1", 3, 6));
        node.process_interests(&mut ctx, &mut out);
        out.drain();

        let data = DataMessage::new(name.clone(), Bytes::new(), NodeId(0)).with_distances(4, 1);
        node.pend_data(data);
        node.process_data(&mut ctx, &mut out);

        let faces: Vec<_> = node
            .dynamic_fib()
            .query(&name.trim_last())
            .iter()
            .map(|f| f.face)
            .collect();
        assert_eq!(faces, vec![NodeId(2), NodeId(3)]);

        let sent = sent_data(&mut out);
        assert_eq!(sent.len(), 2);
        for (to, data) in &sent {
            assert_eq!(data.relevant_routers.len(), 1);
            assert_eq!(data.relevant_routers[0].faces, vec![*to]);
            assert_eq!(data.relevant_routers[0].metric, 2.0);
        }
    }

    #[test]
    fn test_eviction_erases_remote_routes() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);
        node.set_capacity(100);

        let mut first = DataMessage::new(Name::from_string("p/a/10/1"), Bytes::new(), NodeId(0)).with_size(100);
        first.insert_relevant_router(NodeId(7), vec![NodeId(8)], 3.0);
        node.cache_data_packet(first, &mut ctx, &mut out);
        assert!(out.is_empty());

        let second = DataMessage::new(Name::from_string("p/b/10/1"), Bytes::new(), NodeId(0)).with_size(100);
        node.cache_data_packet(second, &mut ctx, &mut out);

        let erasures: Vec<_> = out.drain().collect();
        assert_eq!(erasures.len(), 1);
        match &erasures[0] {
            Envelope::EraseRoutingInfo { router, prefix, faces, metric } => {
                assert_eq!(*router, NodeId(7));
                assert_eq!(*prefix, Name::from_string("p/a/10"));
                assert_eq!(faces, &vec![NodeId(8)]);
                assert_eq!(*metric, 3.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ctx.metrics.cs_evictions.value(), 1);
    }

    #[test]
    fn test_unsolicited_data_goes_nowhere() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);

        let data = DataMessage::new(Name::from_string("p/f/10/1"), Bytes::new(), NodeId(0))
            .with_size(100)
            .with_distances(3, 1);
        node.pend_data(data);
        node.process_data(&mut ctx, &mut out);

        assert!(sent_data(&mut out).is_empty());
        assert_eq!(node.pit_size(), 0);
        assert_eq!(node.pending_data(), 0);
    }

    #[test]
    fn test_declined_cache_point_undoes_upstream_routes() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);
        node.set_capacity(500);
        let name = Name::from_string("p/f/10/1");

        node.pend_interest(interest("p/f/10/1", 2, 5));
        node.process_interests(&mut ctx, &mut out);
        out.drain();

        let mut data = DataMessage::new(name.clone(), Bytes::new(), NodeId(0))
            .with_size(1024)
            .with_distances(2, 1);
        data.insert_relevant_router(NodeId(7), vec![NodeId(1)], 1.0);
        node.pend_data(data);
        node.process_data(&mut ctx, &mut out);

        assert!(!node.content_store().contains(&name));
        let envelopes: Vec<_> = out.drain().collect();
        assert_eq!(envelopes.len(), 2);

        let erased: Vec<_> = envelopes
            .iter()
            .filter_map(|e| match e {
                Envelope::EraseRoutingInfo { router, prefix, .. } => Some((*router, prefix.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(erased, vec![(NodeId(7), Name::from_string("p/f/10"))]);

        let forwarded: Vec<_> = envelopes
            .into_iter()
            .filter_map(|e| match e {
                Envelope::Data { to, data } => Some((to, data)),
                _ => None,
            })
            .collect();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].0, NodeId(2));
        assert_eq!(forwarded[0].1.caching_router_id, None);
        assert_eq!(forwarded[0].1.data_type, DataType::NoCache);
        assert!(forwarded[0].1.relevant_routers.is_empty());
        assert_eq!(ctx.metrics.cs_evictions.value(), 0);
        assert_eq!(ctx.metrics.dfib_remote_erasures.value(), 1);
    }

    #[test]
    fn test_eviction_without_relevant_routers_is_silent() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0]);
        node.set_capacity(100);

        let data = DataMessage::new(Name::from_string("p/a/10/1"), Bytes::new(), NodeId(0)).with_size(100);
        node.cache_data_packet(data, &mut ctx, &mut out);
        assert_eq!(node.drop_data_packet(&mut ctx, &mut out), Some(Name::from_string("p/a/10/1")));
        assert!(out.is_empty());
    }

    #[test]
    fn test_cache_hit_classification() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut node = router(1, &[0, 2]);
        let name = Name::from_string("p/f/10/1");
        let data = DataMessage::new(name.clone(), Bytes::new(), NodeId(0)).with_size(10);
        node.cache_data_packet(data, &mut ctx, &mut out);

        let mut far = interest("p/f/10/1", 2, 1);
        far.current_router_dist = 4;
        far.caching_router_dist = 2;
        node.pend_interest(far);
        node.process_interests(&mut ctx, &mut out);

        let sent = sent_data(&mut out);
        // current becomes 5 at this router
        assert_eq!(sent[0].1.current_router_dist, 5);
        assert_eq!(sent[0].1.data_type, DataType::Normal);
        assert!(sent[0].1.relevant_routers.is_empty());
        assert_eq!(ctx.metrics.cs_hits.value(), 1);
    }

    #[test]
    fn test_producer_prefix_check() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        ctx.set_producer_prefix(NodeId(0), Name::from_string("p"));
        let mut producer = Node::new(NodeId(0), NodeRole::Producer, vec![NodeId(1)], NodeOptions::default());

        producer.pend_interest(interest("p/f/10/1", 1, 1));
        producer.pend_interest(interest("q/f/10/1", 1, 2));
        producer.producer_operation(&mut ctx, &mut out);

        let sent = sent_data(&mut out);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1.data_type, DataType::Normal);
        assert_eq!(sent[0].1.size, 1024);
        assert_eq!(sent[0].1.current_router_dist, 1);
        assert!(sent[1].1.is_nack());
        assert_eq!(producer.counters().interests_received, 2);
    }

    #[test]
    fn test_static_only_forwards_on_static_route() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let options = NodeOptions {
            strategy: Strategy::StaticOnly { cache_probability: 1.0 },
            capacity: 10_000,
            ..Default::default()
        };
        let mut node = Node::new(NodeId(1), NodeRole::Router, vec![NodeId(0), NodeId(2)], options);
        node.insert_static_route(Name::from_string("p"), NodeId(0), 1.0);
        let name = Name::from_string("p/f/10/1");
        node.dynamic_fib_mut().add_routing_info(&name.trim_last(), &[NodeId(2)], 0.1);

        node.pend_interest(interest("p/f/10/1", 2, 1));
        node.process_interests(&mut ctx, &mut out);
        let sent = sent_interests(&mut out);
        assert_eq!(sent[0].0, NodeId(0));

        node.pend_data(DataMessage::new(name.clone(), Bytes::new(), NodeId(0)).with_size(10));
        node.process_data(&mut ctx, &mut out);
        assert!(node.content_store().contains(&name));
        assert_eq!(node.counters().packets_cached, 1);
        assert_eq!(sent_data(&mut out).len(), 1);
    }

    #[test]
    fn test_user_refuses_interests() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        let mut user = Node::new(NodeId(2), NodeRole::User, vec![NodeId(1)], NodeOptions::default());

        user.pend_interest(interest("p/f/10/1", 1, 1));
        user.user_operation(&mut ctx, &mut out);

        let sent = sent_data(&mut out);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.is_nack());
    }

    #[test]
    fn test_user_walks_file_chunks() {
        let mut ctx = SimContext::new(0);
        let mut out = Outbox::new();
        ctx.catalog = crate::workload::FileCatalog::from_files(vec![Name::from_string("p/f/2")], 0.75);
        let mut user = Node::new(NodeId(2), NodeRole::User, vec![NodeId(1)], NodeOptions::default());

        for _ in 0..3 {
            user.user_operation(&mut ctx, &mut out);
        }
        let names: Vec<_> = sent_interests(&mut out)
            .into_iter()
            .map(|(to, i)| {
                assert_eq!(to, NodeId(1));
                assert!(i.unavailable_faces.contains(&NodeId(1)));
                i.name.to_path()
            })
            .collect();
        assert_eq!(names, vec!["p/f/2/0", "p/f/2/1", "p/f/2/0"]);
        assert_eq!(user.outstanding().len(), 3);
        assert_eq!(user.counters().requests_sent, 3);
    }
}
