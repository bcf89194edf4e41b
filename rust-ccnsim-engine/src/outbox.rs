//! Messages a node hands to the registry for delivery.
//!
//! A node never touches another node directly. Everything addressed to a
//! neighbor, including dynamic FIB cleanup on a remote router, is queued here
//! and applied by [`Network`](crate::network::Network) once the node's turn ends.

use rust_ccnsim_common::ndn::{DataMessage, InterestMessage, Name};
use rust_ccnsim_common::types::{FaceId, NodeId};

#[derive(Debug, Clone)]
pub enum Envelope {
    Interest {
        to: NodeId,
        interest: InterestMessage,
    },
    Data {
        to: NodeId,
        data: DataMessage,
    },
    /// Undo a dynamic FIB installation on `router`.
    EraseRoutingInfo {
        router: NodeId,
        prefix: Name,
        faces: Vec<FaceId>,
        metric: f32,
    },
    /// Ask `router` to cache `data`.
    CacheAt { router: NodeId, data: DataMessage },
}

#[derive(Debug, Default)]
pub struct Outbox {
    envelopes: Vec<Envelope>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_interest(&mut self, to: NodeId, interest: InterestMessage) {
        self.envelopes.push(Envelope::Interest { to, interest });
    }

    pub fn send_data(&mut self, to: NodeId, data: DataMessage) {
        self.envelopes.push(Envelope::Data { to, data });
    }

    pub fn erase_routing_info(&mut self, router: NodeId, prefix: Name, faces: Vec<FaceId>, metric: f32) {
        self.envelopes.push(Envelope::EraseRoutingInfo {
            router,
            prefix,
            faces,
            metric,
        });
    }

    pub fn cache_at(&mut self, router: NodeId, data: DataMessage) {
        self.envelopes.push(Envelope::CacheAt { router, data });
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    /// Envelopes in the order they were queued.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Envelope> {
        self.envelopes.drain(..)
    }

    pub fn into_envelopes(self) -> Vec<Envelope> {
        self.envelopes
    }
}
