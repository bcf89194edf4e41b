//! Pending Interest Table.
//!
//! One entry per outstanding name. Every arrival that is still waiting for an
//! answer is kept as a [`PitInfo`], together with the face the aggregated
//! Interest was sent upstream through.

use log::trace;
use rust_ccnsim_common::ndn::Name;
use rust_ccnsim_common::types::{FaceId, PacketId};
use std::collections::HashMap;

/// A downstream arrival waiting for the named object.
#[derive(Debug, Clone, PartialEq)]
pub struct PitInfo {
    /// Current-router-distance of the Interest at this node.
    pub distance: i32,
    pub hop_count: u32,
    pub arrival_face: FaceId,
    /// Id of the Interest, copied onto the Data sent back.
    pub interest_id: Option<PacketId>,
}

#[derive(Debug, Clone, Default)]
pub struct PitEntry {
    infos: Vec<PitInfo>,
    forwarding_face: Option<FaceId>,
}

impl PitEntry {
    pub fn infos(&self) -> &[PitInfo] {
        &self.infos
    }

    pub fn forwarding_face(&self) -> Option<FaceId> {
        self.forwarding_face
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pit {
    entries: HashMap<Name, PitEntry>,
}

impl Pit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the entry or appends to it. A supplied forwarding face overwrites the stored one.
    pub fn insert_or_merge(&mut self, name: &Name, info: PitInfo, forwarding_face: Option<FaceId>) {
        let entry = self.entries.entry(name.clone()).or_default();
        trace!(
            "PIT {} += arrival {} ({} pending)",
            name,
            info.arrival_face,
            entry.infos.len() + 1
        );
        entry.infos.push(info);
        if forwarding_face.is_some() {
            entry.forwarding_face = forwarding_face;
        }
    }

    pub fn exists(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &Name) -> Option<&PitEntry> {
        self.entries.get(name)
    }

    pub fn forwarding_face(&self, name: &Name) -> Option<FaceId> {
        self.entries.get(name)?.forwarding_face
    }

    /// Returns false when there is no entry for `name`.
    pub fn set_forwarding_face(&mut self, name: &Name, face: FaceId) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.forwarding_face = Some(face);
                true
            }
            None => false,
        }
    }

    /// Removes the entry and hands back every pending arrival.
    pub fn take_and_drop(&mut self, name: &Name) -> Vec<PitInfo> {
        self.entries
            .remove(name)
            .map(|entry| entry.infos)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ccnsim_common::types::NodeId;

    fn info(face: u32, id: u64) -> PitInfo {
        PitInfo {
            distance: 1,
            hop_count: 1,
            arrival_face: NodeId(face),
            interest_id: Some(PacketId(id)),
        }
    }

    #[test]
    fn test_aggregation() {
        let mut pit = Pit::new();
        let name = Name::from_string("p/x/3");

        for i in 0..5 {
            pit.insert_or_merge(&name, info(i, i as u64), None);
        }
        assert_eq!(pit.len(), 1);
        assert_eq!(pit.get(&name).unwrap().infos().len(), 5);

        let infos = pit.take_and_drop(&name);
        assert_eq!(infos.len(), 5);
        assert_eq!(infos[3].arrival_face, NodeId(3));
        assert!(!pit.exists(&name));
        assert!(pit.take_and_drop(&name).is_empty());
    }

    #[test]
    fn test_forwarding_face_only_overwritten_when_given() {
        let mut pit = Pit::new();
        let name = Name::from_string("p/x/3");

        pit.insert_or_merge(&name, info(1, 1), Some(NodeId(7)));
        pit.insert_or_merge(&name, info(2, 2), None);
        assert_eq!(pit.forwarding_face(&name), Some(NodeId(7)));

        pit.insert_or_merge(&name, info(3, 3), Some(NodeId(8)));
        assert_eq!(pit.forwarding_face(&name), Some(NodeId(8)));
    }

    #[test]
    fn test_set_forwarding_face() {
        let mut pit = Pit::new();
        let name = Name::from_string("p/x/3");

        assert!(!pit.set_forwarding_face(&name, NodeId(1)));
        assert_eq!(pit.forwarding_face(&name), None);

        pit.insert_or_merge(&name, info(1, 1), None);
        assert_eq!(pit.forwarding_face(&name), None);
        assert!(pit.set_forwarding_face(&name, NodeId(4)));
        assert_eq!(pit.forwarding_face(&name), Some(NodeId(4)));
    }
}
