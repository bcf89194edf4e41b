//! Dynamic FIB.
//!
//! Maps a trimmed name to the faces behind which a cached copy is known to
//! live. Each face keeps a count-weighted running average of the distances it
//! was announced with, a reference count and a lifetime. Entries are added as
//! Data flows back and erased when the cached copy they point at is evicted.

use log::trace;
use rust_ccnsim_common::ndn::Name;
use rust_ccnsim_common::types::{FaceId, FIB_FACE_LIFETIME};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A face toward a cached copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceInfo {
    pub face: FaceId,
    /// Average distance to the copies announced through this face.
    pub metric: f32,
    /// Number of announcements averaged into `metric`.
    pub num: u32,
    pub lifetime: u32,
}

#[derive(Debug, Clone)]
pub struct DynamicFib {
    entries: HashMap<Name, BTreeMap<FaceId, FaceInfo>>,
    face_lifetime: u32,
}

impl DynamicFib {
    pub fn new(face_lifetime: u32) -> Self {
        Self {
            entries: HashMap::new(),
            face_lifetime,
        }
    }

    pub fn add_routing_info(&mut self, prefix: &Name, faces: &[FaceId], metric: f32) {
        let lifetime = self.face_lifetime;
        let entry = self.entries.entry(prefix.clone()).or_default();

        for &face in faces {
            match entry.get_mut(&face) {
                Some(info) => {
                    let num = info.num as f32;
                    info.metric = (info.metric * num + metric) / (num + 1.0);
                    info.num += 1;
                    info.lifetime = lifetime;
                }
                None => {
                    entry.insert(
                        face,
                        FaceInfo {
                            face,
                            metric,
                            num: 1,
                            lifetime,
                        },
                    );
                }
            }
            trace!("DFIB {} += {} (metric {})", prefix, face, metric);
        }
    }

    /// Undoes an [`add_routing_info`](Self::add_routing_info). Unknown prefixes and faces are ignored.
    pub fn erase_routing_info(&mut self, prefix: &Name, faces: &[FaceId], metric: f32) {
        let lifetime = self.face_lifetime;
        let Some(entry) = self.entries.get_mut(prefix) else {
            return;
        };

        for face in faces {
            let Some(info) = entry.get_mut(face) else {
                continue;
            };
            if info.num <= 1 {
                entry.remove(face);
            } else {
                let num = info.num as f32;
                info.metric = (info.metric * num - metric) / (num - 1.0);
                info.num -= 1;
                info.lifetime = lifetime;
            }
            trace!("DFIB {} -= {} (metric {})", prefix, face, metric);
        }

        if entry.is_empty() {
            self.entries.remove(prefix);
        }
    }

    /// Ages every face by `deviation`. Faces with less lifetime than that are
    /// dropped, as are prefixes left without faces.
    ///
    /// A face holding exactly `deviation` survives this tick at lifetime 0
    /// and goes on the next one; it is not dropped on the equal boundary.
    pub fn tick(&mut self, deviation: u32) {
        let aged: HashMap<Name, BTreeMap<FaceId, FaceInfo>> = self
            .entries
            .iter()
            .filter_map(|(prefix, faces)| {
                let kept: BTreeMap<FaceId, FaceInfo> = faces
                    .values()
                    .filter(|info| info.lifetime >= deviation)
                    .map(|info| {
                        let mut info = *info;
                        info.lifetime -= deviation;
                        (info.face, info)
                    })
                    .collect();
                (!kept.is_empty()).then(|| (prefix.clone(), kept))
            })
            .collect();
        self.entries = aged;
    }

    /// Faces for `prefix` in ascending face order; empty when unknown.
    pub fn query(&self, prefix: &Name) -> Vec<FaceInfo> {
        self.entries
            .get(prefix)
            .map(|faces| faces.values().copied().collect())
            .unwrap_or_default()
    }

    /// Number of prefixes with at least one face.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }
}

impl Default for DynamicFib {
    fn default() -> Self {
        Self::new(FIB_FACE_LIFETIME)
    }
}
