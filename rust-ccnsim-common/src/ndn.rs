//! Named-data message records.
//!
//! This module provides the Interest and Data records exchanged between
//! simulated nodes, together with the hierarchical names they carry. The
//! records hold routing metadata only; there is no wire encoding.

use crate::error::Error;
use crate::types::{FaceId, NodeId, PacketId, DEFAULT_INTEREST_TTL};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;


/// Minimum number of components a name needs for face-cost computation.
pub const MIN_ROUTABLE_COMPONENTS: usize = 3;

/// Represents a name component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    /// Creates a new name component from a byte slice.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the component as bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Parses the component as an unsigned decimal number.
    pub fn as_number(&self) -> Option<u32> {
        std::str::from_utf8(&self.0).ok()?.parse().ok()
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Print printable ASCII characters directly, otherwise use hex
        if self.0.iter().all(|&b| b.is_ascii_graphic() || b == b' ') {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "0x")?;
            for &b in self.0.iter() {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

/// A hierarchical name: top-level prefix first, chunk sequence last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// Creates a new empty name.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Creates a name from a string representation with '/' as component separator.
    ///
    /// Leading, trailing and repeated separators are ignored, so `p/x/3` and
    /// `/p/x/3` are the same name.
    pub fn from_string(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(|comp| NameComponent::new(comp.as_bytes().to_vec()))
            .collect();

        Self { components }
    }

    /// Like [`Name::from_string`], but rejects names without any component.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let name = Self::from_string(s);
        if name.is_empty() {
            return Err(Error::InvalidName(format!("'{}' has no components", s)));
        }
        Ok(name)
    }

    /// Adds a component to the name.
    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Returns a copy of this name with one more component appended.
    pub fn child(&self, component: impl fmt::Display) -> Self {
        let mut name = self.clone();
        name.push(NameComponent::new(component.to_string().into_bytes()));
        name
    }

    /// Returns the number of components in the name.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the name has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns an iterator over the name components.
    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    /// Gets a component at the specified index.
    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// Returns a prefix of this name with the specified length.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// The top-level prefix as a one-component name, used as static FIB key.
    pub fn top_level(&self) -> Option<Name> {
        self.components.first().map(|c| Name {
            components: vec![c.clone()],
        })
    }

    /// The name with its last component removed. Dynamic FIB entries and
    /// content store statistics are keyed by this form.
    pub fn trim_last(&self) -> Self {
        self.prefix(self.len().saturating_sub(1))
    }

    /// Total chunk count carried in the penultimate component.
    pub fn chunk_count(&self) -> Option<u32> {
        if self.len() < 2 {
            return None;
        }
        self.components[self.len() - 2].as_number()
    }

    /// Checks if this name is a prefix of another name.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }

        self.components
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a == b)
    }

    /// Renders the name without the leading separator, e.g. `p/x/3`.
    pub fn to_path(&self) -> String {
        self.components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }

        for component in &self.components {
            write!(f, "/{}", component)?;
        }

        Ok(())
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::from_string(s)
    }
}

/// Kind of an Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterestType {
    /// First attempt along a path.
    Normal,
    /// Retry after an upstream NACK or a detected loop.
    Nack,
}

/// Kind of a Data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Content that may still be cached on the way back.
    Normal,
    /// Content that must not be cached again.
    NoCache,
    /// Negative acknowledgement; carries no content.
    Nack,
}

/// A request for a named chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestMessage {
    /// The requested name.
    pub name: Name,

    /// Remaining time-to-live. Carried, never enforced.
    pub ttl: u32,

    /// Number of hand-offs so far.
    pub hop_count: u32,

    /// Hops traveled from the requester.
    pub current_router_dist: i32,

    /// Distance of the best caching candidate seen so far.
    pub caching_router_dist: i32,

    /// Hash of the best caching candidate.
    pub caching_router_hash: f64,

    /// Weight of the best caching candidate.
    pub caching_router_weight: f64,

    /// Node the Interest was last sent from.
    pub arrival_face: FaceId,

    /// Faces that must not be chosen again.
    pub unavailable_faces: BTreeSet<FaceId>,

    pub interest_type: InterestType,

    /// Unset until the requester assigns one.
    pub id: Option<PacketId>,
}

impl InterestMessage {
    /// Creates a new normal Interest arriving from `arrival_face`.
    pub fn new(name: Name, arrival_face: FaceId) -> Self {
        Self {
            name,
            ttl: DEFAULT_INTEREST_TTL,
            hop_count: 0,
            current_router_dist: 0,
            caching_router_dist: 0,
            caching_router_hash: 0.0,
            caching_router_weight: 0.0,
            arrival_face,
            unavailable_faces: BTreeSet::new(),
            interest_type: InterestType::Normal,
            id: None,
        }
    }

    /// Sets the packet id.
    pub fn with_id(mut self, id: PacketId) -> Self {
        self.id = Some(id);
        self
    }

    /// Marks a face as not selectable.
    pub fn with_unavailable_face(mut self, face: FaceId) -> Self {
        self.unavailable_faces.insert(face);
        self
    }

    /// Sets the Interest type.
    pub fn with_type(mut self, interest_type: InterestType) -> Self {
        self.interest_type = interest_type;
        self
    }

    pub fn is_nack(&self) -> bool {
        self.interest_type == InterestType::Nack
    }

    pub fn increase_hop_count(&mut self) {
        self.hop_count += 1;
    }

    pub fn increase_current_router_dist(&mut self) {
        self.current_router_dist += 1;
    }
}

/// Interests are the same request when they name the same chunk.
impl PartialEq for InterestMessage {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for InterestMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Interest {} ({:?}, hops {}, dist {}/{}, from {})",
            self.name,
            self.interest_type,
            self.hop_count,
            self.current_router_dist,
            self.caching_router_dist,
            self.arrival_face
        )
    }
}

/// A dynamic FIB installation made on behalf of a Data object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantRouter {
    /// Router holding the dynamic FIB entry.
    pub router: NodeId,
    /// Faces added to that entry.
    pub faces: Vec<FaceId>,
    /// Metric they were added with.
    pub metric: f32,
}

/// A response to an Interest, carrying content or a denial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataMessage {
    pub name: Name,

    /// Opaque content.
    pub payload: Bytes,

    /// Nominal size charged against content store capacity.
    pub size: usize,

    pub current_router_dist: i32,

    pub caching_router_dist: i32,

    /// Node the Data was last sent from.
    pub arrival_face: FaceId,

    pub hop_count: u32,

    pub data_type: DataType,

    /// Dynamic FIB entries installed along the path for this object.
    pub relevant_routers: Vec<RelevantRouter>,

    /// Router that cached the object on the way back, if any.
    pub caching_router_id: Option<NodeId>,

    /// Content store hits while resident.
    pub reuse_count: u64,

    pub weight: f64,

    pub id: Option<PacketId>,
}

impl DataMessage {
    /// Creates a new normal Data whose size is its name plus payload length.
    pub fn new(name: Name, payload: impl Into<Bytes>, arrival_face: FaceId) -> Self {
        let payload = payload.into();
        let size = name.to_path().len() + payload.len();
        Self {
            name,
            payload,
            size,
            current_router_dist: 0,
            caching_router_dist: 0,
            arrival_face,
            hop_count: 0,
            data_type: DataType::Normal,
            relevant_routers: Vec::new(),
            caching_router_id: None,
            reuse_count: 0,
            weight: 0.0,
            id: None,
        }
    }

    /// Creates a NACK for `name` answering Interest `id`.
    pub fn nack(name: Name, arrival_face: FaceId, hop_count: u32, id: Option<PacketId>) -> Self {
        let mut data = Self::new(name, Bytes::new(), arrival_face);
        data.data_type = DataType::Nack;
        data.hop_count = hop_count;
        data.id = id;
        data
    }

    /// Sets the nominal size.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Sets the distance pair.
    pub fn with_distances(mut self, current: i32, caching: i32) -> Self {
        self.current_router_dist = current;
        self.caching_router_dist = caching;
        self
    }

    /// Sets the Data type.
    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn is_nack(&self) -> bool {
        self.data_type == DataType::Nack
    }

    pub fn increase_hop_count(&mut self) {
        self.hop_count += 1;
    }

    pub fn decrease_current_router_dist(&mut self) {
        self.current_router_dist -= 1;
    }

    pub fn insert_relevant_router(&mut self, router: NodeId, faces: Vec<FaceId>, metric: f32) {
        self.relevant_routers.push(RelevantRouter {
            router,
            faces,
            metric,
        });
    }

    pub fn clear_relevant_routers(&mut self) {
        self.relevant_routers.clear();
    }
}

impl fmt::Display for DataMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Data {} ({:?}, {} bytes, hops {}, dist {}/{}, from {})",
            self.name,
            self.data_type,
            self.size,
            self.hop_count,
            self.current_router_dist,
            self.caching_router_dist,
            self.arrival_face
        )
    }
}
