use glam::Vec3;
use rustc_hash::FxHashMap;
use tracing::warn;
use voxfield_core::events::EventSender;
use voxfield_shared::coords::ChunkPos;
use voxfield_shared::mesh::ChunkGeometry;

/// Receiver of chunk geometry. Geometry is chunk-local; `offset` is the
/// world translation of the chunk origin.
pub trait GeometrySink {
    fn add_chunk_geometry(&mut self, pos: ChunkPos, offset: Vec3, geometry: &ChunkGeometry);
    fn remove_chunk_geometry(&mut self, pos: ChunkPos);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl GeometrySink for NullSink {
    fn add_chunk_geometry(&mut self, _pos: ChunkPos, _offset: Vec3, _geometry: &ChunkGeometry) {}

    fn remove_chunk_geometry(&mut self, _pos: ChunkPos) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedGeometry {
    pub offset: Vec3,
    pub geometry: ChunkGeometry,
}

/// Keeps the geometry currently submitted for every chunk.
#[derive(Debug, Default)]
pub struct RecordingSink {
    chunks: FxHashMap<ChunkPos, RecordedGeometry>,
    adds: usize,
    removes: usize,
    duplicate_adds: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pos: ChunkPos) -> Option<&RecordedGeometry> {
        self.chunks.get(&pos)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn adds(&self) -> usize {
        self.adds
    }

    pub fn removes(&self) -> usize {
        self.removes
    }

    /// Adds for a chunk whose previous geometry was never removed.
    pub fn duplicate_adds(&self) -> usize {
        self.duplicate_adds
    }

    pub fn total_triangles(&self) -> usize {
        self.chunks
            .values()
            .map(|recorded| recorded.geometry.triangle_count())
            .sum()
    }
}

impl GeometrySink for RecordingSink {
    fn add_chunk_geometry(&mut self, pos: ChunkPos, offset: Vec3, geometry: &ChunkGeometry) {
        self.adds += 1;
        let previous = self.chunks.insert(
            pos,
            RecordedGeometry {
                offset,
                geometry: geometry.clone(),
            },
        );
        if previous.is_some() {
            self.duplicate_adds += 1;
        }
    }

    fn remove_chunk_geometry(&mut self, pos: ChunkPos) {
        self.removes += 1;
        self.chunks.remove(&pos);
    }
}

#[derive(Debug, Clone)]
pub enum GeometryEvent {
    Upsert {
        pos: ChunkPos,
        offset: Vec3,
        geometry: ChunkGeometry,
    },
    Remove {
        pos: ChunkPos,
    },
}

/// Forwards geometry to a consumer thread, e.g. a renderer.
pub struct ChannelSink {
    sender: EventSender<GeometryEvent>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(sender: EventSender<GeometryEvent>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Events that could not be delivered because the consumer hung up.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn forward(&mut self, event: GeometryEvent) {
        if self.sender.send(event).is_err() {
            if self.dropped == 0 {
                warn!("Geometry consumer disconnected; dropping chunk geometry events");
            }
            self.dropped += 1;
        }
    }
}

impl GeometrySink for ChannelSink {
    fn add_chunk_geometry(&mut self, pos: ChunkPos, offset: Vec3, geometry: &ChunkGeometry) {
        self.forward(GeometryEvent::Upsert {
            pos,
            offset,
            geometry: geometry.clone(),
        });
    }

    fn remove_chunk_geometry(&mut self, pos: ChunkPos) {
        self.forward(GeometryEvent::Remove { pos });
    }
}
