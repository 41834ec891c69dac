pub mod error;
pub mod render;
pub mod settings;
pub mod world;

pub use error::{SettingsError, WorldError};
pub use render::{ChannelSink, GeometryEvent, GeometrySink, NullSink, RecordingSink};
pub use settings::WorldSettings;
pub use world::{LoadReport, WorldIndex};
