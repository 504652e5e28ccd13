#![forbid(unsafe_code)]

pub mod axis;
pub mod clock;
pub mod core;
pub mod data;
pub mod ease;
pub mod error;
pub mod geo;
pub mod map;
pub mod projection;
pub mod race;
pub mod reconcile;
pub mod scale;
pub mod trend;

pub use clock::{AnimationClock, PlayState, Player, SystemTimeSource, TimeSource};
pub use core::{Rgba8, Year, YearRange};
pub use data::{Dataset, Indices, Metric};
pub use ease::Ease;
pub use error::{ChartError, ChartResult};
pub use geo::{load_states, StateShapes};
pub use map::{MapFrame, MapView, ScrollMapView};
pub use projection::{EntityFilter, Mode};
pub use race::RaceView;
pub use trend::TrendView;
