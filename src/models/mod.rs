pub mod event;
pub mod geo;
pub mod travel;

pub use event::{Event, EventInfo, ValidationError};
pub use geo::{GeoDistance, GeoPoint, TimedGeoPoint};
pub use travel::{RelatedAccessInfo, RelatedEventInfo, SuspiciousTravelResult};
