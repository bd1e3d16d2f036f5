/// Input side of the collector.
///
/// - `locations`  : the lamppost layer (GeoPackage or GeoJSON).
/// - `device_feed` : per-device CSV feeds over HTTP.

pub mod device_feed;
pub mod locations;
