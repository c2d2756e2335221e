//! Geometry utilities: centroids, measures, normals and containment tests.

pub mod metrics;

pub use metrics::Point;
