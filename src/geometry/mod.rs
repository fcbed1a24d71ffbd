//! Geometry utilities: rigid-body poses and matrix-convention handling.

pub mod pose;

pub use pose::{MatrixLayout, Pose};
