pub mod config;
pub mod estimator;
pub mod geometry;
pub mod io;
pub mod system;
pub mod target;
pub mod tracking;
