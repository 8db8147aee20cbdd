//! Error types shared by every subsystem of the reconstruction engine.

pub mod types;
