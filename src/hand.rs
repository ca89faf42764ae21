//! Hand landmarks, gesture classification, palm detection and the landmark network.

pub mod gesture;
pub mod landmark;
pub mod network;
pub mod palm;
