// Wire and storage models

pub mod favorites;
pub mod helix;
pub mod stats;
