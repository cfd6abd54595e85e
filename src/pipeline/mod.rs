pub mod extraction;
pub mod analysis; // Content statistics over a successful result
pub mod export; // CareTend and JSON renderings
