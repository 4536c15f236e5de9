// src/services/mod.rs

pub mod attempts;
pub mod normalizer;
pub mod notifier;
pub mod results;
pub mod scoring;
pub mod submission;
