// src/utils/mod.rs

pub mod de;
pub mod identity;
pub mod token;
