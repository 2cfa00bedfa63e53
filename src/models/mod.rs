// src/models/mod.rs
// DOCUMENTATION: Models module organization
// PURPOSE: Re-export model components

pub mod category;
pub mod farm;
pub mod photo;
pub mod produce;
pub mod submission;

pub use category::*;
pub use farm::*;
pub use photo::*;
pub use produce::*;
pub use submission::*;
