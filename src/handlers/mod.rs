// src/handlers/mod.rs
// DOCUMENTATION: Handlers module organization
// PURPOSE: Re-export handler components

pub mod admin;
pub mod categories;
pub mod farms;
pub mod health;
pub mod indexnow;
pub mod photos;
pub mod produce;
pub mod submissions;

pub use admin::config as admin_config;
pub use categories::config as categories_config;
pub use farms::config as farms_config;
pub use health::config as health_config;
pub use indexnow::config as indexnow_config;
pub use photos::config as photos_config;
pub use produce::config as produce_config;
pub use submissions::config as submissions_config;
