//! Bootstraps standalone console emulators: finds an installed build, pulls a
//! newer one from its release feed when needed, and launches it with the
//! content the frontend asked for.

pub mod cli;
pub mod config;
pub mod decision;
pub mod download;
pub mod error;
pub mod launch;
pub mod locator;
pub mod platform;
pub mod release;
pub mod resolver;
pub mod staging;
pub mod types;
pub mod version_store;


pub use error::{FetchError, LaunchError, StageError};
pub use resolver::{Launcher, Resolution};
