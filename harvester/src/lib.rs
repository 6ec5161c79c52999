pub mod config;
#[allow(clippy::module_inception)]
mod harvester;
mod normalize;

pub use config::HarvesterConfig;
pub use harvester::{Error, Harvester, Phase, RunStats};
pub use normalize::Record;
