//! Host plumbing for running swarmgrid worlds outside a renderer.

pub mod cli;
pub mod host;

pub use cli::Cli;
pub use host::{HeadlessHost, HostOptions, RunSummary};
