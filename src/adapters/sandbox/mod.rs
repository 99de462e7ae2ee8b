//! Test sandbox adapters.

pub mod docker;

pub use docker::DockerSandbox;
