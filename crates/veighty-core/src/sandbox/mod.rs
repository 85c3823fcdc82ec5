pub mod filename;
pub mod sandbox;

pub use filename::SandboxName;
pub use sandbox::Sandbox;
