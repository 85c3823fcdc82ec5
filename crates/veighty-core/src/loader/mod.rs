pub mod loader;

pub use loader::{ProgramImage, ProgramLoader};
