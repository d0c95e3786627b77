pub mod executor;
pub mod renderer;

pub use executor::*;
pub use renderer::*;
