pub mod renderers;
pub mod tools;

pub use renderers::{JsonlRendererPlugin, TextRendererPlugin};
pub use tools::{EchoTool, ShellTool, ToolRegistry};
