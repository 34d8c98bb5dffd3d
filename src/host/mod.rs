mod protocol;
mod reader;
mod renderer;

pub use protocol::{HostCommand, RenderAction, RenderRecord};
pub use reader::{spawn_command_reader, BackendSwitch, CommandHandler};
pub use renderer::JsonLinesRenderer;
