//! Terminal presentation layer: input parsing and rendering.

pub mod command;
pub mod render;

pub use command::{Command, HELP, parse_command};
pub use render::{
    QUICK_PROMPTS, render_header, render_quick_prompts, render_screen, render_sidebar,
    render_thread,
};
