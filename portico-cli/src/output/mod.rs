//! Output formatting for CLI.

mod json;
mod text;

pub use json::{BreakerOutput, ChatOutput, JsonFormatter, LoginOutput};
pub use text::TextFormatter;
