//! Text output formatting with colors.

use portico_fetch::CircuitState;

use super::json::{BreakerOutput, LoginOutput};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Formats a chat reply.
    pub fn format_chat(&self, model_label: &str, reply: &str) -> String {
        format!("{}\n{}", self.bold(&format!("{model_label}:")), reply)
    }

    /// Formats a login summary.
    pub fn format_login(&self, login: &LoginOutput) -> String {
        let access = if login.access {
            self.green("✓ portal access")
        } else {
            self.red("✗ no portal access")
        };

        let mut lines = vec![
            format!("{} {}", self.bold(&login.user), self.dim(&format!("@ {}", login.base_url))),
            format!("  Session:  {}", login.session_key),
            format!("  Since:    {}", login.created_at.format("%Y-%m-%d %H:%M:%S UTC")),
            format!("  Cookies:  {}", login.cookies.join(", ")),
            format!("  Access:   {access}"),
        ];

        if let Some(breakers) = &login.breakers {
            lines.push(String::new());
            lines.push(self.format_breakers(breakers));
        }
        lines.join("\n")
    }

    /// Formats the breaker table.
    pub fn format_breakers(&self, breakers: &[BreakerOutput]) -> String {
        if breakers.is_empty() {
            return self.dim("No breakers recorded");
        }

        let mut lines = vec![self.bold("Breakers")];
        for breaker in breakers {
            let state = match breaker.state {
                CircuitState::Closed => self.green("closed"),
                CircuitState::HalfOpen => self.yellow("half-open"),
                CircuitState::Open => self.red("open"),
            };
            lines.push(format!(
                "  {:<40} {} ({} failures)",
                breaker.key, state, breaker.failure_count
            ));
        }
        lines.join("\n")
    }

    /// Formats an error message.
    pub fn format_error(&self, error: &str) -> String {
        format!("{}: {}", self.red("Error"), error)
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}
