//! Terminal colors for CLI output.
//!
//! Everything degrades to plain text when `NO_COLOR` is set or stdout is not
//! a terminal.

use console::Style;
use owo_colors::{AnsiColors, OwoColorize};
use std::sync::LazyLock;

/// Shared theme instance.
pub static THEME: LazyLock<Theme> = LazyLock::new(Theme::default);

#[derive(Debug, Clone)]
pub struct Theme {
    pub success: Style,
    pub error: Style,
    pub warning: Style,
    /// Titles and section headers
    pub header: Style,
    pub dim: Style,
    pub path: Style,
    pub number: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            success: Style::new().green().bright(),
            error: Style::new().red().bright(),
            warning: Style::new().yellow().bright(),
            header: Style::new().cyan().bold(),
            dim: Style::new().dim(),
            path: Style::new().magenta(),
            number: Style::new().cyan(),
        }
    }
}

impl Theme {
    pub fn success_with_icon(&self, text: &str) -> String {
        self.with_icon("✓", AnsiColors::Green, &self.success, text)
    }

    pub fn error_with_icon(&self, text: &str) -> String {
        self.with_icon("✗", AnsiColors::Red, &self.error, text)
    }

    pub fn warning_with_icon(&self, text: &str) -> String {
        self.with_icon("⚠", AnsiColors::Yellow, &self.warning, text)
    }

    fn with_icon(&self, icon: &str, color: AnsiColors, style: &Style, text: &str) -> String {
        if Self::should_disable_colors() {
            format!("{icon} {text}")
        } else {
            format!("{} {}", icon.color(color), style.apply_to(text))
        }
    }

    /// A topic label preceded by a dot in the topic's palette color.
    pub fn topic_swatch(&self, color: &str, label: &str) -> String {
        let rgb = color.strip_prefix('#').filter(|h| h.len() == 6).and_then(|h| {
            let channel = |i: usize| u8::from_str_radix(h.get(i..i + 2)?, 16).ok();
            Some((channel(0)?, channel(2)?, channel(4)?))
        });

        match rgb {
            Some((r, g, b)) if !Self::should_disable_colors() => {
                format!("{} {label}", "●".truecolor(r, g, b))
            }
            _ => format!("● {label}"),
        }
    }

    pub fn should_disable_colors() -> bool {
        use is_terminal::IsTerminal;
        std::env::var("NO_COLOR").is_ok() || !std::io::stdout().is_terminal()
    }

    /// Style `text` unless colors are disabled.
    pub fn apply<T: std::fmt::Display>(&self, style: &Style, text: T) -> String {
        if Self::should_disable_colors() {
            text.to_string()
        } else {
            style.apply_to(text).to_string()
        }
    }
}
