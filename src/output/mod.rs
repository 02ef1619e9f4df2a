//! Output formatting for the terminal front-end
//!
//! Colored and plain renderers share one trait so the application picks a
//! formatter once and never checks color support again.

mod colored;
mod formatter;

pub use colored::{tier_color, ColoredFormatter};
pub use formatter::{
    align_text, create_table, progress_bar, Alignment, Column, FormattingOptions, OutputFormatter,
    PlainFormatter, RowData,
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..FormattingOptions::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true)
    }
}
