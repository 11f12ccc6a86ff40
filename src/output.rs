//! # Output Configuration
//!
//! Controls how the CLI decorates what it prints. Colors and status markers
//! follow the `--color` flag; in `auto` mode the environment decides:
//! - `NO_COLOR` set (any value) disables colors (https://no-color.org/)
//! - `CLICOLOR=0` disables colors
//! - `CLICOLOR_FORCE=1` forces colors even when stdout is not a TTY
//! - `TERM=dumb` disables colors
//!
//! The decision is pushed into `console` so every `console::style` call
//! respects it.

use std::env;

use clap::ValueEnum;
use console::{style, StyledObject};

/// Value of the `--color` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// Resolved output settings.
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    pub fn new(choice: ColorChoice) -> Self {
        let use_color = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => detect_color_support(),
        };
        Self { use_color }
    }

    /// Make `console` follow this configuration.
    pub fn apply(&self) {
        console::set_colors_enabled(self.use_color);
        console::set_colors_enabled_stderr(self.use_color);
    }

    /// A status marker: the symbol with colors on, the plain tag without.
    pub fn marker<'a>(&self, symbol: &'a str, plain: &'a str) -> &'a str {
        if self.use_color {
            symbol
        } else {
            plain
        }
    }

    pub fn heading<'a>(&self, text: &'a str) -> StyledObject<&'a str> {
        style(text).bold()
    }

    pub fn dim<D>(&self, value: D) -> StyledObject<D> {
        style(value).dim()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}

fn detect_color_support() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
        return true;
    }
    if env::var("TERM").is_ok_and(|v| v == "dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}
