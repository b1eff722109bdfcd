//! Console output formatting with ANSI color support.
//!
//! Provides styled terminal output with automatic TTY detection
//! and respect for the NO_COLOR environment variable.

use crate::sources::{Chapter, ChapterPage, Content, Highlight, PageSection};
use std::io::{self, IsTerminal};

/// ANSI style codes for terminal formatting.
#[derive(Debug, Clone, Copy)]
pub enum Style {
    Bold,
    Dim,
    Red,
    Green,
    Blue,
    Magenta,
    Cyan,
    Gray,
}

impl Style {
    /// Returns the ANSI escape code for this style.
    fn code(self) -> &'static str {
        match self {
            Style::Bold => "1",
            Style::Dim => "2",
            Style::Red => "31",
            Style::Green => "32",
            Style::Blue => "34",
            Style::Magenta => "35",
            Style::Cyan => "36",
            Style::Gray => "90",
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Console output handler with color support detection.
#[derive(Debug)]
pub struct Console {
    colors_enabled: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Creates a new Console instance, detecting color support.
    ///
    /// Colors are disabled if:
    /// - The `NO_COLOR` environment variable is set
    /// - stdout is not a terminal (TTY)
    pub fn new() -> Self {
        let colors_enabled = std::env::var("NO_COLOR").is_err() && io::stdout().is_terminal();

        Self { colors_enabled }
    }

    /// Creates a Console with colors explicitly enabled or disabled.
    pub fn with_colors(enabled: bool) -> Self {
        Self {
            colors_enabled: enabled,
        }
    }

    /// Applies ANSI styles to text if colors are enabled.
    pub fn style(&self, text: &str, styles: &[Style]) -> String {
        if !self.colors_enabled || styles.is_empty() {
            return text.to_string();
        }

        let codes: Vec<&str> = styles.iter().map(|s| s.code()).collect();
        format!("\x1b[{}m{}{}", codes.join(";"), text, RESET)
    }

    /// Creates a colored label like `[INFO]`.
    pub fn label(&self, label: &str, color: Style) -> String {
        let styled = self.style(label, &[color, Style::Bold]);
        format!("[{}]", styled)
    }

    /// Prints an info message with blue `[INFO]` label.
    pub fn info(&self, message: &str) {
        println!("{} {}", self.label("INFO", Style::Blue), message);
    }

    /// Prints a success message with green `[OK]` label.
    pub fn success(&self, message: &str) {
        println!("{} {}", self.label("OK", Style::Green), message);
    }

    /// Prints an error message with red `[ERROR]` label.
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", self.label("ERROR", Style::Red), message);
    }

    /// Prints a section header in magenta bold.
    pub fn section(&self, message: &str) {
        println!();
        println!("{}", self.style(message, &[Style::Magenta, Style::Bold]));
    }

    /// Returns text styled as muted (dim gray).
    pub fn muted(&self, text: &str) -> String {
        self.style(text, &[Style::Gray, Style::Dim])
    }

    /// Formats one search or browse result as a single line.
    pub fn highlight_line(&self, item: &Highlight) -> String {
        let mut line = format!(
            "{}  {}",
            self.style(&item.title, &[Style::Bold]),
            self.muted(&item.id)
        );
        if let Some(subtitle) = item.subtitle.as_deref().filter(|s| !s.is_empty()) {
            line.push_str(&format!("\n    {}", subtitle));
        }
        line
    }

    /// Prints a list of results, numbered from 1.
    pub fn highlights(&self, items: &[Highlight]) {
        for (i, item) in items.iter().enumerate() {
            println!("{:>3}. {}", i + 1, self.highlight_line(item));
        }
    }

    /// Prints a home page section with its items.
    pub fn page_section(&self, section: &PageSection) {
        self.section(&format!("{} ({:?})", section.title, section.style));
        self.highlights(&section.items);
    }

    /// Prints series metadata.
    pub fn content(&self, content: &Content) {
        self.section(&content.title);
        if !content.creators.is_empty() {
            println!("By {}", content.creators.join(", "));
        }
        if let Some(status) = content.status {
            println!("Status: {:?}", status);
        }
        if !content.tags.is_empty() {
            println!("Tags: {}", self.muted(&content.tags.join(", ")));
        }
        println!("Cover: {}", self.muted(&content.cover));
        println!();
        println!("{}", content.summary);
    }

    /// Formats one chapter as a single line.
    pub fn chapter_line(&self, chapter: &Chapter) -> String {
        let number = self.style(&format_number(chapter.number), &[Style::Cyan, Style::Bold]);
        let mut line = format!("Ch. {} {}", number, chapter.title);
        if chapter.page_count > 0 {
            line.push_str(&format!(" ({} pages)", chapter.page_count));
        }
        format!(
            "{}  {}",
            line,
            self.muted(&format!(
                "{} {}",
                chapter.date.format("%Y-%m-%d"),
                chapter.chapter_id
            ))
        )
    }

    pub fn chapters(&self, chapters: &[Chapter]) {
        for chapter in chapters {
            println!("{}", self.chapter_line(chapter));
        }
    }

    /// Prints chapter page images, one URL per line.
    pub fn pages(&self, pages: &[ChapterPage]) {
        for (i, page) in pages.iter().enumerate() {
            let size = match (page.width, page.height) {
                (Some(w), Some(h)) => self.muted(&format!(" {}x{}", w, h)),
                _ => String::new(),
            };
            println!("{:>3}. {}{}", i + 1, page.url, size);
        }
    }

    /// Formats a count with styling.
    pub fn count(&self, n: usize) -> String {
        self.style(&n.to_string(), &[Style::Green, Style::Bold])
    }
}

/// Chapter numbers print without a trailing `.0` when whole.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}
