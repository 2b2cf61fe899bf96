//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the research-loop CLI.

use crate::research::models::Report;
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the banner line
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n  {} {}\n",
                "research-loop".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n  research-loop v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "✓".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Prompt for confirmation (returns true if user confirms)
    pub fn confirm(&self, message: &str) -> bool {
        if self.colored {
            print!(
                "  {} {} [y/N]: ",
                "?".bright_yellow().bold(),
                message.bright_white()
            );
        } else {
            print!("  [?] {} [y/N]: ", message);
        }

        io::stdout().flush().ok();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_ok() {
            let input = input.trim().to_lowercase();
            input == "y" || input == "yes"
        } else {
            false
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header = table_line(columns);
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 16).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 16));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        println!("    {}", table_line(values));
    }

    /// Print a full report
    pub fn report(&self, report: &Report) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        render_report(&mut handle, report, self.colored).ok();
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

fn table_line(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("{:<15}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write a human-readable rendering of `report`.
pub fn render_report<W: Write>(out: &mut W, report: &Report, colored: bool) -> io::Result<()> {
    if colored {
        writeln!(out, "\n  {}", report.title.bright_white().bold().underline())?;
    } else {
        writeln!(out, "\n  === {} ===", report.title)?;
    }

    if !report.executive_summary.is_empty() {
        writeln!(out, "\n  {}", report.executive_summary)?;
    }

    for section in &report.sections {
        if colored {
            writeln!(out, "\n  {}", section.title.cyan().bold())?;
        } else {
            writeln!(out, "\n  --- {} ---", section.title)?;
        }
        writeln!(out, "  {}", section.body)?;
        if !section.citations.is_empty() {
            let refs = section
                .citations
                .iter()
                .map(|id| format!("[{}]", id))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "  Sources: {}", refs)?;
        }
    }

    if !report.conclusions.is_empty() {
        if colored {
            writeln!(out, "\n  {}", "Conclusions".cyan().bold())?;
        } else {
            writeln!(out, "\n  --- Conclusions ---")?;
        }
        writeln!(out, "  {}", report.conclusions)?;
    }

    if !report.citations.is_empty() {
        if colored {
            writeln!(out, "\n  {}", "References".cyan().bold())?;
        } else {
            writeln!(out, "\n  --- References ---")?;
        }
        for citation in &report.citations {
            writeln!(out, "    [{}] {} <{}>", citation.id, citation.title, citation.url)?;
        }
    }

    writeln!(
        out,
        "\n  {} sources, {} sub-queries, iteration {}",
        report.metadata.source_count,
        report.metadata.sub_query_count,
        report.metadata.iteration_count
    )
}
