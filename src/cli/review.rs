//! Interactive review prompt
//!
//! [`TerminalReviewChannel`] shows a draft and reads one of
//!
//! - `a` / `approve`
//! - `r` / `reject`, then feedback and change requests (one per line, blank line ends)
//! - `q` / `abort`
//!
//! Unknown input re-prompts. End of input aborts.

use super::output::render_report;
use crate::research::models::Report;
use crate::research::review::{ReviewChannel, ReviewDecision};
use crate::types::{AppError, Result};
use owo_colors::OwoColorize;
use std::io::{self, BufRead, Write};

pub struct TerminalReviewChannel<R, W> {
    input: R,
    output: W,
    colored: bool,
}

impl TerminalReviewChannel<io::StdinLock<'static>, io::Stdout> {
    /// Review on the process's stdin and stdout.
    pub fn stdio(colored: bool) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), colored)
    }
}

impl<R: BufRead, W: Write> TerminalReviewChannel<R, W> {
    pub fn new(input: R, output: W, colored: bool) -> Self {
        Self {
            input,
            output,
            colored,
        }
    }

    /// `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn prompt(&mut self, message: &str) -> io::Result<()> {
        if self.colored {
            write!(self.output, "  {} {} ", "?".bright_yellow().bold(), message)?;
        } else {
            write!(self.output, "  [?] {} ", message)?;
        }
        self.output.flush()
    }

    fn read_rejection(&mut self) -> io::Result<ReviewDecision> {
        self.prompt("What should change?")?;
        let feedback = self.read_line()?.unwrap_or_default();

        writeln!(
            self.output,
            "  Specific change requests, one per line (blank line to finish):"
        )?;
        let mut change_requests = Vec::new();
        while let Some(line) = self.read_line()? {
            if line.is_empty() {
                break;
            }
            change_requests.push(line);
        }

        Ok(ReviewDecision::Reject {
            feedback,
            change_requests,
        })
    }

    fn ask(&mut self, session_id: &str, draft: &Report) -> io::Result<ReviewDecision> {
        writeln!(self.output, "\n  Review draft for session {}", session_id)?;
        render_report(&mut self.output, draft, self.colored)?;

        loop {
            self.prompt("[a]pprove, [r]eject with feedback, or [q] abort:")?;
            let Some(answer) = self.read_line()? else {
                return Ok(ReviewDecision::Abort);
            };
            match answer.to_lowercase().as_str() {
                "a" | "approve" => return Ok(ReviewDecision::Approve),
                "r" | "reject" => return self.read_rejection(),
                "q" | "abort" | "quit" => return Ok(ReviewDecision::Abort),
                _ => writeln!(self.output, "  Please answer a, r or q.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> ReviewChannel for TerminalReviewChannel<R, W> {
    fn review(&mut self, session_id: &str, draft: &Report) -> Result<ReviewDecision> {
        self.ask(session_id, draft)
            .map_err(|e| AppError::Internal(format!("review prompt: {}", e)))
    }
}
