//! Injected prompt provider so selection and collection logic never reads the
//! terminal directly.
//!
//! The interactive loops built on top of this trait retry until valid input
//! arrives, capped at [`MAX_PROMPT_ATTEMPTS`]. The tool this replaces retried
//! forever; the cap exists so scripted and non-interactive callers cannot
//! spin.

use std::collections::VecDeque;
use std::io::{self, Write};

use anyhow::{Result, anyhow};
use rpassword::prompt_password;

/// Upper bound on retries for any single interactive question.
pub const MAX_PROMPT_ATTEMPTS: usize = 100;

pub trait Prompt {
    /// Ask a question and return the (trimmed) answer.
    fn text(&mut self, msg: &str) -> Result<String>;

    /// Ask for a secret without echoing it back.
    fn secret(&mut self, msg: &str) -> Result<String>;
}

/// Prompt provider backed by stdin/stdout.
#[derive(Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn text(&mut self, msg: &str) -> Result<String> {
        print!("{msg}");
        io::stdout().flush()?;
        let mut buffer = String::new();
        io::stdin().read_line(&mut buffer)?;
        Ok(buffer.trim().to_string())
    }

    fn secret(&mut self, msg: &str) -> Result<String> {
        let input = prompt_password(msg).map_err(|err| anyhow!("read secret: {err}"))?;
        Ok(input.trim().to_string())
    }
}

/// Prompt provider fed from a fixed queue of answers. Used by tests and by
/// non-interactive callers; answering more questions than were scripted is an
/// error rather than a hang.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }

    fn next(&mut self, msg: &str) -> Result<String> {
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("scripted prompt has no answer for: {msg}"))
    }
}

impl Prompt for ScriptedPrompt {
    fn text(&mut self, msg: &str) -> Result<String> {
        self.next(msg)
    }

    fn secret(&mut self, msg: &str) -> Result<String> {
        self.next(msg)
    }
}
