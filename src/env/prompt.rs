//! Operator prompts.

use std::collections::VecDeque;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt failed: {0}")]
    Terminal(#[from] dialoguer::Error),
    #[error("No answer left for prompt: {0}")]
    Exhausted(String),
}

/// Source of operator answers.
pub trait Prompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, PromptError>;

    /// Free text. An empty answer is returned as-is.
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String, PromptError>;

    /// Hidden input.
    fn secret(&mut self, prompt: &str) -> Result<String, PromptError>;
}

/// Interactive prompts on the controlling terminal.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self { theme: ColorfulTheme::default() }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string()).show_default(true);
        }
        Ok(input.interact_text()?.trim().to_string())
    }

    fn secret(&mut self, prompt: &str) -> Result<String, PromptError> {
        Ok(Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?)
    }
}

/// Answers prompts from a fixed list, as if typed.
///
/// Confirmations accept `y`/`yes`/`n`/`no`; an empty answer takes the
/// prompt's default.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    fn next(&mut self, prompt: &str) -> Result<String, PromptError> {
        self.asked.push(prompt.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| PromptError::Exhausted(prompt.to_string()))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        let answer = self.next(prompt)?.trim().to_lowercase();
        Ok(match answer.as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        })
    }

    fn input(&mut self, prompt: &str, _default: Option<&str>) -> Result<String, PromptError> {
        Ok(self.next(prompt)?.trim().to_string())
    }

    fn secret(&mut self, prompt: &str) -> Result<String, PromptError> {
        self.next(prompt)
    }
}
