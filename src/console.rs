//! Interactive console menu
//!
//! One round per invocation: pick single or batch mapping, answer the
//! prompt, get the result. Anything other than `1` or `2` quits.

use crate::batch::run_batch;
use crate::config::{DEFAULT_INPUT_CSV, DEFAULT_OUTPUT_CSV};
use crate::error::Result;
use crate::mapping::ConceptMapper;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Single,
    Batch,
    Quit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "1" => MenuChoice::Single,
            "2" => MenuChoice::Batch,
            _ => MenuChoice::Quit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MenuOptions {
    /// Used when the batch filename prompt is left blank
    pub default_input: PathBuf,
    pub output: PathBuf,
}

impl Default for MenuOptions {
    fn default() -> Self {
        Self {
            default_input: PathBuf::from(DEFAULT_INPUT_CSV),
            output: PathBuf::from(DEFAULT_OUTPUT_CSV),
        }
    }
}

pub struct ConsoleMenu<'a, R, W> {
    mapper: &'a dyn ConceptMapper,
    input: R,
    out: W,
    options: MenuOptions,
}

impl<'a, R: BufRead, W: Write> ConsoleMenu<'a, R, W> {
    pub fn new(mapper: &'a dyn ConceptMapper, input: R, out: W) -> Self {
        Self {
            mapper,
            input,
            out,
            options: MenuOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MenuOptions) -> Self {
        self.options = options;
        self
    }

    /// Show the menu once and run the chosen action.
    pub async fn run(&mut self) -> Result<MenuChoice> {
        writeln!(self.out, "1. Single mapping\n2. Batch mapping (CSV)\n0. Quit")?;
        let choice = MenuChoice::parse(&self.prompt("Choose: ")?);

        match choice {
            MenuChoice::Single => self.single().await?,
            MenuChoice::Batch => self.batch().await?,
            MenuChoice::Quit => {}
        }
        Ok(choice)
    }

    async fn single(&mut self) -> Result<()> {
        let term = self.prompt("Enter clinical term to map: ")?;
        let result = self.mapper.map_term(&term).await?;
        writeln!(self.out, "Mapping Result: {}", serde_json::to_string_pretty(&result)?)?;
        Ok(())
    }

    async fn batch(&mut self) -> Result<()> {
        let answer = self.prompt(&format!(
            "Input CSV filename (default: {}): ",
            self.options.default_input.display()
        ))?;
        let input = if answer.is_empty() {
            self.options.default_input.clone()
        } else {
            PathBuf::from(answer)
        };

        let summary = run_batch(self.mapper, &input, &self.options.output).await?;
        writeln!(self.out, "Done! See {}.", summary.output.display())?;
        Ok(())
    }

    /// Print `label`, then read one trimmed line. EOF reads as empty.
    fn prompt(&mut self, label: &str) -> Result<String> {
        write!(self.out, "{}", label)?;
        self.out.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}
