//! Terminal prompts for interactive runs.

use std::io::{self, BufRead, StdinLock, Stderr, Write};

use veil_transform::Decider;

/// Asks questions on a writer and reads numbered answers from a reader.
///
/// An empty answer picks the first option; end of input or an I/O error
/// does the same so unattended runs never block.
pub struct TerminalDecider<R, W> {
    input: R,
    output: W,
}

impl TerminalDecider<StdinLock<'static>, Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalDecider<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, prompt: &str, options: &[String]) -> io::Result<usize> {
        writeln!(self.output)?;
        writeln!(self.output, "{prompt}")?;
        for (index, option) in options.iter().enumerate() {
            writeln!(self.output, "  [{index}] {option}")?;
        }
        loop {
            write!(self.output, "Choice [0]: ")?;
            self.output.flush()?;
            let mut answer = String::new();
            if self.input.read_line(&mut answer)? == 0 {
                return Ok(0);
            }
            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(0);
            }
            match answer.parse::<usize>() {
                Ok(choice) if choice < options.len() => return Ok(choice),
                _ => writeln!(self.output, "Enter a number between 0 and {}.", options.len() - 1)?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Decider for TerminalDecider<R, W> {
    fn decide(&mut self, prompt: &str, options: &[String]) -> usize {
        if options.is_empty() {
            return 0;
        }
        self.ask(prompt, options).unwrap_or(0)
    }
}
