//! Sources of integers for the `input` statement.
//!
//! Input is read like `scanf("%d")` reads it: one whitespace separated token at a time, so a
//! single line may answer several `input` statements.

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use anyhow::{bail, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub trait IntSource {
    /// Read the next integer
    ///
    /// Returns `Ok(None)` if the next token is not an integer or input is exhausted. That is
    /// recoverable; `Err` is not.
    fn read_int(&mut self, prompt: &str, sink: &mut dyn Write) -> Result<Option<i32>>;
}

/// Tokens left over from the last line read
#[derive(Default)]
struct Tokens {
    pending: VecDeque<String>,
}

impl Tokens {
    fn feed(&mut self, line: &str) {
        self.pending
            .extend(line.split_whitespace().map(str::to_string));
    }

    fn next_int(&mut self) -> Option<Option<i32>> {
        self.pending.pop_front().map(|tok| tok.parse::<i32>().ok())
    }
}

/// Reads integers from any buffered reader. The prompt goes to the evaluator's sink.
pub struct ReaderInput<R: BufRead> {
    reader: R,
    tokens: Tokens,
}

impl<R: BufRead> ReaderInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            tokens: Tokens::default(),
        }
    }
}

impl<R: BufRead> IntSource for ReaderInput<R> {
    fn read_int(&mut self, prompt: &str, sink: &mut dyn Write) -> Result<Option<i32>> {
        write!(sink, "{}", prompt)?;
        sink.flush()?;

        loop {
            if let Some(val) = self.tokens.next_int() {
                return Ok(val);
            }

            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.tokens.feed(&line);
        }
    }
}

/// Reads integers through a line editor when a human is at the terminal
pub struct EditorInput {
    editor: DefaultEditor,
    tokens: Tokens,
}

impl EditorInput {
    pub fn new() -> Result<Self> {
        let editor = match DefaultEditor::new() {
            Ok(e) => e,
            Err(e) => bail!("Failed to init line editor: {}", e),
        };

        Ok(Self {
            editor,
            tokens: Tokens::default(),
        })
    }
}

impl IntSource for EditorInput {
    fn read_int(&mut self, prompt: &str, sink: &mut dyn Write) -> Result<Option<i32>> {
        // Anything the program wrote so far must show up before the prompt
        sink.flush()?;

        loop {
            if let Some(val) = self.tokens.next_int() {
                return Ok(val);
            }

            match self.editor.readline(prompt) {
                Ok(line) => self.tokens.feed(&line),
                Err(ReadlineError::Eof) => return Ok(None),
                Err(ReadlineError::Interrupted) => bail!("Interrupted"),
                Err(e) => bail!("Failed to read input: {}", e),
            }
        }
    }
}

#[test]
fn test_reader_tokens() {
    let data = "12 -3\n\n  7\nabc 5\n";
    let mut input = ReaderInput::new(data.as_bytes());
    let mut prompts = Vec::new();

    assert_eq!(input.read_int("input: ", &mut prompts).unwrap(), Some(12));
    assert_eq!(input.read_int("input: ", &mut prompts).unwrap(), Some(-3));
    assert_eq!(input.read_int("input: ", &mut prompts).unwrap(), Some(7));
    assert_eq!(input.read_int("input: ", &mut prompts).unwrap(), None);
    assert_eq!(input.read_int("input: ", &mut prompts).unwrap(), Some(5));
    assert_eq!(input.read_int("input: ", &mut prompts).unwrap(), None);

    assert_eq!(
        String::from_utf8(prompts).expect("Output not utf-8"),
        "input: ".repeat(6)
    );
}

#[test]
fn test_reader_overflowing_token() {
    let mut input = ReaderInput::new("99999999999\n".as_bytes());
    let mut sink = Vec::new();

    assert_eq!(input.read_int("", &mut sink).unwrap(), None);
}
