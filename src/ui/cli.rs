use crate::ui::io::IO;
use crate::{MenuError, Note, NoteError, Result};
use colored::Colorize;
use log::trace;
use std::io::{self, BufRead, Write};
use tabled::{Table, Tabled, settings::Style};

pub struct Cli;

// One table row per note. Content is left out to keep rows short
#[derive(Tabled)]
struct NoteRow {
    id: String,
    title: String,
    #[tabled(rename = "type")]
    kind: String,
    marked: bool,
}

impl From<Note> for NoteRow {
    fn from(note: Note) -> Self {
        Self {
            id: note.id.unwrap_or_else(|| "-".to_string()),
            title: note.title,
            kind: note.kind.to_string(),
            marked: note.marked,
        }
    }
}

/// Reads one trimmed line from `reader`
///
/// # Errors
///
/// Returns `MenuError::StdinReadError` if reading fails or the input is closed
pub(crate) fn read_line(reader: &mut impl BufRead) -> Result<String> {
    let mut input = String::new();
    let read = reader
        .read_line(&mut input)
        .map_err(|e| NoteError::Menu(MenuError::StdinReadError(e)))?;
    if read == 0 {
        return Err(NoteError::Menu(MenuError::StdinReadError(
            io::ErrorKind::UnexpectedEof.into(),
        )));
    }

    let input = input.trim().to_string();
    trace!("Got input: {input}");
    Ok(input)
}

/// Reads lines from `reader` until a line equal to `stop_at` (trimmed) or the end of input,
/// calling `prompt` before each line. Returns the preceding lines joined by newlines
///
/// # Errors
///
/// Returns an error if `prompt` or reading fails
pub(crate) fn read_until(
    reader: &mut impl BufRead,
    stop_at: &str,
    mut prompt: impl FnMut() -> Result<()>,
) -> Result<String> {
    let mut input = String::new();
    loop {
        prompt()?;

        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| NoteError::Menu(MenuError::StdinReadError(e)))?;
        trace!("Got input: {}", line.trim_end());

        // EOF ends the text just like the sentinel does
        if read == 0 || line.trim() == stop_at {
            break;
        }
        input += &line;
    }
    Ok(input.trim_end().to_string())
}

fn prompt() -> Result<()> {
    print!("> ");
    io::stdout()
        .flush()
        .map_err(|e| NoteError::Menu(MenuError::StdoutWriteError(e)))
}

impl IO for Cli {
    /// Reads a single line of text, trims the trailing newline, and
    /// returns the resulting string.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to stdout or reading from stdin fails,
    /// or if stdin is closed.
    fn get_input(&self) -> Result<String> {
        prompt()?;
        let input = read_line(&mut io::stdin().lock())?;
        println!();
        Ok(input)
    }

    /// Reads lines from stdin until a line exactly matching `stop_at` (trimmed) is entered,
    /// concatenates the preceding lines and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to stdout or reading from stdin fails.
    fn get_input_until(&self, stop_at: &str) -> Result<String> {
        let input = read_until(&mut io::stdin().lock(), stop_at, prompt)?;
        println!();
        Ok(input)
    }

    fn show_menu(&self, options: &[impl std::fmt::Display]) {
        self.show_title("Choose an option");
        for o in options {
            println!("{o}");
        }
        println!();
    }

    /// Renders a titled table of notes in `psql` style to stdout.
    fn show_notes_list(&self, title: &str, notes: Vec<Note>) {
        self.show_title(title);
        if notes.is_empty() {
            println!("{}", "(empty)".dimmed());
            return;
        }
        let mut table = Table::new(notes.into_iter().map(NoteRow::from));
        table.with(Style::psql());
        println!("{table}");
    }

    fn show_title(&self, title: &str) {
        println!("\n{}\n", title.to_string().bold());
    }

    fn show_text(&self, msg: &str) {
        println!("{msg}");
    }
}
