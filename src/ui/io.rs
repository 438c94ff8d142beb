use crate::app::{NoteList, NoteStore};
use crate::setup::{arguments, logging};
use crate::ui::cli;
use crate::{CollectionId, MenuError, Note, NoteError, Result};

use log::{error, info, trace, warn};
use std::fmt;

/// Abstraction for input/output
pub trait IO {
    /// Read a trimmed line of input ending at newline
    ///
    /// # Errors
    ///
    /// Returns a `MenuError` if reading or prompting fails
    fn get_input(&self) -> Result<String>;
    /// Read multiple lines until a trimmed line equals `stop_at`
    ///
    /// # Errors
    ///
    /// Returns a `MenuError` if reading or prompting fails
    fn get_input_until(&self, stop_at: &str) -> Result<String>;
    /// Display a list of selectable options
    fn show_menu(&self, options: &[impl fmt::Display]);
    /// Display a bolded title
    fn show_title(&self, title: &str);
    /// Render a titled table of notes
    fn show_notes_list(&self, title: &str, notes: Vec<Note>);
    /// Print a plain text message
    fn show_text(&self, msg: &str);
}

/// Actions available in the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    List = 1,
    Create = 2,
    Edit = 3,
    ToggleMark = 4,
    Trash = 5,
    Restore = 6,
    Delete = 7,
    Quit = 8,
}

/// All menu options in display order
pub const ALL_MENU_OPTIONS: [MenuOption; 8] = [
    MenuOption::List,
    MenuOption::Create,
    MenuOption::Edit,
    MenuOption::ToggleMark,
    MenuOption::Trash,
    MenuOption::Restore,
    MenuOption::Delete,
    MenuOption::Quit,
];

/// Convert a numeric choice into a `MenuOption`
impl TryFrom<u8> for MenuOption {
    type Error = ();

    fn try_from(n: u8) -> std::result::Result<Self, Self::Error> {
        ALL_MENU_OPTIONS
            .into_iter()
            .find(|option| *option as u8 == n)
            .ok_or(())
    }
}

/// Show the option number and label, e.g. `(2) Create note`
impl fmt::Display for MenuOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::List => "List notes",
            Self::Create => "Create note",
            Self::Edit => "Edit note",
            Self::ToggleMark => "Mark/unmark note",
            Self::Trash => "Move note to trash",
            Self::Restore => "Restore note from trash",
            Self::Delete => "Delete note from trash",
            Self::Quit => "Quit",
        };
        write!(f, "({}) {}", *self as u8, label)
    }
}

/// Initialize logging, parse args, open the store and run the main menu loop
///
/// # Errors
///
/// Returns an error if the database cannot be opened or stdin/stdout fail
pub async fn run() -> Result<()> {
    let args = arguments::parse_args();
    logging::setup_log(args.log_level.into());

    let database = arguments::open_database(&args.backend)?;
    let store = NoteStore::new(database);
    let io = cli::Cli;

    let outcome = menu_loop(&io, &store).await;
    store.teardown();
    outcome
}

/// Shows the menu until the user quits. Input errors on a single action are logged, not fatal
///
/// # Errors
///
/// Returns an error if stdin or stdout can no longer be used
pub async fn menu_loop(io: &impl IO, store: &NoteStore) -> Result<()> {
    loop {
        io.show_menu(&ALL_MENU_OPTIONS);
        let option = match get_menu_input(io) {
            Ok(option) => option,
            Err(NoteError::Menu(e @ (MenuError::ParseError(_) | MenuError::InvalidOption(_)))) => {
                error!("{e}");
                continue;
            }
            Err(e) => return Err(e),
        };

        if option == MenuOption::Quit {
            info!("Bye");
            return Ok(());
        }

        match handle_menu_option(io, store, option).await {
            Ok(()) => {}
            Err(NoteError::Menu(
                e @ (MenuError::StdinReadError(_) | MenuError::StdoutWriteError(_)),
            )) => return Err(e.into()),
            Err(e) => error!("{e}"),
        }
    }
}

/// Try parsing input as `MenuOption` or return an error
///
/// # Errors
///
/// Returns `NoteError::Menu(MenuError::ParseError)` if input is not an integer
/// Returns `NoteError::Menu(MenuError::InvalidOption)` if integer is out of range
fn get_menu_input(io: &impl IO) -> Result<MenuOption> {
    let input = io.get_input()?;

    match input.parse::<u8>() {
        Ok(n) => MenuOption::try_from(n).map_err(|()| NoteError::Menu(MenuError::InvalidOption(n))),
        Err(_) => Err(NoteError::Menu(MenuError::ParseError(input))),
    }
}

/// Dispatch chosen `MenuOption` to its handler
async fn handle_menu_option(io: &impl IO, store: &NoteStore, option: MenuOption) -> Result<()> {
    match option {
        MenuOption::List => {
            handle_list(io, store);
            Ok(())
        }
        MenuOption::Create => handle_create(io, store).await,
        MenuOption::Edit => handle_edit(io, store).await,
        MenuOption::ToggleMark => handle_toggle_mark(io, store).await,
        MenuOption::Trash => handle_trash(io, store).await,
        MenuOption::Restore => handle_restore(io, store).await,
        MenuOption::Delete => handle_delete(io, store).await,
        MenuOption::Quit => Ok(()),
    }
}

/// Show all three live lists
fn handle_list(io: &impl IO, store: &NoteStore) {
    io.show_notes_list("Notes", store.normal_notes().snapshot());
    io.show_notes_list("Marked notes", store.normal_marked_notes().snapshot());
    io.show_notes_list("Trash", store.trash_notes().snapshot());
}

/// Prompt for title and content and add a new note
async fn handle_create(io: &impl IO, store: &NoteStore) -> Result<()> {
    io.show_title("Create note");

    io.show_text("Title:");
    let title = io.get_input()?;
    // Stop when getting a "." alone on a line
    io.show_text("Content (end with '.' on last line):");
    let content = io.get_input_until(".")?;
    trace!("Creating note '{title}'");

    store
        .add_note(&Note::new(title, content), CollectionId::Notes)
        .await;
    Ok(())
}

/// Prompt for a note and replace its title and content
async fn handle_edit(io: &impl IO, store: &NoteStore) -> Result<()> {
    io.show_title("Edit note");
    let mut note = pick_note(io, CollectionId::Notes, &[store.normal_notes(), store.normal_marked_notes()])?;

    io.show_text(&format!("Title [{}] (empty keeps it):", note.title));
    let title = io.get_input()?;
    if !title.is_empty() {
        note.title = title;
    }
    io.show_text("Content (end with '.' on last line, empty keeps it):");
    let content = io.get_input_until(".")?;
    if !content.is_empty() {
        note.content = content;
    }

    store.update_note(&note).await;
    Ok(())
}

/// Flip the `marked` flag of a note
async fn handle_toggle_mark(io: &impl IO, store: &NoteStore) -> Result<()> {
    io.show_title("Mark/unmark note");
    let mut note = pick_note(io, CollectionId::Notes, &[store.normal_notes(), store.normal_marked_notes()])?;
    note.marked = !note.marked;
    store.update_note(&note).await;
    Ok(())
}

async fn handle_trash(io: &impl IO, store: &NoteStore) -> Result<()> {
    io.show_title("Move note to trash");
    let note = pick_note(io, CollectionId::Notes, &[store.normal_notes(), store.normal_marked_notes()])?;
    store.move_to_trash(&note).await;
    Ok(())
}

async fn handle_restore(io: &impl IO, store: &NoteStore) -> Result<()> {
    io.show_title("Restore note from trash");
    let note = pick_note(io, CollectionId::Trash, &[store.trash_notes()])?;
    store.restore(&note).await;
    Ok(())
}

/// Permanently delete a trashed note after confirmation
async fn handle_delete(io: &impl IO, store: &NoteStore) -> Result<()> {
    io.show_title("Delete note from trash");
    let note = pick_note(io, CollectionId::Trash, &[store.trash_notes()])?;

    loop {
        io.show_text(&format!("Delete '{}' for good? (y/n):", note.title));
        match io.get_input()?.to_lowercase().as_str() {
            "y" | "yes" => break,
            "n" | "no" => {
                info!("Not deleting note '{}'", note.title);
                return Ok(());
            }
            _ => warn!("Invalid input. Please enter 'y' or 'n'"),
        }
    }

    if let Some(id) = note.id.as_deref() {
        store.delete_note(CollectionId::Trash, id).await;
    }
    Ok(())
}

/// Prompt for a note ID and look it up in the given live lists
///
/// # Errors
///
/// `MenuError::UnknownNote` if none of the lists holds a note with that ID
fn pick_note(io: &impl IO, collection: CollectionId, lists: &[&NoteList]) -> Result<Note> {
    io.show_text("ID:");
    let id = io.get_input()?;

    lists
        .iter()
        .flat_map(|list| list.snapshot())
        .find(|note| note.id.as_deref() == Some(id.as_str()))
        .ok_or_else(|| NoteError::Menu(MenuError::UnknownNote(id, collection)))
}
