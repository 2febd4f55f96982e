use crate::models::{Category, SortBy, SortOrder};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Search(String),
    /// `None` clears the category filter
    Category(Option<Category>),
    Sort(Option<SortBy>, Option<SortOrder>),
    Page(u32),
    Lang(String),
    Langs(Vec<String>),
    Show(String),
    Edit(String),
    Set(String),
    Save,
    Cancel,
    Add {
        key: String,
        category: String,
        description: String,
    },
    Delete(String),
    Confirm,
    Dismiss,
    Stats,
    Sidebar,
    Reset,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  list                              show the current page
  search <text>                     filter by text (empty clears)
  category <name|all>               filter by category
  sort <key|category|updated|none> [asc|desc]
  page <n>                          go to page n
  lang <code>                       select the display language
  langs <code,code,...>             set the available languages
  show <id>                         show one key with every translation
  edit <id>                         start editing <id> in the selected language
  set <text>                        replace the edit buffer
  save                              save the edit
  cancel                            discard the edit
  add <key> <category> [description]
  delete <id>                       ask to delete a key
  confirm                           confirm the pending delete
  dismiss                           close the open delete or add prompt
  stats                             page counters and completion per language
  sidebar                           toggle the sidebar flag
  reset                             clear all filters
  help                              this text
  quit                              exit
";

/// Split off the first whitespace-delimited word
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn required<'a>(arg: &'a str, usage: &str) -> Result<&'a str, String> {
    if arg.is_empty() {
        Err(format!("Usage: {}", usage))
    } else {
        Ok(arg)
    }
}

fn parse_sort(args: &str) -> Result<Command, String> {
    let (field, order) = split_word(args);
    let sort_by = match field.to_lowercase().as_str() {
        "key" => Some(SortBy::Key),
        "category" => Some(SortBy::Category),
        "updated" | "updatedat" => Some(SortBy::UpdatedAt),
        "none" | "" => None,
        other => return Err(format!("Unknown sort field '{}'", other)),
    };
    let sort_order = match order.to_lowercase().as_str() {
        "" => None,
        "asc" => Some(SortOrder::Asc),
        "desc" => Some(SortOrder::Desc),
        other => return Err(format!("Unknown sort order '{}'", other)),
    };
    Ok(Command::Sort(sort_by, sort_order))
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (name, args) = split_word(line);

        let command = match name.to_lowercase().as_str() {
            "list" | "ls" => Command::List,
            "search" => Command::Search(args.to_string()),
            "category" => match args.to_lowercase().as_str() {
                "" | "all" => Command::Category(None),
                other => Command::Category(Some(other.parse()?)),
            },
            "sort" => parse_sort(args)?,
            "page" => {
                let n: u32 = required(args, "page <n>")?
                    .parse()
                    .map_err(|_| format!("Invalid page number '{}'", args))?;
                if n == 0 {
                    return Err("Pages start at 1".to_string());
                }
                Command::Page(n)
            }
            "lang" => Command::Lang(required(args, "lang <code>")?.to_string()),
            "langs" => Command::Langs(
                required(args, "langs <code,code,...>")?
                    .split(',')
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect(),
            ),
            "show" => Command::Show(required(args, "show <id>")?.to_string()),
            "edit" => Command::Edit(required(args, "edit <id>")?.to_string()),
            // An empty value is a legitimate translation
            "set" => Command::Set(args.to_string()),
            "save" => Command::Save,
            "cancel" => Command::Cancel,
            "add" => {
                let (key, rest) = split_word(args);
                let (category, description) = split_word(rest);
                Command::Add {
                    key: key.to_string(),
                    category: category.to_string(),
                    description: description.to_string(),
                }
            }
            "delete" | "rm" => Command::Delete(required(args, "delete <id>")?.to_string()),
            "confirm" | "yes" => Command::Confirm,
            "dismiss" | "no" => Command::Dismiss,
            "stats" => Command::Stats,
            "sidebar" => Command::Sidebar,
            "reset" => Command::Reset,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            "" => return Err("Type `help` for a list of commands".to_string()),
            other => return Err(format!("Unknown command '{}'. Type `help`.", other)),
        };

        Ok(command)
    }
}
