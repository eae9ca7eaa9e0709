//! Line commands accepted on stdin.

use std::path::PathBuf;
use std::str::FromStr;

use quill_core::BlockId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace a block's text
    Edit { id: BlockId, text: String },
    Focus(BlockId),
    Unfocus,
    /// Ask the hub for a new empty block
    Add,
    /// Upload an image file into a block
    Image { id: BlockId, path: PathBuf },
    Reload,
    Show,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("`{0}` is not a block id")]
    BadId(String),
}

pub const HELP: &str = "\
commands:
  show                 print the document
  focus <id>           new blocks are inserted after this block
  unfocus              new blocks are appended
  edit <id> <text>     replace the text of a block
  add                  create an empty block
  image <id> <path>    upload an image into a block
  reload               refetch the document
  quit";

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim_start();

        match word.to_ascii_lowercase().as_str() {
            "" => Err(ParseCommandError::Empty),
            "edit" => {
                let (id, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(ParseCommandError::Usage("edit <id> <text>"))?;
                Ok(Self::Edit {
                    id: parse_id(id)?,
                    text: text.trim_start().to_string(),
                })
            }
            "focus" => match rest {
                "" => Err(ParseCommandError::Usage("focus <id>")),
                id => Ok(Self::Focus(parse_id(id)?)),
            },
            "unfocus" => Ok(Self::Unfocus),
            "add" => Ok(Self::Add),
            "image" => {
                let (id, path) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(ParseCommandError::Usage("image <id> <path>"))?;
                Ok(Self::Image {
                    id: parse_id(id)?,
                    path: PathBuf::from(path.trim()),
                })
            }
            "reload" => Ok(Self::Reload),
            "show" | "ls" => Ok(Self::Show),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_id(raw: &str) -> Result<BlockId, ParseCommandError> {
    raw.trim()
        .parse()
        .map_err(|_| ParseCommandError::BadId(raw.trim().to_string()))
}

/// MIME type for an upload, from the file extension.
pub fn content_type_for(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
