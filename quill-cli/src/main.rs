//! Quill terminal client.
//!
//! Without arguments, lists the user's documents. With a document id, opens
//! that document, prints remote changes as they arrive and reads edit
//! commands from stdin. Settings come from `QUILL_*` environment variables;
//! `QUILL_ACCESS_TOKEN` stores a fresh access token before connecting.

mod command;

use std::process::ExitCode;
use std::sync::Arc;

use log::info;
use quill_collab::{
    ChannelManager, ClientConfig, CredentialStore, Credentials, DocumentApi, DocumentDirectory,
    DocumentSession, EventKind, HttpDocumentApi, HubEvent, SessionUpdate, StoreChange,
};
use quill_core::{DocumentId, FileUpload, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};

use command::{content_type_for, Command, HELP};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Interactive state for one open document.
struct App {
    session: DocumentSession,
}

impl App {
    fn print_document(&self) {
        let focus = self.session.focused();
        println!(
            "document {} ({}, {} blocks)",
            self.session.document_id(),
            self.session.role(),
            self.session.blocks().len()
        );
        for block in self.session.blocks().iter() {
            let marker = if Some(block.id) == focus { '>' } else { ' ' };
            println!("{marker} [{}] {}", block.id, block.text);
        }
    }

    fn print_update(&self, update: &SessionUpdate) {
        match update {
            SessionUpdate::Block(StoreChange::Inserted { id, index }) => {
                println!("+ block {id} at {index}");
            }
            SessionUpdate::Block(StoreChange::Replaced { id, .. }) => {
                let text = self.session.blocks().get(*id).map_or("", |b| b.text.as_str());
                println!("~ [{id}] {text}");
            }
            SessionUpdate::Block(change) => log::debug!("{change:?}"),
            SessionUpdate::ImageAttached { block_id, image } => {
                println!("+ image {} on block {block_id}: {}", image.id, image.url);
            }
            SessionUpdate::Reloaded { count } => println!("reloaded ({count} blocks)"),
            SessionUpdate::ConnectionChanged(status) => println!("connection: {status:?}"),
            SessionUpdate::EditFailed(failure) => {
                println!("! edit of block {} not saved: {}", failure.block_id, failure.error);
            }
        }
    }

    /// Returns false when the user asked to quit.
    async fn handle(&mut self, command: Command) -> AppResult<bool> {
        match command {
            Command::Edit { id, text } => {
                if !self.session.edit_block(id, text)?.is_change() {
                    println!("no block {id}");
                }
            }
            Command::Focus(id) => {
                if !self.session.focus(id) {
                    println!("no block {id}");
                }
            }
            Command::Unfocus => self.session.clear_focus(),
            Command::Add => self.session.add_block().await?,
            Command::Image { id, path } => {
                let content = tokio::fs::read(&path).await?;
                let upload = FileUpload {
                    file_name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    content_type: content_type_for(&path).to_string(),
                    content,
                };
                let image = self.session.attach_image(id, upload).await?;
                println!("uploaded {}", image.url);
            }
            Command::Reload => {
                let count = self.session.reload().await?;
                println!("reloaded ({count} blocks)");
            }
            Command::Show => self.print_document(),
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn run(mut self) -> AppResult<()> {
        self.print_document();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let command = match line.parse::<Command>() {
                        Ok(command) => command,
                        Err(command::ParseCommandError::Empty) => continue,
                        Err(e) => {
                            println!("{e}");
                            continue;
                        }
                    };
                    match self.handle(command).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => println!("error: {e}"),
                    }
                }
                update = self.session.next_update() => match update {
                    Some(update) => self.print_update(&update),
                    None => break,
                },
            }
        }

        self.session.close().await;
        Ok(())
    }
}

async fn list_documents(api: &dyn DocumentApi) -> AppResult<()> {
    let mut directory = DocumentDirectory::new();
    directory.load(api.my_documents().await?);
    if directory.is_empty() {
        println!("no documents");
    }
    for entry in directory.iter() {
        println!("{:>6}  {:<8} {}", entry.document.id, entry.role, entry.document.name);
    }
    Ok(())
}

/// Membership pushes carry no document id; they are only logged.
fn watch_memberships(channel: &ChannelManager) {
    channel.subscribe(EventKind::AddedToDocument, |event| {
        if let HubEvent::AddedToDocument(user_ids) = event {
            info!("{}", membership_note(user_ids));
        }
    });
}

fn membership_note(user_ids: &[UserId]) -> String {
    let ids: Vec<String> = user_ids.iter().map(ToString::to_string).collect();
    format!("Users added to a document: {}", ids.join(", "))
}

async fn run() -> AppResult<()> {
    let config = ClientConfig::from_env();
    let credentials = Arc::new(CredentialStore::from_path(config.credential_path.as_deref())?);
    if let Ok(token) = std::env::var("QUILL_ACCESS_TOKEN") {
        credentials.save(Credentials::new(token))?;
    }
    if !credentials.has_credential() {
        return Err("no access token: set QUILL_ACCESS_TOKEN".into());
    }

    let api = Arc::new(HttpDocumentApi::new(&config, credentials.clone())?);
    let Some(arg) = std::env::args().nth(1) else {
        return list_documents(api.as_ref()).await;
    };
    let document_id: DocumentId = arg.parse().map_err(|_| format!("`{arg}` is not a document id"))?;

    let channel = Arc::new(ChannelManager::new(config, credentials));
    watch_memberships(&channel);
    channel.connect().await?;
    let session = DocumentSession::open(channel.clone(), api, document_id).await?;

    App { session }.run().await?;
    channel.disconnect().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    info!("Starting Quill client...");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("quill: {e}");
            ExitCode::FAILURE
        }
    }
}
