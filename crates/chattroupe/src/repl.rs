//! Terminal front end: command parsing and the interactive loop

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{FileType, SourceDocument};

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit & Process PDFs (files or directories)
    Upload(Vec<PathBuf>),
    /// Question about the indexed PDFs
    Ask(String),
    /// Upload an image
    Image(PathBuf),
    /// Question about the image
    ImageAsk(String),
    /// Tell me about the image
    Describe,
    Clear,
    History,
    Retry,
    Help,
    Quit,
    /// Anything that is not a command
    Chat(String),
    /// Blank line
    Empty,
}

/// Why a line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command {0}. Type /help for the list of commands.")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl Command {
    pub fn parse(line: &str) -> std::result::Result<Self, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        if !line.starts_with('/') {
            return Ok(Command::Chat(line.to_string()));
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "/upload" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("/upload <file.pdf|directory>..."));
                }
                Command::Upload(rest.split_whitespace().map(PathBuf::from).collect())
            }
            "/ask" => Command::Ask(required(rest, "/ask <question>")?),
            "/image" => Command::Image(PathBuf::from(required(rest, "/image <file.png|file.jpg>")?)),
            "/image-ask" => Command::ImageAsk(required(rest, "/image-ask <question>")?),
            "/describe" => Command::Describe,
            "/clear" => Command::Clear,
            "/history" => Command::History,
            "/retry" => Command::Retry,
            "/help" | "/?" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => return Err(CommandError::Unknown(name.to_string())),
        };

        Ok(command)
    }
}

fn required(rest: &str, usage: &'static str) -> std::result::Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

pub const HELP: &str = "\
Commands:
  /upload <paths...>     Submit & Process PDF files or directories of PDFs
  /ask <question>        Ask a question about the processed PDFs
  /image <path>          Upload a PNG or JPEG image
  /image-ask <question>  Ask a question about the image
  /describe              Tell me about the image
  /clear                 Clear chat history and uploads
  /history               Show the chat history
  /retry                 Retry the last failed action
  /help                  Show this help
  /quit                  Exit
Anything else is sent to the chat. Ctrl-C stops a reply that is
streaming; at the prompt it exits.";

/// Expand files and directories into the PDFs they name, in a stable order
///
/// Directories are walked recursively and only `.pdf` files are kept. An
/// explicitly named file is kept whatever its extension, so the extractor
/// can report it.
pub fn collect_pdf_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut in_dir: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| is_pdf(p))
                .collect();
            in_dir.sort();
            found.extend(in_dir);
        } else if path.is_file() {
            found.push(path.clone());
        } else {
            return Err(Error::file_read(
                path.display().to_string(),
                "no such file or directory",
            ));
        }
    }

    Ok(found)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FileType::from_extension(e) == FileType::Pdf)
        .unwrap_or(false)
}

/// Read every PDF named by `paths`
pub async fn load_documents(paths: &[PathBuf]) -> Result<Vec<SourceDocument>> {
    let mut documents = Vec::new();
    for path in collect_pdf_paths(paths)? {
        documents.push(SourceDocument::from_path(&path).await?);
    }
    Ok(documents)
}

#[cfg(feature = "cli")]
pub use interactive::Repl;

#[cfg(feature = "cli")]
mod interactive {
    use bytes::Bytes;
    use console::style;
    use futures_util::StreamExt;
    use indicatif::{ProgressBar, ProgressStyle};
    use std::future::Future;
    use std::io::Write;
    use std::time::Duration;
    use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

    use super::{load_documents, Command, HELP};
    use crate::error::{Error, Result};
    use crate::session::{Assistant, Draft, Session};

    /// Interactive terminal session
    pub struct Repl {
        assistant: Assistant,
        session: Session,
    }

    enum Flow {
        Continue,
        Quit,
    }

    impl Repl {
        pub fn new(assistant: Assistant, session: Session) -> Self {
            Self { assistant, session }
        }

        /// Read commands from stdin until /quit or end of input
        pub async fn run(mut self) -> Result<()> {
            println!(
                "{} Chat with PDFs, images and Gemini. Type {} for commands.",
                style("ChatTroupe").cyan().bold(),
                style("/help").bold()
            );

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                print!("{} ", style(">").green().bold());
                std::io::stdout().flush()?;

                let line = match next_input(&mut lines, tokio::signal::ctrl_c()).await? {
                    Input::Line(line) => line,
                    Input::Interrupted => {
                        println!();
                        break;
                    }
                    Input::Closed => break,
                };

                let command = match Command::parse(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", style(e).yellow());
                        continue;
                    }
                };

                match self.dispatch(command).await {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => self.report(&e),
                }
            }

            println!("Bye!");
            Ok(())
        }

        fn report(&self, error: &Error) {
            tracing::debug!("Command failed: {}", error);
            println!("{}", style(error.user_message()).red());
            if self.session.draft().is_some() {
                println!("{}", style("Type /retry to try again.").dim());
            }
        }

        async fn dispatch(&mut self, command: Command) -> Result<Flow> {
            match command {
                Command::Empty => {}
                Command::Help => println!("{}", HELP),
                Command::Quit => return Ok(Flow::Quit),
                Command::Upload(paths) => {
                    let documents = load_documents(&paths).await?;
                    self.submit(documents).await?;
                }
                Command::Ask(question) => self.ask_pdf(&question).await?,
                Command::Image(path) => {
                    let filename = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.display().to_string());
                    let data = tokio::fs::read(&path)
                        .await
                        .map_err(|e| Error::file_read(&filename, e.to_string()))?;
                    let info = self
                        .assistant
                        .set_image(&mut self.session, filename, Bytes::from(data))
                        .await?;
                    println!(
                        "Image {} ready ({}x{}).",
                        style(&info.filename).bold(),
                        info.width,
                        info.height
                    );
                }
                Command::ImageAsk(question) => self.ask_image(Some(&question)).await?,
                Command::Describe => self.ask_image(None).await?,
                Command::Clear => {
                    self.assistant.clear(&mut self.session);
                    println!("History cleared.");
                }
                Command::History => {
                    if self.session.history().is_empty() {
                        println!("{}", style("(no messages yet)").dim());
                    } else {
                        println!("{}", self.session.history().render());
                    }
                }
                Command::Retry => self.retry().await?,
                Command::Chat(message) => self.chat(&message).await?,
            }
            Ok(Flow::Continue)
        }

        async fn retry(&mut self) -> Result<()> {
            match self.session.take_draft() {
                None => println!("Nothing to retry."),
                Some(Draft::Documents) => self.submit(Vec::new()).await?,
                Some(Draft::PdfQuestion(q)) => self.ask_pdf(&q).await?,
                Some(Draft::ImageQuestion(q)) => self.ask_image(Some(&q)).await?,
                Some(Draft::DescribeImage) => self.ask_image(None).await?,
                Some(Draft::Chat(m)) => self.chat(&m).await?,
            }
            Ok(())
        }

        async fn submit(&mut self, documents: Vec<crate::types::SourceDocument>) -> Result<()> {
            let summary = with_spinner(
                "Processing...",
                self.assistant.submit_documents(&mut self.session, documents),
            )
            .await?;
            println!(
                "{} {} document(s), {} page(s) with text, {} chunk(s) indexed in {}ms.",
                style("Done:").green().bold(),
                summary.documents.len(),
                summary.pages_with_text,
                summary.chunks,
                summary.processing_time_ms
            );
            if summary.chunks == 0 {
                println!(
                    "{}",
                    style("No text could be extracted; questions will find nothing.").yellow()
                );
            }
            Ok(())
        }

        async fn ask_pdf(&mut self, question: &str) -> Result<()> {
            let answer = with_spinner(
                "Thinking...",
                self.assistant.ask_pdf(&mut self.session, question),
            )
            .await?;
            println!("{} {}", style("Reply:").cyan().bold(), answer.answer);
            Ok(())
        }

        async fn ask_image(&mut self, question: Option<&str>) -> Result<()> {
            let answer = match question {
                Some(q) => {
                    with_spinner("Looking...", self.assistant.ask_image(&mut self.session, q))
                        .await?
                }
                None => {
                    with_spinner("Looking...", self.assistant.describe_image(&mut self.session))
                        .await?
                }
            };
            println!("{} {}", style("Reply:").cyan().bold(), answer.answer);
            Ok(())
        }

        /// Print fragments as they arrive; Ctrl-C stops the reply
        async fn chat(&mut self, message: &str) -> Result<()> {
            let mut pending = self.assistant.begin_chat(&mut self.session, message).await?;
            print!("{} ", style("Gemini:").cyan().bold());

            let mut failure = None;
            loop {
                tokio::select! {
                    fragment = pending.reply.next() => match fragment {
                        Some(Ok(text)) => {
                            print!("{}", text);
                            std::io::stdout().flush()?;
                        }
                        Some(Err(e)) => {
                            failure = Some(e);
                            break;
                        }
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        println!(" {}", style("[stopped]").dim());
                        break;
                    }
                }
            }
            println!();

            match failure {
                None => {
                    self.session
                        .complete_chat(pending.epoch, pending.reply.text());
                    Ok(())
                }
                Some(e) => {
                    self.session
                        .fail_chat(pending.epoch, &pending.message, pending.reply.text());
                    Err(e)
                }
            }
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Input {
        Line(String),
        Interrupted,
        Closed,
    }

    /// Next prompt line, or Ctrl-C
    ///
    /// Once a chat has listened for Ctrl-C the default SIGINT exit is gone,
    /// so the prompt has to watch for it too.
    async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> std::io::Result<Input>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = std::io::Result<()>>,
    {
        tokio::select! {
            line = lines.next_line() => Ok(line?.map(Input::Line).unwrap_or(Input::Closed)),
            _ = interrupt => Ok(Input::Interrupted),
        }
    }

    async fn with_spinner<T>(message: &'static str, task: impl Future<Output = T>) -> T {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));

        let output = task.await;
        spinner.finish_and_clear();
        output
    }

}
