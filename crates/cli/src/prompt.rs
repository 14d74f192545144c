//! Terminal prompts for interactive runs.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use toloka2media_core::naming::NumberContext;
use toloka2media_core::{AddRequest, OperatorPrompt};

/// Asks the operator on stdin/stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl OperatorPrompt for TerminalPrompt {
    async fn confirm_overwrite(&self, codename: &str, targets: &[PathBuf]) -> bool {
        let mut question = format!("{}: these files will be replaced:\n", codename);
        for target in targets {
            question.push_str(&format!("  {}\n", target.display()));
        }
        question.push_str("Overwrite? [y/N]: ");

        match ask(question).await {
            Ok(answer) => parse_confirmation(&answer),
            Err(e) => {
                warn!(codename, error = %e, "Failed to read answer, declining overwrite");
                false
            }
        }
    }

    async fn choose_episode_index(
        &self,
        file_name: &str,
        numbers: &[NumberContext],
    ) -> Option<usize> {
        if numbers.is_empty() {
            println!("{} contains no numbers", file_name);
            return None;
        }

        println!("{}", file_name);
        for number in numbers {
            println!(
                "  {}: ...{}[{}]{}...",
                number.position, number.before, number.number, number.after
            );
        }

        loop {
            let question = "Which number is the episode? (empty to abort): ".to_string();
            let answer = match ask(question).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(error = %e, "Failed to read episode index");
                    return None;
                }
            };
            if answer.trim().is_empty() {
                return None;
            }
            match parse_index(&answer, numbers.len()) {
                Some(index) => return Some(index),
                None => println!("Enter a number between 1 and {}", numbers.len()),
            }
        }
    }

    async fn choose_adjustment(&self, file_name: &str, raw_episode: u32) -> i64 {
        loop {
            let question = format!(
                "{} is episode {}. Offset to add [0]: ",
                file_name, raw_episode
            );
            let answer = match ask(question).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(error = %e, "Failed to read offset, using 0");
                    return 0;
                }
            };
            match parse_adjustment(&answer) {
                Some(adjustment) => return adjustment,
                None => println!("Enter a whole number, e.g. -12"),
            }
        }
    }
}

/// Collects an add request field by field. Index and offset are left to
/// the orchestrator, which asks once it has seen the file names.
pub async fn ask_add_request(url: Option<String>) -> Result<AddRequest> {
    let url = match url {
        Some(url) => url,
        None => ask_optional("Tracker URL: ")
            .await?
            .context("A tracker URL is required")?,
    };

    let season = ask_optional("Season number [1]: ").await?;
    let season = match season {
        Some(s) => s
            .parse::<u32>()
            .with_context(|| format!("Invalid season number: {}", s))?,
        None => 1,
    };

    let mut request = AddRequest::new(url, season);
    if let Some(title) = ask_optional("Title (empty to use the tracker title): ").await? {
        request = request.with_title(title);
    }
    if let Some(codename) = ask_optional("Codename (empty to derive one): ").await? {
        request = request.with_codename(codename);
    }
    if let Some(group) = ask_optional("Release group (empty to use the uploader): ").await? {
        request = request.with_release_group(group);
    }
    if let Some(meta) = ask_optional("Meta tags (empty for default): ").await? {
        request = request.with_meta(meta);
    }
    if let Some(path) = ask_optional("Download dir (empty for default): ").await? {
        request = request.with_download_dir(path);
    }
    let partial = ask("Partial season? [y/N]: ".to_string()).await?;
    Ok(request.partial_season(parse_confirmation(&partial)))
}

async fn ask_optional(question: &str) -> Result<Option<String>> {
    let answer = ask(question.to_string()).await?;
    let answer = answer.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}

/// Prints `question` and reads one line from stdin off the runtime threads.
async fn ask(question: String) -> Result<String> {
    let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut stdout = io::stdout();
        stdout.write_all(question.as_bytes())?;
        stdout.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
        }
        Ok(line)
    })
    .await
    .context("Prompt task failed")??;

    Ok(answer.trim_end_matches(['\r', '\n']).to_string())
}

fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn parse_index(answer: &str, count: usize) -> Option<usize> {
    answer
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|index| (1..=count).contains(index))
}

fn parse_adjustment(answer: &str) -> Option<i64> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Some(0);
    }
    answer.strip_prefix('+').unwrap_or(answer).parse().ok()
}
