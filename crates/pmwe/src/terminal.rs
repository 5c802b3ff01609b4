use std::fs;
use std::io::{self, BufRead, Write};
use std::process::Command;

use pmwe_core::page::CACHE_SUFFIX;
use pmwe_core::{PageReference, SyncError, UserActions};
use tracing::info;

/// Word that must be typed to confirm a delete.
pub const CONFIRM_WORD: &str = "delete";

/// Editor and confirmation steps performed on the controlling terminal.
pub struct TerminalUser {
    editor: Option<String>,
    assume_yes: bool,
}

impl TerminalUser {
    pub fn new(editor: Option<String>, assume_yes: bool) -> Self {
        Self { editor, assume_yes }
    }
}

impl UserActions for TerminalUser {
    fn edit_text(&mut self, page: &PageReference, seed: &str) -> Result<String, SyncError> {
        let editor = self
            .editor
            .as_deref()
            .ok_or_else(|| SyncError::Edit("no editor configured".to_string()))?;

        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", page.qualified_name.replace('/', ".")))
            .suffix(CACHE_SUFFIX)
            .tempfile()
            .map_err(|error| SyncError::Edit(format!("could not create temporary file: {error}")))?;
        info!("using tempfile {}", file.path().display());
        file.write_all(seed.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|error| SyncError::Edit(format!("could not write temporary file: {error}")))?;

        run_command(editor, file.path().to_string_lossy().as_ref())
            .map_err(|error| SyncError::Edit(error.to_string()))?;

        let bytes = fs::read(file.path())
            .map_err(|error| SyncError::Edit(format!("could not read edited file: {error}")))?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(_) => {
                // The tempfile is the only copy of the edit; keep it on disk.
                let kept = file.into_temp_path().keep().map_err(|error| {
                    SyncError::Edit(format!(
                        "edited text is not valid UTF-8 and could not be kept: {error}"
                    ))
                })?;
                Err(SyncError::Edit(format!(
                    "edited text is not valid UTF-8, left it in \"{}\"",
                    kept.display()
                )))
            }
        }
    }

    fn confirm_delete(&mut self, page: &PageReference) -> Result<bool, SyncError> {
        if self.assume_yes {
            return Ok(true);
        }
        eprintln!(
            "Deleting: {}. Are you sure? (Type {CONFIRM_WORD})",
            page.qualified_name
        );
        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(|error| SyncError::Edit(format!("could not read confirmation: {error}")))?;
        Ok(answer.trim() == CONFIRM_WORD)
    }
}

/// Run a configured command line with `target` appended as the last argument.
pub fn run_command(command_line: &str, target: &str) -> io::Result<()> {
    let mut parts = command_line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
    let status = Command::new(program)
        .args(parts)
        .arg(target)
        .status()
        .map_err(|error| io::Error::new(error.kind(), format!("failed to launch {program}: {error}")))?;
    if !status.success() {
        return Err(io::Error::other(format!(
            "{program} exited with {}",
            status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "a signal".to_string())
        )));
    }
    Ok(())
}
