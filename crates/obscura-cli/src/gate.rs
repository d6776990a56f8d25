//! Terminal confirmation as the local authentication factor

use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;

use obscura_core::{AuthError, AuthenticationGate};

/// Asks the person at the terminal to confirm before an asset is revealed
///
/// Only available when stdin is an interactive terminal, so scripted runs
/// cannot answer the prompt by piping input.
pub struct TerminalGate;

#[async_trait]
impl AuthenticationGate for TerminalGate {
    fn is_available(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    async fn authenticate(&self, reason: &str) -> Result<(), AuthError> {
        let prompt = format!("{reason} [y/N]: ");
        tokio::task::spawn_blocking(move || prompt_stdin(&prompt))
            .await
            .map_err(|e| AuthError::Unknown(e.to_string()))?
    }
}

fn prompt_stdin(prompt: &str) -> Result<(), AuthError> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{prompt}")
        .and_then(|()| stderr.flush())
        .map_err(|e| AuthError::Unknown(e.to_string()))?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| AuthError::Unknown(e.to_string()))?;

    parse_answer(&answer)
}

/// Interpret a confirmation answer; anything but yes is a refusal
pub fn parse_answer(answer: &str) -> Result<(), AuthError> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(()),
        "" | "n" | "no" => Err(AuthError::UserCancelled),
        other => Err(AuthError::Failed(format!("unrecognized answer '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y\n").is_ok());
        assert!(parse_answer("  YES ").is_ok());
        assert_eq!(parse_answer("\n"), Err(AuthError::UserCancelled));
        assert_eq!(parse_answer("no"), Err(AuthError::UserCancelled));
        assert!(matches!(parse_answer("maybe"), Err(AuthError::Failed(_))));
    }
}
