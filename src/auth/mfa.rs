use console::Term;

use crate::errors::KostyError;

/// Source of one-time MFA codes for the current-session role assumption.
pub trait MfaPrompt: Send + Sync {
    fn token_code(&self, serial_number: &str) -> Result<String, KostyError>;
}

/// Reads the code interactively from the controlling terminal.
pub struct ConsolePrompt {
    term: Term,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self { term: Term::stderr() }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl MfaPrompt for ConsolePrompt {
    fn token_code(&self, serial_number: &str) -> Result<String, KostyError> {
        if !self.term.is_term() {
            return Err(KostyError::Auth(format!(
                "MFA code required for {} but no terminal is attached",
                serial_number
            )));
        }
        self.term
            .write_str(&format!("Enter MFA code for {}: ", serial_number))?;
        let line = self.term.read_line()?;
        validate_token_code(&line)
    }
}

/// Fixed code, for non-interactive callers that obtained it elsewhere.
pub struct StaticPrompt(pub String);

impl MfaPrompt for StaticPrompt {
    fn token_code(&self, _serial_number: &str) -> Result<String, KostyError> {
        validate_token_code(&self.0)
    }
}

/// Token codes are exactly six ASCII digits.
pub fn validate_token_code(raw: &str) -> Result<String, KostyError> {
    let code = raw.trim();
    if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(code.to_string())
    } else {
        Err(KostyError::Auth("MFA code must be 6 digits".into()))
    }
}
