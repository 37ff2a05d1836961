// src/core/protocol/command.rs

//! Parses a framed line into a client command.

/// A client request. The first whitespace-delimited token selects the variant, case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `USER <name>`: attempt to bind this connection to an account.
    User(String),
    /// `POST <text>`: publish a message. The text is accepted but not stored.
    Post(String),
    /// `BYE`: release the account bound to this connection.
    Bye,
    /// Anything else, including malformed `USER` lines and empty lines.
    Unknown(String),
}

impl Command {
    /// Interprets a single protocol line, which must already be stripped of its terminator.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim_start();
        let (token, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest),
            None => (trimmed, ""),
        };

        match token {
            "USER" => match rest.split_whitespace().next() {
                Some(name) => Command::User(name.to_string()),
                None => Command::Unknown(line.to_string()),
            },
            "POST" => Command::Post(rest.trim_start().to_string()),
            "BYE" => Command::Bye,
            _ => Command::Unknown(line.to_string()),
        }
    }

    /// A short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::User(_) => "USER",
            Command::Post(_) => "POST",
            Command::Bye => "BYE",
            Command::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        Command::parse(line)
    }
}
