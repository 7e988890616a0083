//! Chat commands recognised inside text messages.

const HELP: &str = "!help";
const ECHO: &str = "!echo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Everything after `!echo `, verbatim.
    Echo(String),
    /// Not a command; treat the text as a plain message.
    None,
}

impl Command {
    /// Parse a text message. Total: every input maps to some `Command`.
    ///
    /// Matching is case-sensitive and never trims. The single space after
    /// `!echo` is a separator, unless the body itself starts with a space; then
    /// all padding after `!echo` is kept, so `!echo  x` echoes `"  x"`.
    pub fn parse(text: &str) -> Self {
        if text == HELP {
            return Self::Help;
        }
        if text == ECHO {
            return Self::Echo(String::new());
        }
        let Some(padded) = text.strip_prefix(ECHO) else {
            return Self::None;
        };
        match padded.strip_prefix(' ') {
            Some(body) if body.starts_with(' ') => Self::Echo(padded.to_string()),
            Some(body) => Self::Echo(body.to_string()),
            None => Self::None,
        }
    }
}
