//! Message flags.

use std::fmt;

/// A flag the pipeline adds to messages with `STORE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`: the message has been read.
    Seen,
}

impl Flag {
    /// Protocol spelling of the flag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
        }
    }

    /// Parenthesized flag list for a `STORE` command, e.g. `(\Seen)`.
    #[must_use]
    pub fn list(flags: &[Self]) -> String {
        let names: Vec<&str> = flags.iter().map(|flag| flag.as_str()).collect();
        format!("({})", names.join(" "))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
