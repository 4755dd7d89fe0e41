use std::fmt;

/// A name as it appeared in source, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn new(lexeme: impl Into<String>, line: usize) -> Self {
        Self {
            lexeme: lexeme.into(),
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}
