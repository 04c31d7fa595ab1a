#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error("unterminated parameter starting at offset {offset} in pattern {pattern:?}")]
    UnterminatedParam { pattern: String, offset: usize },
    #[error("unexpected {found:?} at offset {offset} in pattern {pattern:?}")]
    UnexpectedChar {
        pattern: String,
        offset: usize,
        found: char,
    },
    #[error("pattern {pattern:?} produced an invalid matcher: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Pattern(#[from] CompileError),
    #[error("invalid rewrite expression {expr:?}: {source}")]
    RewriteRegex {
        expr: String,
        #[source]
        source: regex::Error,
    },
}
