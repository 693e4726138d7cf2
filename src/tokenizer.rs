//! Syntactic classification of raw command-line arguments
//!
//! The tokenizer has no knowledge of which commands or options exist. It only
//! splits the argument vector into option and value tokens, in order.

use serde::Serialize;

/// Argument that ends tokenization; everything after it is ignored.
const END_OF_ARGS: &str = "--";

/// A single classified argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Token {
    /// An option spelling with its leading dashes, e.g. `--env` or `-v`
    Option { name: String },
    /// Anything that does not start with a dash
    Value { value: String },
}

impl Token {
    pub fn option(name: impl Into<String>) -> Self {
        Token::Option { name: name.into() }
    }

    pub fn value(value: impl Into<String>) -> Self {
        Token::Value {
            value: value.into(),
        }
    }
}

/// Convert an argument vector into tokens.
///
/// The caller strips the program path before calling. `--name=value` becomes
/// an option followed by a value, `-abc` becomes one option per letter, and
/// scanning stops at a literal `--`.
#[must_use]
pub fn tokenize<I, S>(args: I) -> Vec<Token>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tokens = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        if arg == END_OF_ARGS {
            break;
        }
        if arg.starts_with("--") {
            match arg.split_once('=') {
                Some((name, value)) => {
                    tokens.push(Token::option(name));
                    tokens.push(Token::value(value));
                }
                None => tokens.push(Token::option(arg)),
            }
        } else if let Some(letters) = arg.strip_prefix('-') {
            tokens.extend(letters.chars().map(|c| Token::option(format!("-{c}"))));
        } else {
            tokens.push(Token::value(arg));
        }
    }
    tokens
}
