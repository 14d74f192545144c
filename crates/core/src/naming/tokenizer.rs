//! Digit-run tokenizer used to locate episode numbers inside file names.

use serde::Serialize;

/// Kind of a token produced by [`tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// A maximal run of ASCII digits.
    Digits,
    /// Everything between two digit runs.
    Text,
}

/// A contiguous run of the input string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the token within the input.
    pub start: usize,
}

impl Token<'_> {
    /// Byte offset one past the end of the token.
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is_digits(&self) -> bool {
        self.kind == TokenKind::Digits
    }
}

/// A numeric token together with the text surrounding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberContext {
    /// 1-based position among the numeric tokens.
    pub position: usize,
    pub number: String,
    pub before: String,
    pub after: String,
}

/// Splits `input` into alternating digit and text runs, in order.
///
/// The concatenation of all token texts equals the input. Never fails.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut run_start = 0;
    let mut run_kind: Option<TokenKind> = None;

    for (idx, ch) in input.char_indices() {
        let kind = if ch.is_ascii_digit() {
            TokenKind::Digits
        } else {
            TokenKind::Text
        };

        match run_kind {
            Some(current) if current == kind => {}
            Some(current) => {
                tokens.push(Token {
                    kind: current,
                    text: &input[run_start..idx],
                    start: run_start,
                });
                run_start = idx;
                run_kind = Some(kind);
            }
            None => run_kind = Some(kind),
        }
    }

    if let Some(kind) = run_kind {
        tokens.push(Token {
            kind,
            text: &input[run_start..],
            start: run_start,
        });
    }

    tokens
}

/// Returns only the digit runs of `input`, in order.
pub fn numbers(input: &str) -> Vec<&str> {
    tokenize(input)
        .into_iter()
        .filter(|t| t.is_digits())
        .map(|t| t.text)
        .collect()
}

/// Returns each digit run with up to `width` characters of text on either side.
///
/// Used when the operator picks which number in a file name is the episode.
pub fn numbers_with_context(input: &str, width: usize) -> Vec<NumberContext> {
    tokenize(input)
        .iter()
        .filter(|t| t.is_digits())
        .enumerate()
        .map(|(idx, token)| {
            let before: String = {
                let head = &input[..token.start];
                let skip = head.chars().count().saturating_sub(width);
                head.chars().skip(skip).collect()
            };
            let after: String = input[token.end()..].chars().take(width).collect();

            NumberContext {
                position: idx + 1,
                number: token.text.to_string(),
                before,
                after,
            }
        })
        .collect()
}
