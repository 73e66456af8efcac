//! Line input for interactive writers
//!
//! Each line is one message. The line `\q` ends the submission, as does end
//! of input.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::error::Result;
use crate::session::TextSource;

/// Line that ends a submission
pub const QUIT_SENTINEL: &str = "\\q";

/// Message lines read from a buffered reader (stdin in the chat demo)
pub struct LineInput<R> {
    lines: Lines<R>,
    done: bool,
}

impl<R: AsyncBufRead + Unpin> LineInput<R> {
    /// Read lines from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            done: false,
        }
    }

    /// Next message line, `None` after `\q` or end of input
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if self.done {
            return Ok(None);
        }

        match self.lines.next_line().await? {
            Some(line) if line == QUIT_SENTINEL => {
                self.done = true;
                Ok(None)
            }
            Some(line) => Ok(Some(line)),
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> TextSource for LineInput<R> {
    async fn next_text(&mut self) -> Result<Option<String>> {
        self.next_line().await
    }
}
