//! Element-path event stream over an XML document.
//!
//! Descriptors and repository metadata are consumed as a flat sequence of
//! events keyed by the slash-joined path from the document root, e.g.
//! `project/dependencies/dependency/artifactId`. Nothing is buffered beyond
//! the current element stack.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

/// One step through the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// An element was opened.
    Open(String),
    /// Non-blank character data inside the element at `path`.
    Text {
        /// Path of the enclosing element.
        path: String,
        /// Unescaped, trimmed text.
        text: String,
    },
    /// An element was closed.
    Close(String),
}

/// Errors from [`ElementEvents`].
#[derive(Error, Debug)]
pub enum XmlError {
    /// The tokenizer rejected the document.
    #[error("{0}")]
    Syntax(#[from] quick_xml::Error),

    /// The document ended while elements were still open.
    #[error("Unexpected end of document inside <{0}>")]
    Truncated(String),
}

enum Token {
    Start(String),
    Empty(String),
    End,
    Text(String),
    Eof,
    Skip,
}

/// Iterator of [`XmlEvent`]s backed by `quick-xml`.
pub struct ElementEvents<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    stack: Vec<String>,
    pending_close: Option<String>,
    done: bool,
}

impl<R: BufRead> std::fmt::Debug for ElementEvents<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementEvents")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> ElementEvents<R> {
    /// Start streaming `reader`.
    pub fn new(reader: R) -> Self {
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            stack: Vec::new(),
            pending_close: None,
            done: false,
        }
    }

    fn path(&self) -> String {
        self.stack.join("/")
    }
}

fn local_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn tokenize(event: Event<'_>) -> Result<Token, quick_xml::Error> {
    Ok(match event {
        Event::Start(e) => Token::Start(local_name(e.local_name().as_ref())),
        Event::Empty(e) => Token::Empty(local_name(e.local_name().as_ref())),
        Event::End(_) => Token::End,
        Event::Text(t) => Token::Text(t.unescape()?.trim().to_string()),
        Event::CData(c) => Token::Text(String::from_utf8_lossy(&c.into_inner()).trim().to_string()),
        Event::Eof => Token::Eof,
        _ => Token::Skip,
    })
}

impl<R: BufRead> Iterator for ElementEvents<R> {
    type Item = Result<XmlEvent, XmlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(path) = self.pending_close.take() {
            return Some(Ok(XmlEvent::Close(path)));
        }
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            let token = match self.reader.read_event_into(&mut self.buf).and_then(tokenize) {
                Ok(token) => token,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };

            match token {
                Token::Start(name) => {
                    self.stack.push(name);
                    return Some(Ok(XmlEvent::Open(self.path())));
                }
                Token::Empty(name) => {
                    self.stack.push(name);
                    let path = self.path();
                    self.stack.pop();
                    self.pending_close = Some(path.clone());
                    return Some(Ok(XmlEvent::Open(path)));
                }
                Token::End => {
                    let path = self.path();
                    self.stack.pop();
                    return Some(Ok(XmlEvent::Close(path)));
                }
                Token::Text(text) if !text.is_empty() && !self.stack.is_empty() => {
                    return Some(Ok(XmlEvent::Text {
                        path: self.path(),
                        text,
                    }));
                }
                Token::Eof => {
                    self.done = true;
                    if self.stack.is_empty() {
                        return None;
                    }
                    return Some(Err(XmlError::Truncated(self.path())));
                }
                Token::Text(_) | Token::Skip => {}
            }
        }
    }
}
