use crate::background::SessionToken;

/// What the single modal region currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalContent {
    /// Form of an open editing session
    Session(SessionToken),
    /// Review list of every overlay
    OverlayList,
}

/// The one modal region a map field owns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModalRegion {
    content: Option<ModalContent>,
    markup: Option<String>,
}

impl ModalRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, content: ModalContent, markup: String) {
        self.content = Some(content);
        self.markup = Some(markup);
    }

    /// Close the region, returning what it showed.
    pub fn hide(&mut self) -> Option<ModalContent> {
        self.markup = None;
        self.content.take()
    }

    pub fn is_open(&self) -> bool {
        self.content.is_some()
    }

    pub fn content(&self) -> Option<ModalContent> {
        self.content
    }

    pub fn markup(&self) -> Option<&str> {
        self.markup.as_deref()
    }
}
