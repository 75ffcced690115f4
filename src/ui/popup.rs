/// Actions offered inside an overlay's info popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupAction {
    Edit,
    Delete,
}

impl PopupAction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "edit" => Some(PopupAction::Edit),
            "delete" => Some(PopupAction::Delete),
            _ => None,
        }
    }
}

/// The floating info window attached to an overlay's handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoPopup {
    markup: Option<String>,
    open: bool,
}

impl InfoPopup {
    pub fn markup(&self) -> Option<&str> {
        self.markup.as_deref()
    }

    pub fn set_markup(&mut self, markup: String) {
        self.markup = Some(markup);
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_state() {
        let mut popup = InfoPopup::default();
        assert!(popup.markup().is_none());
        assert!(!popup.is_open());

        popup.set_markup("<div/>".to_string());
        popup.open();
        assert_eq!(popup.markup(), Some("<div/>"));
        assert!(popup.is_open());

        popup.close();
        assert!(!popup.is_open());
    }

    #[test]
    fn test_action_names() {
        assert_eq!(PopupAction::from_name("edit"), Some(PopupAction::Edit));
        assert_eq!(PopupAction::from_name("delete"), Some(PopupAction::Delete));
        assert_eq!(PopupAction::from_name("share"), None);
    }
}
