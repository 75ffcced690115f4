//! Review list of every overlay on a map surface.
//!
//! Deleted overlays stay listed so they can be restored; permanently
//! deleting one is the only way an overlay leaves its collection.

use crate::{
    background::SessionToken,
    core::surface::MapSurface,
    layers::base::{OverlayKind, OverlayRef},
    Result,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRow {
    #[serde(skip)]
    pub reference: OverlayRef,
    pub kind: OverlayKind,
    pub title: String,
    pub deleted: bool,
}

pub struct OverlayListView<'a> {
    surface: &'a mut MapSurface,
}

impl<'a> OverlayListView<'a> {
    pub(crate) fn new(surface: &'a mut MapSurface) -> Self {
        Self { surface }
    }

    pub fn rows(&self) -> Vec<ListRow> {
        self.surface
            .overlays()
            .iter()
            .map(|item| {
                let title = match item.title() {
                    "" => format!("Untitled {}", item.kind()),
                    title => title.to_string(),
                };
                ListRow {
                    reference: OverlayRef::new(item.kind(), item.id()),
                    kind: item.kind(),
                    title,
                    deleted: item.is_deleted(),
                }
            })
            .collect()
    }

    /// Open an editing session that returns to this list when it closes.
    pub fn edit(&mut self, reference: OverlayRef) -> Result<SessionToken> {
        self.surface.edit(reference, true)
    }

    pub fn delete(&mut self, reference: OverlayRef) -> Result<()> {
        self.surface.delete(reference, true)
    }

    pub fn undo(&mut self, reference: OverlayRef) -> Result<()> {
        self.surface.undo(reference)
    }

    pub fn permanently_delete(&mut self, reference: OverlayRef) -> Result<()> {
        self.surface.permanently_delete(reference)
    }

    pub fn render(&self) -> Result<String> {
        let rows: Vec<serde_json::Value> = self
            .rows()
            .into_iter()
            .map(|row| {
                let mut value = serde_json::to_value(&row)?;
                value["id"] = serde_json::json!(row.reference.id.0);
                Ok(value)
            })
            .collect::<std::result::Result<_, serde_json::Error>>()?;
        let template = &self.surface.config().templates.overlay_list;
        self.surface
            .services()
            .templates
            .render(template, &serde_json::json!({ "rows": rows }))
    }
}
