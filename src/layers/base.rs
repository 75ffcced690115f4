use crate::{
    core::geo::{LatLng, LatLngBounds},
    layers::attributes::AttributeModel,
    platform::{HandleId, Interaction, MappingPlatform, Primitive, Templates},
    ui::popup::InfoPopup,
    Result,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayKind {
    Marker,
    Polygon,
    Polyline,
    Route,
    Circle,
    GroundOverlay,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 6] = [
        OverlayKind::Marker,
        OverlayKind::Polygon,
        OverlayKind::Polyline,
        OverlayKind::Route,
        OverlayKind::Circle,
        OverlayKind::GroundOverlay,
    ];

    /// Key of this kind's array in the persisted field
    pub fn collection_key(&self) -> &'static str {
        match self {
            OverlayKind::Marker => "markers",
            OverlayKind::Polygon => "polygons",
            OverlayKind::Polyline => "polylines",
            OverlayKind::Route => "routes",
            OverlayKind::Circle => "circles",
            OverlayKind::GroundOverlay => "groundOverlays",
        }
    }

    /// Human-readable name, as used in list rows and errors
    pub fn name(&self) -> &'static str {
        match self {
            OverlayKind::Marker => "marker",
            OverlayKind::Polygon => "polygon",
            OverlayKind::Polyline => "polyline",
            OverlayKind::Route => "route",
            OverlayKind::Circle => "circle",
            OverlayKind::GroundOverlay => "ground overlay",
        }
    }
}

impl std::fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Addresses one overlay across the six collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayRef {
    pub kind: OverlayKind,
    pub id: HandleId,
}

impl OverlayRef {
    pub fn new(kind: OverlayKind, id: HandleId) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for OverlayRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Popup body: free text or pre-split lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Lines(Vec<String>),
}

impl Content {
    /// One line per comma-separated part of a formatted address.
    pub fn from_address(formatted_address: &str) -> Self {
        Content::Lines(
            formatted_address
                .split(',')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn lines(&self) -> Vec<String> {
        match self {
            Content::Text(text) if text.is_empty() => Vec::new(),
            Content::Text(text) => text.lines().map(str::to_string).collect(),
            Content::Lines(lines) => lines.clone(),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

/// Attributes every overlay kind persists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommonAttrs {
    pub title: String,
    pub content: Content,
    pub custom_content: bool,
    pub is_saved_to_map: bool,
    pub deleted: bool,
}

/// Per-kind attribute record: what gets persisted and what the handle draws.
pub trait OverlayAttributes:
    Clone + PartialEq + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: OverlayKind;

    fn common(&self) -> &CommonAttrs;

    fn common_mut(&mut self) -> &mut CommonAttrs;

    fn primitive(&self) -> Primitive;

    fn bounds(&self) -> Option<LatLngBounds>;

    /// Where the popup opens
    fn info_window_position(&self) -> LatLng;

    /// Whether there is enough geometry to put the handle on the map.
    fn is_drawable(&self) -> bool {
        true
    }

    /// Pull geometry the user changed directly on the handle into the record.
    /// Returns true when something was adopted.
    fn adopt_live_geometry(&mut self, _platform: &dyn MappingPlatform, _handle: HandleId) -> bool {
        false
    }
}

/// Shared overlay core: one handle, one popup, one attribute model.
pub struct Overlay<A> {
    handle: HandleId,
    model: AttributeModel<A>,
    popup: InfoPopup,
    interaction: Interaction,
    generation: u64,
    is_new: bool,
}

impl<A: OverlayAttributes> Overlay<A> {
    /// Wrap attributes loaded from the persisted field.
    pub fn create(mut attrs: A, platform: &dyn MappingPlatform) -> Self {
        attrs.common_mut().is_saved_to_map = true;
        Self::with_handle(attrs, platform, false)
    }

    /// Start a brand-new overlay from an "Add" action.
    pub fn draft(mut attrs: A, platform: &dyn MappingPlatform) -> Self {
        let common = attrs.common_mut();
        common.is_saved_to_map = false;
        common.deleted = false;
        Self::with_handle(attrs, platform, true)
    }

    fn with_handle(attrs: A, platform: &dyn MappingPlatform, is_new: bool) -> Self {
        let handle = platform.create(attrs.primitive());
        let overlay = Self {
            handle,
            model: AttributeModel::new(attrs),
            popup: InfoPopup::default(),
            interaction: Interaction::frozen(),
            generation: 0,
            is_new,
        };
        overlay.sync_attachment(platform);
        overlay
    }

    pub fn id(&self) -> HandleId {
        self.handle
    }

    pub fn attrs(&self) -> &A {
        self.model.get()
    }

    pub fn model(&self) -> &AttributeModel<A> {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut AttributeModel<A> {
        &mut self.model
    }

    pub fn popup(&self) -> &InfoPopup {
        &self.popup
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    pub fn title(&self) -> &str {
        &self.attrs().common().title
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_deleted(&self) -> bool {
        self.attrs().common().deleted
    }

    pub fn is_saved_to_map(&self) -> bool {
        self.attrs().common().is_saved_to_map
    }

    /// Bumped whenever pending asynchronous results must stop applying.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mutate attributes and redraw the handle if anything changed.
    pub fn update<F>(&mut self, platform: &dyn MappingPlatform, mutate: F) -> Vec<String>
    where
        F: FnOnce(&mut A),
    {
        let changed = self.model.set(mutate);
        if !changed.is_empty() {
            self.redraw(platform);
        }
        changed
    }

    /// String-keyed form binding, e.g. `("strokeColor", "#ff0000")`.
    pub fn set_value(
        &mut self,
        platform: &dyn MappingPlatform,
        key: &str,
        value: serde_json::Value,
    ) -> Result<Vec<String>> {
        let changed = self.model.set_value(key, value)?;
        if !changed.is_empty() {
            self.redraw(platform);
        }
        Ok(changed)
    }

    /// Record a change the user already made on the handle; no redraw.
    pub fn write_back<F>(&mut self, mutate: F) -> Vec<String>
    where
        F: FnOnce(&mut A),
    {
        self.model.set(mutate)
    }

    pub fn redraw(&self, platform: &dyn MappingPlatform) {
        platform.update(self.handle, self.attrs().primitive());
        self.sync_attachment(platform);
    }

    fn sync_attachment(&self, platform: &dyn MappingPlatform) {
        let attrs = self.attrs();
        platform.set_attached(self.handle, !attrs.common().deleted && attrs.is_drawable());
    }

    pub fn set_interaction(&mut self, platform: &dyn MappingPlatform, interaction: Interaction) {
        self.interaction = interaction;
        platform.set_interaction(self.handle, interaction);
    }

    /// Soft delete: hide the handle, keep the overlay for undo.
    pub fn remove(&mut self, platform: &dyn MappingPlatform) {
        self.close_popup(platform);
        self.model.set(|attrs| attrs.common_mut().deleted = true);
        self.generation += 1;
        platform.set_attached(self.handle, false);
    }

    /// Undo a soft delete.
    pub fn restore(&mut self, platform: &dyn MappingPlatform) {
        self.model.set(|attrs| attrs.common_mut().deleted = false);
        self.sync_attachment(platform);
    }

    /// Revert every attribute and the handle geometry to `snapshot`.
    pub fn reset(&mut self, platform: &dyn MappingPlatform, snapshot: A) {
        self.model.replace(snapshot);
        self.generation += 1;
        self.redraw(platform);
    }

    /// Detach the handle for good.
    pub fn discard(&mut self, platform: &dyn MappingPlatform) {
        self.popup.close();
        self.generation += 1;
        platform.discard(self.handle);
    }

    /// Registered into a collection: no longer new, persisted from now on.
    pub fn mark_saved(&mut self) {
        self.is_new = false;
        self.model
            .set(|attrs| attrs.common_mut().is_saved_to_map = true);
    }

    pub fn build_info_content(&mut self, templates: &dyn Templates) -> Result<()> {
        let common = self.attrs().common();
        let data = serde_json::json!({
            "kind": A::KIND.to_string(),
            "title": common.title,
            "lines": common.content.lines(),
            "actions": ["edit", "delete"],
        });
        self.popup.set_markup(templates.render("info-window", &data)?);
        Ok(())
    }

    pub fn open_popup(&mut self, platform: &dyn MappingPlatform) {
        if let Some(markup) = self.popup.markup() {
            platform.open_popup(self.handle, markup, self.attrs().info_window_position());
            self.popup.open();
        }
    }

    pub fn close_popup(&mut self, platform: &dyn MappingPlatform) {
        if self.popup.is_open() {
            platform.close_popup(self.handle);
        }
        self.popup.close();
    }

    /// Adopt handle-side geometry, then project the attributes for the field.
    pub fn to_json(&mut self, platform: &dyn MappingPlatform) -> Result<serde_json::Value> {
        let mut attrs = self.attrs().clone();
        if attrs.adopt_live_geometry(platform, self.handle) {
            self.model.replace(attrs);
        }
        Ok(serde_json::to_value(self.attrs())?)
    }
}

impl<A: OverlayAttributes> crate::traits::OverlayOperations for Overlay<A> {
    fn id(&self) -> HandleId {
        self.handle
    }

    fn kind(&self) -> OverlayKind {
        A::KIND
    }

    fn title(&self) -> &str {
        Overlay::title(self)
    }

    fn is_deleted(&self) -> bool {
        Overlay::is_deleted(self)
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn bounds(&self) -> Option<LatLngBounds> {
        self.attrs().bounds()
    }

    fn remove(&mut self, platform: &dyn MappingPlatform) {
        Overlay::remove(self, platform)
    }

    fn restore(&mut self, platform: &dyn MappingPlatform) {
        Overlay::restore(self, platform)
    }

    fn discard(&mut self, platform: &dyn MappingPlatform) {
        Overlay::discard(self, platform)
    }

    fn build_info_content(&mut self, templates: &dyn Templates) -> Result<()> {
        Overlay::build_info_content(self, templates)
    }

    fn open_popup(&mut self, platform: &dyn MappingPlatform) {
        Overlay::open_popup(self, platform)
    }

    fn close_popup(&mut self, platform: &dyn MappingPlatform) {
        Overlay::close_popup(self, platform)
    }

    fn to_json(&mut self, platform: &dyn MappingPlatform) -> Result<serde_json::Value> {
        Overlay::to_json(self, platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_from_address() {
        let content = Content::from_address("1600 Amphitheatre Pkwy, Mountain View, CA 94043, USA");
        assert_eq!(
            content.lines(),
            vec!["1600 Amphitheatre Pkwy", "Mountain View", "CA 94043", "USA"]
        );
    }

    #[test]
    fn test_content_wire_shapes() {
        let text: Content = serde_json::from_value(serde_json::json!("hello")).unwrap();
        assert_eq!(text, Content::Text("hello".into()));

        let lines: Content = serde_json::from_value(serde_json::json!(["a", "b"])).unwrap();
        assert_eq!(lines.lines(), vec!["a", "b"]);
        assert!(Content::default().lines().is_empty());
    }

    #[test]
    fn test_collection_keys() {
        let keys: Vec<_> = OverlayKind::ALL.iter().map(|k| k.collection_key()).collect();
        assert_eq!(
            keys,
            vec!["markers", "polygons", "polylines", "routes", "circles", "groundOverlays"]
        );
    }
}
