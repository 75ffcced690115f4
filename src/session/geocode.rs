//! Free-text place search that can drop a marker on the chosen result.

use super::{SessionContext, SessionCore, SessionForm, SessionState};
use crate::{
    background::{Purpose, Ticket},
    layers::{base::OverlayRef, marker::Marker, marker::MarkerAttrs},
    platform::{GeocodeRequest, GeocodeResponse, GeocodeResult, GeocodeStatus},
    MapError, Result,
};

pub struct GeocodeSession {
    core: SessionCore,
    query: String,
    results: Vec<GeocodeResult>,
    status: Option<GeocodeStatus>,
    chosen: Option<usize>,
    /// Bumped per search; carried as the ticket generation
    search_seq: u64,
}

impl GeocodeSession {
    pub(crate) fn open(mut core: SessionCore) -> Self {
        core.begin_editing();
        Self {
            core,
            query: String::new(),
            results: Vec::new(),
            status: None,
            chosen: None,
            search_seq: 0,
        }
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[GeocodeResult] {
        &self.results
    }

    pub fn status(&self) -> Option<GeocodeStatus> {
        self.status
    }

    pub fn chosen(&self) -> Option<&GeocodeResult> {
        self.chosen.and_then(|index| self.results.get(index))
    }

    /// Store the answer to search number `seq`; answers to older searches are dropped.
    pub(crate) fn apply_results(&mut self, seq: u64, response: GeocodeResponse) -> bool {
        if seq != self.search_seq {
            log::debug!("dropping results of superseded search {seq}");
            return false;
        }
        self.chosen = None;
        match response {
            Ok(results) => {
                self.status = None;
                self.results = results;
            }
            Err(status) => {
                log::info!("search for {:?} failed: {}", self.query, status);
                self.status = Some(status);
                self.results.clear();
            }
        }
        true
    }

    pub(crate) fn commit(self, cx: &mut SessionContext<'_>) -> Result<Option<OverlayRef>> {
        let GeocodeSession {
            mut core,
            results,
            chosen,
            ..
        } = self;
        let reference = match chosen.and_then(|index| results.get(index)) {
            Some(result) => {
                let mut attrs = MarkerAttrs::at(result.location);
                attrs.apply_geocode(Some(result));
                let mut marker = Marker::create(attrs, cx.services.platform.as_ref());
                if let Err(err) = marker.build_info_content(cx.services.templates.as_ref()) {
                    log::warn!("could not build popup for marker {}: {}", marker.id(), err);
                }
                Some(cx.overlays.push(marker))
            }
            None => None,
        };
        core.finish(SessionState::Committed);
        Ok(reference)
    }

    pub(crate) fn cancel(mut self, _cx: &mut SessionContext<'_>) -> Result<()> {
        self.results.clear();
        self.chosen = None;
        self.core.finish(SessionState::Cancelled);
        Ok(())
    }
}

impl<'a> SessionForm<'a, GeocodeSession> {
    /// Start a search; the previous one, if still in flight, is superseded.
    pub fn search(&mut self, query: impl Into<String>) -> Result<()> {
        let query = query.into().trim().to_string();
        let session = &mut *self.session;
        session.search_seq += 1;
        session.results.clear();
        session.status = None;
        session.chosen = None;
        session.query = query.clone();
        if query.is_empty() {
            return Ok(());
        }

        let mut ticket = Ticket::untargeted(Purpose::GeocodeSearch).in_session(Some(session.core.token()));
        ticket.generation = session.search_seq;
        self.cx.tasks.geocode(
            ticket,
            self.cx.services.geocoder.clone(),
            GeocodeRequest::Address(query),
        );
        Ok(())
    }

    pub fn results(&self) -> &[GeocodeResult] {
        self.session.results()
    }

    pub fn choose(&mut self, index: usize) -> Result<()> {
        let len = self.session.results.len();
        if index >= len {
            return Err(MapError::IndexOutOfBounds { index, len }.into());
        }
        self.session.chosen = Some(index);
        Ok(())
    }

    pub fn render(&mut self) -> Result<String> {
        let session = &*self.session;
        let results: Vec<_> = session
            .results
            .iter()
            .map(|result| {
                serde_json::json!({
                    "address": result.formatted_address,
                    "lat": result.location.lat,
                    "lng": result.location.lng,
                })
            })
            .collect();
        let data = serde_json::json!({
            "kind": "geocode",
            "session": session.core.token().0,
            "query": session.query,
            "results": results,
            "status": session.status.map(|status| status.to_string()),
            "chosen": session.chosen,
        });
        self.cx
            .services
            .templates
            .render(&self.cx.config.templates.session_form, &data)
    }
}
