//! Preview image slots and their preload tickets.
//!
//! The host verifies that an image actually loads before it is shown. Each
//! request is a ticket stamped with the selection generation it was issued
//! under; a slot only accepts the completion of the ticket it is currently
//! waiting on, so a slow preload can never overwrite a newer selection.

use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageSlot {
    Vehicle,
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    Selection,
    /// Stock/lowered switch; a failed load restores `previous`.
    LoweredToggle { previous: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTicket {
    pub slot: ImageSlot,
    pub url: String,
    pub generation: u64,
    pub origin: ImageOrigin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageStatus {
    #[default]
    Empty,
    Loading,
    Loaded,
    Errored,
}

/// What a completion did to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCompletion {
    Shown,
    /// Selection image failed; the slot is now blank.
    Suppressed,
    /// Toggle image failed; the old image stays and the stance must revert.
    Reverted { previous: bool },
    /// Superseded ticket, ignored.
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct SlotState {
    displayed: String,
    status: ImageStatus,
    pending: Option<ImageTicket>,
    failed_url: Option<String>,
}

impl SlotState {
    /// URL currently on screen; empty when suppressed.
    pub fn displayed(&self) -> &str {
        &self.displayed
    }

    pub fn status(&self) -> ImageStatus {
        self.status
    }

    pub fn pending(&self) -> Option<&ImageTicket> {
        self.pending.as_ref()
    }

    fn settled_status(&self) -> ImageStatus {
        if self.displayed.is_empty() {
            ImageStatus::Empty
        } else {
            ImageStatus::Loaded
        }
    }
}

#[derive(Debug, Default)]
pub struct ImageSlots {
    vehicle: SlotState,
    overlay: SlotState,
    queue: Vec<ImageTicket>,
}

impl ImageSlots {
    pub fn slot(&self, slot: ImageSlot) -> &SlotState {
        match slot {
            ImageSlot::Vehicle => &self.vehicle,
            ImageSlot::Overlay => &self.overlay,
        }
    }

    fn slot_mut(&mut self, slot: ImageSlot) -> &mut SlotState {
        match slot {
            ImageSlot::Vehicle => &mut self.vehicle,
            ImageSlot::Overlay => &mut self.overlay,
        }
    }

    /// Points `slot` at `url`. A preload is queued only when the URL differs
    /// from what is shown or already in flight; `None` blanks the slot.
    pub fn request(&mut self, slot: ImageSlot, url: Option<&str>, generation: u64, origin: ImageOrigin) {
        let Some(url) = url else {
            self.queue.retain(|ticket| ticket.slot != slot);
            let state = self.slot_mut(slot);
            state.pending = None;
            state.displayed.clear();
            state.status = ImageStatus::Empty;
            state.failed_url = None;
            return;
        };

        let state = self.slot(slot);
        let in_flight = state.pending.as_ref().is_some_and(|ticket| ticket.url == url);
        let settled = state.pending.is_none() && state.displayed == url;
        let known_bad = state.pending.is_none() && state.failed_url.as_deref() == Some(url);
        if in_flight || settled || known_bad {
            return;
        }

        let ticket = ImageTicket {
            slot,
            url: url.to_string(),
            generation,
            origin,
        };
        self.queue.retain(|queued| queued.slot != slot);
        self.queue.push(ticket.clone());

        let state = self.slot_mut(slot);
        state.pending = Some(ticket);
        state.status = ImageStatus::Loading;
        state.failed_url = None;
    }

    /// Tickets the host has not started yet.
    pub fn take_requests(&mut self) -> Vec<ImageTicket> {
        std::mem::take(&mut self.queue)
    }

    pub fn complete(&mut self, ticket: &ImageTicket, loaded: bool) -> ImageCompletion {
        let state = self.slot_mut(ticket.slot);
        if state.pending.as_ref() != Some(ticket) {
            debug!(
                "discarding stale {:?} preload of {} (generation {})",
                ticket.slot, ticket.url, ticket.generation
            );
            return ImageCompletion::Stale;
        }
        state.pending = None;

        if loaded {
            state.displayed = ticket.url.clone();
            state.status = ImageStatus::Loaded;
            return ImageCompletion::Shown;
        }

        match ticket.origin {
            ImageOrigin::Selection => {
                state.displayed.clear();
                state.status = ImageStatus::Errored;
                state.failed_url = Some(ticket.url.clone());
                ImageCompletion::Suppressed
            }
            ImageOrigin::LoweredToggle { previous } => {
                state.status = state.settled_status();
                ImageCompletion::Reverted { previous }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_request_supersedes_in_flight_ticket() {
        let mut slots = ImageSlots::default();
        slots.request(ImageSlot::Vehicle, Some("red.png"), 1, ImageOrigin::Selection);
        slots.request(ImageSlot::Vehicle, Some("blue.png"), 2, ImageOrigin::Selection);

        let queued = slots.take_requests();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].url, "blue.png");

        let stale = ImageTicket {
            slot: ImageSlot::Vehicle,
            url: "red.png".into(),
            generation: 1,
            origin: ImageOrigin::Selection,
        };
        assert_eq!(slots.complete(&stale, true), ImageCompletion::Stale);
        assert_eq!(slots.complete(&queued[0], true), ImageCompletion::Shown);
        assert_eq!(slots.slot(ImageSlot::Vehicle).displayed(), "blue.png");
    }

    #[test]
    fn unchanged_url_keeps_its_ticket() {
        let mut slots = ImageSlots::default();
        slots.request(ImageSlot::Overlay, Some("o.png"), 1, ImageOrigin::Selection);
        slots.request(ImageSlot::Overlay, Some("o.png"), 2, ImageOrigin::Selection);

        let queued = slots.take_requests();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].generation, 1);
        assert_eq!(slots.complete(&queued[0], true), ImageCompletion::Shown);

        slots.request(ImageSlot::Overlay, Some("o.png"), 3, ImageOrigin::Selection);
        assert!(slots.take_requests().is_empty());
    }

    #[test]
    fn failed_selection_image_is_blanked_and_not_retried() {
        let mut slots = ImageSlots::default();
        slots.request(ImageSlot::Overlay, Some("broken.png"), 1, ImageOrigin::Selection);
        let ticket = slots.take_requests().remove(0);

        assert_eq!(slots.complete(&ticket, false), ImageCompletion::Suppressed);
        let overlay = slots.slot(ImageSlot::Overlay);
        assert_eq!(overlay.displayed(), "");
        assert_eq!(overlay.status(), ImageStatus::Errored);

        slots.request(ImageSlot::Overlay, Some("broken.png"), 2, ImageOrigin::Selection);
        assert!(slots.take_requests().is_empty());
    }

    #[test]
    fn failed_toggle_keeps_previous_image() {
        let mut slots = ImageSlots::default();
        slots.request(ImageSlot::Vehicle, Some("stock.png"), 1, ImageOrigin::Selection);
        let stock = slots.take_requests().remove(0);
        slots.complete(&stock, true);

        slots.request(
            ImageSlot::Vehicle,
            Some("low.png"),
            2,
            ImageOrigin::LoweredToggle { previous: false },
        );
        let lowered = slots.take_requests().remove(0);

        assert_eq!(
            slots.complete(&lowered, false),
            ImageCompletion::Reverted { previous: false }
        );
        let vehicle = slots.slot(ImageSlot::Vehicle);
        assert_eq!(vehicle.displayed(), "stock.png");
        assert_eq!(vehicle.status(), ImageStatus::Loaded);
    }

    #[test]
    fn blanking_a_slot_drops_its_queued_ticket() {
        let mut slots = ImageSlots::default();
        slots.request(ImageSlot::Overlay, Some("o.png"), 1, ImageOrigin::Selection);
        slots.request(ImageSlot::Overlay, None, 2, ImageOrigin::Selection);

        assert!(slots.take_requests().is_empty());
        assert_eq!(slots.slot(ImageSlot::Overlay).status(), ImageStatus::Empty);
    }
}
