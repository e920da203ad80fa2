use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::intent::{NavigationIntent, PanelRequest, Selector};
use crate::prefs::Prefs;
use crate::remote::{FetchError, PanelService, PanelViewModel};
use crate::render::{render, Surface};
use crate::viewport::{Mode, Viewport};

/// Fire-and-forget toast sink.
pub trait Notifier {
    fn notify(&mut self, message: &str, level: Level);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

struct FetchOutcome {
    generation: u64,
    selector: Selector,
    result: Result<PanelViewModel, FetchError>,
}

/// Drives the navigation panel: turns intents into fetches and fetch
/// resolutions into renders. Only the most recently initiated fetch may
/// render; anything older is discarded on arrival.
pub struct PanelController {
    prefs: Prefs,
    service: Arc<dyn PanelService>,
    viewport: Viewport,
    generation: u64,
    tx: Sender<FetchOutcome>,
    rx: Receiver<FetchOutcome>,
}

impl PanelController {
    pub fn new(prefs: Prefs, service: Arc<dyn PanelService>, viewport: Viewport) -> Self {
        let (tx, rx) = unbounded();
        Self {
            prefs,
            service,
            viewport,
            generation: 0,
            tx,
            rx,
        }
    }

    pub fn prefs(&self) -> &Prefs {
        &self.prefs
    }

    pub fn is_compact(&self) -> bool {
        self.viewport.is_compact()
    }

    /// Forwards a layout width change to the viewport detector.
    pub fn viewport_resized(&mut self, width: u16, surface: &mut dyn Surface) -> Option<Mode> {
        self.viewport.update(width, &self.prefs, surface)
    }

    /// Entry point for every panel trigger. In compact mode the intent is
    /// dropped before any state is touched; otherwise the request is
    /// resolved (persisting navigation state) and dispatched.
    pub fn apply(&mut self, intent: NavigationIntent, surface: &mut dyn Surface) -> Result<()> {
        let Some(request) = self.begin(intent, surface)? else {
            return Ok(());
        };
        let generation = self.generation;
        let service = self.service.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let selector = request.selector.clone();
            let result = service.fetch(&request);
            let _ = tx.send(FetchOutcome {
                generation,
                selector,
                result,
            });
        });
        Ok(())
    }

    /// Replays the last persisted selector and page, used at startup so the
    /// panel resumes where the previous session left it.
    pub fn restore(&mut self, surface: &mut dyn Surface) -> Result<()> {
        let selector = self
            .prefs
            .active_selector()?
            .unwrap_or(Selector::Today);
        let page = self.prefs.active_page()?.unwrap_or(1);
        self.apply(NavigationIntent::new(selector).page(page), surface)
    }

    /// Drains resolved fetches. Returns true when anything changed.
    pub fn poll(&mut self, surface: &mut dyn Surface, notifier: &mut dyn Notifier) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.rx.try_recv() {
            changed |= self.resolve(outcome, surface, notifier);
        }
        changed
    }

    fn begin(
        &mut self,
        intent: NavigationIntent,
        surface: &mut dyn Surface,
    ) -> Result<Option<PanelRequest>> {
        if self.viewport.is_compact() {
            return Ok(None);
        }
        let request = crate::intent::resolve_intent(intent, &self.prefs)?;
        self.generation = self.generation.wrapping_add(1);
        surface.set_loading(true);
        Ok(Some(request))
    }

    fn resolve(
        &mut self,
        outcome: FetchOutcome,
        surface: &mut dyn Surface,
        notifier: &mut dyn Notifier,
    ) -> bool {
        if outcome.generation != self.generation {
            // A newer fetch owns the loading indicator now; this result is
            // stale and must not touch the surface.
            return false;
        }
        match outcome.result {
            Ok(model) => {
                render(surface, &model, &outcome.selector);
                surface.set_loading(false);
            }
            Err(err) => {
                surface.set_loading(false);
                notifier.notify(err.notice(), Level::Error);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{sample_view_model, MockPanelService};
    use crate::render::MemorySurface;
    use crate::storage::MemoryStore;
    use crate::viewport::DEFAULT_BREAKPOINT;
    use std::time::{Duration, Instant};

    struct RecordingNotifier {
        messages: Vec<(String, Level)>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                messages: Vec::new(),
            }
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&mut self, message: &str, level: Level) {
            self.messages.push((message.to_string(), level));
        }
    }

    fn controller() -> PanelController {
        let prefs = Prefs::new(Arc::new(MemoryStore::new()));
        PanelController::new(
            prefs,
            Arc::new(MockPanelService),
            Viewport::new(DEFAULT_BREAKPOINT),
        )
    }

    fn full_mode(controller: &mut PanelController, surface: &mut MemorySurface) {
        controller.viewport_resized(1200, surface);
    }

    fn outcome_for(generation: u64, selector: Selector, title: &str) -> FetchOutcome {
        let request = PanelRequest {
            selector: selector.clone(),
            page: 1,
            year: None,
            search_keys: None,
            force_refresh: false,
            tab: None,
            exclusions: None,
            extra: None,
        };
        let mut model = sample_view_model(&request);
        model.display_name = title.to_string();
        FetchOutcome {
            generation,
            selector,
            result: Ok(model),
        }
    }

    #[test]
    fn compact_mode_drops_intents() {
        let mut controller = controller();
        let mut surface = MemorySurface::new();
        controller.viewport_resized(600, &mut surface);
        let before = surface.clone();

        controller
            .apply(NavigationIntent::new(Selector::Popular), &mut surface)
            .unwrap();
        assert_eq!(surface, before);
        assert_eq!(
            controller.prefs().active_selector().unwrap(),
            None,
            "a dropped intent must not persist state"
        );
    }

    #[test]
    fn latest_generation_wins() {
        let mut controller = controller();
        let mut surface = MemorySurface::new();
        let mut notifier = RecordingNotifier::new();
        full_mode(&mut controller, &mut surface);

        let a = controller
            .begin(NavigationIntent::new(Selector::Today), &mut surface)
            .unwrap()
            .expect("request a");
        let b = controller
            .begin(NavigationIntent::new(Selector::Popular), &mut surface)
            .unwrap()
            .expect("request b");
        assert_eq!(a.selector, Selector::Today);

        // B resolves first and renders.
        let changed = controller.resolve(
            outcome_for(2, b.selector.clone(), "fresh"),
            &mut surface,
            &mut notifier,
        );
        assert!(changed);
        assert_eq!(surface.title, "fresh");
        assert!(!surface.loading);

        // A arrives late; nothing may change, not even the indicator.
        let rendered = surface.clone();
        let changed = controller.resolve(
            outcome_for(1, a.selector, "stale"),
            &mut surface,
            &mut notifier,
        );
        assert!(!changed);
        assert_eq!(surface, rendered);
        assert!(notifier.messages.is_empty());
    }

    #[test]
    fn stale_result_leaves_loading_indicator() {
        let mut controller = controller();
        let mut surface = MemorySurface::new();
        let mut notifier = RecordingNotifier::new();
        full_mode(&mut controller, &mut surface);

        let a = controller
            .begin(NavigationIntent::new(Selector::Today), &mut surface)
            .unwrap()
            .expect("request a");
        controller
            .begin(NavigationIntent::new(Selector::Popular), &mut surface)
            .unwrap()
            .expect("request b");

        controller.resolve(
            outcome_for(1, a.selector, "stale"),
            &mut surface,
            &mut notifier,
        );
        assert!(
            surface.loading,
            "the pending newer fetch still owns the indicator"
        );
    }

    #[test]
    fn failure_preserves_previous_render() {
        let mut controller = controller();
        let mut surface = MemorySurface::new();
        let mut notifier = RecordingNotifier::new();
        full_mode(&mut controller, &mut surface);

        let first = controller
            .begin(NavigationIntent::new(Selector::Popular), &mut surface)
            .unwrap()
            .expect("first request");
        controller.resolve(
            outcome_for(1, first.selector, "popular"),
            &mut surface,
            &mut notifier,
        );
        let rendered = surface.clone();

        let second = controller
            .begin(NavigationIntent::new(Selector::Today), &mut surface)
            .unwrap()
            .expect("second request");
        controller.resolve(
            FetchOutcome {
                generation: 2,
                selector: second.selector,
                result: Err(FetchError::Protocol {
                    message: "quota exceeded".into(),
                }),
            },
            &mut surface,
            &mut notifier,
        );

        assert!(!surface.loading);
        let mut expected = rendered;
        expected.loading = false;
        assert_eq!(surface, expected);
        assert_eq!(
            notifier.messages,
            vec![("quota exceeded".to_string(), Level::Error)]
        );
    }

    #[test]
    fn apply_and_poll_round_trip() {
        let mut controller = controller();
        let mut surface = MemorySurface::new();
        let mut notifier = RecordingNotifier::new();
        full_mode(&mut controller, &mut surface);

        controller
            .apply(NavigationIntent::new(Selector::Popular), &mut surface)
            .unwrap();
        assert!(surface.loading);

        let deadline = Instant::now() + Duration::from_secs(5);
        while !controller.poll(&mut surface, &mut notifier) {
            assert!(Instant::now() < deadline, "fetch never resolved");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!surface.loading);
        assert_eq!(surface.title, "popular");
    }

    #[test]
    fn restore_replays_persisted_state() {
        let prefs = Prefs::new(Arc::new(MemoryStore::new()));
        prefs.set_active_selector(&Selector::History).unwrap();
        prefs.set_active_page(2).unwrap();
        prefs.set_selected_year(2020).unwrap();

        let mut controller = PanelController::new(
            prefs,
            Arc::new(MockPanelService),
            Viewport::new(DEFAULT_BREAKPOINT),
        );
        let mut surface = MemorySurface::new();
        let mut notifier = RecordingNotifier::new();
        controller.viewport_resized(1200, &mut surface);

        controller.restore(&mut surface).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !controller.poll(&mut surface, &mut notifier) {
            assert!(Instant::now() < deadline, "restore never resolved");
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(surface.title, "on this day");
        let years = surface.year_options.as_ref().expect("year selector shown");
        assert!(years
            .iter()
            .any(|option| option.year == 2020 && option.selected));
        assert_eq!(
            controller.prefs().active_selector().unwrap(),
            Some(Selector::History)
        );
        assert_eq!(controller.prefs().active_page().unwrap(), Some(2));
    }
}
