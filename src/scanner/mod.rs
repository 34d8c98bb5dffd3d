mod driver;
pub mod extract;
pub mod feed;
pub mod render;
pub mod state;

use std::sync::Arc;

use tokio::sync::mpsc;

pub use driver::ScannerTask;
pub use extract::{ExtractionPolicy, PreFilter, TextSource, Verdict};
pub use feed::{channel_feed, ChangeFeed, ChannelFeed, FeedPublisher};
pub use render::{Badge, Effect, Renderer};
pub use state::{SkipReason, UnitPhase, UnitState, UnitTable};

use crate::{
    config::ScannerConfig,
    domain::{
        types::DEFAULT_MAX_TEXT_LENGTH, ClassificationOutcome, ClassificationRequest, FeedBatch,
        FeedItem, UnitId,
    },
    settings::{Settings, SettingsStore},
    tasks::RequestSink,
};

/// Result for one dispatched unit, tagged with the epoch it was sent in.
#[derive(Debug)]
pub struct Completion {
    pub unit: UnitId,
    pub epoch: u64,
    pub ticket: u64,
    pub outcome: ClassificationOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScanTrigger {
    None,
    Debounced,
    Immediate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub dispatched: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ScannerOptions {
    pub extraction: ExtractionPolicy,
    pub prefilter: PreFilter,
    pub max_text_length: usize,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            extraction: ExtractionPolicy::default(),
            prefilter: PreFilter::default(),
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }
}

impl ScannerOptions {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            extraction: ExtractionPolicy::default(),
            prefilter: PreFilter::from_config(config),
            max_text_length: config.max_text_length,
        }
    }
}

pub struct FeedScanner {
    store: Arc<dyn SettingsStore>,
    settings: Settings,
    sink: Arc<dyn RequestSink>,
    renderer: Arc<dyn Renderer>,
    options: ScannerOptions,
    table: UnitTable,
    epoch: u64,
    next_ticket: u64,
    completions: mpsc::UnboundedSender<Completion>,
}

impl FeedScanner {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        sink: Arc<dyn RequestSink>,
        renderer: Arc<dyn Renderer>,
        options: ScannerOptions,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (completions, receiver) = mpsc::unbounded_channel();
        let settings = store.get();
        let scanner = Self {
            store,
            settings,
            sink,
            renderer,
            options,
            table: UnitTable::default(),
            epoch: 0,
            next_ticket: 0,
            completions,
        };
        (scanner, receiver)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn table(&self) -> &UnitTable {
        &self.table
    }

    pub fn is_enabled(&self) -> bool {
        self.store.get().enabled
    }

    pub fn pending(&self) -> usize {
        self.table.count(UnitPhase::Pending)
    }

    pub fn has_unprocessed(&self) -> bool {
        !self.table.unprocessed().is_empty()
    }

    pub async fn backend_ready(&self) -> bool {
        self.sink.backend_ready().await
    }

    /// Records added and removed units. Returns how many units are new.
    pub fn observe(&mut self, batch: FeedBatch) -> usize {
        for id in &batch.removed {
            self.table.remove(id);
        }
        let mut added = 0;
        for item in batch.added {
            if self.table.insert(item) {
                added += 1;
            }
        }
        if added > 0 {
            tracing::trace!(target: "scanner", added, tracked = self.table.len(), "units observed");
        }
        added
    }

    /// Dispatches every unprocessed unit. Units are marked processed before
    /// the request goes out, so overlapping passes never send one twice.
    pub fn scan_pass(&mut self) -> ScanReport {
        let settings = self.store.get();
        let mut report = ScanReport::default();
        if !settings.enabled {
            return report;
        }

        for id in self.table.unprocessed() {
            let prepared = match self.table.item(&id) {
                Some(item) => self.prepare(item, settings.sensitivity),
                None => continue,
            };
            let Some(state) = self.table.state_mut(&id) else {
                continue;
            };
            state.processed = true;

            let request = match prepared {
                Ok(request) => request,
                Err(reason) => {
                    state.phase = UnitPhase::Skipped(reason);
                    report.skipped += 1;
                    continue;
                }
            };
            self.next_ticket += 1;
            let ticket = self.next_ticket;
            state.phase = UnitPhase::Pending;
            state.ticket = Some(ticket);

            let completions = self.completions.clone();
            let epoch = self.epoch;
            let unit = id.clone();
            self.sink.submit(
                request,
                Box::new(move |outcome| {
                    let _ = completions.send(Completion {
                        unit,
                        epoch,
                        ticket,
                        outcome,
                    });
                }),
            );
            report.dispatched += 1;
        }

        if report.dispatched + report.skipped > 0 {
            tracing::debug!(
                target: "scanner",
                dispatched = report.dispatched,
                skipped = report.skipped,
                epoch = self.epoch,
                "scan pass finished"
            );
        }
        report
    }

    fn prepare(&self, item: &FeedItem, sensitivity: u8) -> Result<ClassificationRequest, SkipReason> {
        let Some((text, _source)) = self.options.extraction.extract(item) else {
            return Err(SkipReason::Empty);
        };
        match self.options.prefilter.check(text) {
            Verdict::Eligible => {}
            Verdict::Empty => return Err(SkipReason::Empty),
            Verdict::TooShort => return Err(SkipReason::TooShort),
        }
        ClassificationRequest::new(text, sensitivity, self.options.max_text_length)
            .ok_or(SkipReason::Empty)
    }

    /// Applies a classification result. Stale results (older epoch, unit gone
    /// or reset since dispatch) are dropped without touching the unit.
    pub fn apply_completion(&mut self, completion: Completion) {
        let Completion {
            unit,
            epoch,
            ticket,
            outcome,
        } = completion;
        if epoch != self.epoch {
            tracing::trace!(target: "scanner", unit = %unit, epoch, current = self.epoch, "stale result dropped");
            return;
        }
        let show_score = self.store.get().show_score;
        let Some(state) = self.table.state_mut(&unit) else {
            return;
        };
        // A unit removed and re-added since dispatch carries a newer ticket.
        if state.phase != UnitPhase::Pending || state.ticket != Some(ticket) {
            tracing::trace!(target: "scanner", unit = %unit, ticket, "superseded result dropped");
            return;
        }
        state.ticket = None;

        match outcome {
            Ok(result) => {
                let score = result.display_percent();
                let badge = show_score.then(|| Badge::for_score(score));
                state.cached_score = Some(score);
                state.phase = if result.should_blur {
                    UnitPhase::Blurred
                } else {
                    UnitPhase::Visible
                };
                if result.should_blur || badge.is_some() {
                    let effect = Effect {
                        blur: result.should_blur,
                        badge,
                    };
                    self.renderer.apply(&unit, &effect);
                    state.censored = effect.blur;
                    state.badged = badge.is_some();
                }
                tracing::debug!(
                    target: "scanner",
                    unit = %unit,
                    blurred = result.should_blur,
                    score,
                    top_label = %result.top_label,
                    "unit classified"
                );
            }
            Err(err) => {
                // Fail open: the unit stays as it was.
                state.phase = UnitPhase::Failed;
                tracing::warn!(target: "scanner", unit = %unit, error = %err, "classification failed; leaving unit visible");
            }
        }
    }

    pub fn reload_settings(&mut self) -> ScanTrigger {
        let next = self.store.get();
        let prev = std::mem::replace(&mut self.settings, next.clone());
        let mut trigger = ScanTrigger::None;

        if prev.enabled != next.enabled {
            self.revert_all();
            self.reset_all();
            if next.enabled {
                trigger = ScanTrigger::Immediate;
            }
            tracing::info!(target: "scanner", enabled = next.enabled, "filtering toggled");
            return trigger;
        }
        if !next.enabled {
            return trigger;
        }

        if prev.sensitivity != next.sensitivity {
            self.revert_all();
            self.reset_all();
            trigger = trigger.max(ScanTrigger::Debounced);
            tracing::info!(target: "scanner", from = prev.sensitivity, to = next.sensitivity, "sensitivity changed");
        }

        if prev.show_score != next.show_score {
            if next.show_score {
                self.revert_all();
                self.reset_all();
                trigger = trigger.max(ScanTrigger::Immediate);
            } else {
                self.remove_badges();
            }
        }

        if prev.api_token != next.api_token && self.reset_failed() > 0 {
            trigger = trigger.max(ScanTrigger::Debounced);
        }
        trigger
    }

    fn revert_all(&mut self) {
        let renderer = &self.renderer;
        self.table.for_each_mut(|id, state| {
            if state.has_effect() {
                renderer.revert(id);
                state.censored = false;
                state.badged = false;
            }
        });
    }

    fn remove_badges(&mut self) {
        let renderer = &self.renderer;
        self.table.for_each_mut(|id, state| {
            if state.badged {
                renderer.remove_badge(id);
                state.badged = false;
            }
        });
    }

    fn reset_all(&mut self) {
        self.table
            .for_each_mut(|_, state| *state = UnitState::default());
        self.epoch += 1;
    }

    fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        self.table.for_each_mut(|_, state| {
            if state.phase == UnitPhase::Failed {
                *state = UnitState::default();
                reset += 1;
            }
        });
        reset
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        ai::ClassifyError,
        domain::ClassificationResult,
        settings::{MemorySettingsStore, SettingsPatch},
        tasks::ResponseCallback,
    };

    #[derive(Default)]
    pub(crate) struct ParkedSink {
        pub parked: Mutex<Vec<(ClassificationRequest, ResponseCallback)>>,
    }

    impl ParkedSink {
        pub fn texts(&self) -> Vec<String> {
            self.parked.lock().iter().map(|(r, _)| r.text.clone()).collect()
        }

        pub fn resolve_all<F>(&self, answer: F)
        where
            F: Fn(&ClassificationRequest) -> ClassificationOutcome,
        {
            let parked: Vec<_> = self.parked.lock().drain(..).collect();
            for (request, respond) in parked {
                respond(answer(&request));
            }
        }
    }

    #[async_trait]
    impl RequestSink for ParkedSink {
        fn submit(&self, request: ClassificationRequest, respond: ResponseCallback) {
            self.parked.lock().push((request, respond));
        }

        async fn backend_ready(&self) -> bool {
            true
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum RenderCall {
        Apply(String, Effect),
        Revert(String),
        RemoveBadge(String),
    }

    #[derive(Default)]
    pub(crate) struct RecordingRenderer {
        pub calls: Mutex<Vec<RenderCall>>,
    }

    impl Renderer for RecordingRenderer {
        fn apply(&self, unit: &UnitId, effect: &Effect) {
            self.calls
                .lock()
                .push(RenderCall::Apply(unit.to_string(), *effect));
        }

        fn revert(&self, unit: &UnitId) {
            self.calls.lock().push(RenderCall::Revert(unit.to_string()));
        }

        fn remove_badge(&self, unit: &UnitId) {
            self.calls
                .lock()
                .push(RenderCall::RemoveBadge(unit.to_string()));
        }
    }

    pub(crate) fn verdict(should_blur: bool, score: f64) -> ClassificationResult {
        ClassificationResult {
            should_blur,
            top_label: "started a new position".into(),
            top_score: score,
            blur_score: score,
            pmo_score: (score * 100.0).round() as u8,
            threshold: 50,
            raw_scores: vec![("started a new position".into(), score)],
        }
    }

    struct Harness {
        scanner: FeedScanner,
        completions: mpsc::UnboundedReceiver<Completion>,
        store: Arc<MemorySettingsStore>,
        sink: Arc<ParkedSink>,
        renderer: Arc<RecordingRenderer>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemorySettingsStore::default());
            let sink = Arc::new(ParkedSink::default());
            let renderer = Arc::new(RecordingRenderer::default());
            let (scanner, completions) = FeedScanner::new(
                store.clone(),
                sink.clone(),
                renderer.clone(),
                ScannerOptions::default(),
            );
            Self {
                scanner,
                completions,
                store,
                sink,
                renderer,
            }
        }

        fn drain(&mut self) {
            while let Ok(completion) = self.completions.try_recv() {
                self.scanner.apply_completion(completion);
            }
        }

        fn patch(&mut self, patch: SettingsPatch) -> ScanTrigger {
            self.store.update(patch).unwrap();
            self.scanner.reload_settings()
        }

        fn phase(&self, id: &str) -> UnitPhase {
            self.scanner.table().state(&id.into()).unwrap().phase
        }
    }

    const PROMO: &str = "Thrilled to share that I have started a new position as Staff Engineer!";
    const ARTICLE: &str = "Interesting write-up on how the new scheduler handles priority inversion.";

    fn batch(items: &[(&str, &str)]) -> FeedBatch {
        FeedBatch::added(
            items
                .iter()
                .map(|(id, text)| FeedItem::new(*id, *text))
                .collect(),
        )
    }

    fn answer(request: &ClassificationRequest) -> ClassificationOutcome {
        if request.text.contains("Thrilled") {
            Ok(verdict(true, 0.62))
        } else {
            Ok(verdict(false, 0.2))
        }
    }

    #[test]
    fn scan_is_idempotent_for_processed_units() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[("u1", PROMO)]));

        assert_eq!(h.scanner.scan_pass().dispatched, 1);
        assert_eq!(h.scanner.scan_pass().dispatched, 0);
        h.scanner.observe(batch(&[("u1", PROMO)]));
        assert_eq!(h.scanner.scan_pass().dispatched, 0);
        assert_eq!(h.sink.texts(), [PROMO]);
    }

    #[test]
    fn short_and_empty_units_are_skipped_without_dispatch() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[
            ("name", "Jane Doe"),
            ("blank", "   "),
            ("short-allowed", "New role!"),
        ]));

        let report = h.scanner.scan_pass();
        assert_eq!(report, ScanReport { dispatched: 1, skipped: 2 });
        assert_eq!(h.phase("name"), UnitPhase::Skipped(SkipReason::TooShort));
        assert_eq!(h.phase("blank"), UnitPhase::Skipped(SkipReason::Empty));
        assert_eq!(h.sink.texts(), ["New role!"]);
    }

    #[test]
    fn long_text_is_truncated_before_dispatch() {
        let mut h = Harness::new();
        let long = "word ".repeat(300);
        h.scanner.observe(batch(&[("u1", long.as_str())]));
        h.scanner.scan_pass();
        assert_eq!(h.sink.texts()[0].chars().count(), 500);
    }

    #[test]
    fn blurs_and_badges_by_result() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[("promo", PROMO), ("article", ARTICLE)]));
        h.scanner.scan_pass();
        h.sink.resolve_all(answer);
        h.drain();

        assert_eq!(h.phase("promo"), UnitPhase::Blurred);
        assert_eq!(h.phase("article"), UnitPhase::Visible);
        assert_eq!(
            *h.renderer.calls.lock(),
            [
                RenderCall::Apply(
                    "promo".into(),
                    Effect {
                        blur: true,
                        badge: Some(Badge::for_score(62))
                    }
                ),
                RenderCall::Apply(
                    "article".into(),
                    Effect {
                        blur: false,
                        badge: Some(Badge::for_score(20))
                    }
                ),
            ]
        );
        let state = h.scanner.table().state(&"promo".into()).unwrap();
        assert!(state.censored && state.badged);
        assert_eq!(state.cached_score, Some(62));
    }

    #[test]
    fn no_badge_and_no_render_for_visible_unit_when_scores_hidden() {
        let mut h = Harness::new();
        h.store
            .update(SettingsPatch {
                show_score: Some(false),
                ..SettingsPatch::default()
            })
            .unwrap();
        h.scanner.reload_settings();
        h.scanner.observe(batch(&[("promo", PROMO), ("article", ARTICLE)]));
        h.scanner.scan_pass();
        h.sink.resolve_all(answer);
        h.drain();

        assert_eq!(
            *h.renderer.calls.lock(),
            [RenderCall::Apply(
                "promo".into(),
                Effect {
                    blur: true,
                    badge: None
                }
            )]
        );
    }

    #[test]
    fn failures_leave_unit_untouched() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[("u1", PROMO)]));
        h.scanner.scan_pass();
        h.sink
            .resolve_all(|_| Err(ClassifyError::Unavailable { attempts: 3, reason: "503".into() }));
        h.drain();

        assert_eq!(h.phase("u1"), UnitPhase::Failed);
        assert!(h.renderer.calls.lock().is_empty());
        assert_eq!(h.scanner.scan_pass().dispatched, 0, "failed units are not retried by rescans");
    }

    #[test]
    fn disabling_reverts_everything_without_calls() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[("promo", PROMO), ("article", ARTICLE)]));
        h.scanner.scan_pass();
        h.sink.resolve_all(answer);
        h.drain();
        h.renderer.calls.lock().clear();

        let trigger = h.patch(SettingsPatch {
            enabled: Some(false),
            ..SettingsPatch::default()
        });
        assert_eq!(trigger, ScanTrigger::None);
        assert_eq!(
            *h.renderer.calls.lock(),
            [
                RenderCall::Revert("promo".into()),
                RenderCall::Revert("article".into())
            ]
        );
        let state = h.scanner.table().state(&"promo".into()).unwrap();
        assert_eq!(*state, UnitState::default());

        assert_eq!(h.scanner.scan_pass(), ScanReport::default());
        assert!(h.sink.parked.lock().is_empty());

        let trigger = h.patch(SettingsPatch {
            enabled: Some(true),
            ..SettingsPatch::default()
        });
        assert_eq!(trigger, ScanTrigger::Immediate);
        assert_eq!(h.scanner.scan_pass().dispatched, 2);
    }

    #[test]
    fn sensitivity_change_resets_and_discards_in_flight_results() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[("promo", PROMO)]));
        h.scanner.scan_pass();
        let before = h.scanner.epoch();

        let trigger = h.patch(SettingsPatch {
            sensitivity: Some(70),
            ..SettingsPatch::default()
        });
        assert_eq!(trigger, ScanTrigger::Debounced);
        assert_eq!(h.scanner.epoch(), before + 1);

        // The request sent before the change completes afterwards.
        h.sink.resolve_all(answer);
        h.drain();
        assert!(h.renderer.calls.lock().is_empty());
        assert_eq!(h.phase("promo"), UnitPhase::Unseen);

        h.scanner.scan_pass();
        let parked = h.sink.parked.lock();
        assert_eq!(parked[0].0.sensitivity, 70);
    }

    #[test]
    fn hiding_scores_only_removes_badges() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[("promo", PROMO), ("article", ARTICLE)]));
        h.scanner.scan_pass();
        h.sink.resolve_all(answer);
        h.drain();
        h.renderer.calls.lock().clear();
        let epoch = h.scanner.epoch();

        let trigger = h.patch(SettingsPatch {
            show_score: Some(false),
            ..SettingsPatch::default()
        });
        assert_eq!(trigger, ScanTrigger::None);
        assert_eq!(h.scanner.epoch(), epoch);
        assert_eq!(
            *h.renderer.calls.lock(),
            [
                RenderCall::RemoveBadge("promo".into()),
                RenderCall::RemoveBadge("article".into())
            ]
        );
        assert_eq!(h.phase("promo"), UnitPhase::Blurred);

        let trigger = h.patch(SettingsPatch {
            show_score: Some(true),
            ..SettingsPatch::default()
        });
        assert_eq!(trigger, ScanTrigger::Immediate);
        assert_eq!(h.phase("promo"), UnitPhase::Unseen);
    }

    #[test]
    fn new_token_retries_failed_units() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[("u1", PROMO)]));
        h.scanner.scan_pass();
        h.sink.resolve_all(|_| Err(ClassifyError::MissingCredential));
        h.drain();

        let trigger = h.patch(SettingsPatch {
            api_token: Some("hf_new".into()),
            ..SettingsPatch::default()
        });
        assert_eq!(trigger, ScanTrigger::Debounced);
        assert_eq!(h.phase("u1"), UnitPhase::Unseen);
        assert_eq!(h.scanner.scan_pass().dispatched, 1);
    }

    #[test]
    fn re_added_unit_only_takes_its_own_result() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[("u1", PROMO)]));
        h.scanner.scan_pass();
        h.scanner.observe(FeedBatch {
            added: Vec::new(),
            removed: vec!["u1".into()],
        });
        h.scanner.observe(batch(&[("u1", PROMO)]));
        h.scanner.scan_pass();
        assert_eq!(h.sink.texts().len(), 2);

        let mut parked: Vec<_> = h.sink.parked.lock().drain(..).collect();
        let (_, current) = parked.pop().unwrap();
        let (_, removed) = parked.pop().unwrap();
        removed(Ok(verdict(true, 0.9)));
        current(Ok(verdict(false, 0.1)));
        h.drain();

        assert_eq!(h.phase("u1"), UnitPhase::Visible);
        assert_eq!(
            *h.renderer.calls.lock(),
            [RenderCall::Apply(
                "u1".into(),
                Effect {
                    blur: false,
                    badge: Some(Badge::for_score(10))
                }
            )]
        );
    }

    #[test]
    fn removed_units_ignore_late_results() {
        let mut h = Harness::new();
        h.scanner.observe(batch(&[("u1", PROMO)]));
        h.scanner.scan_pass();
        h.scanner.observe(FeedBatch {
            added: Vec::new(),
            removed: vec!["u1".into()],
        });
        h.sink.resolve_all(answer);
        h.drain();

        assert!(h.scanner.table().is_empty());
        assert!(h.renderer.calls.lock().is_empty());
    }
}
