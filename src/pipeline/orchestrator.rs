use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, OnceLock,
};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::GuardConfig;
use crate::core::{
    error::GuardError,
    page::PageSnapshot,
    sink::{DetectionLog, ReportSink, SiteReport, WarningSink},
    types::{DetectionResult, DomainLists, FormAnalysis, ReputationAnalysis, Warning},
};
use crate::detectors::DetectorSet;
use crate::pipeline::checks::{
    check_forms, check_reputation, check_scam_content, check_similar_domain,
    check_suspect_domain, check_unofficial_donation, ScanContext, ScanOutcome,
};
use crate::sources::{
    lists::{load_lists_or, ListSource},
    lookup::ReputationLookup,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Uninitialized,
    ListsLoaded,
    Scanning,
    WarningShown,
    Clean,
}

/// Why a scan pass was requested.
#[derive(Debug, Clone)]
pub enum ScanTrigger {
    Initial,
    Timer,
    /// The DOM changed; carries the new snapshot.
    Mutation(PageSnapshot),
    /// The page URL changed without a reload.
    Navigation(PageSnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Full,
    /// Timer pass: forms plus scam content.
    Periodic,
    FormsOnly,
}

/// Result of one completed pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub kind: PassKind,
    pub hostname: String,
    pub warning: Option<Warning>,
    /// Whether the warning reached the warning sink.
    pub surfaced: bool,
    pub detection: DetectionResult,
    pub forms: Vec<FormAnalysis>,
    pub reputation: Option<ReputationAnalysis>,
}

struct PageState {
    page: PageSnapshot,
    detection: DetectionResult,
    warnings_shown: u32,
    state: OrchestratorState,
    forms: Vec<FormAnalysis>,
    reputation: Option<ReputationAnalysis>,
    surfaced: Vec<Warning>,
}

impl PageState {
    fn new(page: PageSnapshot) -> Self {
        Self {
            page,
            detection: DetectionResult::default(),
            warnings_shown: 0,
            state: OrchestratorState::Uninitialized,
            forms: Vec::new(),
            reputation: None,
            surfaced: Vec::new(),
        }
    }
}

/// Clears the in-progress flag when a pass ends, including when its future is dropped.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs the checks against one page and decides what to surface.
///
/// Passes never overlap: a trigger that arrives while a pass is running is dropped.
pub struct DetectionOrchestrator {
    config: GuardConfig,
    lookup: Arc<dyn ReputationLookup>,
    detectors: OnceLock<DetectorSet>,
    page: Mutex<PageState>,
    in_progress: AtomicBool,
    warning_sink: Arc<dyn WarningSink>,
    report_sinks: Vec<Arc<dyn ReportSink>>,
}

impl DetectionOrchestrator {
    pub fn new(
        config: GuardConfig,
        page: PageSnapshot,
        lookup: Arc<dyn ReputationLookup>,
        warning_sink: Arc<dyn WarningSink>,
        report_sinks: Vec<Arc<dyn ReportSink>>,
    ) -> Self {
        Self {
            config,
            lookup,
            detectors: OnceLock::new(),
            page: Mutex::new(PageState::new(page)),
            in_progress: AtomicBool::new(false),
            warning_sink,
            report_sinks,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Fallback lists built from the shipped defaults and the configured portal.
    pub fn fallback_lists(&self) -> DomainLists {
        DomainLists::builtin().with_official_portal(&self.config.official_portal)
    }

    /// Fetches lists once. Any failure falls back to the built-in lists.
    pub async fn load_lists(&self, source: Option<&dyn ListSource>) -> Result<(), GuardError> {
        if self.detectors.get().is_some() {
            return Ok(());
        }
        let lists = load_lists_or(source, self.fallback_lists()).await;
        self.install_lists(lists)
    }

    pub fn install_lists(&self, lists: DomainLists) -> Result<(), GuardError> {
        let detectors = DetectorSet::new(lists, &self.config, Arc::clone(&self.lookup))?;
        if self.detectors.set(detectors).is_err() {
            debug!("lists already installed; keeping the first set");
            return Ok(());
        }
        self.with_state(|s| s.state = OrchestratorState::ListsLoaded);
        Ok(())
    }

    pub fn state(&self) -> OrchestratorState {
        self.read_state(|s| s.state)
            .unwrap_or(OrchestratorState::Uninitialized)
    }

    pub fn detection(&self) -> DetectionResult {
        self.read_state(|s| s.detection).unwrap_or_default()
    }

    pub fn reputation(&self) -> Option<ReputationAnalysis> {
        self.read_state(|s| s.reputation.clone()).flatten()
    }

    /// Form analyses from the latest pass that looked at forms.
    pub fn forms(&self) -> Vec<FormAnalysis> {
        self.read_state(|s| s.forms.clone()).unwrap_or_default()
    }

    pub fn hostname(&self) -> String {
        self.read_state(|s| s.page.hostname.clone())
            .unwrap_or_default()
    }

    /// Runs one pass for `trigger`. Returns `None` if the trigger was dropped or
    /// needed no pass (a mutation that added no forms).
    pub async fn scan(&self, trigger: ScanTrigger) -> Result<Option<PassReport>, GuardError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("scan already in progress; dropping {} trigger", trigger_name(&trigger));
            return Ok(None);
        }
        let _guard = PassGuard(&self.in_progress);
        self.scan_guarded(trigger).await
    }

    async fn scan_guarded(&self, trigger: ScanTrigger) -> Result<Option<PassReport>, GuardError> {
        if self.detectors.get().is_none() {
            warn!("scan requested before lists were loaded; using built-in lists");
            self.install_lists(self.fallback_lists())?;
        }
        let Some(kind) = self.apply_trigger(trigger) else {
            return Ok(None);
        };
        let Some(page) = self.read_state(|s| {
            s.state = OrchestratorState::Scanning;
            s.page.clone()
        }) else {
            return Err(GuardError::Unknown);
        };
        let Some(detectors) = self.detectors.get() else {
            return Err(GuardError::Unknown);
        };

        let ctx = ScanContext::new(detectors.classifier.lists(), &self.config, &page);
        let outcome = match kind {
            PassKind::Full => run_full_pass(detectors, &ctx).await,
            PassKind::Periodic => run_periodic_pass(detectors, &ctx),
            PassKind::FormsOnly => check_forms(detectors, &ctx),
        };
        let report = self.fold(kind, &page, outcome).await;
        Ok(Some(report))
    }

    /// Updates the snapshot for `trigger` and picks the pass to run, if any.
    fn apply_trigger(&self, trigger: ScanTrigger) -> Option<PassKind> {
        self.read_state(|s| match trigger {
            ScanTrigger::Initial => Some(PassKind::Full),
            ScanTrigger::Timer => Some(PassKind::Periodic),
            ScanTrigger::Mutation(next) => {
                let added = next.new_forms_since(&s.page);
                s.page = next;
                if added > 0 {
                    debug!("{} new form(s) inserted; rescanning forms", added);
                    Some(PassKind::FormsOnly)
                } else {
                    None
                }
            }
            ScanTrigger::Navigation(next) => {
                if next.hostname != s.page.hostname {
                    info!("hostname changed {} -> {}; starting over", s.page.hostname, next.hostname);
                    let mut fresh = PageState::new(next);
                    fresh.state = OrchestratorState::ListsLoaded;
                    *s = fresh;
                    Some(PassKind::Full)
                } else {
                    s.page = next;
                    Some(PassKind::FormsOnly)
                }
            }
        })
        .flatten()
    }

    async fn fold(
        &self,
        kind: PassKind,
        page: &PageSnapshot,
        outcome: ScanOutcome,
    ) -> PassReport {
        let gate = self.read_state(|s| {
            s.detection.merge(&outcome.flags);
            if !outcome.forms.is_empty() || kind != PassKind::Full {
                s.forms = outcome.forms.clone();
            }
            if outcome.reputation.is_some() {
                s.reputation = outcome.reputation.clone();
            }
            let repeated = outcome
                .warning
                .as_ref()
                .is_some_and(|w| s.surfaced.contains(w));
            let surfaced = outcome.warning.is_some()
                && !repeated
                && s.warnings_shown < self.config.max_warnings_per_page;
            if surfaced {
                s.warnings_shown += 1;
                s.surfaced.extend(outcome.warning.clone());
            }
            s.state = if s.warnings_shown > 0 {
                OrchestratorState::WarningShown
            } else {
                OrchestratorState::Clean
            };
            (surfaced, s.detection, s.reputation.clone())
        });
        let (surfaced, detection, reputation) = gate.unwrap_or((false, outcome.flags, None));

        if let Some(warning) = &outcome.warning {
            if surfaced {
                info!(
                    "{} on {}: {}",
                    warning.category.as_str(),
                    page.hostname,
                    warning.message
                );
                self.warning_sink
                    .on_warning(warning, &detection, reputation.as_ref());
                let log = DetectionLog::new(
                    &page.url,
                    &page.hostname,
                    warning,
                    detection,
                    reputation.clone(),
                );
                self.dispatch_log(&log).await;
            } else {
                debug!(
                    "{} on {} suppressed; already shown or warning limit reached",
                    warning.category.as_str(),
                    page.hostname
                );
            }
        }

        PassReport {
            kind,
            hostname: page.hostname.clone(),
            warning: outcome.warning,
            surfaced,
            detection,
            forms: outcome.forms,
            reputation,
        }
    }

    async fn dispatch_log(&self, log: &DetectionLog) {
        for sink in &self.report_sinks {
            if let Err(err) = sink.on_log(log).await {
                warn!("{} sink failed to record detection: {}", sink.name(), err);
            }
        }
    }

    /// Explicit "report this site". Errors are returned so the caller can offer a retry.
    pub async fn report_site(&self) -> Result<(), GuardError> {
        let (url, hostname) = self
            .read_state(|s| (s.page.url.clone(), s.page.hostname.clone()))
            .ok_or(GuardError::Unknown)?;
        let report = SiteReport {
            url,
            hostname,
            timestamp: Utc::now(),
            detection: self.detection(),
            reputation: self.reputation(),
        };
        let mut failures = Vec::new();
        for sink in &self.report_sinks {
            if let Err(err) = sink.on_report(&report).await {
                warn!("{} sink failed to record report: {}", sink.name(), err);
                failures.push(format!("{}: {}", sink.name(), err));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(GuardError::Sink(failures.join("; ")))
        }
    }

    /// Initial pass, then timer and channel triggers until the channel closes.
    pub async fn run(self: Arc<Self>, mut triggers: mpsc::Receiver<ScanTrigger>) {
        debug!(
            "scanner started for {} (multiple warnings: {})",
            self.hostname(),
            self.config.allows_multiple_warnings()
        );
        self.log_pass(self.scan(ScanTrigger::Initial).await);

        let mut ticker = tokio::time::interval(self.config.scan_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.log_pass(self.scan(ScanTrigger::Timer).await);
                }
                trigger = triggers.recv() => match trigger {
                    Some(trigger) => self.log_pass(self.scan(trigger).await),
                    None => break,
                },
            }
        }
        debug!("trigger channel closed; scanner for {} stopped", self.hostname());
    }

    fn log_pass(&self, result: Result<Option<PassReport>, GuardError>) {
        match result {
            Ok(Some(report)) => debug!(
                "{:?} pass on {}: warning={} surfaced={}",
                report.kind,
                report.hostname,
                report.warning.is_some(),
                report.surfaced
            ),
            Ok(None) => {}
            Err(err) => warn!("scan pass failed: {}", err),
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut PageState)) {
        if let Ok(mut state) = self.page.lock() {
            f(&mut state);
        }
    }

    fn read_state<T>(&self, f: impl FnOnce(&mut PageState) -> T) -> Option<T> {
        self.page.lock().ok().map(|mut state| f(&mut state))
    }
}

/// Sender side of the single-slot trigger queue.
#[derive(Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<ScanTrigger>,
}

impl TriggerHandle {
    /// Queue holds one pending trigger; extra triggers are dropped.
    pub fn channel() -> (Self, mpsc::Receiver<ScanTrigger>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Returns false if the trigger was dropped.
    pub fn trigger(&self, trigger: ScanTrigger) -> bool {
        match self.tx.try_send(trigger) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(t)) => {
                debug!("trigger queue full; dropping {} trigger", trigger_name(&t));
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

fn trigger_name(trigger: &ScanTrigger) -> &'static str {
    match trigger {
        ScanTrigger::Initial => "initial",
        ScanTrigger::Timer => "timer",
        ScanTrigger::Mutation(_) => "mutation",
        ScanTrigger::Navigation(_) => "navigation",
    }
}

type DomainCheck = fn(&DetectorSet, &ScanContext<'_>) -> ScanOutcome;

async fn run_full_pass(detectors: &DetectorSet, ctx: &ScanContext<'_>) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let domain_checks: [DomainCheck; 3] = [
        check_suspect_domain,
        check_similar_domain,
        check_unofficial_donation,
    ];
    for check in domain_checks {
        outcome.absorb(check(detectors, ctx));
        if outcome.concluded() {
            return outcome;
        }
    }
    outcome.absorb(check_reputation(detectors, ctx).await);
    if outcome.concluded() {
        return outcome;
    }
    outcome.absorb(run_periodic_pass(detectors, ctx));
    outcome
}

fn run_periodic_pass(detectors: &DetectorSet, ctx: &ScanContext<'_>) -> ScanOutcome {
    let mut outcome = check_forms(detectors, ctx);
    if !outcome.concluded() {
        outcome.absorb(check_scam_content(detectors, ctx));
    }
    outcome
}
