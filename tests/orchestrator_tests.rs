use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use donation_guard::config::GuardConfig;
use donation_guard::core::error::GuardError;
use donation_guard::core::page::{FieldSnapshot, FormSnapshot, PageSnapshot};
use donation_guard::core::similarity::{similarity, SimilarityMode};
use donation_guard::core::sink::{DetectionLog, MemorySink, ReportSink, SiteReport};
use donation_guard::core::types::{DetectionCategory, DomainLists, RiskLevel, Severity};
use donation_guard::detectors::DetectorSet;
use donation_guard::pipeline::orchestrator::{
    DetectionOrchestrator, OrchestratorState, PassKind, ScanTrigger, TriggerHandle,
};
use donation_guard::sources::lookup::StaticLookup;

fn quiet_lookup() -> Arc<StaticLookup> {
    Arc::new(StaticLookup::new(Some(3650), vec![], Some("Example Hosting")))
}

fn orchestrator_with(
    config: GuardConfig,
    page: PageSnapshot,
    lookup: Arc<StaticLookup>,
    sink: Arc<MemorySink>,
    extra_sinks: Vec<Arc<dyn ReportSink>>,
) -> DetectionOrchestrator {
    let mut sinks: Vec<Arc<dyn ReportSink>> = vec![sink.clone() as Arc<dyn ReportSink>];
    sinks.extend(extra_sinks);
    DetectionOrchestrator::new(config, page, lookup, sink, sinks)
}

struct FailingSink;

#[async_trait]
impl ReportSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn on_report(&self, _report: &SiteReport) -> Result<(), GuardError> {
        Err(GuardError::Network("backend down".into()))
    }

    async fn on_log(&self, _log: &DetectionLog) -> Result<(), GuardError> {
        Err(GuardError::Network("backend down".into()))
    }
}

fn risky_form() -> FormSnapshot {
    FormSnapshot::new("Donate now to hurricane victims", "http://collect-funds.example")
        .with_field(FieldSnapshot::input("credit_card", "text"))
}

#[test]
fn similarity_properties() {
    let mode = SimilarityMode::Alphanumeric;
    assert_eq!(similarity("supportjamaica.gov.jm", "supportjamaica.gov.jm", mode), 1.0);
    assert_eq!(
        similarity("aidjamaica.com", "supportjamaica.gov.jm", mode),
        similarity("supportjamaica.gov.jm", "aidjamaica.com", mode)
    );
    assert!(similarity("supportjamaica.gov.jm", "supportjamaicagovjm.com", mode) > 0.85);
}

#[test]
fn official_suffix_is_trusted_whatever_the_lists_say() {
    let lists = DomainLists::new(
        vec!["opm.gov.jm".to_string()],
        Vec::<String>::new(),
        "supportjamaica.gov.jm",
    );
    let detectors =
        DetectorSet::new(lists, &GuardConfig::default(), quiet_lookup()).unwrap();
    for host in ["opm.gov.jm", "anything.gov.jm", "a.b.c.gov.jm"] {
        assert!(detectors.classifier.is_trusted(host), "{host}");
    }
    assert!(!detectors.classifier.is_trusted("gov.jm.example.com"));
}

#[tokio::test]
async fn suspect_host_raises_only_the_suspect_flag() {
    let sink = Arc::new(MemorySink::default());
    let page = PageSnapshot::new("https://supportjamaicagovjm.com/donate")
        .unwrap()
        .with_body_text("Donate now for hurricane relief in Jamaica")
        .with_form(risky_form());
    let orch = orchestrator_with(GuardConfig::default(), page, quiet_lookup(), sink.clone(), vec![]);
    orch.load_lists(None).await.unwrap();

    let report = orch.scan(ScanTrigger::Initial).await.unwrap().unwrap();
    let detection = report.detection;
    assert!(detection.suspect_domain);
    assert!(!detection.similar_domain);
    assert!(!detection.unofficial_donation);
    assert!(!detection.suspicious_form);
    assert_eq!(report.warning.unwrap().severity, Severity::High);
    assert_eq!(sink.warnings().len(), 1);
}

#[tokio::test]
async fn three_sensitive_fields_force_high_even_on_same_host_action() {
    let lists = DomainLists::builtin();
    let detectors =
        DetectorSet::new(lists, &GuardConfig::default(), quiet_lookup()).unwrap();
    let form = FormSnapshot::new("Donate", "https://relief-fund.example/submit")
        .with_field(FieldSnapshot::input("ssn", "text"))
        .with_field(FieldSnapshot::input("ssn2", "text"))
        .with_field(FieldSnapshot::input("birthdate", "date"));
    let analysis = detectors
        .forms
        .analyze_form(0, &form, "relief-fund.example", false);
    assert_eq!(analysis.risk_level, RiskLevel::High);
}

#[tokio::test]
async fn urgency_only_form_depends_on_trust() {
    let detectors =
        DetectorSet::new(DomainLists::builtin(), &GuardConfig::default(), quiet_lookup()).unwrap();
    let form = FormSnapshot::new("Donate immediately, act now!", "");

    let trusted = detectors.forms.analyze_form(0, &form, "opm.gov.jm", true);
    assert_eq!(trusted.risk_level, RiskLevel::None);

    let untrusted = detectors.forms.analyze_form(0, &form, "give-now.example", false);
    assert_eq!(untrusted.risk_level, RiskLevel::Medium);
}

#[tokio::test]
async fn trusted_host_reputation_never_calls_lookups() {
    let lookup = quiet_lookup();
    let detectors =
        DetectorSet::new(DomainLists::builtin(), &GuardConfig::default(), lookup.clone()).unwrap();
    let page = PageSnapshot::new("https://jis.gov.jm/").unwrap();
    let analysis = detectors.reputation.analyze(&page).await;
    assert_eq!(analysis.risk_score, 0);
    assert!(analysis.severity().is_none());
    assert_eq!(lookup.calls(), 0);
}

#[tokio::test]
async fn all_reputation_signals_sum_without_clamping() {
    let lookup = Arc::new(StaticLookup::new(
        Some(5),
        vec!["x".into(), "y".into()],
        Some("offshore-host"),
    ));
    let detectors =
        DetectorSet::new(DomainLists::builtin(), &GuardConfig::default(), lookup).unwrap();
    let page = PageSnapshot::new("http://relief-fund.example/").unwrap();
    let analysis = detectors.reputation.analyze(&page).await;
    assert!(!analysis.ssl_valid);
    assert_eq!(analysis.risk_score, 105);
    assert_eq!(analysis.severity(), Some(Severity::High));
}

#[tokio::test]
async fn end_to_end_unofficial_donation_page() {
    let html = r#"
        <html><body>
          <h1>Hurricane Melissa relief</h1>
          <p>Please donate now. We also accept Western Union.</p>
          <form action="http://collect-funds.example">
            <input name="credit_card" type="text">
            <button>Give</button>
          </form>
        </body></html>
    "#;
    let page = PageSnapshot::parse("https://melissareliefjamaica.net/", html).unwrap();
    let lists = DomainLists::new(
        Vec::<String>::new(),
        vec!["supportjamaica.gov.jm".to_string()],
        "supportjamaica.gov.jm",
    );
    let sink = Arc::new(MemorySink::default());
    let orch = orchestrator_with(GuardConfig::default(), page, quiet_lookup(), sink.clone(), vec![]);
    orch.install_lists(lists).unwrap();

    let report = orch.scan(ScanTrigger::Initial).await.unwrap().unwrap();
    assert!(report.detection.unofficial_donation || report.detection.suspicious_form);
    let warning = report.warning.unwrap();
    assert_eq!(warning.severity, Severity::High);
    assert!(warning.message.contains("supportjamaica.gov.jm"));
    assert_eq!(orch.state(), OrchestratorState::WarningShown);
    assert_eq!(sink.logs().len(), 1);
    assert_eq!(sink.logs()[0].hostname, "melissareliefjamaica.net");
}

#[tokio::test]
async fn later_warnings_are_suppressed_but_flags_still_update() {
    let sink = Arc::new(MemorySink::default());
    let page = PageSnapshot::new("https://aidjamaica.com/").unwrap();
    let orch = orchestrator_with(GuardConfig::default(), page, quiet_lookup(), sink.clone(), vec![]);
    orch.load_lists(None).await.unwrap();
    orch.scan(ScanTrigger::Initial).await.unwrap();

    let mutated = PageSnapshot::new("https://aidjamaica.com/")
        .unwrap()
        .with_form(risky_form());
    let report = orch
        .scan(ScanTrigger::Mutation(mutated))
        .await
        .unwrap()
        .unwrap();
    assert!(report.warning.is_some());
    assert!(!report.surfaced);
    assert!(orch.detection().suspicious_form);
    assert!(orch.detection().suspect_domain);
    assert_eq!(sink.warnings().len(), 1);
    assert_eq!(orch.state(), OrchestratorState::WarningShown);
}

#[tokio::test]
async fn multiple_warnings_when_configured() {
    let sink = Arc::new(MemorySink::default());
    let config = GuardConfig {
        max_warnings_per_page: 2,
        ..GuardConfig::default()
    };
    let page = PageSnapshot::new("https://aidjamaica.com/").unwrap();
    let orch = orchestrator_with(config, page, quiet_lookup(), sink.clone(), vec![]);
    orch.load_lists(None).await.unwrap();
    orch.scan(ScanTrigger::Initial).await.unwrap();
    let mutated = PageSnapshot::new("https://aidjamaica.com/")
        .unwrap()
        .with_form(risky_form());
    let report = orch
        .scan(ScanTrigger::Mutation(mutated))
        .await
        .unwrap()
        .unwrap();
    assert!(report.surfaced);
    assert_eq!(sink.warnings().len(), 2);
}

#[tokio::test]
async fn concurrent_trigger_is_dropped() {
    let sink = Arc::new(MemorySink::default());
    let lookup = Arc::new(
        StaticLookup::new(Some(3650), vec![], None).with_delay(Duration::from_millis(300)),
    );
    let page = PageSnapshot::new("https://example.org/").unwrap();
    let orch = Arc::new(orchestrator_with(GuardConfig::default(), page, lookup, sink, vec![]));
    orch.load_lists(None).await.unwrap();

    let first = tokio::spawn({
        let orch = Arc::clone(&orch);
        async move { orch.scan(ScanTrigger::Initial).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = orch.scan(ScanTrigger::Timer).await.unwrap();
    assert!(second.is_none());

    let first = first.await.unwrap().unwrap();
    assert!(first.is_some());
    // guard released once the pass finished
    assert!(orch.scan(ScanTrigger::Timer).await.unwrap().is_some());
}

#[tokio::test]
async fn slow_lookups_do_not_block_the_pass() {
    let sink = Arc::new(MemorySink::default());
    let lookup = Arc::new(
        StaticLookup::new(Some(1), vec!["spamhaus".into()], None)
            .with_delay(Duration::from_secs(30)),
    );
    let config = GuardConfig {
        reputation_timeout_ms: 50,
        ..GuardConfig::default()
    };
    let page = PageSnapshot::new("https://example.org/").unwrap();
    let orch = orchestrator_with(config, page, lookup, sink, vec![]);
    orch.load_lists(None).await.unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), orch.scan(ScanTrigger::Initial))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reputation = report.reputation.unwrap();
    assert_eq!(reputation.domain_age, None);
    assert!(reputation.blacklist_status.is_empty());
    assert!(report.warning.is_none());
}

#[tokio::test]
async fn cancelled_pass_releases_the_scan_guard() {
    let sink = Arc::new(MemorySink::default());
    let lookup = Arc::new(
        StaticLookup::new(Some(3650), vec![], None).with_delay(Duration::from_millis(500)),
    );
    let page = PageSnapshot::new("https://example.org/").unwrap();
    let orch = orchestrator_with(GuardConfig::default(), page, lookup, sink, vec![]);
    orch.load_lists(None).await.unwrap();

    let cancelled =
        tokio::time::timeout(Duration::from_millis(50), orch.scan(ScanTrigger::Initial)).await;
    assert!(cancelled.is_err());

    let next = orch.scan(ScanTrigger::Timer).await.unwrap();
    assert_eq!(next.map(|r| r.kind), Some(PassKind::Periodic));
}

#[tokio::test]
async fn urgent_content_on_untrusted_host_warns() {
    let sink = Arc::new(MemorySink::default());
    let page = PageSnapshot::new("https://give-now.example/")
        .unwrap()
        .with_body_text("Act now! Send money via gift card before it's too late.");
    let orch = orchestrator_with(GuardConfig::default(), page, quiet_lookup(), sink.clone(), vec![]);
    orch.load_lists(None).await.unwrap();

    let report = orch.scan(ScanTrigger::Initial).await.unwrap().unwrap();
    let warning = report.warning.unwrap();
    assert_eq!(warning.category, DetectionCategory::ScamContent);
    assert_eq!(warning.severity, Severity::Medium);
    assert!(report.surfaced);
    assert!(report.detection.is_raised(DetectionCategory::ScamContent));
    assert!(!report.detection.is_raised(DetectionCategory::UnofficialDonation));
    assert_eq!(sink.warnings().len(), 1);
}

#[tokio::test]
async fn urgent_content_on_official_host_is_ignored() {
    let sink = Arc::new(MemorySink::default());
    let page = PageSnapshot::new("https://opm.gov.jm/")
        .unwrap()
        .with_body_text("Act now! Send money via gift card before it's too late.");
    let orch = orchestrator_with(GuardConfig::default(), page, quiet_lookup(), sink.clone(), vec![]);
    orch.load_lists(None).await.unwrap();

    let report = orch.scan(ScanTrigger::Initial).await.unwrap().unwrap();
    assert!(report.warning.is_none());
    assert!(!report.detection.is_raised(DetectionCategory::ScamContent));
    let timer = orch.scan(ScanTrigger::Timer).await.unwrap().unwrap();
    assert!(timer.warning.is_none());
    assert!(sink.warnings().is_empty());
}

#[tokio::test]
async fn timer_pass_picks_up_urgent_content_added_later() {
    let sink = Arc::new(MemorySink::default());
    let page = PageSnapshot::new("https://give-now.example/").unwrap();
    let orch = orchestrator_with(GuardConfig::default(), page, quiet_lookup(), sink.clone(), vec![]);
    orch.load_lists(None).await.unwrap();
    let initial = orch.scan(ScanTrigger::Initial).await.unwrap().unwrap();
    assert!(initial.warning.is_none());

    let updated = PageSnapshot::new("https://give-now.example/")
        .unwrap()
        .with_body_text("Last chance: pay with Western Union immediately.");
    let nav = orch
        .scan(ScanTrigger::Navigation(updated))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(nav.kind, PassKind::FormsOnly);
    assert!(nav.warning.is_none());

    let timer = orch.scan(ScanTrigger::Timer).await.unwrap().unwrap();
    assert_eq!(timer.kind, PassKind::Periodic);
    assert_eq!(
        timer.warning.map(|w| w.category),
        Some(DetectionCategory::ScamContent)
    );
    assert!(timer.surfaced);
    assert!(orch.detection().is_raised(DetectionCategory::ScamContent));
    assert_eq!(orch.state(), OrchestratorState::WarningShown);
}

#[tokio::test]
async fn identical_warning_is_not_surfaced_twice() {
    let sink = Arc::new(MemorySink::default());
    let config = GuardConfig {
        max_warnings_per_page: 3,
        ..GuardConfig::default()
    };
    let page = PageSnapshot::new("https://example.org/").unwrap();
    let orch = orchestrator_with(config, page, quiet_lookup(), sink.clone(), vec![]);
    orch.load_lists(None).await.unwrap();
    orch.scan(ScanTrigger::Initial).await.unwrap();

    let mutated = PageSnapshot::new("https://example.org/")
        .unwrap()
        .with_form(risky_form());
    let first = orch
        .scan(ScanTrigger::Mutation(mutated))
        .await
        .unwrap()
        .unwrap();
    assert!(first.surfaced);

    for _ in 0..2 {
        let again = orch.scan(ScanTrigger::Timer).await.unwrap().unwrap();
        assert_eq!(again.warning, first.warning);
        assert!(!again.surfaced);
    }
    assert_eq!(sink.warnings().len(), 1);
    assert_eq!(sink.logs().len(), 1);
}

#[tokio::test]
async fn run_loop_handles_channel_triggers_until_closed() {
    let sink = Arc::new(MemorySink::default());
    let page = PageSnapshot::new("https://example.org/").unwrap();
    let orch = Arc::new(orchestrator_with(
        GuardConfig::default(),
        page,
        quiet_lookup(),
        sink.clone(),
        vec![],
    ));
    orch.load_lists(None).await.unwrap();

    let (handle, rx) = TriggerHandle::channel();
    let mutated = PageSnapshot::new("https://example.org/")
        .unwrap()
        .with_form(risky_form());
    assert!(handle.trigger(ScanTrigger::Mutation(mutated)));
    drop(handle);

    Arc::clone(&orch).run(rx).await;
    assert!(orch.detection().suspicious_form);
    assert_eq!(sink.warnings().len(), 1);
    assert_eq!(orch.state(), OrchestratorState::WarningShown);
}

#[tokio::test]
async fn sink_failures_never_stop_scanning_but_reports_surface_them() {
    let sink = Arc::new(MemorySink::default());
    let page = PageSnapshot::new("https://aidjamaica.com/").unwrap();
    let orch = orchestrator_with(
        GuardConfig::default(),
        page,
        quiet_lookup(),
        sink.clone(),
        vec![Arc::new(FailingSink) as Arc<dyn ReportSink>],
    );
    orch.load_lists(None).await.unwrap();

    let report = orch.scan(ScanTrigger::Initial).await.unwrap().unwrap();
    assert!(report.surfaced);
    assert_eq!(sink.logs().len(), 1);

    let err = orch.report_site().await.unwrap_err();
    assert!(matches!(err, GuardError::Sink(msg) if msg.contains("failing")));
    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].detection.suspect_domain);
}
