use std::sync::Arc;

use crate::config::GuardConfig;
use crate::core::{error::GuardError, types::DomainLists};
use crate::sources::lookup::ReputationLookup;

pub mod content;
pub mod domain;
pub mod form;
pub mod reputation;

use content::ContentScanner;
use domain::DomainClassifier;
use form::FormRiskAnalyzer;
use reputation::ReputationAggregator;

/// Every heuristic, wired to one set of lists and one config.
pub struct DetectorSet {
    pub classifier: Arc<DomainClassifier>,
    pub content: ContentScanner,
    pub forms: FormRiskAnalyzer,
    pub reputation: ReputationAggregator,
}

impl DetectorSet {
    pub fn new(
        lists: DomainLists,
        config: &GuardConfig,
        lookup: Arc<dyn ReputationLookup>,
    ) -> Result<Self, GuardError> {
        let content = ContentScanner::new()?;
        let forms = FormRiskAnalyzer::new(
            content.clone(),
            &lists.official_portal,
            &config.official_suffix,
        )?;
        let classifier = Arc::new(DomainClassifier::new(lists, config)?);
        let reputation = ReputationAggregator::new(
            lookup,
            Arc::clone(&classifier),
            config.reputation_timeout(),
            config.min_domain_age_days,
        );
        Ok(Self {
            classifier,
            content,
            forms,
            reputation,
        })
    }
}
