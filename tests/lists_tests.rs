use std::time::Duration;

use chrono::Utc;
use donation_guard::config::LookupConfig;
use donation_guard::core::types::DomainLists;
use donation_guard::sources::lists::{load_lists_or, HttpListSource, ListSource};
use donation_guard::sources::lookup::{HttpLookup, ReputationLookup};
use httpmock::prelude::*;

#[tokio::test]
async fn http_lists_are_fetched_without_cache() {
    let server = MockServer::start();
    let hit = server.mock(|when, then| {
        when.method(GET)
            .path("/domain-lists.json")
            .header("Cache-Control", "no-cache");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(
                r#"{
                    "suspectDomains": ["fake-relief.example", "supportjamaica.gov.jm"],
                    "trustedDomains": ["supportjamaica.gov.jm", "redcross.org"],
                    "officialPortal": "supportjamaica.gov.jm"
                }"#,
            );
    });

    let source =
        HttpListSource::new(&server.url("/domain-lists.json"), Duration::from_secs(2)).unwrap();
    let lists = load_lists_or(Some(&source as &dyn ListSource), DomainLists::builtin()).await;
    hit.assert();
    assert!(lists.is_suspect("fake-relief.example"));
    assert!(!lists.is_suspect("supportjamaica.gov.jm"));
    assert!(lists.is_listed_trusted("redcross.org"));
    assert!(lists.last_updated.is_some());
}

#[tokio::test]
async fn server_error_falls_back_to_builtin() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/domain-lists.json");
        then.status(503);
    });
    let source =
        HttpListSource::new(&server.url("/domain-lists.json"), Duration::from_secs(2)).unwrap();
    let fallback = DomainLists::builtin();
    let lists = load_lists_or(Some(&source as &dyn ListSource), fallback.clone()).await;
    assert_eq!(lists, fallback);
}

#[tokio::test]
async fn malformed_document_falls_back_to_builtin() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/domain-lists.json");
        then.status(200).body(r#"{ "suspectDomains": ["x.example"] }"#);
    });
    let source =
        HttpListSource::new(&server.url("/domain-lists.json"), Duration::from_secs(2)).unwrap();
    assert!(source.fetch().await.is_err());
    let lists = load_lists_or(Some(&source as &dyn ListSource), DomainLists::builtin()).await;
    assert!(lists.is_suspect("aidjamaica.com"));
}

fn lookup_config(server: &MockServer) -> LookupConfig {
    LookupConfig {
        rdap_base_url: server.url("/rdap/domain"),
        blacklist_url: Some(server.url("/blacklist/{domain}")),
        hosting_url: Some(server.url("/hosting/{domain}")),
        ..LookupConfig::default()
    }
}

#[tokio::test]
async fn http_lookup_reads_rdap_blacklists_and_hosting() {
    let server = MockServer::start();
    let registered = (Utc::now() - chrono::Duration::days(4)).to_rfc3339();
    server.mock(|when, then| {
        when.method(GET).path("/rdap/domain/relief-fund.example");
        then.status(200).json_body(serde_json::json!({
            "events": [{ "eventAction": "registration", "eventDate": registered }]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/blacklist/relief-fund.example");
        then.status(200)
            .json_body(serde_json::json!({ "lists": ["spamhaus", "surbl"] }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/hosting/relief-fund.example");
        then.status(200)
            .json_body(serde_json::json!({ "provider": "Offshore Hosting Ltd" }));
    });

    let lookup = HttpLookup::new(&lookup_config(&server), Duration::from_secs(2)).unwrap();
    assert_eq!(
        lookup.domain_age_days("relief-fund.example").await.unwrap(),
        Some(4)
    );
    assert_eq!(
        lookup.blacklists("relief-fund.example").await.unwrap(),
        vec!["spamhaus".to_string(), "surbl".to_string()]
    );
    assert_eq!(
        lookup.hosting_provider("relief-fund.example").await.unwrap(),
        Some("Offshore Hosting Ltd".to_string())
    );
}

#[tokio::test]
async fn http_lookup_treats_missing_records_as_unknown() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path_contains("/");
        then.status(404);
    });
    let lookup = HttpLookup::new(&lookup_config(&server), Duration::from_secs(2)).unwrap();
    assert_eq!(lookup.domain_age_days("unknown.example").await.unwrap(), None);
    assert!(lookup.blacklists("unknown.example").await.unwrap().is_empty());
    assert_eq!(lookup.hosting_provider("unknown.example").await.unwrap(), None);
}
