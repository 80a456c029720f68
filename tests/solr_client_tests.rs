use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use solr_search::document::SearchDocument;
use solr_search::error::IndexError;
use solr_search::solr::{FacetCount, QueryParams, SearchService, SolrClient};

const CORE: &str = "/solr/omeka";

async fn client(server: &MockServer) -> SolrClient {
    SolrClient::with_base_url(format!("{}{}", server.uri(), CORE), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn ping_reports_ok_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/admin/ping", CORE)))
        .and(query_param("wt", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client(&server).await.ping().await.unwrap());
}

#[tokio::test]
async fn ping_is_false_when_core_is_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/admin/ping", CORE)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(!client(&server).await.ping().await.unwrap());
}

#[tokio::test]
async fn ping_is_false_when_nothing_listens() {
    let solr = SolrClient::with_base_url("http://127.0.0.1:9/solr/omeka", Duration::from_secs(1))
        .unwrap();
    assert!(!solr.ping().await.unwrap());
}

#[tokio::test]
async fn documents_are_posted_as_a_json_array() {
    let server = MockServer::start().await;

    let mut doc = SearchDocument::new("Item_1");
    doc.set_field("model", "Item");
    doc.add_multi("tag", "maps");
    doc.add_multi("tag", "letters");

    Mock::given(method("POST"))
        .and(path(format!("{}/update", CORE)))
        .and(body_json(json!([
            { "id": "Item_1", "model": "Item", "tag": ["maps", "letters"] }
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responseHeader": { "status": 0 } })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).await.add_documents(&[doc]).await.unwrap();
}

#[tokio::test]
async fn commit_optimize_and_delete_use_update_commands() {
    let server = MockServer::start().await;
    for body in [
        json!({ "commit": {} }),
        json!({ "optimize": {} }),
        json!({ "delete": { "query": "*:*" } }),
    ] {
        Mock::given(method("POST"))
            .and(path(format!("{}/update", CORE)))
            .and(body_json(body))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }

    let solr = client(&server).await;
    solr.commit().await.unwrap();
    solr.optimize().await.unwrap();
    solr.delete_by_query("*:*").await.unwrap();
}

#[tokio::test]
async fn update_errors_carry_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/update", CORE)))
        .respond_with(ResponseTemplate::new(400).set_body_string("undefined field foo"))
        .mount(&server)
        .await;

    let err = client(&server).await.commit().await.unwrap_err();
    match err {
        IndexError::Solr { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "undefined field foo");
        }
        other => panic!("expected Solr error, got {:?}", other),
    }
}

#[tokio::test]
async fn select_parses_hits_and_facet_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/select", CORE)))
        .and(query_param("q", "monticello"))
        .and(query_param("fq", r#"tag:"maps""#))
        .and(query_param("facet.field", "tag"))
        .and(query_param("json.nl", "arrarr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "numFound": 2,
                "start": 0,
                "docs": [{ "id": "Item_1" }, { "id": "Item_2" }]
            },
            "facet_counts": {
                "facet_fields": {
                    "tag": [["maps", 2], ["letters", 1]]
                }
            }
        })))
        .mount(&server)
        .await;

    let results = client(&server)
        .await
        .query(&QueryParams {
            q: "monticello".to_string(),
            fq: vec![r#"tag:"maps""#.to_string()],
            facet_fields: vec!["tag".to_string()],
            facet_mincount: 1,
            rows: 10,
            start: 0,
        })
        .await
        .unwrap();

    assert_eq!(results.num_found, 2);
    assert_eq!(results.docs.len(), 2);
    assert_eq!(
        results.facet_fields["tag"],
        vec![
            FacetCount {
                value: "maps".to_string(),
                count: 2
            },
            FacetCount {
                value: "letters".to_string(),
                count: 1
            },
        ]
    );
}

#[tokio::test]
async fn select_without_facets_has_empty_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/select", CORE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "numFound": 0, "docs": [] }
        })))
        .mount(&server)
        .await;

    let results = client(&server)
        .await
        .query(&QueryParams::default())
        .await
        .unwrap();

    assert_eq!(results.num_found, 0);
    assert!(results.facet_fields.is_empty());
}
