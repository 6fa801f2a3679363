//! GitHub adapter tests against a local mock HTTP server.

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cairn::forge::github::GitHubForge;
use cairn::forge::{CreatePrRequest, Forge, ForgeError, UpdatePrRequest};

fn forge(server: &MockServer) -> GitHubForge {
    GitHubForge::with_api_base("test-token", "acme", "api", server.uri())
}

fn pr_body(number: u64, state: &str, draft: bool) -> serde_json::Value {
    json!({
        "number": number,
        "html_url": format!("https://github.com/acme/api/pull/{number}"),
        "state": state,
        "draft": draft,
        "merged": state == "merged",
        "head": { "ref": "alice/stack-demo/1111111111111111" },
        "base": { "ref": "main" },
        "title": "Add login",
        "body": "Body.",
        "node_id": "PR_node123"
    })
}

#[tokio::test]
async fn create_pr_posts_and_parses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/api/pulls"))
        .and(body_string_contains("alice/stack-demo/1111111111111111"))
        .respond_with(ResponseTemplate::new(201).set_body_json(pr_body(101, "open", false)))
        .mount(&server)
        .await;

    let pr = forge(&server)
        .create_pr(CreatePrRequest {
            head: "alice/stack-demo/1111111111111111".into(),
            base: "main".into(),
            title: "Add login".into(),
            body: Some("Body.".into()),
            draft: false,
        })
        .await
        .unwrap();

    assert_eq!(pr.number, 101);
    assert_eq!(pr.state, "open");
    assert!(!pr.is_draft);
    assert_eq!(pr.base, "main");
    assert_eq!(pr.url, "https://github.com/acme/api/pull/101");
}

#[tokio::test]
async fn update_pr_patches_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/api/pulls/101"))
        .and(body_string_contains("new title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pr_body(101, "open", false)))
        .mount(&server)
        .await;

    let pr = forge(&server)
        .update_pr(UpdatePrRequest {
            number: 101,
            title: Some("new title".into()),
            body: None,
            base: Some("main".into()),
        })
        .await
        .unwrap();
    assert_eq!(pr.number, 101);
}

#[tokio::test]
async fn error_statuses_map_to_kinds() {
    let server = MockServer::start().await;
    for (status, message) in [(401, "Bad credentials"), (404, "Not Found"), (429, "slow down")] {
        Mock::given(method("PATCH"))
            .and(path(format!("/repos/acme/api/pulls/{status}")))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({ "message": message })),
            )
            .mount(&server)
            .await;
    }

    let forge = forge(&server);
    let update = |number| UpdatePrRequest {
        number,
        ..Default::default()
    };

    assert!(matches!(
        forge.update_pr(update(401)).await.unwrap_err(),
        ForgeError::AuthFailed(_)
    ));
    assert!(matches!(
        forge.update_pr(update(404)).await.unwrap_err(),
        ForgeError::NotFound(_)
    ));
    assert!(matches!(
        forge.update_pr(update(429)).await.unwrap_err(),
        ForgeError::RateLimited
    ));
}

#[tokio::test]
async fn username_reads_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "alice" })))
        .mount(&server)
        .await;

    assert_eq!(forge(&server).username().await.unwrap(), "alice");
}

#[tokio::test]
async fn batch_get_prs_uses_one_graphql_roundtrip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("pullRequest(number: 101)"))
        .and(body_string_contains("pullRequest(number: 102)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "repository": {
                    "pr0": {
                        "state": "MERGED",
                        "isDraft": false,
                        "merged": true,
                        "mergedAt": "2024-03-01T12:00:00Z"
                    },
                    "pr1": null
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let statuses = forge(&server).batch_get_prs(&[101, 102]).await.unwrap();
    assert_eq!(statuses.len(), 1);
    let status = &statuses[&101];
    assert_eq!(status.state, "merged");
    assert!(status.is_merged);
    assert!(!status.is_draft);
    assert_eq!(
        status.merged_at.unwrap().to_rfc3339(),
        "2024-03-01T12:00:00+00:00"
    );
}

#[tokio::test]
async fn batch_get_prs_skips_network_when_empty() {
    let server = MockServer::start().await;
    // No mocks mounted: any request would 404 and fail the call.
    let statuses = forge(&server).batch_get_prs(&[]).await.unwrap();
    assert!(statuses.is_empty());
}

#[tokio::test]
async fn graphql_errors_surface_as_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [ { "message": "Something went wrong" } ]
        })))
        .mount(&server)
        .await;

    let err = forge(&server).batch_get_prs(&[5]).await.unwrap_err();
    match err {
        ForgeError::ApiError { message, .. } => assert!(message.contains("Something went wrong")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn mark_pr_ready_resolves_node_id_then_mutates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/api/pulls/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pr_body(101, "open", true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("markPullRequestReadyForReview"))
        .and(body_string_contains("PR_node123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "markPullRequestReadyForReview": { "pullRequest": { "id": "PR_node123" } } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    forge(&server).mark_pr_ready(101).await.unwrap();
}

#[tokio::test]
async fn comment_crud_roundtrip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/api/issues/101/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 900, "body": "<!-- stack-visualization: demo -->\ntable" },
            { "id": 901, "body": "unrelated comment" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/api/issues/101/comments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 902, "body": "x" })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/api/issues/comments/900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 900, "body": "y" })))
        .mount(&server)
        .await;

    let forge = forge(&server);
    let comments = forge.list_pr_comments(101).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert!(comments[0].body.contains("stack-visualization"));

    let id = forge.create_pr_comment(101, "x").await.unwrap();
    assert_eq!(id, 902);

    forge.update_pr_comment(900, "y").await.unwrap();
}
