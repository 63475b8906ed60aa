mod common;

use album_vault::repository::Repository;
use axum::http::{StatusCode, header};
use common::{
    ALL_PERMISSIONS, TestContext, bearer, empty_request, json_request, multipart_body, now, send,
    token_with, upload_request,
};
use serde_json::json;
use tower::util::ServiceExt;

fn admin() -> String {
    bearer(&ALL_PERMISSIONS)
}

// --- Public reads ---

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();
    let response = ctx
        .router()
        .oneshot(empty_request("GET", "/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_empty_album_list_is_bad_request() {
    let ctx = TestContext::new();
    let (status, body) = send(&ctx.router(), empty_request("GET", "/albums", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"success": false, "error": 400, "message": "bad request"})
    );
}

#[tokio::test]
async fn test_images_of_unknown_album_is_bad_request() {
    let ctx = TestContext::new();
    let (status, body) = send(&ctx.router(), empty_request("GET", "/albums/42/images", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "bad request");
}

#[tokio::test]
async fn test_unknown_route_and_bad_ids_use_the_envelope() {
    let ctx = TestContext::new();
    let router = ctx.router();

    let (status, body) = send(&router, empty_request("GET", "/nowhere", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"success": false, "error": 404, "message": "resource not found"})
    );

    let (status, body) = send(&router, empty_request("GET", "/albums/abc/images", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "resource not found");
}

#[tokio::test]
async fn test_negative_and_oversized_ids_are_not_found() {
    let ctx = TestContext::new();
    ctx.state.repo.create_album("Pets").await.unwrap();
    let router = ctx.router();
    let auth = admin();

    for request in [
        empty_request("GET", "/albums/-1/images", None),
        empty_request("DELETE", "/albums/-1", Some(&auth)),
        empty_request("DELETE", "/images/-1", Some(&auth)),
        json_request("PATCH", "/albums/-1", Some(&auth), json!({"newName": "x"})),
        empty_request("GET", "/albums/2147483648/images", None),
    ] {
        let uri = request.uri().clone();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(
            body,
            json!({"success": false, "error": 404, "message": "resource not found"}),
            "{uri}"
        );
    }
}

#[tokio::test]
async fn test_unsupported_method_is_405_envelope() {
    let ctx = TestContext::new();
    let (status, body) = send(&ctx.router(), empty_request("PUT", "/albums", None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        body,
        json!({"success": false, "error": 405, "message": "method not allowed"})
    );
}

// --- Album lifecycle ---

#[tokio::test]
async fn test_album_lifecycle() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let auth = admin();

    // Create
    let (status, body) = send(
        &router,
        json_request("POST", "/albums", Some(&auth), json!({"albumName": "Trip"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "albums": [{"id": 1, "name": "Trip"}]})
    );

    let (_, body) = send(
        &router,
        json_request("POST", "/albums", Some(&auth), json!({"albumName": "Home"})),
    )
    .await;
    assert_eq!(body["albums"][0]["id"], 2);

    // List in id order
    let (status, body) = send(&router, empty_request("GET", "/albums", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "albums": [
            {"id": 1, "name": "Trip"},
            {"id": 2, "name": "Home"}
        ]})
    );

    // Rename
    let (status, body) = send(
        &router,
        json_request("PATCH", "/albums/1", Some(&auth), json!({"newName": "Road trip"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "albums": [{"id": 1, "name": "Road trip"}]})
    );

    // Delete both
    let (status, body) = send(&router, empty_request("DELETE", "/albums/1", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "delete": 1}));
    let (status, _) = send(&router, empty_request("DELETE", "/albums/2", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);

    // Gone
    let (status, _) = send(&router, empty_request("GET", "/albums", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = send(&router, empty_request("DELETE", "/albums/1", Some(&auth))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "resource not found");
}

#[tokio::test]
async fn test_create_album_requires_a_name() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let auth = admin();

    for payload in [json!({}), json!({"albumName": null}), json!({"albumName": ""})] {
        let (status, body) =
            send(&router, json_request("POST", "/albums", Some(&auth), payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "bad request");
    }
    assert!(ctx.state.repo.list_albums().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_unprocessable() {
    let ctx = TestContext::new();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/albums")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, admin())
        .body(axum::body::Body::from("{\"albumName\": "))
        .unwrap();

    let (status, body) = send(&ctx.router(), request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "unprocessable");
}

#[tokio::test]
async fn test_patch_checks_new_name_before_album() {
    let ctx = TestContext::new();
    let router = ctx.router();
    let auth = admin();

    let (status, _) = send(
        &router,
        json_request("PATCH", "/albums/999", Some(&auth), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &router,
        json_request("PATCH", "/albums/999", Some(&auth), json!({"newName": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patch_accepts_empty_name() {
    let ctx = TestContext::new();
    let album = ctx.state.repo.create_album("Named").await.unwrap();

    let (status, body) = send(
        &ctx.router(),
        json_request(
            "PATCH",
            &format!("/albums/{}", album.id),
            Some(&admin()),
            json!({"newName": ""}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["albums"][0]["name"], "");
}

// --- Authorization ---

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let ctx = TestContext::new();
    let (status, body) = send(
        &ctx.router(),
        json_request("POST", "/albums", None, json!({"albumName": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], 401);
    assert_eq!(body["message"]["code"], "authorization_header_missing");
    assert_eq!(
        body["message"]["description"],
        "Authorization header is expected."
    );
}

#[tokio::test]
async fn test_bad_headers_are_unauthorized() {
    let ctx = TestContext::new();
    let router = ctx.router();

    let cases = [
        ("Basic abc", "invalid_header"),
        ("Bearer", "invalid_header"),
        ("Bearer a b", "invalid_header"),
        ("Bearer not-a-jwt", "invalid_header"),
    ];
    for (header_value, code) in cases {
        let (status, body) = send(
            &router,
            empty_request("DELETE", "/albums/1", Some(header_value)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{header_value}");
        assert_eq!(body["message"]["code"], code, "{header_value}");
    }
}

#[tokio::test]
async fn test_expired_and_foreign_tokens_are_unauthorized() {
    let ctx = TestContext::new();
    let router = ctx.router();

    let expired = token_with(
        &ALL_PERMISSIONS,
        album_vault::auth::LOCAL_ISSUER,
        album_vault::auth::LOCAL_AUDIENCE,
        now() - 3600,
    );
    let (status, body) = send(
        &router,
        empty_request("DELETE", "/albums/1", Some(&format!("Bearer {expired}"))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"]["code"], "token_expired");
    assert_eq!(body["message"]["description"], "Token expired.");

    let foreign = token_with(
        &ALL_PERMISSIONS,
        album_vault::auth::LOCAL_ISSUER,
        "someone-else",
        now() + 3600,
    );
    let (status, body) = send(
        &router,
        empty_request("DELETE", "/albums/1", Some(&format!("Bearer {foreign}"))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"]["code"], "invalid_claims");
}

#[tokio::test]
async fn test_each_route_requires_its_own_permission() {
    let ctx = TestContext::new();
    let album = ctx.state.repo.create_album("Guarded").await.unwrap();
    let router = ctx.router();

    let routes = [
        ("POST", "/albums".to_string(), "post:albums"),
        ("PATCH", format!("/albums/{}", album.id), "patch:albums"),
        ("DELETE", format!("/albums/{}", album.id), "delete:albums"),
        ("POST", format!("/albums/{}/images", album.id), "post:images"),
        ("DELETE", "/images/1".to_string(), "delete:images"),
    ];

    for (method, uri, needed) in &routes {
        // Every permission except the one the route needs.
        let others: Vec<&str> = ALL_PERMISSIONS
            .iter()
            .copied()
            .filter(|p| p != needed)
            .collect();
        let (status, body) = send(
            &router,
            json_request(method, uri, Some(&bearer(&others)), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        assert_eq!(body["error"], 403);
        assert_eq!(body["message"]["code"], "unauthorized");
        assert_eq!(
            body["message"]["description"],
            "User does not have the right permissions"
        );
    }

    // The album survived every refused attempt untouched.
    let stored = ctx.state.repo.get_album(album.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Guarded");
}

#[tokio::test]
async fn test_token_without_permissions_claim_is_forbidden() {
    let ctx = TestContext::new();
    let (status, _) = send(
        &ctx.router(),
        json_request("POST", "/albums", Some(&bearer(&[])), json!({"albumName": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// --- Images ---

#[tokio::test]
async fn test_upload_list_and_delete_image() {
    let ctx = TestContext::new();
    let album = ctx.state.repo.create_album("Pets").await.unwrap();
    let router = ctx.router();
    let auth = admin();

    let (status, body) = send(
        &router,
        upload_request(
            &format!("/albums/{}/images", album.id),
            Some(&auth),
            multipart_body("file", Some("cat.jpeg"), b"\xff\xd8\xff\xe0fake-jpeg"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "images": [{
            "id": 1,
            "w": 800,
            "h": 600,
            "url": "http://localhost/images/local_1/cat.jpeg",
            "albumId": album.id
        }]})
    );
    assert_eq!(ctx.host.stored_files(), vec!["local_1".to_string()]);

    let (status, body) = send(
        &router,
        empty_request("GET", &format!("/albums/{}/images", album.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"].as_array().unwrap().len(), 1);
    assert!(body["images"][0].get("externalId").is_none());

    let (status, body) = send(&router, empty_request("DELETE", "/images/1", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "delete": 1}));
    assert_eq!(ctx.host.deleted_files(), vec!["local_1".to_string()]);

    let (status, _) = send(
        &router,
        empty_request("GET", &format!("/albums/{}/images", album.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The row is gone, so a repeat delete never reaches the host.
    let (status, body) = send(&router, empty_request("DELETE", "/images/1", Some(&auth))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"success": false, "error": 404, "message": "resource not found"})
    );
    assert_eq!(ctx.host.deleted_files(), vec!["local_1".to_string()]);
}

#[tokio::test]
async fn test_upload_without_file_is_bad_request() {
    let ctx = TestContext::new();
    let album = ctx.state.repo.create_album("Empty").await.unwrap();
    let router = ctx.router();
    let uri = format!("/albums/{}/images", album.id);

    // Wrong field name.
    let (status, _) = send(
        &router,
        upload_request(&uri, Some(&admin()), multipart_body("photo", Some("a.jpeg"), b"x")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Right name, but a text field rather than a file.
    let (status, _) = send(
        &router,
        upload_request(&uri, Some(&admin()), multipart_body("file", None, b"x")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Not multipart at all.
    let (status, body) = send(
        &router,
        json_request("POST", &uri, Some(&admin()), json!({"file": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "bad request");

    assert!(ctx.host.stored_files().is_empty());
}

#[tokio::test]
async fn test_upload_into_missing_album_is_unprocessable() {
    let ctx = TestContext::new();
    let (status, body) = send(
        &ctx.router(),
        upload_request(
            "/albums/77/images",
            Some(&admin()),
            multipart_body("file", Some("a.jpeg"), b"x"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "unprocessable");
    assert!(ctx.host.stored_files().is_empty());
}

#[tokio::test]
async fn test_upload_with_failing_host_stores_nothing() {
    let ctx = TestContext::new();
    let album = ctx.state.repo.create_album("Offline").await.unwrap();
    ctx.host.set_failing(true);

    let (status, _) = send(
        &ctx.router(),
        upload_request(
            &format!("/albums/{}/images", album.id),
            Some(&admin()),
            multipart_body("file", Some("a.jpeg"), b"x"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(ctx.state.repo.list_images(album.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_remote_delete_keeps_the_row() {
    let ctx = TestContext::new();
    let album = ctx.state.repo.create_album("Sticky").await.unwrap();
    let router = ctx.router();

    let (status, body) = send(
        &router,
        upload_request(
            &format!("/albums/{}/images", album.id),
            Some(&admin()),
            multipart_body("file", Some("a.jpeg"), b"x"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let image_id = body["images"][0]["id"].as_i64().unwrap();

    ctx.host.set_failing(true);
    let (status, body) = send(
        &router,
        empty_request("DELETE", &format!("/images/{image_id}"), Some(&admin())),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "unprocessable");

    let (status, body) = send(
        &router,
        empty_request("GET", &format!("/albums/{}/images", album.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"][0]["id"], image_id);
}

#[tokio::test]
async fn test_delete_unknown_image_is_not_found() {
    let ctx = TestContext::new();
    let (status, body) = send(
        &ctx.router(),
        empty_request("DELETE", "/images/5", Some(&admin())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "resource not found");
}

#[tokio::test]
async fn test_album_with_images_cannot_be_deleted() {
    let ctx = TestContext::new();
    let album = ctx.state.repo.create_album("Full").await.unwrap();
    let router = ctx.router();

    let (status, _) = send(
        &router,
        upload_request(
            &format!("/albums/{}/images", album.id),
            Some(&admin()),
            multipart_body("file", Some("a.jpeg"), b"x"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &router,
        empty_request("DELETE", &format!("/albums/{}", album.id), Some(&admin())),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(ctx.state.repo.get_album(album.id).await.unwrap().is_some());
}

// --- Misc ---

#[tokio::test]
async fn test_client_config_is_empty_without_providers() {
    let ctx = TestContext::new();
    let (status, body) = send(&ctx.router(), empty_request("GET", "/client-config", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "auth0Domain": "",
            "auth0ClientId": "",
            "auth0Audience": "",
            "imagekitPublicKey": "",
            "imagekitUrlEndpoint": ""
        })
    );
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let ctx = TestContext::new();
    let (status, body) = send(
        &ctx.router(),
        empty_request("GET", "/api-docs/openapi.json", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().unwrap();
    for path in ["/albums", "/albums/{id}", "/albums/{id}/images", "/images/{id}"] {
        assert!(paths.contains_key(path), "{path}");
    }
}
