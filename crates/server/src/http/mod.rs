use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{AppState, routes};

pub mod auth;

/// Room for the non-file parts of a multipart form.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::auth::router())
        .merge(routes::users::router(&state))
        .merge(routes::tags::router())
        .merge(routes::categories::router(&state))
        .merge(routes::posts::router())
        .merge(routes::reviews::router(&state))
        .merge(routes::favorites::router())
        .merge(routes::tasks::router())
        .merge(routes::comments::router())
        .layer(DefaultBodyLimit::max(
            state.config().upload.max_bytes + FORM_OVERHEAD_BYTES,
        ));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", api_routes)
        .nest_service("/uploads", ServeDir::new(&state.config().upload.dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_app::{
        TestApp, empty_request, json_request, multipart_request,
    };

    async fn create_tag(app: &TestApp, token: &str, name: &str) -> i64 {
        let (status, body) = app
            .send(json_request("POST", "/api/v1/tags", Some(token), json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_i64().unwrap()
    }

    async fn create_post(app: &TestApp, token: &str, fields: &[(&str, &str)]) -> serde_json::Value {
        let (status, body) = app
            .send(multipart_request("POST", "/api/v1/posts", token, fields, None))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = TestApp::new().await;
        let (status, body) = app.send(empty_request("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn protected_routes_require_valid_token() {
        let app = TestApp::new().await;
        let (status, body) = app.send(empty_request("GET", "/api/v1/posts", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = app
            .send(empty_request("GET", "/api/v1/posts", Some("not-a-token")))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.send(empty_request("GET", "/api/v1/tags", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn register_then_sign_in_issues_working_token() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(json_request(
                "POST",
                "/api/v1/auth/register",
                None,
                json!({ "username": "ana", "email": "ana@example.com", "password": "secret1" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert!(body["data"].get("password_hash").is_none());

        let (status, _) = app
            .send(json_request(
                "POST",
                "/api/v1/auth/register",
                None,
                json!({ "username": "ana", "email": "other@example.com", "password": "secret1" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .send(json_request(
                "POST",
                "/api/v1/auth/sign-in",
                None,
                json!({ "email": "ana@example.com", "password": "wrong-one" }),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .send(json_request(
                "POST",
                "/api/v1/auth/sign-in",
                None,
                json!({ "email": "ana@example.com", "password": "secret1" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["access_token"].as_str().unwrap().to_string();

        let (status, body) = app
            .send(empty_request("GET", "/api/v1/users/me", Some(&token)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "ana");
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let app = TestApp::new().await;
        let (status, _) = app
            .send(json_request(
                "POST",
                "/api/v1/auth/register",
                None,
                json!({ "username": "ana", "email": "ana@example.com", "password": "123" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_without_tag_gets_themed_tag() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ana").await;
        create_tag(&app, &token, "City").await;
        let mountain = create_tag(&app, &token, "Mountain").await;

        let post = create_post(
            &app,
            &token,
            &[("title", "Peak"), ("content", "View"), ("status", "natura")],
        )
        .await;
        assert_eq!(post["tag_id"], mountain);
        assert_eq!(post["status"], "NATURA");
    }

    #[tokio::test]
    async fn post_with_unknown_tag_is_rejected() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ana").await;
        let (status, _) = app
            .send(multipart_request(
                "POST",
                "/api/v1/posts",
                &token,
                &[("title", "A"), ("content", "B"), ("status", "URBAN"), ("tagId", "99")],
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(multipart_request(
                "POST",
                "/api/v1/posts",
                &token,
                &[("title", "A"), ("content", "B"), ("status", "SUBURBAN")],
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_image_is_stored_and_served() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ana").await;
        let (status, body) = app
            .send(multipart_request(
                "POST",
                "/api/v1/posts",
                &token,
                &[("title", "Pic"), ("content", "B"), ("status", "RURAL")],
                Some(("barn.PNG", &b"\x89PNG fake"[..])),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let image = body["data"]["image"].as_str().unwrap().to_string();
        assert!(image.ends_with(".png"));
        assert!(app.root.join("uploads").join(&image).exists());

        let (status, _) = app
            .send(empty_request("GET", &format!("/uploads/{image}"), None))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(multipart_request(
                "POST",
                "/api/v1/posts",
                &token,
                &[("title", "Doc"), ("content", "B"), ("status", "RURAL")],
                Some(("notes.txt", &b"text"[..])),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_owner_cannot_touch_post() {
        let app = TestApp::new().await;
        let (_, ana) = app.user("ana").await;
        let (_, bea) = app.user("bea").await;
        let post = create_post(
            &app,
            &ana,
            &[("title", "Mine"), ("content", "B"), ("status", "URBAN")],
        )
        .await;
        let uri = format!("/api/v1/posts/{}", post["id"]);

        let (status, _) = app
            .send(multipart_request("PUT", &uri, &bea, &[("title", "Stolen")], None))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.send(empty_request("DELETE", &uri, Some(&bea))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = app
            .send(empty_request("GET", "/api/v1/posts/user", Some(&ana)))
            .await;
        assert_eq!(body["data"][0]["title"], "Mine");
        assert_eq!(body["data"][0]["username"], "ana");

        let (status, _) = app.send(empty_request("DELETE", &uri, Some(&ana))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn reviews_average_and_uniqueness() {
        let app = TestApp::new().await;
        let (_, ana) = app.user("ana").await;
        let post = create_post(
            &app,
            &ana,
            &[("title", "T"), ("content", "C"), ("status", "URBAN")],
        )
        .await;
        let uri = format!("/api/v1/posts/{}/reviews", post["id"]);

        let (_, body) = app.send(empty_request("GET", &uri, Some(&ana))).await;
        assert_eq!(body["data"]["average_rating"], 0.0);

        for (name, rating) in [("bea", 1), ("cai", 2)] {
            let (_, token) = app.user(name).await;
            let (status, _) = app
                .send(json_request(
                    "POST",
                    &uri,
                    Some(&token),
                    json!({ "rating": rating, "comment": "ok" }),
                ))
                .await;
            assert_eq!(status, StatusCode::CREATED);
            let (status, _) = app
                .send(json_request(
                    "POST",
                    &uri,
                    Some(&token),
                    json!({ "rating": 5, "comment": "again" }),
                ))
                .await;
            assert_eq!(status, StatusCode::CONFLICT);
        }

        let (_, body) = app.send(empty_request("GET", &uri, Some(&ana))).await;
        assert_eq!(body["data"]["average_rating"], 1.5);
        assert_eq!(body["data"]["total_reviews"], 2);

        let (status, _) = app
            .send(json_request(
                "POST",
                &uri,
                Some(&ana),
                json!({ "rating": 6, "comment": "too much" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(empty_request("GET", "/api/v1/posts/999/reviews", Some(&ana)))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn favorites_flow() {
        let app = TestApp::new().await;
        let (_, ana) = app.user("ana").await;
        let (_, bea) = app.user("bea").await;
        let post = create_post(
            &app,
            &ana,
            &[("title", "T"), ("content", "C"), ("status", "RURAL")],
        )
        .await;

        let (status, body) = app
            .send(json_request(
                "POST",
                "/api/v1/favorites",
                Some(&bea),
                json!({ "post_id": post["id"], "notes": "later" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let favorite_id = body["data"]["id"].as_i64().unwrap();

        let (status, _) = app
            .send(json_request(
                "POST",
                "/api/v1/favorites",
                Some(&bea),
                json!({ "post_id": post["id"] }),
            ))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = app
            .send(empty_request("GET", "/api/v1/favorites", Some(&bea)))
            .await;
        assert_eq!(body["data"][0]["post"]["title"], "T");
        assert_eq!(body["data"][0]["post"]["username"], "ana");

        let (status, _) = app
            .send(json_request(
                "PUT",
                &format!("/api/v1/favorites/{favorite_id}"),
                Some(&ana),
                json!({ "notes": "mine now" }),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let status_uri = format!("/api/v1/posts/{}/favorite", post["id"]);
        let (_, body) = app.send(empty_request("GET", &status_uri, Some(&bea))).await;
        assert_eq!(body["data"]["favorited"], true);

        let (status, _) = app
            .send(empty_request("DELETE", &status_uri, Some(&bea)))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = app.send(empty_request("GET", &status_uri, Some(&bea))).await;
        assert_eq!(body["data"]["favorited"], false);
    }

    #[tokio::test]
    async fn tag_bulk_delete_and_in_use_conflict() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ana").await;
        let farm = create_tag(&app, &token, "Farm").await;
        let lake = create_tag(&app, &token, "Lake").await;

        let (status, _) = app
            .send(json_request(
                "POST",
                "/api/v1/tasks",
                Some(&token),
                json!({ "title": "Hay", "content": "Bale it", "status": "RURAL", "tag_id": farm }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app
            .send(empty_request("DELETE", &format!("/api/v1/tags/{farm}"), Some(&token)))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .send(json_request(
                "POST",
                "/api/v1/tags/bulk-delete",
                Some(&token),
                json!({ "tag_ids": [] }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(json_request(
                "POST",
                "/api/v1/tags/bulk-delete",
                Some(&token),
                json!({ "tag_ids": [lake, 998, 999] }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted_count"], 1);

        let (status, _) = app
            .send(json_request(
                "POST",
                "/api/v1/tags/bulk-delete",
                Some(&token),
                json!({ "tag_ids": [998] }),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn comments_are_public_to_read_and_author_only_to_change() {
        let app = TestApp::new().await;
        let (_, ana) = app.user("ana").await;
        let (_, bea) = app.user("bea").await;
        let tag = create_tag(&app, &ana, "Street").await;
        let (_, body) = app
            .send(json_request(
                "POST",
                "/api/v1/tasks",
                Some(&ana),
                json!({ "title": "Mural", "content": "Paint", "status": "URBAN", "tag_id": tag }),
            ))
            .await;
        let task_id = body["data"]["id"].as_i64().unwrap();
        let comments_uri = format!("/api/v1/tasks/{task_id}/comments");

        let (status, body) = app
            .send(json_request("POST", &comments_uri, Some(&ana), json!({ "content": "first" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let comment_id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = app.send(empty_request("GET", &comments_uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["username"], "ana");

        let (status, _) = app
            .send(json_request(
                "PUT",
                &format!("/api/v1/comments/{comment_id}"),
                Some(&bea),
                json!({ "content": "edited" }),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(empty_request("GET", &format!("/api/v1/tasks/{task_id}"), Some(&bea)))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn categories_crud() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ana").await;
        let (status, body) = app
            .send(json_request(
                "POST",
                "/api/v1/categories",
                Some(&token),
                json!({ "name": "Travel" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["color"], "#3B82F6");
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = app
            .send(empty_request("GET", &format!("/api/v1/categories/{id}"), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Travel");

        let (status, _) = app
            .send(json_request(
                "PUT",
                &format!("/api/v1/categories/{id}"),
                Some(&token),
                json!({ "color": "blue" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(empty_request("GET", "/api/v1/categories/404", None))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleted_account_token_stops_working() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ana").await;
        let (status, _) = app
            .send(empty_request("DELETE", "/api/v1/users/me", Some(&token)))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(empty_request("GET", "/api/v1/users/me", Some(&token)))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn path_loaders_resolve_users_categories_and_reviews() {
        let app = TestApp::new().await;
        let (ana_id, ana) = app.user("ana").await;
        let (_, bea) = app.user("bea").await;

        let (status, body) = app
            .send(empty_request("GET", &format!("/api/v1/users/{ana_id}"), Some(&bea)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "ana");
        let (status, body) = app
            .send(empty_request("GET", "/api/v1/users/999", Some(&bea)))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");

        let post = create_post(
            &app,
            &ana,
            &[("title", "T"), ("content", "C"), ("status", "URBAN")],
        )
        .await;
        let (_, body) = app
            .send(json_request(
                "POST",
                &format!("/api/v1/posts/{}/reviews", post["id"]),
                Some(&bea),
                json!({ "rating": 4, "comment": "nice" }),
            ))
            .await;
        let review_id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = app
            .send(empty_request("GET", &format!("/api/v1/reviews/{review_id}"), Some(&ana)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "bea");
        let (status, _) = app
            .send(empty_request("GET", "/api/v1/reviews/999", Some(&ana)))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .send(json_request(
                "PUT",
                &format!("/api/v1/reviews/{review_id}"),
                Some(&ana),
                json!({ "rating": 1 }),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_form_fields_clear_tag_and_coordinates() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ana").await;
        let lake = create_tag(&app, &token, "Lake").await;
        let lake_id = lake.to_string();
        let post = create_post(
            &app,
            &token,
            &[
                ("title", "Shore"),
                ("content", "Calm"),
                ("status", "NATURA"),
                ("tagId", lake_id.as_str()),
                ("latitude", "45.5"),
                ("longitude", "9.25"),
            ],
        )
        .await;
        assert_eq!(post["tag_id"], lake);
        assert_eq!(post["latitude"], 45.5);
        let uri = format!("/api/v1/posts/{}", post["id"]);

        let (status, body) = app
            .send(multipart_request(
                "PUT",
                &uri,
                &token,
                &[("latitude", "north"), ("longitude", "")],
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["latitude"], 45.5);
        assert!(body["data"]["longitude"].is_null());
        assert_eq!(body["data"]["tag_id"], lake);

        let (status, body) = app
            .send(multipart_request(
                "PUT",
                &uri,
                &token,
                &[("tagId", ""), ("latitude", "")],
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["data"]["tag_id"].is_null());
        assert!(body["data"]["latitude"].is_null());
        assert_eq!(body["data"]["title"], "Shore");
    }

    #[tokio::test]
    async fn replacing_post_image_removes_previous_file() {
        let app = TestApp::new().await;
        let (_, token) = app.user("ana").await;
        let uploads = app.root.join("uploads");
        let (status, body) = app
            .send(multipart_request(
                "POST",
                "/api/v1/posts",
                &token,
                &[("title", "Barn"), ("content", "Red"), ("status", "RURAL")],
                Some(("old.jpg", &b"old"[..])),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let old_image = body["data"]["image"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/posts/{}", body["data"]["id"]);

        let (status, body) = app
            .send(multipart_request(
                "PUT",
                &uri,
                &token,
                &[("title", "Barn at dusk")],
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["image"], old_image.as_str());
        assert!(uploads.join(&old_image).exists());

        let (status, body) = app
            .send(multipart_request(
                "PUT",
                &uri,
                &token,
                &[],
                Some(("new.webp", &b"new"[..])),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let new_image = body["data"]["image"].as_str().unwrap().to_string();
        assert_ne!(new_image, old_image);
        assert!(uploads.join(&new_image).exists());
        assert!(!uploads.join(&old_image).exists());

        let (status, _) = app.send(empty_request("DELETE", &uri, Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!uploads.join(&new_image).exists());
    }
}
