use crate::server::{ServerState, Settings, app};
use axum::{
    body::{Body, Bytes},
    http::{
        Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::{num::NonZeroU64, sync::Arc, time::Duration};
use time::UtcDateTime;
use tower::ServiceExt;
use yatube_common::{
    model::{
        auth::{AuthToken, Authentication, PasswordHash},
        follow::Follow,
        group::{CreateGroup, Group, GroupSlug, GroupTitle},
        post::{CreatePost, Post, PostContent, PostText},
        user::{CreateUser, User, Username},
    },
    page::Paginator,
    util::PositiveDuration,
};
use yatube_db::{MemoryStore, PostFilter, Store};

struct TestApp {
    store: Arc<MemoryStore>,
    state: ServerState,
}

impl TestApp {
    fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    fn with_per_page(per_page: u64) -> Self {
        Self::with_settings(Settings {
            paginator: Paginator::new(NonZeroU64::new(per_page).unwrap()),
            auth_token_lifetime: None,
        })
    }

    fn with_settings(settings: Settings) -> Self {
        Self::with_state(settings, Duration::from_secs(20))
    }

    fn with_cache_ttl(index_cache_ttl: Duration) -> Self {
        Self::with_state(Settings::default(), index_cache_ttl)
    }

    fn with_state(settings: Settings, index_cache_ttl: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = ServerState::new(store.clone(), settings, index_cache_ttl);

        Self { store, state }
    }

    /// A user without a usable password, for tests that never log in through the form.
    async fn user(&self, username: &str) -> User {
        self.store
            .create_user(&CreateUser {
                username: Username::new(username.to_owned()).unwrap(),
                password_hash: PasswordHash::from_phc("!".to_owned()),
            })
            .await
            .unwrap()
    }

    async fn token_for(&self, user: &User) -> String {
        let token = AuthToken::generate_random(user.id);
        self.store
            .create_auth(&Authentication {
                user: user.id,
                token_hash: token.hash().unwrap(),
                created_at: UtcDateTime::now(),
                expires_after: None,
            })
            .await
            .unwrap();

        token.as_token_str()
    }

    async fn staff_token(&self, username: &str) -> String {
        let staff = self.user(username).await;
        self.store.set_staff(staff.id, true).await.unwrap();
        self.token_for(&staff).await
    }

    async fn group(&self, slug: &str) -> Group {
        self.store
            .create_group(&CreateGroup {
                title: GroupTitle::new(format!("Группа {slug}")).unwrap(),
                slug: GroupSlug::new(slug.to_owned()).unwrap(),
                description: "Тестовое описание".to_owned(),
            })
            .await
            .unwrap()
    }

    async fn post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.store
            .create_post(&CreatePost {
                author: author.id,
                content: PostContent {
                    text: PostText::new(text.to_owned()).unwrap(),
                    group: group.map(|group| group.id),
                    image: None,
                },
            })
            .await
            .unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        self.call(request).await
    }

    async fn call(&self, request: Request<Body>) -> Response {
        app(self.state.clone()).oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    async fn get_json(&self, uri: &str, token: Option<&str>) -> Value {
        let response = self.get(uri, token).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        json_body(response).await
    }
}

async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn json_body(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[LOCATION].to_str().unwrap()
}

fn assert_redirect(response: &Response, to: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response), to);
}

fn texts(page: &Value) -> Vec<&str> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["text"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn feeds_are_paginated() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let group = app.group("test-slug").await;
    for i in 0..13 {
        app.post(&author, &format!("Пост {i}"), Some(&group)).await;
    }

    for uri in ["/", "/group/test-slug/", "/profile/author/"] {
        let first = app.get_json(uri, None).await;
        assert_eq!(first["page"]["items"].as_array().unwrap().len(), 10, "{uri}");
        assert_eq!(first["page"]["num_pages"], 2);
        assert_eq!(first["page"]["has_next"], true);

        let second = app.get_json(&format!("{uri}?page=2"), None).await;
        assert_eq!(second["page"]["items"].as_array().unwrap().len(), 3, "{uri}");
        assert_eq!(second["page"]["has_next"], false);
    }

    let newest = app.get_json("/profile/author/", None).await;
    assert_eq!(texts(&newest["page"])[0], "Пост 12");
    assert_eq!(newest["posts_count"], 13);

    let clamped = app.get_json("/group/test-slug/?page=99", None).await;
    assert_eq!(clamped["page"]["number"], 2);
    let junk = app.get_json("/group/test-slug/?page=junk", None).await;
    assert_eq!(junk["page"]["number"], 1);
}

#[tokio::test]
async fn configured_page_size_applies() {
    let app = TestApp::with_per_page(3);
    let author = app.user("author").await;
    for i in 0..4 {
        app.post(&author, &format!("Пост {i}"), None).await;
    }

    let first = app.get_json("/profile/author/", None).await;
    assert_eq!(texts(&first["page"]), ["Пост 3", "Пост 2", "Пост 1"]);
    let last = app.get_json("/profile/author/?page=2", None).await;
    assert_eq!(texts(&last["page"]), ["Пост 0"]);
}

#[tokio::test]
async fn empty_feed_has_one_page() {
    let app = TestApp::new();

    let index = app.get_json("/", None).await;
    assert_eq!(index["page"]["items"], json!([]));
    assert_eq!(index["page"]["number"], 1);
    assert_eq!(index["page"]["num_pages"], 1);
}

#[tokio::test]
async fn created_post_appears_in_feeds() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let token = app.token_for(&author).await;
    let group = app.group("test-slug").await;
    app.group("other-slug").await;

    let response = app
        .post_json(
            "/create/",
            Some(&token),
            json!({"text": "Пост с картинкой", "group": group.id, "image": "small.gif"}),
        )
        .await;
    assert_redirect(&response, "/profile/author/");

    for uri in ["/", "/profile/author/", "/group/test-slug/"] {
        let feed = app.get_json(uri, None).await;
        let post = &feed["page"]["items"][0];
        assert_eq!(post["text"], "Пост с картинкой", "{uri}");
        assert_eq!(post["image"], "posts/small.gif", "{uri}");
        assert_eq!(post["author"]["username"], "author");
        assert_eq!(post["group"]["slug"], "test-slug");
    }

    let other = app.get_json("/group/other-slug/", None).await;
    assert_eq!(other["page"]["count"], 0);
}

#[tokio::test]
async fn create_form_lists_groups() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let token = app.token_for(&author).await;
    app.group("test-slug").await;

    let form = app.get_json("/create/", Some(&token)).await;
    assert_eq!(form["is_edit"], false);
    assert_eq!(form["form"]["text"], "");
    assert_eq!(form["groups"][0]["slug"], "test-slug");
}

#[tokio::test]
async fn invalid_post_form_is_rejected() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let token = app.token_for(&author).await;

    let response = app
        .post_json("/create/", Some(&token), json!({"text": "  ", "group": 424_242}))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json_body(response).await;
    assert_eq!(body["status"], 422);
    assert_eq!(body["errors"]["text"][0], "This field is required.");
    assert!(
        body["errors"]["group"][0]
            .as_str()
            .unwrap()
            .starts_with("Select a valid choice.")
    );
    assert_eq!(app.store.count_posts(PostFilter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn author_edits_post() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let token = app.token_for(&author).await;
    let group = app.group("test-slug").await;
    let post = app.post(&author, "Старый текст", None).await;

    let form = app
        .get_json(&format!("/posts/{}/edit/", post.id), Some(&token))
        .await;
    assert_eq!(form["is_edit"], true);
    assert_eq!(form["post_id"], post.id.get());
    assert_eq!(form["form"]["text"], "Старый текст");

    let response = app
        .post_json(
            &format!("/posts/{}/edit/", post.id),
            Some(&token),
            json!({"text": "Новый текст", "group": group.id}),
        )
        .await;
    assert_redirect(&response, &format!("/posts/{}/", post.id));

    let edited = app.store.fetch_post(post.id).await.unwrap().unwrap();
    assert_eq!(edited.text.get(), "Новый текст");
    assert_eq!(edited.group.unwrap().id, group.id);
    assert_eq!(edited.author.id, author.id);
    assert_eq!(edited.pub_date, post.pub_date);
}

#[tokio::test]
async fn edit_without_image_keeps_it() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let token = app.token_for(&author).await;

    let response = app
        .post_json(
            "/create/",
            Some(&token),
            json!({"text": "Пост с картинкой", "image": "small.gif"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let post_id = app.get_json("/profile/author/", None).await["page"]["items"][0]["id"].clone();
    let edit_uri = format!("/posts/{post_id}/edit/");
    let detail_uri = format!("/posts/{post_id}/");

    for body in [
        json!({"text": "Новый текст"}),
        json!({"text": "Новый текст", "image": ""}),
    ] {
        let response = app.post_json(&edit_uri, Some(&token), body).await;
        assert_redirect(&response, &detail_uri);
        let detail = app.get_json(&detail_uri, None).await;
        assert_eq!(detail["post"]["text"], "Новый текст");
        assert_eq!(detail["post"]["image"], "posts/small.gif");
    }

    let response = app
        .post_json(
            &edit_uri,
            Some(&token),
            json!({"text": "Другая картинка", "image": "big.gif"}),
        )
        .await;
    assert_redirect(&response, &detail_uri);
    let detail = app.get_json(&detail_uri, None).await;
    assert_eq!(detail["post"]["image"], "posts/big.gif");

    let response = app
        .post_json(
            &edit_uri,
            Some(&token),
            json!({"text": "Без картинки", "clear_image": true}),
        )
        .await;
    assert_redirect(&response, &detail_uri);
    let detail = app.get_json(&detail_uri, None).await;
    assert_eq!(detail["post"]["image"], Value::Null);
}

#[tokio::test]
async fn non_author_cannot_edit() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let intruder = app.user("intruder").await;
    let token = app.token_for(&intruder).await;
    let post = app.post(&author, "Текст автора", None).await;
    let edit_uri = format!("/posts/{}/edit/", post.id);
    let detail_uri = format!("/posts/{}/", post.id);

    let response = app.get(&edit_uri, Some(&token)).await;
    assert_redirect(&response, &detail_uri);

    let response = app
        .post_json(&edit_uri, Some(&token), json!({"text": "Взлом"}))
        .await;
    assert_redirect(&response, &detail_uri);

    assert_eq!(app.store.fetch_post(post.id).await.unwrap().unwrap(), post);
}

#[tokio::test]
async fn anonymous_actions_redirect_to_login() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let post = app.post(&author, "Текст", None).await;

    let response = app.get("/create/", None).await;
    assert_redirect(&response, "/auth/login/?next=/create/");

    let response = app
        .post_json("/create/", None, json!({"text": "Аноним"}))
        .await;
    assert_redirect(&response, "/auth/login/?next=/create/");

    let edit_uri = format!("/posts/{}/edit/", post.id);
    let response = app
        .post_json(&edit_uri, None, json!({"text": "Аноним"}))
        .await;
    assert_redirect(&response, &format!("/auth/login/?next={edit_uri}"));

    let comment_uri = format!("/posts/{}/comment/", post.id);
    let response = app
        .post_json(&comment_uri, None, json!({"text": "Аноним"}))
        .await;
    assert_redirect(&response, &format!("/auth/login/?next={comment_uri}"));

    let response = app.get("/follow/?page=2", None).await;
    assert_redirect(&response, "/auth/login/?next=/follow/%3Fpage%3D2");

    assert_eq!(app.store.count_posts(PostFilter::All).await.unwrap(), 1);
    assert_eq!(app.store.fetch_post(post.id).await.unwrap().unwrap(), post);
    assert!(app.store.fetch_post_comments(post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn comments_on_post_detail() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let reader = app.user("reader").await;
    let token = app.token_for(&reader).await;
    let post = app.post(&author, "Текст", None).await;
    app.post(&author, "Второй", None).await;
    let detail_uri = format!("/posts/{}/", post.id);

    let response = app
        .post_json(
            &format!("/posts/{}/comment/", post.id),
            Some(&token),
            json!({"text": "Первый"}),
        )
        .await;
    assert_redirect(&response, &detail_uri);

    let response = app
        .post_json(&detail_uri, Some(&token), json!({"text": "Второй"}))
        .await;
    assert_redirect(&response, &detail_uri);

    let response = app
        .post_json(&detail_uri, Some(&token), json!({"text": ""}))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let detail = app.get_json(&detail_uri, None).await;
    assert_eq!(detail["post"]["text"], "Текст");
    assert_eq!(detail["author_posts_count"], 2);
    assert_eq!(detail["form"]["text"], "");
    let comments = detail["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["text"], "Первый");
    assert_eq!(comments[1]["text"], "Второй");
    assert_eq!(comments[0]["author"]["username"], "reader");
}

#[tokio::test]
async fn unknown_things_are_not_found() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let token = app.token_for(&author).await;

    for uri in [
        "/unexisting_page/",
        "/posts/999/",
        "/posts/not-a-number/",
        "/group/missing/",
        "/profile/nobody/",
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json_body(response).await, json!({"status": 404}));
    }

    let response = app
        .post_json("/posts/999/comment/", Some(&token), json!({"text": "Текст"}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/posts/999/edit/", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/profile/nobody/follow/", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_and_unfollow() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let reader = app.user("reader").await;
    let stranger = app.user("stranger").await;
    let reader_token = app.token_for(&reader).await;
    let stranger_token = app.token_for(&stranger).await;
    app.post(&author, "Пост автора", None).await;
    let edge = Follow {
        user: reader.id,
        author: author.id,
    };

    for _ in 0..2 {
        let response = app
            .send(Method::POST, "/profile/author/follow/", Some(&reader_token), None)
            .await;
        assert_redirect(&response, "/profile/author/");
    }
    assert!(app.store.is_following(edge).await.unwrap());

    let feed = app.get_json("/follow/", Some(&reader_token)).await;
    assert_eq!(texts(&feed["page"]), ["Пост автора"]);
    let feed = app.get_json("/follow/", Some(&stranger_token)).await;
    assert!(texts(&feed["page"]).is_empty());

    let profile = app.get_json("/profile/author/", Some(&reader_token)).await;
    assert_eq!(profile["following"], true);
    assert_eq!(profile["is_own_profile"], false);
    let profile = app.get_json("/profile/author/", None).await;
    assert_eq!(profile["following"], false);

    let response = app
        .get("/profile/author/unfollow/", Some(&reader_token))
        .await;
    assert_redirect(&response, "/profile/author/");
    assert!(!app.store.is_following(edge).await.unwrap());

    let feed = app.get_json("/follow/", Some(&reader_token)).await;
    assert!(texts(&feed["page"]).is_empty());
}

#[tokio::test]
async fn own_profile_is_flagged() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let token = app.token_for(&author).await;

    let profile = app.get_json("/profile/author/", Some(&token)).await;
    assert_eq!(profile["is_own_profile"], true);
    assert_eq!(profile["author"]["id"], author.id.get());
}

#[tokio::test]
async fn index_is_cached_until_cleared() {
    let app = TestApp::new();
    let author = app.user("author").await;
    let staff_token = app.staff_token("admin").await;
    app.post(&author, "Первый", None).await;

    let first = body_bytes(app.get("/", None).await).await;
    app.post(&author, "Свежий", None).await;
    let second = body_bytes(app.get("/", None).await).await;
    assert_eq!(first, second);

    let response = app
        .send(Method::POST, "/admin/cache/clear/", Some(&staff_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let third = app.get_json("/", None).await;
    assert_eq!(texts(&third["page"]), ["Свежий", "Первый"]);

    app.post(&author, "Ещё один", None).await;
    app.state.feed_cache.clear();
    let fourth = app.get_json("/", None).await;
    assert_eq!(texts(&fourth["page"])[0], "Ещё один");
}

#[tokio::test]
async fn index_is_rendered_again_after_expiry() {
    let app = TestApp::with_cache_ttl(Duration::from_millis(250));
    let author = app.user("author").await;
    app.post(&author, "Первый", None).await;

    let first = body_bytes(app.get("/", None).await).await;
    app.post(&author, "Свежий", None).await;
    let cached = body_bytes(app.get("/", None).await).await;
    assert_eq!(first, cached);

    tokio::time::sleep(Duration::from_millis(600)).await;

    let fresh = app.get_json("/", None).await;
    assert_eq!(texts(&fresh["page"]), ["Свежий", "Первый"]);
}

#[tokio::test]
async fn signup_login_logout() {
    let app = TestApp::new();

    let credentials = json!({"username": "leo", "password": "correct horse"});
    let response = app
        .post_json("/auth/signup/", None, credentials.clone())
        .await;
    assert_redirect(&response, "/");

    let response = app.post_json("/auth/signup/", None, credentials).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(
        body["errors"]["username"][0],
        "A user with that username already exists."
    );

    let response = app
        .post_json(
            "/auth/signup/",
            None,
            json!({"username": "bad name", "password": "short"}),
        )
        .await;
    let body = json_body(response).await;
    assert_eq!(body["errors"]["username"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"]["password"].as_array().unwrap().len(), 1);

    let response = app
        .post_json(
            "/auth/login/",
            None,
            json!({"username": "leo", "password": "wrong horse"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["errors"]["__all__"].as_array().unwrap().len(), 1);

    let response = app
        .post_json(
            "/auth/login/?next=/follow/",
            None,
            json!({"username": "leo", "password": "correct horse"}),
        )
        .await;
    assert_redirect(&response, "/follow/");
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_owned();
    assert!(cookie.starts_with("session="));

    let with_cookie = |method: Method, uri: &str| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(COOKIE, &cookie)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.call(with_cookie(Method::GET, "/follow/")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.call(with_cookie(Method::POST, "/auth/logout/")).await;
    assert_redirect(&response, "/");
    assert!(
        response.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );

    let response = app.call(with_cookie(Method::GET, "/follow/")).await;
    assert_redirect(&response, "/auth/login/?next=/follow/");
}

#[tokio::test]
async fn login_ignores_foreign_next() {
    let app = TestApp::new();
    let response = app
        .post_json(
            "/auth/signup/",
            None,
            json!({"username": "leo", "password": "correct horse"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .post_json(
            "/auth/login/",
            None,
            json!({"username": "leo", "password": "correct horse", "next": "https://evil.example/"}),
        )
        .await;
    assert_redirect(&response, "/");

    let form = app.get_json("/auth/login/?next=/create/", None).await;
    assert_eq!(form["next"], "/create/");
}

#[tokio::test]
async fn expired_and_forged_tokens_are_anonymous() {
    let app = TestApp::with_settings(Settings {
        auth_token_lifetime: Some(PositiveDuration::new_unchecked(time::Duration::hours(1))),
        ..Settings::default()
    });
    let user = app.user("author").await;

    let token = AuthToken::generate_random(user.id);
    app.store
        .create_auth(&Authentication {
            user: user.id,
            token_hash: token.hash().unwrap(),
            created_at: UtcDateTime::now() - time::Duration::hours(2),
            expires_after: Some(PositiveDuration::new_unchecked(time::Duration::hours(1))),
        })
        .await
        .unwrap();

    let response = app.get("/follow/", Some(&token.as_token_str())).await;
    assert_redirect(&response, "/auth/login/?next=/follow/");

    let forged = AuthToken::generate_random(user.id);
    let response = app.get("/follow/", Some(&forged.as_token_str())).await;
    assert_redirect(&response, "/auth/login/?next=/follow/");

    let response = app.get("/follow/", Some("not a token")).await;
    assert_redirect(&response, "/auth/login/?next=/follow/");
}

#[tokio::test]
async fn admin_routes_need_staff() {
    let app = TestApp::new();
    let user = app.user("author").await;
    let token = app.token_for(&user).await;

    let response = app
        .post_json(
            "/admin/groups/",
            Some(&token),
            json!({"title": "Группа", "slug": "group"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await, json!({"status": 403}));

    let response = app
        .send(Method::DELETE, "/admin/users/author/", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(Method::POST, "/admin/cache/clear/", None, None)
        .await;
    assert_redirect(&response, "/auth/login/?next=/admin/cache/clear/");

    assert!(app.store.fetch_user(user.id).await.unwrap().is_some());
}

#[tokio::test]
async fn staff_manages_groups_users_and_posts() {
    let app = TestApp::new();
    let staff_token = app.staff_token("admin").await;
    let author = app.user("author").await;
    let reader = app.user("reader").await;
    let reader_token = app.token_for(&reader).await;

    let group = json!({"title": "Котики", "slug": "cats", "description": "Про котиков"});
    let response = app
        .post_json("/admin/groups/", Some(&staff_token), group.clone())
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["slug"], "cats");

    let response = app
        .post_json("/admin/groups/", Some(&staff_token), group)
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json_body(response).await["errors"]["slug"][0],
        "Group with this Slug already exists."
    );

    let cats = app
        .store
        .fetch_group_by_slug(&GroupSlug::new("cats".to_owned()).unwrap())
        .await
        .unwrap()
        .unwrap();
    let grouped = app.post(&author, "Про кота", Some(&cats)).await;
    let commented = app.post(&author, "Обсуждаемый", None).await;
    app.post_json(
        &format!("/posts/{}/comment/", commented.id),
        Some(&reader_token),
        json!({"text": "Комментарий"}),
    )
    .await;

    let response = app
        .send(Method::DELETE, "/admin/groups/cats/", Some(&staff_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let orphan = app.store.fetch_post(grouped.id).await.unwrap().unwrap();
    assert_eq!(orphan.group, None);
    assert_eq!(app.get("/group/cats/", None).await.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(
            Method::DELETE,
            &format!("/admin/posts/{}/", commented.id),
            Some(&staff_token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.store.fetch_post_comments(commented.id).await.unwrap().is_empty());

    let response = app
        .send(Method::DELETE, "/admin/users/author/", Some(&staff_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        app.store
            .count_posts(PostFilter::Author(author.id))
            .await
            .unwrap(),
        0
    );

    let response = app
        .send(Method::DELETE, "/admin/users/author/", Some(&staff_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
