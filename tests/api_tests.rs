use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode, header},
};
use cinevault::api::{create_app_state, router};
use cinevault::auth::token::{Token, TokenScope};
use cinevault::config::Config;
use cinevault::mailer::MemoryMailer;
use cinevault::models::permission::MOVIES_WRITE;
use cinevault::state::SharedState;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    shared: Arc<SharedState>,
    mailer: Arc<MemoryMailer>,
}

fn test_config() -> Config {
    let mut config = Config::default();
    let path = std::env::temp_dir().join(format!("cinevault-test-{}.db", uuid::Uuid::new_v4()));
    config.general.database_path = format!("sqlite:{}?mode=rwc", path.display());
    config.general.max_db_connections = 2;
    config.security.argon2_memory_cost_kib = 64;
    config.security.argon2_time_cost = 1;
    config.limiter.enabled = false;
    config.observability.metrics_enabled = false;
    config
}

async fn spawn_app_with(config: Config) -> TestApp {
    let mailer = Arc::new(MemoryMailer::new());
    let shared = Arc::new(
        SharedState::with_mailer(config, mailer.clone())
            .await
            .expect("Failed to create shared state"),
    );
    let state = create_app_state(shared.clone(), None).await;

    TestApp {
        router: router(state).await,
        shared,
        mailer,
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> axum::response::Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Registers a user and returns its id with the mailed activation token.
    async fn register(&self, email: &str) -> (i64, String) {
        let response = self
            .send_json(
                "POST",
                "/v1/users",
                None,
                json!({"name": "Alice Smith", "email": email, "password": "pa55word1234"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        let id = json["data"]["user"]["id"].as_i64().unwrap();

        let sent = self.mailer.last_for(email).await.expect("welcome email");
        (id, sent.email.token().to_string())
    }

    async fn login(&self, email: &str) -> axum::response::Response {
        self.send_json(
            "POST",
            "/v1/tokens/authentication",
            None,
            json!({"email": email, "password": "pa55word1234"}),
        )
        .await
    }

    /// Registered, activated and logged in.
    async fn active_user(&self, email: &str) -> String {
        let (_, activation) = self.register(email).await;
        let response = self
            .send_json("PUT", "/v1/users/activated", None, json!({"token": activation}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = self.login(email).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        json["data"]["authentication_token"]["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn writer(&self, email: &str) -> String {
        let token = self.active_user(email).await;
        self.shared
            .account_service
            .grant_permission(email, MOVIES_WRITE)
            .await
            .unwrap();
        token
    }
}

fn movie_body() -> Value {
    json!({
        "title": "Moana",
        "year": 2016,
        "runtime": "107 mins",
        "genres": ["animation", "adventure"]
    })
}

#[tokio::test]
async fn test_healthcheck() {
    let app = spawn_app().await;

    let response = app.get("/v1/healthcheck", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "available");
    assert_eq!(json["data"]["system_info"]["environment"], "development");
    assert_eq!(
        json["data"]["system_info"]["version"],
        env!("CARGO_PKG_VERSION")
    );
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let app = spawn_app().await;

    let response = app.get("/v1/nothing-here", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/v1/healthcheck")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_malformed_authorization_header() {
    let app = spawn_app().await;

    let response = app
        .send(
            Request::builder()
                .uri("/v1/healthcheck")
                .header(header::AUTHORIZATION, "Token xyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid or missing authentication token");
}

#[tokio::test]
async fn test_unknown_bearer_token() {
    let app = spawn_app().await;

    let response = app
        .get("/v1/healthcheck", Some("AAAAAAAAAAAAAAAAAAAAAAAAAA"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn test_anonymous_cannot_list_movies() {
    let app = spawn_app().await;

    let response = app.get("/v1/movies", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

    let json = body_json(response).await;
    assert_eq!(
        json["error"],
        "you must be authenticated to access this resource"
    );
}

#[tokio::test]
async fn test_inactive_user_is_forbidden() {
    let app = spawn_app().await;
    let (user_id, _) = app.register("inactive@example.com").await;

    let response = app.login("inactive@example.com").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = Token::generate(
        i32::try_from(user_id).unwrap(),
        chrono::Duration::hours(1),
        TokenScope::Authentication,
    )
    .unwrap();
    app.shared.store.insert_token(&token).await.unwrap();

    let response = app.get("/v1/movies", Some(&token.plaintext)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(
        json["error"],
        "your user account must be activated to access this resource"
    );
}

#[tokio::test]
async fn test_reader_cannot_write() {
    let app = spawn_app().await;
    let token = app.active_user("reader@example.com").await;

    let response = app.get("/v1/movies", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send_json("POST", "/v1/movies", Some(&token), movie_body())
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(
        json["error"],
        "your user account doesn't have the necessary permissions to access this resource"
    );
}

#[tokio::test]
async fn test_registration_activation_flow() {
    let app = spawn_app().await;
    let (_, activation) = app.register("flow@example.com").await;
    assert_eq!(activation.len(), 26);

    let response = app
        .send_json(
            "POST",
            "/v1/users",
            None,
            json!({"name": "Bob", "email": "FLOW@example.com", "password": "pa55word1234"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(
        json["error"]["email"],
        "a user with this email address already exists"
    );

    let response = app
        .send_json("PUT", "/v1/users/activated", None, json!({"token": activation}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["user"]["activated"], true);
    assert!(json["data"]["user"].get("password").is_none());

    // Activation tokens are single use.
    let response = app
        .send_json("PUT", "/v1/users/activated", None, json!({"token": activation}))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app.login("flow@example.com").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .send_json(
            "POST",
            "/v1/tokens/authentication",
            None,
            json!({"email": "flow@example.com", "password": "wrongpassword"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = spawn_app().await;
    let old_token = app.active_user("reset@example.com").await;

    let response = app
        .send_json(
            "POST",
            "/v1/tokens/password-reset",
            None,
            json!({"email": "reset@example.com"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let reset = app.mailer.last_for("reset@example.com").await.unwrap();
    let response = app
        .send_json(
            "PUT",
            "/v1/users/password",
            None,
            json!({"password": "n3wpassw0rd", "token": reset.email.token()}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/v1/healthcheck", Some(&old_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send_json(
            "POST",
            "/v1/tokens/authentication",
            None,
            json!({"email": "reset@example.com", "password": "n3wpassw0rd"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_movie_crud() {
    let app = spawn_app().await;
    let token = app.writer("writer@example.com").await;

    let response = app
        .send_json("POST", "/v1/movies", Some(&token), movie_body())
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string();
    let json = body_json(response).await;
    let id = json["data"]["movie"]["id"].as_i64().unwrap();
    assert_eq!(location, format!("/v1/movies/{id}"));
    assert_eq!(json["data"]["movie"]["runtime"], "107 mins");
    assert_eq!(json["data"]["movie"]["version"], 1);

    let response = app
        .send_json(
            "PATCH",
            &location,
            Some(&token),
            json!({"year": 1985}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["movie"]["year"], 1985);
    assert_eq!(json["data"]["movie"]["title"], "Moana");
    assert_eq!(json["data"]["movie"]["version"], 2);

    let response = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri(&location)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&location, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_movie_validation() {
    let app = spawn_app().await;
    let token = app.writer("validate@example.com").await;

    let response = app
        .send_json(
            "POST",
            "/v1/movies",
            Some(&token),
            json!({"title": "", "year": 1500, "runtime": "90 mins", "genres": ["a", "a"]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["title"], "must be provided");
    assert_eq!(json["error"]["year"], "must be greater than 1888");
    assert_eq!(json["error"]["genres"], "must not contain duplicate values");

    let response = app
        .send_json(
            "POST",
            "/v1/movies",
            Some(&token),
            json!({"title": "Moana", "runtime": "107 minutes"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send_json(
            "POST",
            "/v1/movies",
            Some(&token),
            json!({"title": "Moana", "rating": 5}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expected_version_mismatch() {
    let app = spawn_app().await;
    let token = app.writer("version@example.com").await;

    let response = app
        .send_json("POST", "/v1/movies", Some(&token), movie_body())
        .await;
    let json = body_json(response).await;
    let id = json["data"]["movie"]["id"].as_i64().unwrap();

    let response = app
        .send(
            Request::builder()
                .method("PATCH")
                .uri(format!("/v1/movies/{id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .header("X-Expected-Version", "7")
                .body(Body::from(json!({"title": "Moana 2"}).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert_eq!(
        json["error"],
        "unable to update the record due to an edit conflict, please try again"
    );
}

#[tokio::test]
async fn test_list_movies_filters() {
    let app = spawn_app().await;
    let token = app.writer("list@example.com").await;

    for (title, year, genres) in [
        ("Black Panther", 2018, json!(["action", "adventure"])),
        ("Deadpool", 2016, json!(["action", "comedy"])),
        ("The Breakfast Club", 1986, json!(["drama"])),
    ] {
        let response = app
            .send_json(
                "POST",
                "/v1/movies",
                Some(&token),
                json!({"title": title, "year": year, "runtime": "100 mins", "genres": genres}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .get("/v1/movies?genres=action&sort=-year", Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let movies = json["data"]["movies"].as_array().unwrap();
    assert_eq!(movies.len(), 2);
    assert_eq!(movies[0]["title"], "Black Panther");
    assert_eq!(json["data"]["metadata"]["total_records"], 2);

    let response = app
        .get("/v1/movies?title=club&page_size=1", Some(&token))
        .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["movies"][0]["title"], "The Breakfast Club");
    assert_eq!(json["data"]["metadata"]["last_page"], 1);

    let response = app.get("/v1/movies?title=zzz", Some(&token)).await;
    let json = body_json(response).await;
    assert!(json["data"]["movies"].as_array().unwrap().is_empty());
    assert_eq!(json["data"]["metadata"], json!({}));

    let response = app
        .get("/v1/movies?sort=rating&page=0", Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["sort"], "invalid sort value");
    assert_eq!(json["error"]["page"], "must be greater than zero");
}

#[tokio::test]
async fn test_rate_limit() {
    let mut config = test_config();
    config.limiter.enabled = true;
    config.limiter.rps = 0.5;
    config.limiter.burst = 2;
    let app = spawn_app_with(config).await;

    let addr: SocketAddr = "10.0.0.7:5555".parse().unwrap();
    let request = || {
        Request::builder()
            .uri("/v1/healthcheck")
            .extension(ConnectInfo(addr))
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(app.send(request()).await.status(), StatusCode::OK);
    assert_eq!(app.send(request()).await.status(), StatusCode::OK);

    let response = app.send(request()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["error"], "rate limit exceeded");

    let other: SocketAddr = "10.0.0.8:5555".parse().unwrap();
    let response = app
        .send(
            Request::builder()
                .uri("/v1/healthcheck")
                .extension(ConnectInfo(other))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_activation_tokens_are_superseded_and_consumed() {
    let mut config = test_config();
    config.security.activation_token_ttl_hours = 12;
    let app = spawn_app_with(config).await;

    let (user_id, first) = app.register("reissue@example.com").await;
    let welcome = app.mailer.last_for("reissue@example.com").await.unwrap();
    assert!(welcome.email.plain_body().contains("expire in 12 hours"));

    let response = app
        .send_json(
            "POST",
            "/v1/tokens/activation",
            None,
            json!({"email": "reissue@example.com"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let second = app
        .mailer
        .last_for("reissue@example.com")
        .await
        .unwrap()
        .email
        .token()
        .to_string();
    assert_ne!(first, second);

    // Outstanding alongside the second one until activation consumes both.
    let third = Token::generate(
        i32::try_from(user_id).unwrap(),
        chrono::Duration::hours(1),
        TokenScope::Activation,
    )
    .unwrap();
    app.shared.store.insert_token(&third).await.unwrap();

    let response = app
        .send_json("PUT", "/v1/users/activated", None, json!({"token": first}))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["token"], "invalid or expired activation token");

    let response = app
        .send_json("PUT", "/v1/users/activated", None, json!({"token": second}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send_json(
            "PUT",
            "/v1/users/activated",
            None,
            json!({"token": third.plaintext}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .send_json(
            "POST",
            "/v1/tokens/activation",
            None,
            json!({"email": "reissue@example.com"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["email"], "user has already been activated");
}

#[tokio::test]
async fn test_registration_is_validated_before_hashing() {
    // Argon2 rejects these parameters, so any request that reaches the
    // hasher fails with a 500.
    let mut config = test_config();
    config.security.argon2_memory_cost_kib = 0;
    let app = spawn_app_with(config).await;

    let response = app
        .send_json(
            "POST",
            "/v1/users",
            None,
            json!({"name": "", "email": "not-an-email", "password": "short"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["name"], "must be provided");
    assert_eq!(json["error"]["email"], "must be a valid email address");
    assert_eq!(json["error"]["password"], "must be at least 8 bytes long");

    let response = app
        .send_json(
            "POST",
            "/v1/users",
            None,
            json!({"name": "Alice", "email": "alice@example.com", "password": "pa55word1234"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.mailer.sent().await.is_empty());
}
