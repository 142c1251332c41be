use crate::common::{TestApp, UploadPart, routes};

#[tokio::test]
async fn global_quota_rejects_the_hundred_and_first_request() {
    let app = TestApp::spawn().await;

    for n in 1..=100 {
        let res = app.get(routes::ROOT).await;
        assert_eq!(res.status, 200, "request {n} was rejected");
    }

    let res = app.get(routes::ROOT).await;
    assert_eq!(res.status, 429);
    assert_eq!(res.code(), "RATE_LIMITED");
    assert_eq!(
        res.body["message"],
        "Too many requests, please try again later."
    );
    assert!(res.header("retry-after").is_some());
    assert_eq!(res.header("ratelimit-remaining"), Some("0"));
}

#[tokio::test]
async fn global_quota_counts_unmatched_routes() {
    let app = TestApp::spawn_with(|config| config.rate_limit.global.max = 2).await;

    app.get("/nowhere").await;
    app.get("/nowhere").await;
    let res = app.get(routes::ROOT).await;

    assert_eq!(res.status, 429);
}

#[tokio::test]
async fn single_route_has_its_own_quota() {
    let app = TestApp::spawn_with(|config| config.rate_limit.global.max = 1000).await;
    let key = app.create_api_key("pk_single_quota", 1);

    // Authenticated but empty requests reach the quota without storing anything.
    for n in 1..=100 {
        let res = app.upload(routes::SINGLE, Some(&key), vec![]).await;
        assert_eq!(res.status, 400, "request {n} was not passed through");
    }

    let res = app.upload(routes::SINGLE, Some(&key), vec![]).await;
    assert_eq!(res.status, 429);
    assert_eq!(
        res.body["message"],
        "Too many upload requests, please try again later."
    );

    // The bulk quota is untouched.
    let res = app.upload(routes::BULK, Some(&key), vec![]).await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn bulk_route_has_its_own_quota() {
    let app = TestApp::spawn_with(|config| config.rate_limit.global.max = 1000).await;
    let key = app.create_api_key("pk_bulk_quota", 1);

    for n in 1..=100 {
        let res = app.upload(routes::BULK, Some(&key), vec![]).await;
        assert_eq!(res.status, 400, "request {n} was not passed through");
    }

    let res = app.upload(routes::BULK, Some(&key), vec![]).await;
    assert_eq!(res.status, 429);
    assert_eq!(
        res.body["message"],
        "Hourly upload limit reached, please try again later."
    );
}

#[tokio::test]
async fn rejected_credentials_do_not_consume_route_quota() {
    let app = TestApp::spawn_with(|config| {
        config.rate_limit.global.max = 1000;
        config.rate_limit.upload.max = 2;
        config.rate_limit.bulk.max = 2;
    })
    .await;
    let key = app.create_api_key("pk_behind_same_ip", 4);

    for _ in 0..5 {
        let missing = app
            .upload(routes::SINGLE, None, vec![UploadPart::pdf("file", "a.pdf")])
            .await;
        assert_eq!(missing.status, 401);

        let unknown = app
            .upload(
                routes::BULK,
                Some("pk_nobody"),
                vec![UploadPart::pdf("files", "a.pdf")],
            )
            .await;
        assert_eq!(unknown.status, 403);
    }

    let single = app
        .upload(routes::SINGLE, Some(&key), vec![UploadPart::pdf("file", "a.pdf")])
        .await;
    assert_eq!(single.status, 200, "{}", single.text);

    let bulk = app
        .upload(routes::BULK, Some(&key), vec![UploadPart::pdf("files", "b.pdf")])
        .await;
    assert_eq!(bulk.status, 200, "{}", bulk.text);
}

#[tokio::test]
async fn global_quota_applies_on_top_of_route_quota() {
    let app = TestApp::spawn_with(|config| {
        config.rate_limit.global.max = 3;
        config.rate_limit.upload.max = 50;
    })
    .await;

    for _ in 0..3 {
        let res = app
            .upload(routes::SINGLE, None, vec![UploadPart::pdf("file", "a.pdf")])
            .await;
        assert_eq!(res.status, 401);
    }

    let res = app
        .upload(routes::SINGLE, None, vec![UploadPart::pdf("file", "a.pdf")])
        .await;
    assert_eq!(res.status, 429);
    assert_eq!(
        res.body["message"],
        "Too many requests, please try again later."
    );
}

#[tokio::test]
async fn route_quota_headers_take_precedence() {
    let app = TestApp::spawn_with(|config| {
        config.rate_limit.global.max = 1000;
        config.rate_limit.upload.max = 10;
    })
    .await;

    let key = app.create_api_key("pk_headers", 1);

    let res = app.upload(routes::SINGLE, Some(&key), vec![]).await;

    assert_eq!(res.header("ratelimit-limit"), Some("10"));
    assert_eq!(res.header("ratelimit-remaining"), Some("9"));
    assert!(res.header("ratelimit-reset").is_some());
}

#[tokio::test]
async fn disabled_tier_never_rejects() {
    let app = TestApp::spawn_with(|config| config.rate_limit.global.max = 0).await;

    for _ in 0..120 {
        let res = app.get(routes::HEALTH).await;
        assert_eq!(res.status, 200);
    }
}
