use std::sync::Arc;

use enom_api::{ApiClient, ApiError, EndpointRegistry, EndpointSpec, Params, Pipeline};
use enom_common::{ApiConfig, DispatchConfig, EnomConfig, HttpContext};
use enom_login::{Credential, CredentialStore, KeySource};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

struct Harness {
    server: MockServer,
    client: ApiClient,
    store: Arc<CredentialStore>,
    http: HttpContext,
    config: EnomConfig,
    _home: tempfile::TempDir,
}

async fn harness(credential: Option<&str>) -> Harness {
    harness_with_delay(credential, 0).await
}

async fn harness_with_delay(credential: Option<&str>, delay_ms: u64) -> Harness {
    let server = MockServer::start().await;
    let home = tempfile::tempdir().unwrap();

    let config = EnomConfig {
        api: ApiConfig::single_host(server.uri()),
        dispatch: DispatchConfig {
            min_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
        },
        ..EnomConfig::default()
    };
    let http = HttpContext::new(&config.api).unwrap();
    let store = Arc::new(CredentialStore::new(home.path(), KeySource::Disabled));
    if let Some(credential) = credential {
        store.set(Credential::new(credential));
    }
    let client = ApiClient::new(&http, &config, store.clone());

    Harness {
        server,
        client,
        store,
        http,
        config,
        _home: home,
    }
}

fn params(pairs: &[(&str, Value)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn nav_with_keys() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 0,
        "data": {
            "isLogin": true,
            "uname": "listener",
            "face": "https://i0.hdslb.com/face.jpg",
            "mid": 42,
            "wbi_img": {
                "img_url": "https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png",
                "sub_url": "https://i0.hdslb.com/bfs/wbi/4932caff0ff746eab6f01bf08b70ac45.png"
            }
        }
    }))
}

async fn requests_to(server: &MockServer, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .collect()
}

#[tokio::test]
async fn unknown_endpoint_never_touches_the_network() {
    let h = harness(None).await;

    let err = h.client.invoke("not-a-real-name", Params::new()).await.unwrap_err();

    assert!(matches!(err, ApiError::NotFound(ref name) if name == "not-a-real-name"));
    assert!(!err.is_retryable());
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_scalar_params_are_rejected_before_sending() {
    let h = harness(None).await;
    let err = h
        .client
        .invoke("getVideoInfo", params(&[("bvid", json!(["a", "b"]))]))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidParams { .. }));
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn get_merges_defaults_and_attaches_session() {
    let h = harness(Some("SESSDATA=abc")).await;
    Mock::given(method("GET"))
        .and(path("/audio/music-service-c/web/menu/hit"))
        .and(query_param("ps", "20"))
        .and(query_param("pn", "3"))
        .and(header("cookie", "SESSDATA=abc"))
        .and(header("referer", "https://www.bilibili.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "data": []})))
        .expect(1)
        .mount(&h.server)
        .await;

    let out = h
        .client
        .invoke("getHitSong", params(&[("pn", json!(3))]))
        .await
        .unwrap();
    assert_eq!(out, json!({"code": 0, "data": []}));

    let sent = requests_to(&h.server, "/audio/music-service-c/web/menu/hit").await;
    assert_eq!(sent[0].url.query(), Some("ps=20&pn=3"));
}

#[tokio::test]
async fn unsigned_query_skips_empty_values() {
    let h = harness(None).await;
    Mock::given(method("GET"))
        .and(path("/x/player/playurl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .mount(&h.server)
        .await;

    h.client
        .invoke("getAudioOfVideo", params(&[("bvid", json!("BV1xx"))]))
        .await
        .unwrap();

    let sent = requests_to(&h.server, "/x/player/playurl").await;
    // cid defaults to 0 and is left out.
    assert_eq!(sent[0].url.query(), Some("fnval=16&bvid=BV1xx"));
}

#[tokio::test]
async fn signed_endpoint_carries_sorted_query_and_signature() {
    let h = harness(Some("SESSDATA=abc")).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .and(header("cookie", "SESSDATA=abc"))
        .respond_with(nav_with_keys())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .mount(&h.server)
        .await;

    h.client
        .invoke("search", params(&[("keyword", json!("lofi (live)!"))]))
        .await
        .unwrap();

    let sent = requests_to(&h.server, "/x/web-interface/search/type").await;
    let query = sent[0].url.query().unwrap().to_string();
    let keys: Vec<&str> = query
        .split('&')
        .map(|pair| pair.split('=').next().unwrap())
        .collect();

    let (signed_keys, trailer) = keys.split_at(keys.len() - 2);
    assert_eq!(trailer, ["wts", "w_rid"]);
    let mut sorted = signed_keys.to_vec();
    sorted.sort_unstable();
    assert_eq!(signed_keys, sorted.as_slice());

    // Empty defaults are kept when signing; reserved characters are stripped.
    assert!(query.contains("category_id=&"));
    assert!(query.contains("keyword=lofi%20live&"));
    let w_rid = query.rsplit("w_rid=").next().unwrap();
    assert_eq!(w_rid.len(), 32);
}

fn wts_of(request: &Request) -> u64 {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "wts")
        .map(|(_, v)| v.parse().unwrap())
        .unwrap()
}

#[tokio::test]
async fn queued_request_is_signed_when_sent() {
    let h = harness_with_delay(None, 1_500).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(nav_with_keys())
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .mount(&h.server)
        .await;

    let (first, second) = tokio::join!(
        h.client.invoke("search", Params::new()),
        h.client.invoke("search", Params::new()),
    );
    first.unwrap();
    second.unwrap();

    let sent = requests_to(&h.server, "/x/web-interface/search/type").await;
    assert_eq!(sent.len(), 2);
    // The second request waited out the queue delay before being stamped.
    assert!(wts_of(&sent[1]) > wts_of(&sent[0]));
}

#[tokio::test]
async fn missing_keys_degrade_to_unsigned_query() {
    let h = harness(None).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": -101, "data": {}})))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/space/wbi/arc/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client
        .invoke("getUserArc", params(&[("mid", json!(42))]))
        .await
        .unwrap();

    let sent = requests_to(&h.server, "/x/space/wbi/arc/search").await;
    let query = sent[0].url.query().unwrap();
    assert_eq!(query, "mid=42&pn=1&ps=25&tid=3&order=pubdate");
    assert!(!query.contains("w_rid"));
}

#[tokio::test]
async fn unreachable_nav_also_degrades() {
    let h = harness(None).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/space/wbi/arc/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .mount(&h.server)
        .await;

    assert!(h.client.invoke("getUserArc", Params::new()).await.is_ok());
    let sent = requests_to(&h.server, "/x/space/wbi/arc/search").await;
    assert!(!sent[0].url.query().unwrap_or_default().contains("w_rid"));
}

#[tokio::test]
async fn keys_are_cached_per_session_and_dropped_on_rejection() {
    let h = harness(Some("SESSDATA=one")).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(nav_with_keys())
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .mount(&h.server)
        .await;

    h.client.invoke("search", Params::new()).await.unwrap();
    h.client.invoke("search", Params::new()).await.unwrap();
    assert_eq!(requests_to(&h.server, "/x/web-interface/nav").await.len(), 1);

    // Another session must not reuse keys fetched for the first one.
    h.store.set(Credential::new("SESSDATA=two"));
    h.client.invoke("search", Params::new()).await.unwrap();
    assert_eq!(requests_to(&h.server, "/x/web-interface/nav").await.len(), 2);

    h.client.keys().invalidate();
    h.client.invoke("search", Params::new()).await.unwrap();
    assert_eq!(requests_to(&h.server, "/x/web-interface/nav").await.len(), 3);
}

#[tokio::test]
async fn signature_rejection_invalidates_cached_keys() {
    let h = harness(None).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(nav_with_keys())
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/search/type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": -403, "message": "forbidden"})))
        .mount(&h.server)
        .await;

    let out = h.client.invoke("search", Params::new()).await.unwrap();
    assert_eq!(out["code"], json!(-403));
    h.client.invoke("search", Params::new()).await.unwrap();

    assert_eq!(requests_to(&h.server, "/x/web-interface/nav").await.len(), 2);
}

#[tokio::test]
async fn cleared_session_is_not_replayed_from_response_cookies() {
    let h = harness(None).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "SESSDATA=secret; Path=/")
                .set_body_json(json!({"code": -101, "data": {"isLogin": false}})),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .mount(&h.server)
        .await;

    let outcome = h.store.init(&h.http, &h.config.api).await;
    assert_eq!(outcome, enom_login::InitOutcome::Guest);
    h.client.invoke("getVideoInfo", Params::new()).await.unwrap();

    h.store.clear();
    assert!(h.store.get().is_none());
    h.client.invoke("getVideoInfo", Params::new()).await.unwrap();

    let sent = requests_to(&h.server, "/x/web-interface/view").await;
    assert_eq!(
        sent[0].headers.get("cookie").map(|v| v.to_str().unwrap()),
        Some("SESSDATA=secret")
    );
    assert!(sent[1].headers.get("cookie").is_none());
}

#[tokio::test]
async fn post_sends_form_body_with_csrf_from_session() {
    let h = harness(Some("SESSDATA=abc; bili_jct=tok")).await;
    let origin = h.server.uri();
    Mock::given(method("POST"))
        .and(path("/x/v3/fav/resource/deal"))
        .and(header("origin", origin.as_str()))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("rid=123&type=2&add_media_ids=1%2C2&csrf=tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client
        .invoke(
            "addSongToFav",
            params(&[("rid", json!(123)), ("add_media_ids", json!("1,2"))]),
        )
        .await
        .unwrap();

    let sent = requests_to(&h.server, "/x/v3/fav/resource/deal").await;
    assert_eq!(sent[0].url.query(), None);
}

#[tokio::test]
async fn caller_keys_outside_the_body_template_go_to_the_query() {
    let h = harness(Some("bili_jct=tok")).await;
    Mock::given(method("POST"))
        .and(path("/x/relation/modify"))
        .and(query_param("trace", "x1"))
        .and(body_string("fid=9&act=2&re_src=11&csrf=tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client
        .invoke(
            "relationModify",
            params(&[("fid", json!(9)), ("act", json!(2)), ("trace", json!("x1"))]),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn json_body_endpoint() {
    let h = harness(None).await;
    let mut registry = EndpointRegistry::new();
    registry.register(
        EndpointSpec::post("report", format!("{}/x/report", h.server.uri()))
            .body_field("event", "")
            .body_field("count", 0)
            .json_body(),
    );
    let client = h.client.with_registry(registry);

    Mock::given(method("POST"))
        .and(path("/x/report"))
        .and(wiremock::matchers::body_json(json!({"event": "play", "count": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0})))
        .expect(1)
        .mount(&h.server)
        .await;

    client
        .invoke("report", params(&[("event", json!("play"))]))
        .await
        .unwrap();
}

#[tokio::test]
async fn http_error_status_is_reported() {
    let h = harness(None).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&h.server)
        .await;

    let err = h.client.invoke("getVideoInfo", Params::new()).await.unwrap_err();
    match &err {
        ApiError::Status { status, body } => {
            assert_eq!(*status, 503);
            assert_eq!(body, "busy");
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn non_json_body_fails_json_pipeline() {
    let h = harness(None).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/view"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .mount(&h.server)
        .await;

    let err = h.client.invoke("getVideoInfo", Params::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::NotJson { ref snippet } if snippet == "<html>captcha</html>"));
}

#[tokio::test]
async fn raw_pipeline_returns_body_text() {
    let h = harness(None).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
        .mount(&h.server)
        .await;

    let out = h.client.invoke("getCookie", Params::new()).await.unwrap();
    assert_eq!(out, Value::String("<html>home</html>".into()));
}

#[tokio::test]
async fn sink_receives_pipeline_value() {
    let h = harness(None).await;
    let mut registry = EndpointRegistry::new();
    registry.register(
        EndpointSpec::get("charts", format!("{}/charts", h.server.uri()))
            .pipeline(Pipeline::json_sink()),
    );
    let client = h.client.with_registry(registry);

    Mock::given(method("GET"))
        .and(path("/charts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [1, 2]})))
        .mount(&h.server)
        .await;

    let delivered = Arc::new(Mutex::new(None));
    let slot = delivered.clone();
    let sink = move |value: &Value| *slot.lock() = Some(value.clone());

    let out = client
        .invoke_with_sink("charts", Params::new(), Some(&sink))
        .await
        .unwrap();

    assert_eq!(out, json!({"data": [1, 2]}));
    assert_eq!(*delivered.lock(), Some(json!({"data": [1, 2]})));
}

#[tokio::test]
async fn current_user_reads_nav_profile() {
    let h = harness(Some("SESSDATA=abc")).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(nav_with_keys())
        .mount(&h.server)
        .await;

    let user = h.client.current_user().await.unwrap();
    assert!(user.is_login);
    assert_eq!(user.uname.as_deref(), Some("listener"));
    assert_eq!(user.mid, Some(42));
}

#[tokio::test]
async fn anonymous_nav_is_not_logged_in() {
    let h = harness(None).await;
    Mock::given(method("GET"))
        .and(path("/x/web-interface/nav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": -101, "data": {"isLogin": false}})))
        .mount(&h.server)
        .await;

    let user = h.client.current_user().await.unwrap();
    assert!(!user.is_login);
    assert_eq!(user.uname, None);
}
