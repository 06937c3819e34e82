//! Registry clients against a mock HTTP server.

use releasekit_registry::{CratesIo, GoProxy, Npm, PubDev, PyPi};
use releasekit_release::{Error, Registry};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_crates_io_exists_and_checksum() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crates/core/1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": {"num": "1.0.0", "checksum": "abc123", "yanked": false}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crates/core/2.0.0"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let registry = CratesIo::new(&server.uri());
    assert!(registry.version_exists("core", "1.0.0").await.unwrap());
    assert!(!registry.version_exists("core", "2.0.0").await.unwrap());

    let sums = registry.checksums("core", "1.0.0").await.unwrap();
    assert_eq!(sums.get("core-1.0.0.crate").map(String::as_str), Some("abc123"));
    assert!(registry.checksums("core", "2.0.0").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = PyPi::new(&server.uri())
        .version_exists("requests", "2.0.0")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Backend { .. }));
    assert!(err.is_transient());
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_crates_io_yank_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/crates/core/1.0.0/yank"))
        .and(header("Authorization", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let registry = CratesIo::new(&server.uri()).with_token("secret");
    assert!(registry.yank("core", "1.0.0", Some("rolled back")).await.unwrap());
}

#[tokio::test]
async fn test_pypi_checksums_by_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pypi/my-pkg/1.2.0/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "info": {"name": "my_pkg"},
            "urls": [
                {"filename": "my_pkg-1.2.0.tar.gz", "digests": {"sha256": "aa", "md5": "x"}},
                {"filename": "my_pkg-1.2.0-py3-none-any.whl", "digests": {"sha256": "bb"}}
            ]
        })))
        .mount(&server)
        .await;

    let registry = PyPi::new(&server.uri());
    assert!(registry.version_exists("My_Pkg", "1.2.0").await.unwrap());
    let sums = registry.checksums("my_pkg", "1.2.0").await.unwrap();
    assert_eq!(sums.len(), 2);
    assert_eq!(sums["my_pkg-1.2.0-py3-none-any.whl"], "bb");
    assert!(!registry.yank("my_pkg", "1.2.0", None).await.unwrap());
}

#[tokio::test]
async fn test_npm_scoped_package() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/@acme%2Fui/3.1.0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": "3.1.0"})),
        )
        .mount(&server)
        .await;

    let registry = Npm::new(&server.uri());
    assert!(registry.version_exists("@acme/ui", "3.1.0").await.unwrap());
    assert!(!registry.version_exists("@acme/ui", "3.2.0").await.unwrap());
    assert!(registry.checksums("@acme/ui", "3.1.0").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_go_proxy_and_pub_dev() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/github.com/!acme/lib/@v/v0.3.0.info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"Version": "v0.3.0"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/github.com/!acme/lib/@v/v0.4.0.info"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/packages/widgets/versions/1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "1.0.0",
            "archive_sha256": "cafe"
        })))
        .mount(&server)
        .await;

    let go = GoProxy::new(&server.uri());
    assert!(go.version_exists("github.com/Acme/lib", "0.3.0").await.unwrap());
    assert!(!go.version_exists("github.com/Acme/lib", "v0.4.0").await.unwrap());

    let dart = PubDev::new(&server.uri());
    let sums = dart.checksums("widgets", "1.0.0").await.unwrap();
    assert_eq!(sums["widgets-1.0.0.tar.gz"], "cafe");
}

#[tokio::test]
async fn test_poll_version_gives_up_after_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let visible = PubDev::new(&server.uri())
        .poll_version("widgets", "9.9.9", Duration::from_millis(200), Duration::from_millis(50))
        .await
        .unwrap();
    assert!(!visible);
}
