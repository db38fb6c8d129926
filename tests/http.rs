//! HTTP backend and the adapters stacked on it, against a local server.

mod common;

use std::io::{Read, Write};
use std::time::{Duration, Instant, SystemTime};

use common::{Route, TestServer};
use flate2::Compression;
use flate2::write::GzEncoder;
use layerfs::*;
use reqwest::blocking::Client;
use url::Url;

fn http(server: &TestServer) -> HttpFs {
    HttpFs::with_client(
        Context::background(),
        Client::new(),
        Url::parse(&server.url("/")).unwrap(),
    )
    .unwrap()
}

fn sha256(data: &[u8]) -> String {
    hex::encode(HashAlgorithm::Sha256.digest(data))
}

fn gz(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

// =============================================================================
// Status codes and metadata
// =============================================================================

#[test]
fn ok_response_body_and_metadata() {
    let server = TestServer::start([(
        "/dir/data.json",
        Route::ok(r#"{"ok":true}"#).header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
    )]);
    let fs = http(&server);

    assert_eq!(fs.read_file("dir/data.json").unwrap(), br#"{"ok":true}"#);

    let meta = fs.stat("dir/data.json").unwrap();
    assert_eq!(meta.name, "data.json");
    assert_eq!(meta.size, 11);
    assert!(meta.is_file());
    assert_eq!(
        meta.modified,
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_445_412_480)
    );
}

#[test]
fn status_codes_map_to_error_kinds() {
    let server = TestServer::start([
        ("/forbidden", Route::status(403)),
        ("/unauthorized", Route::status(401)),
        ("/broken", Route::status(500)),
    ]);
    let fs = http(&server);

    assert!(fs.read_file("missing").unwrap_err().is_not_found());
    assert!(fs.read_file("forbidden").unwrap_err().is_permission_denied());
    assert!(fs.read_file("unauthorized").unwrap_err().is_permission_denied());

    let err = fs.read_file("broken").unwrap_err();
    assert!(matches!(err, FsError::HttpStatus { status: 500, .. }));
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(err.is_retryable());
}

#[test]
fn query_is_sent_with_the_request() {
    let server = TestServer::start([("/a.json?v=2", Route::ok("v2"))]);
    let fs = http(&server);
    assert_eq!(fs.read_file("a.json?v=2").unwrap(), b"v2");
    assert_eq!(server.hits(), ["/a.json?v=2"]);
}

#[test]
fn cancelled_context_sends_nothing() {
    let server = TestServer::start([("/a", Route::ok("a"))]);
    let ctx = Context::background();
    let fs = HttpFs::with_client(ctx.clone(), Client::new(), Url::parse(&server.url("/")).unwrap())
        .unwrap();
    ctx.cancel();
    assert!(matches!(fs.read_file("a").unwrap_err(), FsError::Cancelled));
    assert!(server.hits().is_empty());
}

#[test]
fn cancel_during_body_read_stops_the_read() {
    let server = TestServer::start([("/big.bin", Route::ok(vec![1u8; 1 << 20]))]);
    let ctx = Context::background();
    let fs = HttpFs::with_client(ctx.clone(), Client::new(), Url::parse(&server.url("/")).unwrap())
        .unwrap();

    let mut file = fs.open("big.bin").unwrap();
    let mut head = [0u8; 16];
    file.read_exact(&mut head).unwrap();
    ctx.cancel();

    let mut rest = Vec::new();
    let err = file.read_to_end(&mut rest).unwrap_err();
    let err = FsError::from_io(err, "read", "big.bin");
    assert!(matches!(err, FsError::Cancelled), "{err}");
    assert!(file.close().is_ok());
}

#[test]
fn deadline_during_body_read_stops_the_read() {
    let server = TestServer::start([(
        "/slow.bin",
        Route::ok("late").stall(Duration::from_secs(3)),
    )]);
    let ctx = Context::background().with_timeout(Duration::from_millis(300));
    let fs = HttpFs::with_client(ctx, Client::new(), Url::parse(&server.url("/")).unwrap())
        .unwrap();

    let start = Instant::now();
    let mut file = fs.open("slow.bin").unwrap();
    let mut out = Vec::new();
    let err = FsError::from_io(file.read_to_end(&mut out).unwrap_err(), "read", "slow.bin");
    assert!(matches!(err, FsError::DeadlineExceeded), "{err}");
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn retry_returns_deadline_error_for_stalled_body() {
    let server = TestServer::start([(
        "/slow.bin",
        Route::ok("late").stall(Duration::from_secs(3)),
    )]);
    let ctx = Context::background().with_timeout(Duration::from_millis(300));
    let http = HttpFs::with_client(ctx.clone(), Client::new(), Url::parse(&server.url("/")).unwrap())
        .unwrap();
    let config = RetryConfig {
        attempts: -1,
        delay: Duration::from_millis(10),
    };
    let fs = RetryFs::new(ctx, http, config);

    let start = Instant::now();
    let err = fs.read_file("slow.bin").unwrap_err();
    assert!(matches!(err, FsError::DeadlineExceeded), "{err}");
    assert!(start.elapsed() < Duration::from_secs(10));
}

// =============================================================================
// Adapters over HTTP
// =============================================================================

#[test]
fn checksum_strips_parameter_and_verifies() {
    let server = TestServer::start([("/f.txt", Route::ok("payload"))]);
    let fs = ChecksumFs::new(http(&server), ChecksumConfig::default());

    let good = format!("f.txt?checksum=0x{}", sha256(b"payload"));
    assert_eq!(fs.read_file(&good).unwrap(), b"payload");

    let bad = format!("f.txt?checksum={}", sha256(b"tampered"));
    assert!(fs.read_file(&bad).unwrap_err().is_kind(ErrorKind::Integrity));

    assert_eq!(server.hits(), ["/f.txt", "/f.txt"]);
}

#[test]
fn retry_recovers_from_unavailable_server() {
    let server = TestServer::start([("/flaky", Route::ok("finally").fail_first(2))]);
    let config = RetryConfig {
        attempts: 3,
        delay: Duration::from_millis(5),
    };
    let fs = RetryFs::new(Context::background(), http(&server), config);

    assert_eq!(fs.read_file("flaky").unwrap(), b"finally");
    assert_eq!(server.hit_count("/flaky"), 3);
}

#[test]
fn retry_does_not_repeat_not_found() {
    let server = TestServer::empty();
    let fs = RetryFs::new(Context::background(), http(&server), RetryConfig::default());
    assert!(fs.read_file("gone").unwrap_err().is_not_found());
    assert_eq!(server.hit_count("/gone"), 1);
}

#[test]
fn cache_fetches_once() {
    let server = TestServer::start([("/big.bin", Route::ok(vec![7u8; 4096]))]);
    let dir = tempfile::tempdir().unwrap();
    let fs = CacheFs::new(http(&server), CacheConfig::with_dir(dir.path())).unwrap();

    for _ in 0..3 {
        assert_eq!(fs.read_file("big.bin").unwrap(), vec![7u8; 4096]);
    }
    assert_eq!(server.hit_count("/big.bin"), 1);
}

#[test]
fn gzip_over_http() {
    let server = TestServer::start([("/feed.json.gz", Route::ok(gz(b"[1,2,3]")))]);
    let fs = http(&server).layer(GzipLayer::default());
    assert_eq!(fs.read_to_string("feed.json.gz").unwrap(), "[1,2,3]");
}

#[test]
fn full_stack_through_mux() {
    let server = TestServer::start([("/data/prices.json.gz", Route::ok(gz(b"{\"eth\":1}")))]);
    let mux = default_mux(Context::background(), Client::new());
    let uri = format!(
        "{}?checksum={}",
        server.url("/data/prices.json.gz"),
        sha256(b"{\"eth\":1}")
    );

    let (fs, path) = mux.resolve(&uri).unwrap();
    assert!(path.starts_with("data/prices.json.gz?checksum="));

    let fs = ChecksumFs::new(GzipFs::new(fs, GzipConfig::default()), ChecksumConfig::default());
    assert_eq!(fs.read_file(&path).unwrap(), b"{\"eth\":1}");
}

// =============================================================================
// IPFS gateways
// =============================================================================

fn gateway(server: &TestServer) -> GatewayConfig {
    GatewayConfig {
        scheme: "http".into(),
        host: server.host(),
        style: GatewayStyle::Path,
    }
}

#[test]
fn ipfs_path_style_gateway() {
    let server = TestServer::start([("/ipfs/bafycid/meta/file.json", Route::ok("content"))]);
    let config = IpfsConfig {
        gateways: vec![gateway(&server)],
        ..IpfsConfig::default()
    };
    let proto = IpfsProto::new(Context::background(), Client::new(), config);

    let uri = format!("ipfs://bafycid/meta/file.json?checksum={}", sha256(b"content"));
    let (fs, path) = parse_uri(&proto, &uri).unwrap();
    assert_eq!(fs.read_file(&path).unwrap(), b"content");
    assert_eq!(server.hits(), ["/ipfs/bafycid/meta/file.json"]);
}

#[test]
fn ipfs_skips_tampering_gateway() {
    let honest = TestServer::start([("/ipfs/cid/x", Route::ok("honest"))]);
    let tampering = TestServer::start([("/ipfs/cid/x", Route::ok("tampered"))]);
    let config = IpfsConfig {
        gateways: vec![gateway(&tampering), gateway(&honest)],
        seed: Some(1),
        ..IpfsConfig::default()
    };
    let fs = IpfsFs::new(Context::background(), Client::new(), &config).unwrap();
    let name = format!("cid/x?checksum={}", sha256(b"honest"));

    for _ in 0..8 {
        assert_eq!(fs.read_file(&name).unwrap(), b"honest");
    }
    assert_eq!(honest.hit_count("/ipfs/cid/x"), 8);
}

#[test]
fn ipfs_all_gateways_failing_lists_each() {
    let a = TestServer::start([("/ipfs/cid/x", Route::ok("wrong"))]);
    let b = TestServer::empty();
    let config = IpfsConfig {
        gateways: vec![gateway(&a), gateway(&b)],
        ..IpfsConfig::default()
    };
    let fs = IpfsFs::new(Context::background(), Client::new(), &config).unwrap();

    let err = fs
        .read_file(&format!("cid/x?checksum={}", sha256(b"right")))
        .unwrap_err();
    assert!(err.is_kind(ErrorKind::Integrity));
    assert!(err.is_not_found());
    assert!(!err.is_retryable());
}
