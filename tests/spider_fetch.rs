//! Integration tests for the spider: one fetch against a mock server,
//! delivered through the result channel.

use sha2::{Digest, Sha256};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pull::feed::{FetchError, Spider};

fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(format!(
        "{}/tests/fixtures/{}",
        env!("CARGO_MANIFEST_DIR"),
        name
    ))
    .unwrap()
}

async fn serve(route: &str, body: Vec<u8>) -> (MockServer, Url) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(1)
        .mount(&server)
        .await;
    let url = Url::parse(&format!("{}{}", server.uri(), route)).unwrap();
    (server, url)
}

#[tokio::test]
async fn test_run_delivers_parsed_rss() {
    let body = fixture("rss2.xml");
    let (_server, url) = serve("/rss", body.clone()).await;

    let result = Spider::new(url, 5).run().await.unwrap();
    assert!(result.is_success(), "unexpected error: {:?}", result.error);
    assert_eq!(result.status, Some(200));

    let feed = result.feed.unwrap();
    assert_eq!(feed.title, "Liftoff News");
    assert_eq!(feed.items.len(), 3);

    let expected = format!("{:x}", Sha256::digest(&body));
    assert_eq!(result.checksum.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn test_run_delivers_normalized_atom() {
    let (_server, url) = serve("/atom", fixture("atom1.xml")).await;

    let result = Spider::new(url, 5).run().await.unwrap();
    let feed = result.feed.unwrap();
    assert_eq!(feed.version, "");
    assert_eq!(feed.items[1].description, "Just the summary");
}

#[tokio::test]
async fn test_gbk_body_is_transcoded() {
    let xml = r#"<?xml version="1.0" encoding="GBK"?><rss version="2.0"><channel><title>科技</title></channel></rss>"#;
    let (bytes, _, _) = encoding_rs::GBK.encode(xml);
    let (_server, url) = serve("/gbk", bytes.into_owned()).await;

    let result = Spider::new(url, 5).fetch().await;
    assert_eq!(result.feed.unwrap().title, "科技");
}

#[tokio::test]
async fn test_concurrent_spiders_are_independent() {
    let (_rss_server, rss_url) = serve("/rss", fixture("rss2.xml")).await;
    let (_bad_server, bad_url) = serve("/bad", b"<html>nope</html>".to_vec()).await;

    let good = Spider::new(rss_url, 5).run();
    let bad = Spider::new(bad_url, 5).run();
    let (good, bad) = (good.await.unwrap(), bad.await.unwrap());

    assert!(good.is_success());
    assert!(matches!(bad.error, Some(FetchError::Feed(_))));
    assert_ne!(good.checksum, bad.checksum);
}
