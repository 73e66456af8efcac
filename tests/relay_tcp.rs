//! End-to-end tests over real TCP sockets

use std::sync::Arc;
use std::time::Duration;

use relay_rs::client::LineInput;
use relay_rs::error::Error;
use relay_rs::{
    ClientConfig, MemoryLog, MessageLog, RegistryConfig, RelayClient, RelayServer, ScanOrder,
    ServerConfig,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct TestServer {
    server: Arc<RelayServer<MemoryLog>>,
    client: RelayClient,
    task: JoinHandle<relay_rs::Result<()>>,
}

impl TestServer {
    async fn start(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Arc::new(RelayServer::with_registry_config(
            config,
            MemoryLog::new(),
            registry_config,
        ));
        let task = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.serve(listener, std::future::pending()).await }
        });

        Self {
            server,
            client: RelayClient::new(ClientConfig::new(addr.to_string())),
            task,
        }
    }

    async fn default() -> Self {
        Self::start(ServerConfig::default(), RegistryConfig::default()).await
    }

    async fn wait_for_subscribers(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.server.registry().len() != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber count never reached");
    }

    async fn stop(self) {
        self.server.shutdown_token().cancel();
        tokio::time::timeout(Duration::from_secs(2), self.task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn test_submit_reports_count_in_order() {
    let t = TestServer::default().await;

    let count = t.client.submit("ann", ["w1", "w2", "w3"]).await.unwrap();
    assert_eq!(count, 3);

    let stored = t.server.log().scan(0, ScanOrder::OldestFirst).await.unwrap();
    let texts: Vec<_> = stored.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["w1", "w2", "w3"]);
    assert!(stored.iter().all(|m| m.author == "ann"));

    t.stop().await;
}

#[tokio::test]
async fn test_quit_line_ends_submission() {
    let t = TestServer::default().await;

    let mut input = LineInput::new(&b"hello\n\\q\nignored\n"[..]);
    let count = t.client.submit_stream("ann", &mut input).await.unwrap();
    assert_eq!(count, 1);

    let stored = t.server.log().scan(0, ScanOrder::OldestFirst).await.unwrap();
    let texts: Vec<_> = stored.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["hello"]);

    t.stop().await;
}

#[tokio::test]
async fn test_history_ordering() {
    let t = TestServer::default().await;
    t.client
        .submit("ann", ["m1", "m2", "m3", "m4", "m5"])
        .await
        .unwrap();

    let mut all = t.client.subscribe(0).await.unwrap();
    let mut texts = Vec::new();
    for _ in 0..5 {
        texts.push(all.next_message().await.unwrap().unwrap().text);
    }
    assert_eq!(texts, ["m1", "m2", "m3", "m4", "m5"]);

    let mut recent = t.client.subscribe(3).await.unwrap();
    let mut texts = Vec::new();
    for _ in 0..3 {
        texts.push(recent.next_message().await.unwrap().unwrap().text);
    }
    assert_eq!(texts, ["m5", "m4", "m3"]);

    t.stop().await;
}

#[tokio::test]
async fn test_live_fan_out_to_every_subscriber() {
    let t = TestServer::default().await;

    let mut first = t.client.subscribe(0).await.unwrap();
    let mut second = t.client.subscribe(0).await.unwrap();
    t.wait_for_subscribers(2).await;

    t.client.submit("bob", ["live"]).await.unwrap();

    for feed in [&mut first, &mut second] {
        let msg = tokio::time::timeout(Duration::from_secs(2), feed.next_message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg.text, "live");
        assert_eq!(msg.author, "bob");
        assert_eq!(msg.id, 1);
    }

    t.stop().await;
}

#[tokio::test]
async fn test_disconnect_unregisters() {
    let t = TestServer::default().await;

    let feed = t.client.subscribe(0).await.unwrap();
    let _other = t.client.subscribe(0).await.unwrap();
    t.wait_for_subscribers(2).await;

    feed.close().await.unwrap();
    t.wait_for_subscribers(1).await;

    // Writers are unaffected by the departed reader
    assert_eq!(t.client.submit("ann", ["after"]).await.unwrap(), 1);

    t.stop().await;
}

#[tokio::test]
async fn test_slow_subscriber_is_dropped() {
    let t = TestServer::start(
        ServerConfig::default(),
        RegistryConfig::default().channel_capacity(1),
    )
    .await;

    // Never read from this one
    let _stalled = t.client.subscribe(0).await.unwrap();
    t.wait_for_subscribers(1).await;

    // Enough traffic to fill the socket buffers and then the channel
    let payload = "x".repeat(60 * 1024);
    let texts: Vec<String> = (0..512).map(|_| payload.clone()).collect();
    let count = t.client.submit("ann", texts).await.unwrap();
    assert_eq!(count, 512);

    t.wait_for_subscribers(0).await;
    assert!(t.server.registry().stats().evictions >= 1);

    t.stop().await;
}

#[tokio::test]
async fn test_oversized_message_is_rejected() {
    let t = TestServer::start(
        ServerConfig::default().max_message_len(8),
        RegistryConfig::default(),
    )
    .await;

    let err = t
        .client
        .submit("ann", ["short", "definitely too long"])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote(ref reason) if reason.contains("exceeds limit")));

    // The message before the bad one was stored
    assert_eq!(t.server.log().len(), 1);

    t.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_live_feeds() {
    let t = TestServer::default().await;

    let mut feed = t.client.subscribe(0).await.unwrap();
    t.wait_for_subscribers(1).await;

    let TestServer { server, task, .. } = t;
    server.shutdown_token().cancel();

    let end = tokio::time::timeout(Duration::from_secs(2), feed.next_message())
        .await
        .unwrap()
        .unwrap();
    assert!(end.is_none());

    task.await.unwrap().unwrap();
    assert!(server.registry().is_empty());
}
