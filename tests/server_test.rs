//! Full end-to-end scenarios over a real bound TCP socket (spec §8,
//! scenarios 5 and the wrong-secret handshake case), driven through the
//! public `Server` + `Client` surface only.

use luxdb::config::CodecConfig;
use luxdb::crypto::{derive_key, Token};
use luxdb::server::{Server, ServerState};
use luxdb::store::Store;
use luxdb::Client;

async fn spawn_server(secret: &str) -> (String, u16, tempfile::TempDir) {
    let (store, guard) = Store::temporary().unwrap();
    let codec = CodecConfig::defaults();
    let key = derive_key(secret, &codec.salt, 10);
    let token = Token::new(key, codec.ttl_secs);
    let server = Server::new("127.0.0.1", None, store, token);
    assert_eq!(server.state(), ServerState::Listening);
    let (listener, addr) = server.bind().await.unwrap();
    tokio::spawn(async move { server.serve(listener).await });
    (addr.ip().to_string(), addr.port(), guard)
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_5_wrong_secret_is_refused_end_to_end() {
    let (host, port, _guard) = spawn_server("correct-horse").await;
    let err = Client::connect(&host, port, "wrong-password", b"test-salt", 10, 60).await.unwrap_err();
    assert!(matches!(err, luxdb::client::ClientError::HandshakeFailed));
}

#[tokio::test(flavor = "multi_thread")]
async fn two_clients_share_one_server_and_see_each_others_writes() {
    let (host, port, _guard) = spawn_server("s3cr3t").await;

    let mut writer = Client::connect(&host, port, "s3cr3t", b"test-salt", 10, 60).await.unwrap();
    writer.create_index("shared", "l2", 4).await.unwrap();
    writer.init_index("shared", 100, 140, 12).await.unwrap();
    writer.add_items("shared", vec![vec![1.0, 2.0, 3.0, 4.0]], vec![42]).await.unwrap();

    let mut reader = Client::connect(&host, port, "s3cr3t", b"test-salt", 10, 60).await.unwrap();
    assert!(reader.index_exists("shared").await.unwrap());
    assert_eq!(reader.count("shared").await.unwrap(), 1);
    let ids = reader.get_ids("shared").await.unwrap();
    assert_eq!(ids, vec![42]);

    writer.quit().await.unwrap();
    reader.quit().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_index_through_one_client_is_visible_to_another() {
    let (host, port, _guard) = spawn_server("s3cr3t").await;

    let mut a = Client::connect(&host, port, "s3cr3t", b"test-salt", 10, 60).await.unwrap();
    a.create_index("temp", "ip", 4).await.unwrap();

    let mut b = Client::connect(&host, port, "s3cr3t", b"test-salt", 10, 60).await.unwrap();
    assert!(b.index_exists("temp").await.unwrap());

    a.delete_index("temp").await.unwrap();
    assert!(!b.index_exists("temp").await.unwrap());

    a.quit().await.unwrap();
    b.quit().await.unwrap();
}
