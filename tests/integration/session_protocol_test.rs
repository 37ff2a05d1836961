// tests/integration/session_protocol_test.rs

//! End-to-end tests for the request/reply protocol, run against both dispatch strategies.

use super::test_helpers::{ALL_DISPATCH, TestServer};

#[tokio::test]
async fn test_greeting_on_connect() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut client = server.connect_raw().await;
        assert_eq!(client.read_reply().await.as_deref(), Some("100"), "{dispatch}");
        server.shutdown().await;
    }
}

#[tokio::test]
async fn test_post_and_bye_require_login() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut client = server.connect().await;
        assert_eq!(client.request("POST hello").await, "221", "{dispatch}");
        assert_eq!(client.request("BYE").await, "221", "{dispatch}");
        server.shutdown().await;
    }
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut client = server.connect().await;
        assert_eq!(client.request("USER alice").await, "110", "{dispatch}");
        assert_eq!(server.state.registry.is_in_session("alice"), Some(true));
        assert_eq!(client.request("POST hello world").await, "120", "{dispatch}");
        assert_eq!(client.request("BYE").await, "130", "{dispatch}");
        assert_eq!(server.state.registry.is_in_session("alice"), Some(false));

        // The connection stays open and unauthenticated after logout.
        assert_eq!(client.request("POST again").await, "221", "{dispatch}");
        assert_eq!(client.request("USER alice").await, "110", "{dispatch}");
        server.shutdown().await;
    }
}

#[tokio::test]
async fn test_unknown_and_banned_accounts() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut client = server.connect().await;
        assert_eq!(client.request("USER mallory").await, "212", "{dispatch}");
        assert_eq!(client.request("USER carol").await, "211", "{dispatch}");
        assert_eq!(server.state.registry.is_in_session("carol"), Some(false));
        // Failed logins leave the connection unauthenticated.
        assert_eq!(client.request("POST hi").await, "221", "{dispatch}");
        server.shutdown().await;
    }
}

#[tokio::test]
async fn test_unrecognized_requests() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut client = server.connect().await;
        assert_eq!(client.request("HELLO").await, "300", "{dispatch}");
        assert_eq!(client.request("user alice").await, "300", "{dispatch}");
        assert_eq!(client.request("USER").await, "300", "{dispatch}");
        assert_eq!(client.request("").await, "300", "{dispatch}");
        assert_eq!(client.request("USERX alice").await, "300", "{dispatch}");
        server.shutdown().await;
    }
}

#[tokio::test]
async fn test_pipelined_commands_reply_in_order() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut client = server.connect().await;
        client.send_raw(b"USER bob\r\nPOST hi\r\nBYE\r\n").await;
        assert_eq!(client.read_reply().await.as_deref(), Some("110"), "{dispatch}");
        assert_eq!(client.read_reply().await.as_deref(), Some("120"), "{dispatch}");
        assert_eq!(client.read_reply().await.as_deref(), Some("130"), "{dispatch}");
        server.shutdown().await;
    }
}

#[tokio::test]
async fn test_command_split_across_writes() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut client = server.connect().await;
        client.send_raw(b"US").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.send_raw(b"ER alice\r").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.send_raw(b"\nPOST x\r\n").await;
        assert_eq!(client.read_reply().await.as_deref(), Some("110"), "{dispatch}");
        assert_eq!(client.read_reply().await.as_deref(), Some("120"), "{dispatch}");
        server.shutdown().await;
    }
}

#[tokio::test]
async fn test_relogin_on_same_connection_is_rejected() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut client = server.connect().await;
        assert_eq!(client.request("USER alice").await, "110", "{dispatch}");
        assert_eq!(client.request("USER alice").await, "213", "{dispatch}");
        assert_eq!(client.request("USER bob").await, "213", "{dispatch}");
        assert_eq!(server.state.registry.is_in_session("bob"), Some(false));
        server.shutdown().await;
    }
}

#[tokio::test]
async fn test_account_held_by_another_connection() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut first = server.connect().await;
        let mut second = server.connect().await;
        assert_eq!(first.request("USER alice").await, "110", "{dispatch}");
        assert_eq!(second.request("USER alice").await, "214", "{dispatch}");
        assert_eq!(second.request("USER bob").await, "110", "{dispatch}");

        assert_eq!(first.request("BYE").await, "130", "{dispatch}");
        let mut third = server.connect().await;
        assert_eq!(third.request("USER alice").await, "110", "{dispatch}");
        server.shutdown().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_logins_admit_exactly_one() {
    for dispatch in ALL_DISPATCH {
        let server = TestServer::start(dispatch).await;
        let mut clients = Vec::new();
        for _ in 0..8 {
            clients.push(server.connect().await);
        }
        for client in clients.iter_mut() {
            client.send_raw(b"USER alice\r\n").await;
        }
        let mut replies = Vec::new();
        for client in clients.iter_mut() {
            replies.push(client.read_reply().await.expect("reply"));
        }
        assert_eq!(
            replies.iter().filter(|r| *r == "110").count(),
            1,
            "{dispatch}: {replies:?}"
        );
        assert_eq!(
            replies.iter().filter(|r| *r == "214").count(),
            7,
            "{dispatch}: {replies:?}"
        );
        server.shutdown().await;
    }
}
