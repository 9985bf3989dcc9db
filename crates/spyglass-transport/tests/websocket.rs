//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use spyglass_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    /// Binds on port 0 and returns the transport with its real address.
    async fn bind_any() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind_any().await;

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);

        // Server sends JSON, client sees a text frame.
        server_conn
            .send(br#"{"hello":"client"}"#)
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "utf-8 payloads should be text frames");
        assert_eq!(msg.into_data().as_ref(), br#"{"hello":"client"}"#);

        // Client sends text, server receives bytes.
        client_ws
            .send(Message::text(r#"{"hello":"server"}"#))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, br#"{"hello":"server"}"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        // A pending recv must not hold up outbound traffic.
        let (mut transport, addr) = bind_any().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });
        let mut client_ws = connect_client(&addr).await;
        let server_conn = std::sync::Arc::new(server_handle.await.unwrap());

        let reader = std::sync::Arc::clone(&server_conn);
        let pending_recv = tokio::spawn(async move { reader.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), server_conn.send(b"ping"))
            .await
            .expect("send should not block behind recv")
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"ping");

        client_ws.send(Message::Close(None)).await.unwrap();
        let result = pending_recv.await.unwrap().expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind_any().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_connection_ids_are_unique() {
        let (mut transport, addr) = bind_any().await;
        let server_handle = tokio::spawn(async move {
            let a = transport.accept().await.expect("accept a");
            let b = transport.accept().await.expect("accept b");
            (a.id(), b.id())
        });

        let _c1 = connect_client(&addr).await;
        let _c2 = connect_client(&addr).await;
        let (a, b) = server_handle.await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_websocket_shutdown_succeeds() {
        let (transport, _addr) = bind_any().await;
        transport.shutdown().await.expect("shutdown should succeed");
    }
}
