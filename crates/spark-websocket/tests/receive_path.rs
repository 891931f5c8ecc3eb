//! 接收路径：类型互译、字节数省略与错误透传。

mod support;

use std::time::Duration;

use spark_websocket::{
    Cancellation, ErrorCategory, MessageType, RawReceiveResult, ReceiveResult, SocketOperation,
    SocketState, WebSocketCapability, opcode,
};
use support::{Call, INJECTED_FAILURE, RecordingSocket, adapter_for, injected_failure, socket_of};

#[tokio::test]
async fn data_frames_surface_the_raw_count() {
    let socket = RecordingSocket::new(SocketState::Open);
    socket.script_receive(Ok(RawReceiveResult::data(MessageType::Text, 5, true)));
    socket.script_receive(Ok(RawReceiveResult::data(MessageType::Binary, 128, false)));
    let adapter = adapter_for(socket);
    let cancel = Cancellation::new();
    let mut buf = [0u8; 256];

    let first = adapter.receive(&mut buf, &cancel).await.unwrap();
    assert_eq!(
        first,
        ReceiveResult::Text {
            end_of_message: true,
            count: 5
        }
    );
    assert_eq!(first.opcode(), opcode::TEXT);

    let second = adapter.receive(&mut buf, &cancel).await.unwrap();
    assert_eq!(second.opcode(), opcode::BINARY);
    assert_eq!(second.count(), Some(128));
    assert!(!second.end_of_message());
}

#[tokio::test]
async fn close_frames_never_surface_a_count() {
    let socket = RecordingSocket::new(SocketState::Open);
    let mut raw = RawReceiveResult::close(Some(1001), Some("going away".into()));
    raw.count = 17;
    socket.script_receive(Ok(raw));
    let adapter = adapter_for(socket);

    let result = adapter
        .receive(&mut [0u8; 32], &Cancellation::new())
        .await
        .unwrap();
    assert!(result.is_close());
    assert_eq!(result.opcode(), opcode::CLOSE);
    assert_eq!(result.count(), None);
    assert_eq!(result.close_status(), Some(1001));
    assert_eq!(result.close_description(), Some("going away"));
}

#[tokio::test]
async fn close_frames_without_status_keep_fields_absent() {
    let socket = RecordingSocket::new(SocketState::Open);
    socket.script_receive(Ok(RawReceiveResult::close(None, None)));
    let adapter = adapter_for(socket);

    let result = adapter
        .receive(&mut [0u8; 8], &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(
        result,
        ReceiveResult::Close {
            end_of_message: true,
            status: None,
            description: None,
        }
    );
}

#[tokio::test]
async fn receive_failures_propagate_unchanged() {
    let socket = RecordingSocket::new(SocketState::Open);
    socket.script_receive(Err(injected_failure(SocketOperation::Receive)));
    let adapter = adapter_for(socket);

    let err = adapter
        .receive(&mut [0u8; 8], &Cancellation::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), INJECTED_FAILURE);
    assert_eq!(err.to_string(), "websocket receive failed by test");
}

#[tokio::test(start_paused = true)]
async fn cancellation_releases_a_pending_receive() {
    let adapter = adapter_for(RecordingSocket::new(SocketState::Open));
    let cancel = Cancellation::new();
    let trigger = cancel.child();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = adapter.receive(&mut [0u8; 8], &cancel).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Cancelled);
    assert_eq!(socket_of(&adapter).calls(), vec![Call::Receive]);
    assert_eq!(socket_of(&adapter).abort_count(), 0);
}
