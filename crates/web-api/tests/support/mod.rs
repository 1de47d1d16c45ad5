#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use config::AppConfig;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::{net::TcpListener, net::TcpStream, task::JoinHandle};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 内存存储上的完整服务，析构时停止广播中心与 HTTP 服务
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    hub_shutdown: CancellationToken,
    hub_task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(AppConfig::default()).await
    }

    pub async fn start_with(config: AppConfig) -> Self {
        let (state, hub) = AppState::in_memory(&config);
        let shutdown = CancellationToken::new();
        let hub_shutdown = shutdown.child_token();
        let hub_task = tokio::spawn(hub.run(hub_shutdown.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, router(state))
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .ok();
        });

        Self {
            addr,
            shutdown,
            hub_shutdown,
            hub_task,
        }
    }

    /// 只停止广播中心，HTTP 服务继续运行
    pub async fn stop_hub(&mut self) {
        self.hub_shutdown.cancel();
        (&mut self.hub_task).await.expect("hub task");
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, room_id: &str, query: &str) -> WsClient {
        let url = format!("ws://{}/api/v1/rooms/{}/join?{}", self.addr, room_id, query);
        let (ws, _) = connect_async(url).await.expect("ws connect");
        ws
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.hub_task.abort();
    }
}

/// 读取下一条 JSON 事件，跳过心跳帧；连接关闭时返回 None
pub async fn next_event(ws: &mut WsClient) -> Option<Value> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")?;
        match frame.ok()? {
            TungsteniteMessage::Text(text) => {
                return Some(serde_json::from_str(text.as_str()).expect("json event"))
            }
            TungsteniteMessage::Close(_) => return None,
            _ => continue,
        }
    }
}

/// 读取事件直到出现指定类型
pub async fn expect_event(ws: &mut WsClient, kind: &str) -> Value {
    loop {
        let event = next_event(ws)
            .await
            .unwrap_or_else(|| panic!("connection closed before {kind}"));
        if event["type"] == kind {
            return event;
        }
    }
}

/// 在短时间内没有任何文本事件到达
pub async fn assert_quiet(ws: &mut WsClient) {
    let waited = tokio::time::timeout(Duration::from_millis(200), async {
        loop {
            match ws.next().await {
                Some(Ok(TungsteniteMessage::Text(text))) => return text.as_str().to_owned(),
                Some(Ok(_)) => continue,
                _ => std::future::pending::<()>().await,
            }
        }
    })
    .await;
    assert!(waited.is_err(), "unexpected event: {:?}", waited);
}

/// 等待会话在广播中心完成登记
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
