//! 房间淘汰后的消息清理
//!
//! 房间存储在空闲淘汰或容量淘汰时把房间ID发到淘汰通道，
//! 这里逐个删除对应房间保存的消息，通道关闭后退出。

use domain::MessageRepository;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub async fn purge_evicted_messages(
    mut evictions: mpsc::UnboundedReceiver<String>,
    messages: Arc<dyn MessageRepository>,
) {
    while let Some(room_id) = evictions.recv().await {
        match messages.delete_by_room_id(&room_id).await {
            Ok(()) => debug!(room_id = %room_id, "已清理淘汰房间的消息"),
            Err(err) => warn!(room_id = %room_id, error = %err, "清理淘汰房间的消息失败"),
        }
    }
    debug!("淘汰通道已关闭，停止清理");
}
