//! UseCase 層
//!
//! ルームへの参加・退出、プレゼンス通知、編集イベントの中継、チャットを実装するレイヤー。
//! UI 層から呼び出され、Domain 層のトレイトだけに依存します。

pub mod chat_service;
pub mod edit_relay;
pub mod error;
pub mod idle_watchdog;
pub mod join_room;
pub mod leave_room;
pub mod presence_broadcaster;

pub use chat_service::{ChatService, DEFAULT_HISTORY_LIMIT};
pub use edit_relay::EditEventRelay;
pub use error::{JoinError, SendMessageError};
pub use idle_watchdog::IdleWatchdog;
pub use join_room::{JoinRequest, JoinRoomUseCase};
pub use leave_room::LeaveRoomUseCase;
pub use presence_broadcaster::PresenceBroadcaster;
