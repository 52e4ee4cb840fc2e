pub mod chat;
pub mod responses;
pub mod updates;
pub mod user;

pub use chat::{
    ChatId, ChatKind, ChatSummary, EventIndex, MessageIndex, MessageSummary, ThreadRead, UserId,
};
pub use responses::{
    ArchiveChatResponse, BlockUserResponse, LeaveGroupResponse, MarkReadResponse,
    PinChatResponse, SetBioResponse, ToggleMuteNotificationResponse, UnblockUserResponse,
    UnpinChatResponse,
};
pub use updates::{
    AvatarIdUpdate, ChatStateSnapshot, GroupChatUpdatesSince, InitialStateResponse, Transaction,
    UpdatedChat, UpdatesResponse, UpdatesSince,
};
pub use user::{
    CheckUsernameResponse, CreatedUser, CurrentUserResponse, SetUsernameResponse, StorageStatus,
    UserLookup, UserSummary, UsersResponse,
};
