/// Wire-level protocol types: message shapes and id generation
mod message;
mod msgid;

pub use message::Message;
pub use msgid::MsgIdGenerator;
