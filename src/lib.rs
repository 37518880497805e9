pub mod cli;
pub mod protocol;
pub mod store;
pub mod wire;

pub use cli::{Command, prompt};
pub use protocol::{
    AsyncPoll, CallError, Dispatcher, ErrorCode, FileClient, FileHandle, FileServer, FileService,
    OperationId, StreamTransport, Transport,
};
pub use store::MemoryFiles;
