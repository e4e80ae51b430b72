//! Pure dispatch logic: recipient resolution, job construction, session
//! state, and the queue polling state machine. No I/O happens here.

pub mod job;
pub mod poller;
pub mod resolver;
pub mod session;
pub mod template;
