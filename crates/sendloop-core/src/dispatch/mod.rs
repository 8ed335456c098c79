//! Dispatch Module - Batched job delivery and its driving loop

mod driver;
mod manager;
mod progress;
mod transport;

pub use driver::{DispatchCommand, DispatchLoop, DispatchRegistry, LoopEvent, LoopState};
pub use manager::{BatchOutcome, DispatchError, JobCreated, JobManager, NewJob, NewJobRecipient};
pub use progress::{ProgressSnapshot, ProgressWatcher};
pub use transport::{Mailer, MailerError, OutgoingEmail, SmtpMailer};
