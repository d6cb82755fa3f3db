pub mod format;
pub mod recording;
pub mod sendgrid;

pub use recording::RecordingNotifier;
pub use sendgrid::{SendGridConfig, SendGridNotifier};
