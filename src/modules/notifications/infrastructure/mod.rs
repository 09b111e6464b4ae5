pub mod resend;
pub mod webhook;

pub use resend::ResendEmailNotifier;
pub use webhook::WebhookNotifier;
