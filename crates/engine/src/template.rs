//! Message placeholders and the default outreach template.
//!
//! Every `[Sender Name]` in a body is substituted, not just the first one, so
//! a draft that signs off twice names the sender twice. `[Recipient Name]`
//! passes through untouched.

/// Replaced with the sender identity when a job is built.
pub const SENDER_PLACEHOLDER: &str = "[Sender Name]";

/// Left untouched; the delivery queue personalizes it per recipient.
pub const RECIPIENT_PLACEHOLDER: &str = "[Recipient Name]";

pub const DEFAULT_SUBJECT: &str =
    "Partnership Opportunity with ReCircle - Sustainable Business Solutions";

pub const DEFAULT_BODY: &str = "Hello [Recipient Name],

I hope this email finds you well. I am writing to introduce you to ReCircle, an innovative company focused on sustainable business solutions and circular economy practices.

ReCircle specializes in:
• Sustainable waste management solutions
• Circular economy consulting
• Environmental impact reduction strategies
• Green technology implementation

We believe there could be excellent synergy between our organizations and would love to explore potential partnership opportunities.

Would you be available for a brief call next week to discuss how we might collaborate?

Best regards,
[Sender Name]
ReCircle Team";

/// Substitute every sender placeholder. Recipient placeholders are preserved.
pub fn apply_sender(body: &str, sender: &str) -> String {
    body.replace(SENDER_PLACEHOLDER, sender)
}
