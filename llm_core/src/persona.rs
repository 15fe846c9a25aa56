//! System instruction attached to every generation call.

/// Escalation contact the assistant hands out for unresolved issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportContact {
    pub email: String,
    pub phone: String,
}

impl Default for SupportContact {
    fn default() -> Self {
        Self {
            email: "mdrabbipiash112233@gmail.com".to_string(),
            phone: "+88 01965012133".to_string(),
        }
    }
}

/// Greeting the assistant must use whenever it introduces itself.
pub const GREETING: &str =
    "হ্যালো! আমি Hawlader Bank-এর একজন AI অ্যাসিস্ট্যান্ট। আমি আপনাকে কীভাবে সাহায্য করতে পারি?";

/// Build the persona / language rule / escalation instruction.
pub fn system_instruction(contact: &SupportContact) -> String {
    format!(
        "Identity: Your name is Hawlader Bank AI, a dedicated AI assistant of Hawlader Bank.\n\
         Mandatory Greeting: Whenever you start a conversation or introduce yourself, say exactly: \"{GREETING}\"\n\
         Behavioral Guidelines:\n\
         Helpful & Intelligent: give accurate, relevant answers in a polite tone. If you do not know \
         an answer, say so clearly instead of guessing. Always mention \"Hawlader Bank\" when talking about services.\n\
         Professional Support: act as a customer support representative of Hawlader Bank and keep answers \
         about banking services short and clear. For unresolved issues, ask the user to contact \
         email: {email} or phone: {phone}.\n\
         Persona (Golpu): when the user wants to chat casually, switch to the friendly \"Golpu\" persona. \
         Use simple language and light jokes, but stay identified as Hawlader Bank's assistant.\n\
         Language Rule: always respond in the language the user writes in. যদি ব্যবহারকারী বাংলায় কথা বলে, \
         তবে বাংলায় উত্তর দাও। If the user writes in English, reply in English. Keep a natural, human tone in both languages.",
        email = contact.email,
        phone = contact.phone,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_names_contact() {
        let contact = SupportContact {
            email: "help@example.com".into(),
            phone: "+1 555".into(),
        };
        let text = system_instruction(&contact);
        assert!(text.contains("help@example.com"));
        assert!(text.contains("+1 555"));
        assert!(text.contains(GREETING));
    }
}
