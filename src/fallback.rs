//! Canned responses used whenever the upstream model cannot be trusted.
//!
//! Output depends only on the inputs: no timestamps, no randomness.

/// Model id reported in metadata for every synthesized response.
pub const FALLBACK_MODEL: &str = "fallback";

const GREETING_WORDS: &[&str] = &["hi", "hello", "hey", "greetings", "howdy", "yo"];
const GREETING_PHRASES: &[&str] = &["good morning", "good afternoon", "good evening"];
const CODE_TERMS: &[&str] = &[
    "code", "function", "bug", "compile", "program", "script", "debug", "syntax", "rust",
    "python", "javascript", "typescript", "api",
];
const HELP_TERMS: &[&str] = &["help", "how do", "how to", "explain", "what is", "can you", "assist"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    Greeting,
    Code,
    Help,
    Other,
}

impl MessageCategory {
    pub fn classify(user_message: &str) -> Self {
        let text = user_message.to_lowercase();
        let is_greeting = text
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| GREETING_WORDS.contains(&word))
            || GREETING_PHRASES.iter().any(|p| text.contains(p));

        if is_greeting {
            MessageCategory::Greeting
        } else if CODE_TERMS.iter().any(|t| text.contains(t)) {
            MessageCategory::Code
        } else if HELP_TERMS.iter().any(|t| text.contains(t)) {
            MessageCategory::Help
        } else {
            MessageCategory::Other
        }
    }

    fn canned_reply(self) -> &'static str {
        match self {
            MessageCategory::Greeting => {
                "Hello! I can't reach my language model at the moment, but I'm still here. \
                 Send your message again in a little while and I'll give you a proper answer."
            }
            MessageCategory::Code => {
                "I'd like to help with your code, but the model service is unavailable right now. \
                 Please resend your question shortly so I can look at it properly."
            }
            MessageCategory::Help => {
                "I want to help, but the assistant service is temporarily unavailable. \
                 Please try again in a few moments."
            }
            MessageCategory::Other => {
                "I can't produce a full response right now because the assistant service is \
                 temporarily unavailable. Please try again shortly."
            }
        }
    }
}

/// Coarse cause of an upstream failure, derived from its error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NetworkConnectivity,
    ResponseTimeout,
    RateLimiting,
    ServiceAvailability,
}

impl ErrorCategory {
    pub fn classify(error: &str) -> Self {
        let text = error.to_lowercase();
        if text.contains("timeout") || text.contains("timed out") {
            ErrorCategory::ResponseTimeout
        } else if text.contains("rate limit") || text.contains("429") || text.contains("too many") {
            ErrorCategory::RateLimiting
        } else if ["network", "connect", "dns", "unreachable"].iter().any(|t| text.contains(t)) {
            ErrorCategory::NetworkConnectivity
        } else {
            ErrorCategory::ServiceAvailability
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ErrorCategory::NetworkConnectivity => "network connectivity",
            ErrorCategory::ResponseTimeout => "response timeout",
            ErrorCategory::RateLimiting => "rate limiting",
            ErrorCategory::ServiceAvailability => "service availability",
        }
    }
}

/// Builds the fallback answer for `user_message`, appending a short diagnostic
/// when the failure that caused it is known.
pub fn fallback(user_message: &str, error_context: Option<&str>) -> String {
    let mut reply = MessageCategory::classify(user_message).canned_reply().to_string();
    if let Some(error) = error_context {
        let category = ErrorCategory::classify(error);
        reply.push_str(&format!(" (Issue detected: {}.)", category.describe()));
    }
    reply
}
