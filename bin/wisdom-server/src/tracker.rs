//! Question accounting for a session.
//!
//! Every accepted chat submission is one question. A submission that repeats
//! the previous attempt (same idempotency key, or same message digest inside
//! the dedupe window) is a retry and never counted twice. Callers must hold the
//! session lock across [`record_attempt`] and the rest of the turn.

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::language::Language;
use crate::session::{Attempt, ChatReply, ConversationState};

/// Questions allowed per session.
pub const MAX_QUESTIONS: u8 = 3;

/// Outcome of submitting a message to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// A new question; carries the count after incrementing.
    Counted(u8),
    /// Duplicate of a completed attempt; replay its reply.
    Replay(ChatReply),
    /// Duplicate of an attempt that never completed; answer again uncounted.
    Retry(u8),
    /// All questions used; carries the (capped) count.
    LimitReached(u8),
}

/// Key identifying a submission for deduplication.
///
/// An explicit idempotency key wins; otherwise the digest of the normalised
/// message text is used.
pub fn attempt_key(idempotency_key: Option<&str>, message: &str) -> String {
    if let Some(key) = idempotency_key.map(str::trim).filter(|k| !k.is_empty()) {
        return format!("key:{key}");
    }
    let normalised = message.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let digest = Sha256::digest(normalised.as_bytes());
    format!("sha:{}", URL_SAFE_NO_PAD.encode(digest))
}

/// Decide how a submission affects `state` and update the counter.
pub fn record_attempt(
    state: &mut ConversationState,
    key: String,
    now: Instant,
    dedupe_window: Duration,
) -> Decision {
    if let Some(last) = &state.last_attempt {
        let explicit = key.starts_with("key:");
        let fresh = now.saturating_duration_since(last.at) <= dedupe_window;
        if last.key == key && (explicit || fresh) {
            return match &last.reply {
                Some(reply) => Decision::Replay(reply.clone()),
                None => Decision::Retry(state.question_count),
            };
        }
    }

    if state.question_count >= MAX_QUESTIONS {
        state.question_count = MAX_QUESTIONS;
        return Decision::LimitReached(MAX_QUESTIONS);
    }

    state.question_count += 1;
    state.last_attempt = Some(Attempt { key, at: now, reply: None });
    Decision::Counted(state.question_count)
}

/// Remember the reply of the in-flight attempt so retries can replay it.
pub fn complete_attempt(state: &mut ConversationState, reply: &ChatReply) {
    if let Some(attempt) = state.last_attempt.as_mut() {
        attempt.reply = Some(reply.clone());
    }
}

pub fn remaining(count: u8) -> u8 {
    MAX_QUESTIONS.saturating_sub(count)
}

/// The sentence a reply must end with after `count` questions.
pub fn notice(language: Language, count: u8) -> String {
    let left = remaining(count);
    match (language, count) {
        (Language::English, 1) => format!("You have asked 1 question. You may ask {left} more questions."),
        (Language::English, c) if c < MAX_QUESTIONS => {
            format!("You have asked {c} questions. You may ask {left} more question.")
        }
        (Language::English, _) => format!(
            "You have now asked all {MAX_QUESTIONS} questions. May Krishna's blessings be with you always."
        ),
        (Language::Hindi, 1) => format!("आपने 1 प्रश्न पूछा है। आप अभी {left} और प्रश्न पूछ सकते हैं।"),
        (Language::Hindi, c) if c < MAX_QUESTIONS => {
            format!("आपने {c} प्रश्न पूछे हैं। आप अभी {left} और प्रश्न पूछ सकते हैं।")
        }
        (Language::Hindi, _) => format!(
            "आपने अपने सभी {MAX_QUESTIONS} प्रश्न पूछ लिए हैं। श्री कृष्ण का आशीर्वाद सदा आपके साथ रहे।"
        ),
        (Language::Spanish, 1) => format!("Has hecho 1 pregunta. Puedes hacer {left} preguntas más."),
        (Language::Spanish, c) if c < MAX_QUESTIONS => {
            format!("Has hecho {c} preguntas. Puedes hacer {left} pregunta más.")
        }
        (Language::Spanish, _) => format!(
            "Ya has hecho las {MAX_QUESTIONS} preguntas. Que las bendiciones de Krishna te acompañen siempre."
        ),
    }
}

/// Instruction appended to the system message for the current turn.
pub fn instruction(language: Language, count: u8) -> String {
    let mut text = format!(
        "This is question {count} of {MAX_QUESTIONS}. End your reply with exactly this sentence: \"{}\"",
        notice(language, count)
    );
    if count == 1 {
        text.push_str(" Mention the three-question limit only in this first reply.");
    }
    if count >= MAX_QUESTIONS {
        text.push_str(" Thank the user for their time and wish them well on their spiritual journey.");
    }
    text
}

/// Fixed reply once the limit has been reached; no oracle call is made.
pub fn limit_message(language: Language) -> &'static str {
    match language {
        Language::English => {
            "You have already asked all three questions for this session. May Krishna's blessings guide you until we meet again."
        }
        Language::Hindi => {
            "आप इस सत्र के सभी तीन प्रश्न पूछ चुके हैं। जब तक हम फिर मिलें, श्री कृष्ण का आशीर्वाद आपका मार्गदर्शन करे।"
        }
        Language::Spanish => {
            "Ya has hecho las tres preguntas de esta sesión. Que las bendiciones de Krishna te guíen hasta que nos volvamos a encontrar."
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(30);

    fn submit(state: &mut ConversationState, msg: &str, now: Instant) -> Decision {
        record_attempt(state, attempt_key(None, msg), now, WINDOW)
    }

    #[test]
    fn counts_up_to_three_then_stops() {
        let mut state = ConversationState::default();
        let now = Instant::now();
        assert_eq!(submit(&mut state, "one", now), Decision::Counted(1));
        assert_eq!(submit(&mut state, "two", now), Decision::Counted(2));
        assert_eq!(submit(&mut state, "three", now), Decision::Counted(3));
        assert_eq!(submit(&mut state, "four", now), Decision::LimitReached(3));
        assert_eq!(state.question_count, 3);
    }

    #[test]
    fn duplicate_in_flight_is_retry() {
        let mut state = ConversationState::default();
        let now = Instant::now();
        assert_eq!(submit(&mut state, "Will I pass?", now), Decision::Counted(1));
        assert_eq!(submit(&mut state, "  will i   PASS? ", now), Decision::Retry(1));
        assert_eq!(state.question_count, 1);
    }

    #[test]
    fn duplicate_after_completion_replays() {
        let mut state = ConversationState::default();
        let now = Instant::now();
        submit(&mut state, "q", now);
        let reply = ChatReply {
            message: "answer".into(),
            question_count: 1,
            conversation_id: None,
            message_id: None,
            language: Language::English,
            limit_reached: false,
            fallback: false,
        };
        complete_attempt(&mut state, &reply);
        assert_eq!(submit(&mut state, "q", now), Decision::Replay(reply));
    }

    #[test]
    fn same_text_outside_window_counts_again() {
        let mut state = ConversationState::default();
        let now = Instant::now();
        submit(&mut state, "q", now);
        let later = now + WINDOW + Duration::from_secs(1);
        assert_eq!(submit(&mut state, "q", later), Decision::Counted(2));
    }

    #[test]
    fn explicit_key_dedupes_regardless_of_age() {
        let mut state = ConversationState::default();
        let now = Instant::now();
        record_attempt(&mut state, attempt_key(Some("req-1"), "a"), now, WINDOW);
        let later = now + Duration::from_secs(3600);
        let decision = record_attempt(&mut state, attempt_key(Some("req-1"), "a"), later, WINDOW);
        assert_eq!(decision, Decision::Retry(1));
    }

    #[test]
    fn over_limit_state_is_clamped() {
        let mut state = ConversationState { question_count: 7, ..Default::default() };
        assert_eq!(submit(&mut state, "x", Instant::now()), Decision::LimitReached(3));
        assert_eq!(state.question_count, 3);
    }

    #[test]
    fn notices_differ_by_count() {
        let one = notice(Language::English, 1);
        let two = notice(Language::English, 2);
        let three = notice(Language::English, 3);
        assert_eq!(one, "You have asked 1 question. You may ask 2 more questions.");
        assert_eq!(two, "You have asked 2 questions. You may ask 1 more question.");
        assert!(three.contains("all 3 questions"));
        assert!(notice(Language::Spanish, 2).starts_with("Has hecho 2"));
    }

    #[test]
    fn instruction_embeds_notice() {
        let text = instruction(Language::Hindi, 3);
        assert!(text.contains(&notice(Language::Hindi, 3)));
        assert!(text.contains("Thank the user"));
    }

    #[test]
    fn limit_messages_are_localized() {
        assert!(limit_message(Language::Spanish).contains("tres preguntas"));
        assert_ne!(limit_message(Language::Hindi), limit_message(Language::English));
    }
}
