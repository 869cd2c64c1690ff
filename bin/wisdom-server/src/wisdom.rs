//! Bhagavad Gita quotations: the static table used for canned replies and the
//! extraction of quotes from oracle answers.

use std::sync::LazyLock;

use regex::Regex;

use crate::language::Language;
use crate::tracker;

const ENGLISH_QUOTES: &[&str] = &[
    "\"Whenever there is a decline in righteousness and an increase in unrighteousness, I manifest myself.\" - Bhagavad Gita 4.7",
    "\"You have a right to perform your prescribed duties, but you are not entitled to the fruits of your actions.\" - Bhagavad Gita 2.47",
    "\"For one who has conquered the mind, the mind is the best of friends.\" - Bhagavad Gita 6.6",
];

const HINDI_QUOTES: &[&str] = &[
    "\"जब भी धर्म की हानि और अधर्म की वृद्धि होती है, तब मैं स्वयं प्रकट होता हूँ।\" - श्रीमद्भगवद्गीता 4.7",
    "\"कर्म करने में ही तुम्हारा अधिकार है, उसके फलों में कभी नहीं।\" - श्रीमद्भगवद्गीता 2.47",
    "\"जिसने मन को जीत लिया है, उसके लिए मन सबसे अच्छा मित्र है।\" - श्रीमद्भगवद्गीता 6.6",
];

const SPANISH_QUOTES: &[&str] = &[
    "\"Cuando hay un declive en la rectitud y un aumento en la injusticia, yo me manifiesto.\" - Bhagavad Gita 4.7",
    "\"Tienes derecho a realizar tus deberes, pero no a los frutos de tus acciones.\" - Bhagavad Gita 2.47",
    "\"Para quien ha conquistado la mente, la mente es el mejor de los amigos.\" - Bhagavad Gita 6.6",
];

fn quotes(language: Language) -> &'static [&'static str] {
    match language {
        Language::English => ENGLISH_QUOTES,
        Language::Hindi => HINDI_QUOTES,
        Language::Spanish => SPANISH_QUOTES,
    }
}

/// Quote for the `count`-th question; rotates through the table.
pub fn rotating_quote(language: Language, count: u8) -> &'static str {
    let table = quotes(language);
    table[usize::from(count.saturating_sub(1)) % table.len()]
}

/// Canned reply used whenever the oracle cannot answer.
pub fn fallback_reply(language: Language, count: u8) -> String {
    let apology = match language {
        Language::English => {
            "I apologize, but I'm having trouble connecting with Krishna's divine wisdom at the moment. Please try again later."
        }
        Language::Hindi => {
            "मैं क्षमा चाहता हूं, लेकिन मुझे अभी कृष्ण के दिव्य ज्ञान से जुड़ने में समस्या हो रही है। कृपया बाद में पुनः प्रयास करें।"
        }
        Language::Spanish => {
            "Lo siento, pero estoy teniendo problemas para conectarme con la sabiduría divina de Krishna en este momento. Por favor, inténtalo de nuevo más tarde."
        }
    };
    format!(
        "{apology}\n\n{}\n\n{}",
        rotating_quote(language, count),
        tracker::notice(language, count)
    )
}

static QUOTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["“]([^"“”]+)["”][^"“”]*?(?:Bhagavad[\s-]?Gita|भगवद्\s?गीता|भगवद्गीता)"#)
        .expect("valid quote pattern")
});

/// The first quoted passage attributed to the Gita, if any.
pub fn extract_quote(reply: &str) -> Option<String> {
    QUOTE_PATTERN
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_owned())
        .filter(|q| !q.is_empty())
}
