//! Rule-based classification and entity extraction
//!
//! Deterministic and offline-safe. Keyword groups are checked in a fixed
//! priority order because one message can hit several groups:
//! health/status check, then quote, then policy/coverage, then claims.

use crate::memory::{ConversationEntry, EntryRole};
use crate::models::{Intent, IntentAnalysis, ResolutionMethod};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

/// Confidence reported for a keyword hit
pub const RULE_CONFIDENCE: f32 = 0.8;
/// Confidence reported when nothing matched; below [`ACTION_CONFIDENCE_THRESHOLD`]
pub const FALLTHROUGH_CONFIDENCE: f32 = 0.3;
/// Analyses under this confidence never produce agent calls
pub const ACTION_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Static keyword lists, zero allocation
const HEALTH_CHECK_KEYWORDS: &[&str] = &[
    "health", "check", "status", "overview", "account summary", "how am i doing",
];

const QUOTE_KEYWORDS: &[&str] = &["quote", "price for", "how much would"];

const POLICY_KEYWORDS: &[&str] = &[
    "policy", "policies", "coverage", "covered", "deductible", "premium",
];

const CLAIM_FILING_KEYWORDS: &[&str] = &[
    "file a claim", "new claim", "report", "accident", "damage", "stolen", "theft",
];

const CLAIM_KEYWORDS: &[&str] = &["claim"];

/// (pattern, normalized value); first hit wins
const COVERAGE_TYPES: &[(&str, &str)] = &[
    ("auto", "auto"),
    ("car", "auto"),
    ("vehicle", "auto"),
    ("homeowners", "home"),
    ("home", "home"),
    ("house", "home"),
    ("renters", "renters"),
    ("life", "life"),
    ("travel", "travel"),
];

const INCIDENT_TYPES: &[(&str, &str)] = &[
    ("collision", "collision"),
    ("accident", "collision"),
    ("crash", "collision"),
    ("theft", "theft"),
    ("stolen", "theft"),
    ("fire", "fire"),
    ("water", "water_damage"),
    ("flood", "water_damage"),
    ("leak", "water_damage"),
];

lazy_static! {
    /// Customer identifier patterns, tried in order
    static ref CUSTOMER_PREFIXED: Regex = Regex::new(r"(?i)customer[\s_-]+([A-Za-z0-9_-]+)").unwrap();
    static ref CUST_CODE: Regex = Regex::new(r"(?i)\bCUST-\d+").unwrap();
    static ref USER_CODE: Regex = Regex::new(r"\buser_\d+").unwrap();

    static ref POLICY_ID: Regex = Regex::new(r"(?i)\bPOL-\d+").unwrap();
    static ref CLAIM_ID: Regex = Regex::new(r"(?i)\bCLM-\d+").unwrap();
}

/// Classify a message with the fixed keyword priority
pub fn classify(text: &str) -> IntentAnalysis {
    let lowered = text.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    let intent = if has_any(HEALTH_CHECK_KEYWORDS) {
        Some(Intent::HealthCheck)
    } else if has_any(QUOTE_KEYWORDS) {
        Some(Intent::QuoteRequest)
    } else if has_any(POLICY_KEYWORDS) {
        Some(Intent::PolicyInquiry)
    } else if has_any(CLAIM_FILING_KEYWORDS) {
        Some(Intent::ClaimFiling)
    } else if has_any(CLAIM_KEYWORDS) {
        Some(Intent::ClaimStatus)
    } else {
        None
    };

    let (intent, confidence) = match intent {
        Some(intent) => (intent, RULE_CONFIDENCE),
        None => (Intent::GeneralInquiry, FALLTHROUGH_CONFIDENCE),
    };

    IntentAnalysis {
        intent,
        confidence,
        entities: extract_entities(text),
        method: ResolutionMethod::Rule,
    }
}

/// Classify a message that may be answering a follow-up question.
///
/// A reply that matches no keyword but carries an entity ("auto",
/// "CUST-001") inherits the intent of the user message the assistant
/// questioned. Entities from the newer message win.
pub fn classify_with_history(text: &str, recent_history: &[ConversationEntry]) -> IntentAnalysis {
    let analysis = classify(text);
    if analysis.intent != Intent::GeneralInquiry || analysis.entities.is_empty() {
        return analysis;
    }

    let mut carried = analysis.entities.clone();
    for pair in recent_history.rchunks_exact(2) {
        let (user, reply) = (&pair[0], &pair[1]);
        let asked = user.role == EntryRole::User
            && reply.role == EntryRole::Assistant
            && reply.content.trim_end().ends_with('?');
        if !asked {
            break;
        }

        let earlier = classify(&user.content);
        for (key, value) in earlier.entities {
            carried.entry(key).or_insert(value);
        }

        if earlier.intent != Intent::GeneralInquiry {
            return IntentAnalysis {
                intent: earlier.intent,
                confidence: RULE_CONFIDENCE,
                entities: carried,
                method: ResolutionMethod::Rule,
            };
        }
    }

    analysis
}

/// Everything the rules can pull out of a message
pub fn extract_entities(text: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    let lowered = text.to_lowercase();

    if let Some(customer_id) = extract_customer_id(text) {
        entities.insert("customer_id".to_string(), customer_id);
    }
    if let Some(m) = POLICY_ID.find(text) {
        entities.insert("policy_id".to_string(), m.as_str().to_uppercase());
    }
    if let Some(m) = CLAIM_ID.find(text) {
        entities.insert("claim_id".to_string(), m.as_str().to_uppercase());
    }
    if let Some(coverage) = first_keyword(&lowered, COVERAGE_TYPES) {
        entities.insert("coverage_type".to_string(), coverage.to_string());
    }
    if let Some(incident) = first_keyword(&lowered, INCIDENT_TYPES) {
        entities.insert("incident_type".to_string(), incident.to_string());
    }

    entities
}

/// Full identifier token, never a truncated prefix.
///
/// A word after "customer" only counts when it carries a digit, so
/// "customer ID is CUST-001" and "customer service" fall through to the
/// code patterns.
pub fn extract_customer_id(text: &str) -> Option<String> {
    let prefixed = CUSTOMER_PREFIXED
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|token| token.chars().any(|c| c.is_ascii_digit()));

    if let Some(id) = prefixed {
        return Some(id.to_string());
    }

    CUST_CODE
        .find(text)
        .or_else(|| USER_CODE.find(text))
        .map(|m| m.as_str().to_string())
}

/// Whole-word keyword lookup so "care" never reads as "car"
fn first_keyword(lowered: &str, table: &[(&str, &'static str)]) -> Option<&'static str> {
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    table
        .iter()
        .find(|(keyword, _)| words.contains(keyword))
        .map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_id_full_token_is_returned() {
        let cases = vec![
            ("Tell me about my policies please for customer CUST-001", "CUST-001"),
            ("customer_ABC-42 wants a quote", "ABC-42"),
            ("Customer   user_77 here", "user_77"),
            ("my id is CUST-1234", "CUST-1234"),
            ("my id is cust-9", "cust-9"),
            ("logged in as user_5150", "user_5150"),
        ];

        for (text, expected) in cases {
            assert_eq!(
                extract_customer_id(text).as_deref(),
                Some(expected),
                "input: {}",
                text
            );
        }
    }

    #[test]
    fn test_cust_code_is_never_truncated() {
        let id = extract_customer_id("please check for customer CUST-001").unwrap();
        assert_eq!(id, "CUST-001");
        assert_ne!(id, "user_CUST");
        assert_ne!(id, "CUST");
    }

    #[test]
    fn test_no_customer_id() {
        assert!(extract_customer_id("I want a quote").is_none());
        assert!(extract_customer_id("customer number please").is_none());
    }

    #[test]
    fn test_word_after_customer_is_not_an_id() {
        let cases = vec![
            ("My customer ID is CUST-001, show my policies", "CUST-001"),
            ("Is customer service open? Anyway, I'm CUST-002", "CUST-002"),
            ("customer support said my id is user_12", "user_12"),
            ("customer number: customer 4471", "4471"),
        ];

        for (text, expected) in cases {
            assert_eq!(
                extract_customer_id(text).as_deref(),
                Some(expected),
                "input: {}",
                text
            );
        }

        let analysis = classify("My customer ID is CUST-001, show my policies");
        assert_eq!(analysis.intent, Intent::PolicyInquiry);
        assert_eq!(analysis.entities["customer_id"], "CUST-001");
    }

    #[test]
    fn test_keyword_priority() {
        let cases = vec![
            ("check my coverage", Intent::HealthCheck),
            ("What's my account status?", Intent::HealthCheck),
            ("I want a quote", Intent::QuoteRequest),
            ("quote for auto coverage", Intent::QuoteRequest),
            ("Tell me about my policies", Intent::PolicyInquiry),
            ("what's my deductible", Intent::PolicyInquiry),
            ("I had an accident and need to file a claim", Intent::ClaimFiling),
            ("where is my claim CLM-88", Intent::ClaimStatus),
            ("hello there", Intent::GeneralInquiry),
        ];

        for (text, expected) in cases {
            assert_eq!(classify(text).intent, expected, "input: {}", text);
        }
    }

    #[test]
    fn test_rule_confidence_constants() {
        let hit = classify("show my policies");
        assert_eq!(hit.confidence, RULE_CONFIDENCE);
        assert_eq!(hit.method, ResolutionMethod::Rule);

        let miss = classify("good morning");
        assert_eq!(miss.intent, Intent::GeneralInquiry);
        assert!(miss.confidence < ACTION_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_entity_extraction() {
        let entities = extract_entities(
            "Car accident yesterday on pol-2001, customer CUST-7, claim clm-12",
        );
        assert_eq!(entities["customer_id"], "CUST-7");
        assert_eq!(entities["policy_id"], "POL-2001");
        assert_eq!(entities["claim_id"], "CLM-12");
        assert_eq!(entities["coverage_type"], "auto");
        assert_eq!(entities["incident_type"], "collision");
    }

    #[test]
    fn test_keywords_match_whole_words() {
        let entities = extract_entities("I care about my scarf");
        assert!(!entities.contains_key("coverage_type"));
    }

    fn history(turns: &[(&str, &str)]) -> Vec<ConversationEntry> {
        turns
            .iter()
            .flat_map(|(user, reply)| {
                let turn = crate::memory::Turn::completed(*user, *reply);
                turn.entries().into_iter().cloned().collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_answer_to_follow_up_inherits_intent() {
        let recent = history(&[("I want a quote", "What type of coverage would you like a quote for?")]);

        let analysis = classify_with_history("auto", &recent);
        assert_eq!(analysis.intent, Intent::QuoteRequest);
        assert_eq!(analysis.confidence, RULE_CONFIDENCE);
        assert_eq!(analysis.entities["coverage_type"], "auto");
    }

    #[test]
    fn test_chained_answers_accumulate_entities() {
        let recent = history(&[
            (
                "I need to file a claim",
                "I need a few more details before I can help:\n- Could you share your customer ID (for example CUST-001)?\n- What happened? Was it a collision, theft, fire or water damage?",
            ),
            ("CUST-009", "What happened? Was it a collision, theft, fire or water damage?"),
        ]);

        let analysis = classify_with_history("a fire", &recent);
        assert_eq!(analysis.intent, Intent::ClaimFiling);
        assert_eq!(analysis.entities["customer_id"], "CUST-009");
        assert_eq!(analysis.entities["incident_type"], "fire");
    }

    #[test]
    fn test_no_inheritance_without_a_pending_question() {
        let answered = history(&[("I want a quote for home", "Your home quote is $40.00 per month.")]);
        assert_eq!(classify_with_history("auto", &answered).intent, Intent::GeneralInquiry);

        let asked = history(&[("I want a quote", "What type of coverage would you like a quote for?")]);
        let chit_chat = classify_with_history("thanks", &asked);
        assert_eq!(chit_chat.intent, Intent::GeneralInquiry);
        assert_eq!(chit_chat.confidence, FALLTHROUGH_CONFIDENCE);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let text = "Tell me about my policies please for customer CUST-001";
        let first = classify(text);
        for _ in 0..5 {
            let again = classify(text);
            assert_eq!(again.intent, first.intent);
            assert_eq!(again.entities, first.entities);
        }
    }
}
