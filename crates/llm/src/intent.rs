//! Pattern-based intent detection for visitor questions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// What a visitor is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    FlightStatus,
    Parking,
    Transportation,
    Security,
    Dining,
    Baggage,
    HumanAgent,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::FlightStatus => "flight_status",
            Self::Parking => "parking",
            Self::Transportation => "transportation",
            Self::Security => "security",
            Self::Dining => "dining",
            Self::Baggage => "baggage",
            Self::HumanAgent => "human_agent",
            Self::General => "general",
        }
    }

    /// Follow-up actions offered by the widget for this intent.
    pub fn suggested_actions(&self) -> Vec<String> {
        let actions: &[&str] = match self {
            Self::Greeting => &["Flight status", "Parking rates", "Dining options"],
            Self::FlightStatus => &["Check flight status", "View departures", "View arrivals"],
            Self::Parking => &["Parking rates", "Parking location"],
            Self::Transportation => &["Taxi stands", "Airport shuttle", "Car rental"],
            Self::Security => &["Prohibited items", "Security wait times"],
            Self::Dining => &["Restaurants before security", "Restaurants after security"],
            Self::Baggage => &["Baggage allowance", "Lost and found"],
            Self::HumanAgent => &["Contact information"],
            Self::General => &["Flight status", "Contact information"],
        };
        actions.iter().map(|a| a.to_string()).collect()
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const HUMAN_TERMS: &[&str] = &["human", "representative", "operator"];
const HUMAN_PHRASES: &[&str] = &["talk to", "speak to", "speak with", "real person", "live agent", "customer service"];
const FLIGHT_TERMS: &[&str] = &["flight", "flights", "delayed", "delay", "departure", "departures", "arrival", "arrivals", "boarding", "gate"];
const SECURITY_TERMS: &[&str] = &["security", "prohibited", "liquids", "liquid", "screening", "allowed", "xray", "checkpoint"];
const BAGGAGE_TERMS: &[&str] = &["baggage", "luggage", "bag", "bags", "suitcase", "lost", "carousel"];
const PARKING_TERMS: &[&str] = &["parking", "park", "parked", "valet"];
const TRANSPORT_TERMS: &[&str] = &["taxi", "bus", "shuttle", "grab", "transport", "transportation", "rental", "ride", "jeepney"];
const DINING_TERMS: &[&str] = &["food", "eat", "restaurant", "restaurants", "dining", "cafe", "coffee", "kfc", "jollibee", "breakfast", "lunch", "dinner", "snack"];
const GREETING_TERMS: &[&str] = &["hi", "hello", "hey", "greetings", "good", "kumusta", "howdy"];

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

fn any_term(words: &[String], terms: &[&str]) -> bool {
    words.iter().any(|w| terms.contains(&w.as_str()))
}

/// Explicit requests for a person, not mentions of staff ("check-in agent").
fn asks_for_human(words: &[String]) -> bool {
    if any_term(words, HUMAN_TERMS) {
        return true;
    }
    let padded = format!(" {} ", words.join(" "));
    HUMAN_PHRASES.iter().any(|p| padded.contains(&format!(" {p} ")))
}

fn spaced_flight_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b([A-Z]{2}|[A-Z][0-9]|[0-9][A-Z])[ -]?([0-9]{3,4})\b").expect("valid regex")
    })
}

fn compact_flight_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z]{2}|[a-z][0-9]|[0-9][a-z])([0-9]{2,4})\b").expect("valid regex")
    })
}

/// Extract a flight designator such as `PR 1845`, `5J560` or `cx-922`.
///
/// Upper-case carrier codes may be separated from a three or four digit
/// number; lower-case codes must be written together so phrases like
/// "is 25" and shouted ones like "IS 25" do not match.
pub fn extract_flight_number(query: &str) -> Option<String> {
    let captures = spaced_flight_pattern()
        .captures(query)
        .or_else(|| compact_flight_pattern().captures(query))?;
    Some(format!(
        "{}{}",
        captures[1].to_uppercase(),
        &captures[2]
    ))
}

/// Detect the intent of a visitor question.
pub fn detect_intent(query: &str) -> Intent {
    let words = words(query);

    if asks_for_human(&words) {
        return Intent::HumanAgent;
    }
    if extract_flight_number(query).is_some() || any_term(&words, FLIGHT_TERMS) {
        return Intent::FlightStatus;
    }
    if any_term(&words, SECURITY_TERMS) {
        return Intent::Security;
    }
    if any_term(&words, BAGGAGE_TERMS) {
        return Intent::Baggage;
    }
    if any_term(&words, PARKING_TERMS) {
        return Intent::Parking;
    }
    if any_term(&words, TRANSPORT_TERMS) {
        return Intent::Transportation;
    }
    if any_term(&words, DINING_TERMS) {
        return Intent::Dining;
    }
    if words
        .first()
        .is_some_and(|w| GREETING_TERMS.contains(&w.as_str()))
    {
        return Intent::Greeting;
    }

    Intent::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_number_extraction() {
        assert_eq!(extract_flight_number("Is PR 1845 delayed?"), Some("PR1845".to_string()));
        assert_eq!(extract_flight_number("status of 5J560"), Some("5J560".to_string()));
        assert_eq!(extract_flight_number("cx922 arrival"), Some("CX922".to_string()));
        assert_eq!(extract_flight_number("CX-922 arrival"), Some("CX922".to_string()));
        assert_eq!(extract_flight_number("is 25 minutes enough"), None);
        assert_eq!(extract_flight_number("IS 25 MINUTES ENOUGH"), None);
        assert_eq!(extract_flight_number("PR 212 gate"), Some("PR212".to_string()));
        assert_eq!(extract_flight_number("Where can I eat?"), None);
    }

    #[test]
    fn test_detect_intents() {
        assert_eq!(detect_intent("Hello there"), Intent::Greeting);
        assert_eq!(detect_intent("Is PR 1845 on time?"), Intent::FlightStatus);
        assert_eq!(detect_intent("How much is parking per hour?"), Intent::Parking);
        assert_eq!(detect_intent("Where is the taxi stand"), Intent::Transportation);
        assert_eq!(detect_intent("Can I bring liquids through security?"), Intent::Security);
        assert_eq!(detect_intent("Is KFC available?"), Intent::Dining);
        assert_eq!(detect_intent("I lost my luggage"), Intent::Baggage);
        assert_eq!(detect_intent("Can I talk to a human?"), Intent::HumanAgent);
        assert_eq!(detect_intent("What is the wifi password"), Intent::General);
    }

    #[test]
    fn test_shouted_prose_is_not_a_flight() {
        assert_eq!(detect_intent("IS 25 MINUTES ENOUGH"), Intent::General);
    }

    #[test]
    fn test_human_only_on_explicit_request() {
        assert_eq!(detect_intent("I want to speak with someone"), Intent::HumanAgent);
        assert_eq!(detect_intent("Is there customer service here?"), Intent::HumanAgent);
        assert_eq!(detect_intent("Where is the check-in agent?"), Intent::General);
        assert_eq!(detect_intent("Is airline staff at gate 5?"), Intent::FlightStatus);
    }

    #[test]
    fn test_greeting_with_question_prefers_topic() {
        assert_eq!(detect_intent("Hi, where can I park?"), Intent::Parking);
    }

    #[test]
    fn test_suggested_actions_not_empty() {
        for intent in [Intent::Greeting, Intent::FlightStatus, Intent::General] {
            assert!(!intent.suggested_actions().is_empty());
        }
        assert_eq!(Intent::FlightStatus.to_string(), "flight_status");
    }
}
