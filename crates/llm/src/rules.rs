//! Deterministic rule-based responder.
//!
//! This is the last link of every provider chain. It never fails: given a
//! grounded knowledge entry it repeats that entry, otherwise it answers from
//! an intent template built from the airport settings.

use crate::intent::{detect_intent, extract_flight_number, Intent};
use concierge_core::config::AirportSettings;

/// Output of the rule-based responder.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleResponse {
    /// Answer text in widget markup
    pub text: String,

    /// Intent the template was chosen for
    pub intent: Intent,

    /// Whether the text came from a knowledge entry
    pub grounded: bool,
}

/// A knowledge entry the responder may quote verbatim.
#[derive(Debug, Clone, Copy)]
pub struct GroundedAnswer<'a> {
    pub question: &'a str,
    pub answer: &'a str,
}

#[derive(Debug, Clone)]
pub struct RuleBasedResponder {
    airport: AirportSettings,
}

impl RuleBasedResponder {
    pub fn new(airport: AirportSettings) -> Self {
        Self { airport }
    }

    pub fn respond(&self, query: &str, grounded: Option<GroundedAnswer<'_>>) -> RuleResponse {
        let intent = detect_intent(query);

        if let Some(entry) = grounded.filter(|e| !e.answer.trim().is_empty()) {
            return RuleResponse {
                text: format!("**{}**\n{}", entry.question.trim(), entry.answer.trim()),
                intent,
                grounded: true,
            };
        }

        RuleResponse {
            text: self.template(intent, query),
            intent,
            grounded: false,
        }
    }

    fn template(&self, intent: Intent, query: &str) -> String {
        let a = &self.airport;
        match intent {
            Intent::Greeting => format!(
                "**Welcome to {}!**\n\
                 I can help with flights, parking, transportation, security and dining.\n\
                 • Ask about a flight, for example \"Is PR 1845 on time?\"\n\
                 • Ask where to eat, park or catch a taxi",
                a.name
            ),
            Intent::FlightStatus => {
                let heading = match extract_flight_number(query) {
                    Some(flight) => format!("**Flight {}**", flight),
                    None => "**Flight Information**".to_string(),
                };
                format!(
                    "{}\n\
                     • Live departure and arrival times are on our [flight status page]({})\n\
                     • Please confirm gate and schedule changes with your airline",
                    heading, a.flight_status_url
                )
            }
            Intent::Parking => format!(
                "**Parking**\n\
                 • Rates, locations and opening hours are on our [parking page]({})\n\
                 • Keep your parking ticket with you to pay at the exit",
                a.parking_url
            ),
            Intent::Transportation => format!(
                "**Getting To and From the Airport**\n\
                 • Taxis, shuttles and ride-hailing pick-up points are listed on our [transportation page]({})\n\
                 • Follow the ground transportation signs at the arrival hall",
                a.transport_url
            ),
            Intent::Security => format!(
                "**Security Screening**\n\
                 • Liquids must be in containers of 100ml or less in a clear bag\n\
                 • See the full list of prohibited items on our [security page]({})",
                a.security_url
            ),
            Intent::Dining => format!(
                "**Dining**\n\
                 • Restaurants and cafes are open before and after security\n\
                 • Visit our [website]({}) for the current list of outlets",
                a.website
            ),
            Intent::Baggage => format!(
                "**Baggage**\n\
                 • Baggage allowance is set by your airline\n\
                 • For lost items call **{}**",
                a.contact_phone
            ),
            Intent::HumanAgent => format!(
                "**Talk to Our Team**\n\
                 • Call **{}**\n\
                 • Or visit any information desk in the terminal",
                a.contact_phone
            ),
            Intent::General => format!(
                "I'm not sure about that one yet.\n\
                 • Visit our [website]({})\n\
                 • Or call **{}** to speak with our team",
                a.website, a.contact_phone
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::markup::{parse, Block};

    fn responder() -> RuleBasedResponder {
        RuleBasedResponder::new(AirportSettings::default())
    }

    #[test]
    fn test_grounded_answer_is_quoted() {
        let response = responder().respond(
            "Is KFC available?",
            Some(GroundedAnswer {
                question: "Is there a KFC?",
                answer: "Yes, KFC is located at the departure hall, Level 2.",
            }),
        );
        assert!(response.grounded);
        assert_eq!(response.intent, Intent::Dining);
        assert!(response.text.starts_with("**Is there a KFC?**\n"));
        assert!(response.text.contains("Level 2"));
    }

    #[test]
    fn test_flight_template_mentions_number() {
        let response = responder().respond("Is 5J 560 delayed?", None);
        assert_eq!(response.intent, Intent::FlightStatus);
        assert!(response.text.contains("**Flight 5J560**"));
        assert!(!response.grounded);
    }

    #[test]
    fn test_every_template_parses_as_markup() {
        let queries = [
            "hello",
            "flight status",
            "parking",
            "taxi",
            "security liquids",
            "restaurant",
            "luggage",
            "human please",
            "wifi",
        ];
        for query in queries {
            let text = responder().respond(query, None).text;
            let blocks = parse(&text);
            assert!(!blocks.is_empty(), "empty template for {}", query);
            assert!(
                blocks.iter().any(|b| matches!(b, Block::Bullet { .. })),
                "template for '{}' has no bullets",
                query
            );
        }
    }

    #[test]
    fn test_blank_grounded_answer_falls_back_to_template() {
        let response = responder().respond(
            "parking",
            Some(GroundedAnswer {
                question: "Parking?",
                answer: "   ",
            }),
        );
        assert!(!response.grounded);
        assert!(response.text.starts_with("**Parking**"));
    }
}
