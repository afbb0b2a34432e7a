//! Built-in topic catalog for agent-on-agent conversations.
//!
//! Each topic pairs a caller prompt (Agent A) with a receiver prompt
//! (Agent B). Agent A's prompt and first message are sent as assistant
//! overrides at initiation; Agent B's prompt rides along in metadata so the
//! stored call row documents both sides.

/// One scripted conversation scenario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicConfig {
    pub topic: &'static str,
    pub prompt_a: &'static str,
    pub prompt_b: &'static str,
    pub first_message_a: Option<&'static str>,
    pub first_message_b: Option<&'static str>,
    pub description: Option<&'static str>,
    pub category: Option<&'static str>,
}

static TOPICS: &[TopicConfig] = &[
    TopicConfig {
        topic: "restaurant_reservation",
        prompt_a: "You are calling a restaurant to book a table for four people this Friday at \
                   7pm. Be polite but persistent about the time. Ask about the cancellation \
                   policy before you hang up.",
        prompt_b: "You are the host at a busy mid-range restaurant taking a phone reservation. \
                   Friday 7pm is fully booked; offer 6pm or 8:30pm instead and explain the \
                   24-hour cancellation policy if asked.",
        first_message_a: Some("Hi, I'd like to make a reservation for this Friday evening."),
        first_message_b: None,
        description: Some("Negotiating a reservation slot under availability constraints"),
        category: Some("hospitality"),
    },
    TopicConfig {
        topic: "customer_support_refund",
        prompt_a: "You bought a wireless keyboard two weeks ago and the space bar has stopped \
                   working. Call support and request a refund rather than a replacement. Stay \
                   calm, but do not accept store credit.",
        prompt_b: "You are a customer support agent for an electronics retailer. Policy allows \
                   refunds within 30 days with an order number. Ask for the order number, offer \
                   a replacement first, then process the refund if the caller insists.",
        first_message_a: Some("Hello, I'm calling about a faulty keyboard I bought from you."),
        first_message_b: None,
        description: Some("Refund request with an agent steering toward replacement"),
        category: Some("customer_service"),
    },
    TopicConfig {
        topic: "clinic_appointment",
        prompt_a: "You need to schedule a routine dental check-up sometime in the next two \
                   weeks, ideally a morning slot. You are free Tuesdays and Thursdays. Confirm \
                   whether your insurance is accepted.",
        prompt_b: "You are a receptionist at a dental clinic. Morning slots are scarce; the \
                   next Tuesday morning is three weeks out, but Thursday afternoons are open. \
                   The clinic accepts most major insurance plans.",
        first_message_a: Some("Hi, I'd like to book a check-up appointment, please."),
        first_message_b: None,
        description: Some("Scheduling around limited availability"),
        category: Some("healthcare"),
    },
    TopicConfig {
        topic: "internet_outage",
        prompt_a: "Your home internet has been down since this morning. Call your provider, \
                   describe the blinking red light on the modem, and push for a technician \
                   visit if remote fixes fail.",
        prompt_b: "You are a tier-one tech support agent for an internet provider. Walk the \
                   caller through a modem power cycle and a line check before you agree to \
                   schedule a technician, which has a three-day lead time.",
        first_message_a: Some("Hi, my internet connection has been down all day."),
        first_message_b: None,
        description: Some("Troubleshooting escalation to a site visit"),
        category: Some("tech_support"),
    },
    TopicConfig {
        topic: "car_insurance_quote",
        prompt_a: "You are shopping for car insurance for a 2019 sedan, clean driving record, \
                   about 8,000 miles a year. Get a monthly price estimate and ask what \
                   discounts apply before committing to anything.",
        prompt_b: "You are an insurance sales agent. Gather the vehicle, mileage, and driving \
                   history, then quote a plausible monthly premium. Mention the safe-driver \
                   and low-mileage discounts, and try to close the sale today.",
        first_message_a: Some("Hello, I'd like to get a quote for car insurance."),
        first_message_b: None,
        description: Some("Price discovery versus a closing-oriented seller"),
        category: Some("financial"),
    },
    TopicConfig {
        topic: "hotel_booking_change",
        prompt_a: "You have a two-night hotel booking next weekend and need to move it one week \
                   later. Call the hotel, keep the same room type, and ask whether the rate \
                   changes.",
        prompt_b: "You are a hotel front-desk agent. The same room type is available the \
                   following weekend but at a rate 15% higher. Waive the change fee only if \
                   the caller objects to it.",
        first_message_a: Some("Hi, I need to change the dates on an existing booking."),
        first_message_b: None,
        description: Some("Date change with a rate difference"),
        category: Some("hospitality"),
    },
];

/// The full built-in catalog, in a stable order.
pub fn all() -> &'static [TopicConfig] {
    TOPICS
}

/// Look up a topic by its exact name.
pub fn find(name: &str) -> Option<&'static TopicConfig> {
    TOPICS.iter().find(|topic| topic.topic == name)
}

/// Topics belonging to one category.
pub fn by_category(category: &str) -> Vec<&'static TopicConfig> {
    TOPICS.iter().filter(|topic| topic.category == Some(category)).collect()
}
