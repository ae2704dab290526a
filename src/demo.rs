//! Travel-desk actions used by the console binary: flights plus hotel search
//! with two contextual refinements.

use anyhow::Result;

use crate::actions::registry::{ActionRegistry, FnBehavior};
use crate::actions::types::{ActionDescriptor, ActionInstance, FulfillResult, ParamSpec, ValueKind};
use crate::error::FlowResult;
use crate::kernel::dispatcher::HandlerTable;
use crate::services::nlu::keyword::KeywordNluService;

pub fn book_flight() -> ActionDescriptor {
    ActionDescriptor::new("BookFlight", "Book Flight")
        .param(ParamSpec::required("destination", "Where do you want to fly to?").entity("Destination"))
        .param(ParamSpec::required("departureCity", "Which city are you departing from?").entity("Origin"))
        .confirm_on_switch()
}

pub fn cancel_flight() -> ActionDescriptor {
    ActionDescriptor::new("CancelFlight", "Cancel Flight")
        .param(ParamSpec::required("bookingReference", "What is your booking reference?").entity("BookingRef"))
}

pub fn find_hotels() -> ActionDescriptor {
    ActionDescriptor::new("FindHotels", "Find Hotels")
        .param(ParamSpec::required("place", "Where do you want to stay?").entity("Place"))
        .param(
            ParamSpec::required("nights", "How many nights?")
                .kind(ValueKind::Integer)
                .error_message("Please give the number of nights as a whole number."),
        )
        .confirm_on_switch()
}

pub fn change_hotel_location() -> ActionDescriptor {
    ActionDescriptor::new("FindHotels-ChangeLocation", "Change Hotel Location")
        .param(ParamSpec::required("place", "Where should I look instead?").entity("Place"))
        .contextual("FindHotels", true)
}

pub fn change_hotel_nights() -> ActionDescriptor {
    ActionDescriptor::new("FindHotels-ChangeNights", "Change Number of Nights")
        .param(ParamSpec::required("nights", "How many nights instead?").kind(ValueKind::Integer))
        .contextual("FindHotels", false)
}

fn describe(action: &ActionInstance, fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| match action.get(f) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => "?".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

pub fn travel_registry() -> FlowResult<ActionRegistry> {
    ActionRegistry::builder()
        .action(
            book_flight(),
            FnBehavior(|action: ActionInstance| async move {
                Ok::<_, anyhow::Error>(FulfillResult::Text(format!(
                    "Flight booked: {}",
                    describe(&action, &["departureCity", "destination"])
                )))
            }),
        )
        .action(
            cancel_flight(),
            FnBehavior(|action: ActionInstance| async move {
                Ok::<_, anyhow::Error>(FulfillResult::Text(format!(
                    "Booking {} cancelled",
                    describe(&action, &["bookingReference"])
                )))
            }),
        )
        .action(
            find_hotels(),
            FnBehavior(|action: ActionInstance| async move {
                Ok::<_, anyhow::Error>(FulfillResult::Text(format!(
                    "Searching hotels: {}",
                    describe(&action, &["place", "nights"])
                )))
            }),
        )
        .contextual(change_hotel_location())
        .contextual(change_hotel_nights())
        .build()
}

pub fn travel_nlu(name: &str) -> Result<KeywordNluService> {
    KeywordNluService::new(name)
        .intent("BookFlight", &["book a flight", "book flight", "fly"], 0.9)
        .intent("CancelFlight", &["cancel"], 0.9)
        .intent("FindHotels", &["hotel", "hotels"], 0.85)
        .intent("FindHotels-ChangeLocation", &["change location", "change the location"], 0.95)
        .intent("FindHotels-ChangeNights", &["change nights", "change the nights"], 0.95)
        .entity("Destination", r"\bto\s+([a-z][\w-]*)")?
        .entity("Origin", r"\bfrom\s+([a-z][\w-]*)")?
        .entity("Place", r"\b(?:in|to)\s+([a-z][\w-]*)")?
        .entity("BookingRef", r"\b([a-z]{2}\d{3,6})\b")
}

/// Every completed action's text result goes back to the user.
pub fn travel_handlers() -> FlowResult<HandlerTable> {
    HandlerTable::builder()
        .fallback(|input| async move {
            if let Some(text) = input.result.as_text() {
                input.outbox.post(text);
            }
            Ok::<(), anyhow::Error>(())
        })
        .build()
}
