mod common;

use intentflow::actions::registry::ActionRegistry;
use intentflow::actions::types::{ActionDescriptor, ActionInstance, ParamSpec, ValueKind};
use intentflow::kernel::event::InboundMessage;
use intentflow::kernel::hooks::{DefaultHooks, DialogHooks};
use intentflow::kernel::resolver::{ActionResolver, Resolution};
use intentflow::nlu::types::{Entity, IntentCandidate, NluResult, ServiceResult};
use intentflow::FlowError;

fn winner(intent: &str, entities: &[(&str, &str)]) -> ServiceResult {
    let best = IntentCandidate::new(intent, 0.9);
    ServiceResult {
        result: NluResult {
            query: "q".into(),
            candidates: vec![best.clone()],
            entities: entities.iter().map(|(k, v)| Entity::new(*k, *v)).collect(),
        },
        best,
        service: "primary".into(),
    }
}

fn message() -> InboundMessage {
    InboundMessage::text("conv-1", "q")
}

#[test]
fn test_unbound_intent_is_no_action() {
    let registry = common::registry_only();
    let resolver = ActionResolver::new(&registry, &DefaultHooks);
    assert_eq!(resolver.resolve(&winner("Greeting", &[]), &message()), Resolution::NoAction);
}

#[test]
fn test_complete_action_is_ready() {
    let registry = common::registry_only();
    let resolver = ActionResolver::new(&registry, &DefaultHooks);
    let resolution = resolver.resolve(&winner("CancelFlight", &[("BookingRef", "AB123")]), &message());

    match resolution {
        Resolution::Ready(entry) => {
            assert_eq!(entry.intent, "CancelFlight");
            assert_eq!(entry.action.get_str("bookingReference"), Some("AB123"));
        }
        other => panic!("Expected Ready, got {:?}", other),
    }
}

#[test]
fn test_missing_parameters_give_a_single_entry_chain() {
    let registry = common::registry_only();
    let resolver = ActionResolver::new(&registry, &DefaultHooks);
    let resolution = resolver.resolve(&winner("BookFlight", &[("Destination", "Paris")]), &message());

    match resolution {
        Resolution::Incomplete(chain) => {
            assert_eq!(chain.len(), 1);
            assert_eq!(chain[0].action.get_str("destination"), Some("Paris"));
        }
        other => panic!("Expected Incomplete, got {:?}", other),
    }
}

#[test]
fn test_contextual_action_gets_its_parent_first() {
    let registry = common::registry_only();
    let resolver = ActionResolver::new(&registry, &DefaultHooks);
    let resolution = resolver.resolve(&winner("FindHotels-ChangeLocation", &[("Place", "Rome")]), &message());

    match resolution {
        Resolution::Incomplete(chain) => {
            let intents: Vec<&str> = chain.iter().map(|e| e.intent.as_str()).collect();
            assert_eq!(intents, vec!["FindHotels", "FindHotels-ChangeLocation"]);
            assert!(chain[0].action.params.is_empty());
        }
        other => panic!("Expected Incomplete, got {:?}", other),
    }
}

#[test]
fn test_contextual_action_without_context_is_rejected() {
    let registry = common::registry_only();
    let resolver = ActionResolver::new(&registry, &DefaultHooks);
    assert_eq!(
        resolver.resolve(&winner("FindHotels-ChangeNights", &[]), &message()),
        Resolution::ContextRequired {
            action: "Change Number of Nights".into()
        }
    );
}

struct TenantHooks;

#[async_trait::async_trait]
impl DialogHooks for TenantHooks {
    fn on_context_created(&self, context: &mut ActionInstance, message: &InboundMessage) {
        context
            .params
            .insert("tenant".into(), serde_json::Value::String(message.conversation_id.clone()));
    }
}

#[test]
fn test_context_created_hook_sees_each_parent() {
    let registry = common::registry_only();
    let resolver = ActionResolver::new(&registry, &TenantHooks);
    match resolver.resolve(&winner("FindHotels-ChangeLocation", &[("Place", "Rome")]), &message()) {
        Resolution::Incomplete(chain) => {
            assert_eq!(chain[0].action.get_str("tenant"), Some("conv-1"));
            assert!(chain[1].action.get("tenant").is_none());
        }
        other => panic!("Expected Incomplete, got {:?}", other),
    }
}

#[test]
fn test_aliases_resolve_to_the_primary_action() {
    let registry = ActionRegistry::builder()
        .action(
            ActionDescriptor::new("Order", "Order").alias("Purchase").param(ParamSpec::optional("item")),
            common::echo(),
        )
        .build()
        .unwrap();
    let resolver = ActionResolver::new(&registry, &DefaultHooks);
    match resolver.resolve(&winner("Purchase", &[]), &message()) {
        Resolution::Ready(entry) => assert_eq!(entry.action.action, "Order"),
        other => panic!("Expected Ready, got {:?}", other),
    }
}

#[test]
fn test_registry_rejects_bad_tables() {
    // 1. Same intent twice
    let err = ActionRegistry::builder()
        .action(ActionDescriptor::new("A", "A"), common::echo())
        .action(ActionDescriptor::new("B", "B").alias("A"), common::echo())
        .build();
    assert!(matches!(err, Err(FlowError::Configuration(_))));

    // 2. Unknown context parent
    let err = ActionRegistry::builder()
        .contextual(ActionDescriptor::new("A-Child", "Child").contextual("A", true))
        .build();
    assert!(matches!(err, Err(FlowError::Configuration(_))));

    // 3. Cycle
    let err = ActionRegistry::builder()
        .contextual(ActionDescriptor::new("X", "X").contextual("Y", true))
        .contextual(ActionDescriptor::new("Y", "Y").contextual("X", true))
        .build();
    assert!(matches!(err, Err(FlowError::Configuration(_))));

    // 4. Choice with no options
    let err = ActionRegistry::builder()
        .action(
            ActionDescriptor::new("Pick", "Pick").param(ParamSpec::required("size", "Size?").kind(ValueKind::Choice(vec![]))),
            common::echo(),
        )
        .build();
    assert!(matches!(err, Err(FlowError::Configuration(_))));
}

#[test]
fn test_validation_order_and_error_messages() {
    let registry = common::registry_only();
    let descriptor = registry.descriptor("FindHotels").unwrap();
    let mut action = registry.build("FindHotels", std::iter::empty::<&Entity>()).unwrap();

    let missing: Vec<String> = action.validate(descriptor).into_iter().map(|v| v.parameter).collect();
    assert_eq!(missing, vec!["place", "nights"]);

    let nights = descriptor.param_spec("nights").unwrap();
    assert!(!action.bind(nights, "a few"));
    let outstanding = action.validate(descriptor);
    assert_eq!(outstanding[1].message, "Please give the number of nights as a whole number.");

    assert!(action.bind(nights, "4"));
    assert_eq!(action.get("nights"), Some(&serde_json::json!(4)));
    assert!(action.rejected.is_empty());
}

struct GhostHooks;

#[async_trait::async_trait]
impl DialogHooks for GhostHooks {
    fn on_action_resolved(&self, _intent: &str, _action: ActionInstance) -> ActionInstance {
        ActionInstance::new("Ghost")
    }
}

#[test]
fn test_unregistered_substitute_is_no_action() {
    let registry = common::registry_only();
    let resolver = ActionResolver::new(&registry, &GhostHooks);
    assert_eq!(
        resolver.resolve(&winner("CancelFlight", &[("BookingRef", "AB123")]), &message()),
        Resolution::NoAction
    );
}

#[tokio::test]
async fn test_reply_entities_come_from_the_winning_candidate_only() {
    use intentflow::actions::extract::{Extraction, NluValueExtractor, ValueExtractor};
    use intentflow::nlu::selector::ScoreRanking;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    let registry = Arc::new(common::registry_only());
    let extractor = NluValueExtractor::new(registry.clone(), Arc::new(ScoreRanking::default()));

    // 1. Reply whose losing candidate carries an Origin entity
    let mut losing = IntentCandidate::new("FindHotels", 0.3);
    losing.entities.push(Entity::new("Origin", "Denver"));
    let nlu = common::StaticNlu {
        name: "primary".into(),
        result: NluResult {
            query: String::new(),
            candidates: vec![IntentCandidate::new("BookFlight", 0.9), losing],
            entities: vec![],
        },
    };

    let mut action = registry
        .build("BookFlight", [Entity::new("Destination", "Paris")].iter())
        .unwrap();
    let outcome = extractor
        .extract_value(&nlu, &mut action, "departureCity", "somewhere warm", &CancellationToken::new())
        .await
        .unwrap();

    // 2. The raw reply is bound, not the other candidate's entity
    assert_eq!(outcome, Extraction::Bound);
    assert_eq!(action.get_str("departureCity"), Some("somewhere warm"));
}
