/// Topic/payload to command translation.
///
/// Topics look like `<root>/<device>/<action>`. The device segment picks the
/// controller, the action segment picks the payload decoder. Unknown devices
/// still produce a command (bound to no target); unknown actions produce none.
use serde::Deserialize;
use std::{collections::HashMap, str::FromStr};
use strum::{Display, EnumIter, EnumString};

use super::{
    command::Command,
    controller::{SharedController, TimerBlock},
    error::GatewayError,
    invoker::InvokerHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    CoilsOn,
    CoilsOff,
    TimerSet,
    TimerReset,
    Validate,
}

#[derive(Debug, Deserialize)]
struct CoilsPayload {
    coils: Vec<u16>,
}

#[derive(Debug, Deserialize)]
struct TimerSetPayload {
    start_address: u16,
    values: TimerBlock,
}

impl Action {
    fn decode<'a, T: Deserialize<'a>>(self, payload: &'a [u8]) -> Result<T, GatewayError> {
        serde_json::from_slice(payload).map_err(|err| GatewayError::Decode {
            action: self.to_string(),
            message: err.to_string(),
        })
    }

    /// Decode the payload for this action and bind it to `target`.
    pub fn build(
        self,
        target: Option<SharedController>,
        payload: &[u8],
    ) -> Result<Command, GatewayError> {
        Ok(match self {
            Action::CoilsOn => {
                let CoilsPayload { coils } = self.decode(payload)?;
                Command::coils_on(target, coils)
            }
            Action::CoilsOff => {
                let CoilsPayload { coils } = self.decode(payload)?;
                Command::coils_off(target, coils)
            }
            Action::TimerSet => {
                let TimerSetPayload {
                    start_address,
                    values,
                } = self.decode(payload)?;
                Command::timer_set(target, start_address, values)
            }
            // No fields; whatever was published is ignored.
            Action::TimerReset => Command::reset_timers(target),
            Action::Validate => Command::validate(target),
        })
    }
}

/// Split a topic into its device id and action segments.
pub fn parse_topic(topic: &str) -> Result<(&str, &str), GatewayError> {
    let segments = topic.split('/').collect::<Vec<_>>();
    match segments.as_slice() {
        [_root, device, .., action] if !device.is_empty() && !action.is_empty() => {
            Ok((*device, *action))
        }
        _ => Err(GatewayError::Topic {
            topic: topic.to_string(),
        }),
    }
}

/// Device table plus action table. Both are fixed once built.
#[derive(Default)]
pub struct Router {
    controllers: HashMap<String, SharedController>,
}

impl FromIterator<SharedController> for Router {
    fn from_iter<I: IntoIterator<Item = SharedController>>(iter: I) -> Self {
        let controllers = iter
            .into_iter()
            .map(|controller| {
                let id = controller.lock().id().to_string();
                (id, controller)
            })
            .collect();
        Self { controllers }
    }
}

impl Router {
    pub fn new(controllers: HashMap<String, SharedController>) -> Self {
        Self { controllers }
    }

    pub fn controller(&self, id: &str) -> Option<&SharedController> {
        self.controllers.get(id)
    }

    pub fn device_ids(&self) -> Vec<&str> {
        let mut ids = self.controllers.keys().map(String::as_str).collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Translate one event into a command.
    ///
    /// `Ok(None)` means the action is not one we handle; the event is dropped.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Result<Option<Command>, GatewayError> {
        let (device, action_name) = parse_topic(topic)?;

        let Ok(action) = Action::from_str(action_name) else {
            log::warn!(
                "Unexpected message: {} {}",
                topic,
                String::from_utf8_lossy(payload)
            );
            return Ok(None);
        };

        let target = self.controllers.get(device).cloned();
        if target.is_none() {
            log::warn!("Unknown device '{device}' in {topic}, {action} will be a no-op");
        }

        action.build(target, payload).map(Some)
    }
}

/// What became of one inbound event.
#[derive(Debug)]
pub enum Dispatch {
    Enqueued(&'static str),
    Ignored,
    Rejected(GatewayError),
}

/// Router plus the producer end of the invoker: the callback the event source drives.
pub struct Dispatcher {
    router: Router,
    invoker: InvokerHandle,
}

impl Dispatcher {
    pub fn new(router: Router, invoker: InvokerHandle) -> Self {
        Self { router, invoker }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> Dispatch {
        match self.router.route(topic, payload) {
            Ok(Some(command)) => {
                let action = command.name();
                self.invoker.enqueue(command);
                log::info!("{}: {} {}", action, topic, String::from_utf8_lossy(payload));
                Dispatch::Enqueued(action)
            }
            Ok(None) => Dispatch::Ignored,
            Err(err) => {
                log::warn!("Dropped {topic}: {err}");
                Dispatch::Rejected(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{command::Outcome, controller::Controller, invoker::Invoker},
        testing::{Call, MockDevice},
    };
    use strum::IntoEnumIterator;

    fn router() -> (Router, MockDevice) {
        let mock = MockDevice::new("mock", 4);
        let plc = Controller::new("plc1", Box::new(mock.clone()), 4).into_shared();
        (Router::from_iter([plc]), mock)
    }

    #[test]
    fn test_action_names() {
        let names = Action::iter().map(|a| a.to_string()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["coils_on", "coils_off", "timer_set", "timer_reset", "validate"]
        );
        assert_eq!(Action::from_str("timer_set").unwrap(), Action::TimerSet);
        assert!(Action::from_str("reboot").is_err());
    }

    #[test]
    fn test_parse_topic() {
        assert_eq!(parse_topic("test/plc1/coils_on").unwrap(), ("plc1", "coils_on"));
        assert_eq!(
            parse_topic("site/plc2/extra/timer_set").unwrap(),
            ("plc2", "timer_set")
        );
        assert!(parse_topic("test/coils_on").is_err());
        assert!(parse_topic("test//coils_on").is_err());
        assert!(parse_topic("test/plc1/").is_err());
        assert!(parse_topic("").is_err());
    }

    #[test]
    fn test_routes_coils_on() {
        let (router, _mock) = router();
        let command = router
            .route("test/plc1/coils_on", br#"{"coils":[1,2]}"#)
            .unwrap()
            .unwrap();
        match command {
            Command::CoilsOn { target, coils } => {
                assert_eq!(coils, vec![1, 2]);
                assert_eq!(target.unwrap().lock().id(), "plc1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_routes_timer_set() {
        let (router, _mock) = router();
        let command = router
            .route(
                "test/plc1/timer_set",
                br#"{"start_address": 4, "values":[15,0,0,10]}"#,
            )
            .unwrap()
            .unwrap();
        match command {
            Command::TimerSet {
                start_address,
                values,
                ..
            } => {
                assert_eq!(start_address, 4);
                assert_eq!(values, [15, 0, 0, 10]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_timer_reset_ignores_payload() {
        let (router, _mock) = router();
        for payload in [&b""[..], &b"anything"[..]] {
            let command = router.route("test/plc1/timer_reset", payload).unwrap();
            assert!(matches!(command, Some(Command::ResetTimers { target: Some(_) })));
        }
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        let (router, _mock) = router();
        let cases: [(&str, &[u8]); 7] = [
            ("test/plc1/timer_set", br#"{"start_address": 0}"#),
            ("test/plc1/timer_set", br#"{"start_address": 0, "values": [1, 2, 3]}"#),
            ("test/plc1/timer_set", br#"{"start_address": 0, "values": [1, 2, 3, 4, 5]}"#),
            ("test/plc1/timer_set", br#"{"start_address": 0, "values": [70000, 0, 0, 0]}"#),
            ("test/plc1/coils_on", b""),
            ("test/plc1/coils_on", br#"{"coils": [-1]}"#),
            ("test/plc1/coils_off", br#"{"coils": "1,2"}"#),
        ];
        for (topic, payload) in cases {
            let err = router.route(topic, payload).unwrap_err();
            assert!(matches!(err, GatewayError::Decode { .. }), "{topic}");
        }
    }

    #[test]
    fn test_unknown_device_binds_no_target() {
        let (router, mock) = router();
        let command = router
            .route("test/plc9/coils_on", br#"{"coils":[1]}"#)
            .unwrap()
            .unwrap();
        assert!(command.target().is_none());
        assert!(matches!(command.execute(), Outcome::NoTarget));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_unknown_action_is_dropped() {
        let (router, _mock) = router();
        assert!(router.route("test/plc1/reboot", b"{}").unwrap().is_none());
    }

    #[test]
    fn test_dispatch_enqueues_only_valid_commands() {
        let (router, mock) = router();
        let invoker = Invoker::new();
        let dispatcher = Dispatcher::new(router, invoker.handle());

        assert!(matches!(
            dispatcher.dispatch("test/plc1/timer_set", br#"{"start_address": 0}"#),
            Dispatch::Rejected(GatewayError::Decode { .. })
        ));
        assert!(matches!(
            dispatcher.dispatch("test/plc1/status", b""),
            Dispatch::Ignored
        ));
        assert!(matches!(
            dispatcher.dispatch("plc1", b""),
            Dispatch::Rejected(GatewayError::Topic { .. })
        ));
        assert_eq!(invoker.pending(), 0);

        assert!(matches!(
            dispatcher.dispatch("test/plc1/coils_on", br#"{"coils":[0]}"#),
            Dispatch::Enqueued("coils_on")
        ));
        assert_eq!(invoker.pending(), 1);

        invoker.drain();
        assert_eq!(
            mock.calls(),
            vec![Call::WriteBit {
                address: 0,
                value: true
            }]
        );
    }

    #[test]
    fn test_device_ids_sorted() {
        let plcs = ["plc2", "plc1"].map(|id| {
            Controller::new(id, Box::new(MockDevice::new(id, 4)), 4).into_shared()
        });
        let router = Router::from_iter(plcs);
        assert_eq!(router.device_ids(), vec!["plc1", "plc2"]);
        assert!(router.controller("plc2").is_some());
    }
}
