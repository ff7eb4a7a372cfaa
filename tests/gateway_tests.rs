use std::{sync::Arc, thread};

use parking_lot::Mutex;
use rtu_gateway::{
    core::{
        Command, Controller, Dispatch, Dispatcher, GatewayError, Invoker, Outcome, Router,
        Validation,
    },
    testing::{Call, CallKind, Journal, MockDevice},
};

fn plc(id: &str, num_coils: u16) -> (rtu_gateway::core::SharedController, MockDevice) {
    let mock = MockDevice::new(id, num_coils);
    let plc = Controller::new(id, Box::new(mock.clone()), num_coils).into_shared();
    (plc, mock)
}

#[test]
fn test_mqtt_coils_on_then_validate() {
    let (plc1, mock) = plc("plc1", 4);
    let invoker = Invoker::new();
    let dispatcher = Dispatcher::new(Router::from_iter([plc1.clone()]), invoker.handle());

    assert!(matches!(
        dispatcher.dispatch("test/plc1/coils_on", br#"{"coils":[1,2]}"#),
        Dispatch::Enqueued("coils_on")
    ));
    assert!(matches!(
        dispatcher.dispatch("test/plc1/validate", b""),
        Dispatch::Enqueued("validate")
    ));

    let reports = invoker.drain();

    assert_eq!(
        mock.calls(),
        vec![
            Call::WriteBits {
                start: 0,
                values: vec![false, true, true, false]
            },
            Call::ReadBits { start: 0, count: 4 },
        ]
    );
    assert_eq!(plc1.lock().coil_state(), &[false, true, true, false]);
    match &reports[1].outcome {
        Outcome::Validated(Validation::Consistent { coils }) => {
            assert_eq!(coils, &vec![false, true, true, false])
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_timer_reset_restores_value_before_last_set() {
    let (plc1, mock) = plc("plc1", 4);
    mock.set_registers(0, &[7, 7, 7, 7]);
    let invoker = Invoker::new();
    let dispatcher = Dispatcher::new(Router::from_iter([plc1]), invoker.handle());

    dispatcher.dispatch(
        "test/plc1/timer_set",
        br#"{"start_address":0,"values":[20,0,0,10]}"#,
    );
    dispatcher.dispatch(
        "test/plc1/timer_set",
        br#"{"start_address":0,"values":[15,0,0,10]}"#,
    );
    dispatcher.dispatch("test/plc1/timer_reset", b"");
    let reports = invoker.drain();

    assert!(matches!(reports[2].outcome, Outcome::Restored(1)));
    assert_eq!(
        mock.calls().last(),
        Some(&Call::WriteRegisters {
            start: 0,
            values: vec![20, 0, 0, 10]
        })
    );
    assert_eq!(mock.registers(0, 4), vec![20, 0, 0, 10]);
}

#[test]
fn test_fifo_across_producers() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let mock1 = MockDevice::new("plc1", 4).with_journal(journal.clone());
    let mock2 = MockDevice::new("plc2", 4).with_journal(journal.clone());
    let plc1 = Controller::new("plc1", Box::new(mock1), 4).into_shared();
    let plc2 = Controller::new("plc2", Box::new(mock2), 4).into_shared();
    let invoker = Invoker::new();

    // Producers run one after another so the enqueue order is known.
    for (plc, coil) in [(plc1.clone(), 0), (plc2.clone(), 1), (plc1, 2), (plc2, 3)] {
        let handle = invoker.handle();
        thread::spawn(move || handle.enqueue(Command::coils_on(Some(plc), vec![coil])))
            .join()
            .unwrap();
    }
    assert_eq!(invoker.pending(), 4);

    invoker.drain();

    let order = journal
        .lock()
        .iter()
        .map(|(device, call)| match call {
            Call::WriteBit { address, .. } => (device.clone(), *address),
            other => panic!("unexpected {other:?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![
            ("plc1".to_string(), 0),
            ("plc2".to_string(), 1),
            ("plc1".to_string(), 2),
            ("plc2".to_string(), 3),
        ]
    );
}

#[test]
fn test_unknown_device_is_harmless() {
    let (plc1, mock) = plc("plc1", 4);
    let invoker = Invoker::new();
    let dispatcher = Dispatcher::new(Router::from_iter([plc1]), invoker.handle());

    dispatcher.dispatch("test/plc9/coils_on", br#"{"coils":[0]}"#);
    dispatcher.dispatch("test/plc1/coils_on", br#"{"coils":[0]}"#);
    let reports = invoker.drain();

    assert!(matches!(reports[0].outcome, Outcome::NoTarget));
    assert!(matches!(reports[1].outcome, Outcome::Applied));
    assert_eq!(mock.calls().len(), 1);
}

#[test]
fn test_timer_set_without_values_is_rejected() {
    let (plc1, mock) = plc("plc1", 4);
    let invoker = Invoker::new();
    let dispatcher = Dispatcher::new(Router::from_iter([plc1]), invoker.handle());

    let dispatch = dispatcher.dispatch("test/plc1/timer_set", br#"{"start_address":0}"#);

    assert!(matches!(
        dispatch,
        Dispatch::Rejected(GatewayError::Decode { .. })
    ));
    assert_eq!(invoker.pending(), 0);
    assert!(mock.calls().is_empty());
}

#[test]
fn test_failed_write_keeps_cache_and_later_commands_run() {
    let (plc1, mock) = plc("plc1", 4);
    let invoker = Invoker::new();
    mock.fail(CallKind::WriteBits);

    invoker.enqueue(Command::coils_on(Some(plc1.clone()), vec![0, 3]));
    invoker.enqueue(Command::coils_on(Some(plc1.clone()), vec![1]));
    let reports = invoker.drain();

    assert!(matches!(
        reports[0].outcome,
        Outcome::Failed(GatewayError::Transport { .. })
    ));
    assert!(matches!(reports[1].outcome, Outcome::Applied));
    assert_eq!(plc1.lock().coil_state(), &[false, true, false, false]);
    assert_eq!(mock.coils(), vec![false, true, false, false]);
}

#[test]
fn test_run_consumer_serves_concurrent_producers() {
    let (plc1, mock) = plc("plc1", 8);
    let invoker = Arc::new(Invoker::new());
    let consumer = {
        let invoker = Arc::clone(&invoker);
        thread::spawn(move || invoker.run())
    };

    let producers = (0..8u16)
        .map(|coil| {
            let handle = invoker.handle();
            let plc = plc1.clone();
            thread::spawn(move || handle.enqueue(Command::coils_on(Some(plc), vec![coil])))
        })
        .collect::<Vec<_>>();
    for producer in producers {
        assert!(producer.join().unwrap());
    }
    invoker.handle().shutdown();

    assert_eq!(consumer.join().unwrap(), 8);
    assert_eq!(mock.coils(), vec![true; 8]);
    assert_eq!(plc1.lock().coil_state(), &[true; 8]);
}
