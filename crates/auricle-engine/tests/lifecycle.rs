mod support;

use std::fs;

use auricle_engine::{EngineConfig, EngineError, EngineState};
use auricle_sdk::{ErrorCode, Waveform};
use pretty_assertions::assert_eq;
use support::{fast_stop, DriverCommand, Harness};

#[test]
fn start_from_unprepared_prepares_and_waits_for_the_driver() {
    let harness = Harness::loaded(true);
    let engine = &harness.engine;

    engine.start().expect("start");
    assert_eq!(engine.state(), EngineState::Starting);
    assert!(engine.ac().is_locked());
    assert_eq!(engine.nchannels_out(), 1);
    assert_eq!(
        harness.driver_commands(),
        vec![
            DriverCommand::Prepare {
                inputs: 1,
                outputs: 1
            },
            DriverCommand::Start,
        ]
    );

    harness.events().started();
    assert_eq!(engine.state(), EngineState::Running);

    engine.start().expect("start while running is a no-op");
    assert_eq!(harness.driver_commands().len(), 2);
}

#[test]
fn stream_notifications_outside_their_states_are_ignored() {
    let harness = Harness::loaded(true);
    harness.events().started();
    assert_eq!(harness.engine.state(), EngineState::Unprepared);

    harness.events().stopped(4, 5);
    assert_eq!(harness.engine.state(), EngineState::Unprepared);
    assert_eq!(harness.engine.latched_errors(), (0, 0));
}

#[test]
fn stop_waits_for_the_driver_acknowledgement() {
    let harness = Harness::loaded(true);
    harness.engine.start().expect("start");
    harness.events().started();

    harness.engine.stop().expect("stop");
    assert_eq!(harness.engine.state(), EngineState::Stopped);
    assert_eq!(harness.driver_commands().last(), Some(&DriverCommand::Stop));
}

#[test]
fn unacknowledged_stop_times_out_and_stays_stopping() {
    let harness = Harness::loaded(false);
    harness.engine.start().expect("start");
    harness.events().started();

    let err = harness.engine.stop().expect_err("no acknowledgement");
    assert!(matches!(err, EngineError::StopTimedOut));
    assert_eq!(harness.engine.state(), EngineState::Stopping);

    harness.engine.stop().expect("stop while stopping is a no-op");
    harness.events().stopped(0, 0);
    assert_eq!(harness.engine.state(), EngineState::Stopped);
}

#[test]
fn stop_requires_a_prepared_engine() {
    let harness = Harness::loaded(true);
    assert_eq!(
        harness.engine.stop().expect_err("unprepared").to_string(),
        "Program is not running."
    );
}

#[test]
fn release_unlocks_the_space_and_forgets_the_output_channels() {
    let harness = Harness::loaded(true);
    let engine = &harness.engine;
    engine.prepare().expect("prepare");
    assert_eq!(engine.state(), EngineState::Stopped);
    engine.prepare().expect("prepare twice");
    assert_eq!(harness.module_log(), vec!["scale:prepare:1".to_owned()]);

    engine.release().expect("release");
    assert_eq!(engine.state(), EngineState::Unprepared);
    assert!(!engine.ac().is_locked());
    assert_eq!(engine.nchannels_out(), 0);
    engine.release().expect("release twice");
    assert_eq!(
        harness.module_log(),
        vec!["scale:prepare:1".to_owned(), "scale:release".to_owned()]
    );
    assert_eq!(harness.driver_commands().last(), Some(&DriverCommand::Release));
}

#[test]
fn release_of_a_running_engine_stops_it_first() {
    let harness = Harness::loaded(true);
    harness.engine.start().expect("start");
    harness.events().started();

    harness.engine.release().expect("release");
    assert_eq!(harness.engine.state(), EngineState::Unprepared);
    let commands = harness.driver_commands();
    assert_eq!(
        &commands[commands.len() - 2..],
        &[DriverCommand::Stop, DriverCommand::Release]
    );
}

#[test]
fn quit_reaches_exiting_from_every_state() {
    let unprepared = Harness::loaded(true);
    unprepared.engine.quit().expect("quit");

    let stopped = Harness::loaded(true);
    stopped.engine.prepare().expect("prepare");
    stopped.engine.quit().expect("quit");

    let running = Harness::loaded(true);
    running.engine.start().expect("start");
    running.events().started();
    running.engine.quit().expect("quit");

    let stuck = Harness::loaded(false);
    stuck.engine.start().expect("start");
    stuck.events().started();
    let err = stuck.engine.quit().expect_err("stop never acknowledged");
    assert!(matches!(err, EngineError::StopTimedOut));

    for harness in [&unprepared, &stopped, &running, &stuck] {
        assert_eq!(harness.engine.state(), EngineState::Exiting);
        assert!(harness.engine.exit_requested());
    }

    stopped.events().started();
    stopped.events().stopped(0, 0);
    assert_eq!(stopped.engine.state(), EngineState::Exiting);
    assert!(matches!(stopped.engine.start(), Err(EngineError::Exiting)));
}

#[test]
fn non_waveform_output_rolls_the_module_back() {
    let harness = Harness::new(true);
    harness.engine.load_module("analyzer").expect("load module");
    harness.engine.load_driver("mock").expect("load driver");

    let err = harness.engine.prepare().expect_err("spectral output");
    assert_eq!(
        err.to_string(),
        "The processing library does not return waveform data."
    );
    assert_eq!(harness.engine.state(), EngineState::Unprepared);
    assert!(!harness.engine.ac().is_locked());
    assert_eq!(
        harness.module_log(),
        vec!["analyzer:prepare".to_owned(), "analyzer:release".to_owned()]
    );
    assert!(harness.driver_commands().is_empty());
}

#[test]
fn prepare_requires_both_libraries() {
    let harness = Harness::new(true);
    harness.engine.load_module("scale").expect("load module");
    assert!(matches!(harness.engine.prepare(), Err(EngineError::NoDriver)));
    assert!(harness.module_log().is_empty());
}

#[test]
fn blocks_are_rejected_unless_running() {
    let harness = Harness::loaded(true);
    let mut input = Waveform::new(200, 1);
    let mut output = Waveform::new(200, 1);

    let code = harness
        .engine
        .process(&mut input, &mut output)
        .expect_err("unprepared");
    assert_eq!(code, ErrorCode::PROCESS_FAILED);
    assert!(harness.module_log().is_empty());
    assert_eq!(
        harness.engine.take_async_error(),
        "The framework is not in a running state."
    );
    assert_eq!(harness.engine.take_async_error(), "");
}

#[test]
fn running_engine_copies_processed_blocks_to_the_output() {
    let harness = Harness::loaded(true);
    harness
        .engine
        .parse_module("factor=2")
        .expect("set factor");
    harness.engine.start().expect("start");
    harness.events().started();

    let mut input = Waveform::from_interleaved(1, vec![0.25; 200]).expect("block");
    let mut output = Waveform::new(200, 1);
    harness
        .events()
        .process(&mut input, &mut output)
        .expect("process");
    assert!(output.as_slice().iter().all(|sample| *sample == 0.5));
}

#[test]
fn output_blocks_of_another_size_are_rejected() {
    let harness = Harness::loaded(true);
    harness.engine.start().expect("start");
    harness.events().started();

    let mut input = Waveform::new(200, 1);
    let mut output = Waveform::new(200, 2);
    let code = harness
        .events()
        .process(&mut input, &mut output)
        .expect_err("two output channels");
    assert_eq!(code, ErrorCode::PROCESS_FAILED);
    assert_eq!(
        harness.engine.take_async_error(),
        "The output block has 200 frames of 2 channels, the processing library returned \
         200 frames of 1 channels."
    );
}

#[test]
fn processing_errors_are_logged_by_severity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let errorlog = dir.path().join("error.log");
    let fatallog = dir.path().join("fatal.log");
    let config = fast_stop(EngineConfig::default())
        .with_error_logs(Some(errorlog.clone()), Some(fatallog.clone()));

    for library in ["broken", "broken", "doomed", "doomed"] {
        let harness = Harness::with_config(true, config.clone());
        harness.engine.load_module(library).expect("load module");
        harness.engine.load_driver("mock").expect("load driver");
        harness.engine.start().expect("start");
        harness.events().started();

        let mut input = Waveform::new(200, 1);
        let mut output = Waveform::new(200, 1);
        assert!(harness.events().process(&mut input, &mut output).is_err());
        assert!(harness
            .engine
            .take_async_error()
            .starts_with(&format!("Error in module \"{library}:{library}\"")));
    }

    let errors = fs::read_to_string(&errorlog).expect("error log");
    assert_eq!(errors.matches("\ndivision by zero.\n").count(), 2);
    assert!(!errors.contains("Fatal error"));
    let fatal = fs::read_to_string(&fatallog).expect("fatal log");
    assert_eq!(fatal.matches("Error in module").count(), 1);
    assert!(fatal.ends_with("\nFatal error: filter unstable.\n"));
}

#[test]
fn driver_stop_latches_codes_and_raises_exit_on_request() {
    let config = fast_stop(EngineConfig::default()).with_exit_on_stop(true);
    let harness = Harness::with_config(true, config);
    harness.engine.load_module("scale").expect("load module");
    harness.engine.load_driver("mock").expect("load driver");
    harness.engine.start().expect("start");
    harness.events().started();

    harness.events().stopped(1, 7);
    assert_eq!(harness.engine.state(), EngineState::Stopped);
    assert_eq!(harness.engine.latched_errors(), (1, 7));
    assert!(harness.engine.exit_requested());
    assert_eq!(harness.engine.take_async_error(), "IO Error: mock failure 7");
    assert_eq!(harness.engine.take_async_error(), "");
}

#[test]
fn driver_error_follows_the_processing_error() {
    let harness = Harness::new(true);
    harness.engine.load_module("broken").expect("load module");
    harness.engine.load_driver("mock").expect("load driver");
    harness.engine.start().expect("start");
    harness.events().started();

    let mut input = Waveform::new(200, 1);
    let mut output = Waveform::new(200, 1);
    let code = harness
        .events()
        .process(&mut input, &mut output)
        .expect_err("module fails");
    harness.events().stopped(code.get(), 2);
    assert!(!harness.engine.exit_requested());
    assert_eq!(
        harness.engine.take_async_error(),
        "Error in module \"broken:broken\":\ndivision by zero\nIO Error: mock failure 2"
    );
}

#[test]
fn settings_lock_with_the_driver_and_preparation() {
    let harness = Harness::new(true);
    let engine = &harness.engine;
    engine.set_fragsize(64).expect("no driver yet");
    engine.set_srate(16_000.0).expect("no driver yet");
    engine.set_input_channels(2).expect("unprepared");
    engine.load_module("scale").expect("load module");
    engine.load_driver("mock").expect("load driver");

    assert!(matches!(
        engine.set_fragsize(32),
        Err(EngineError::Locked("fragsize"))
    ));
    engine.prepare().expect("prepare");
    assert!(matches!(
        engine.set_input_channels(1),
        Err(EngineError::Locked("nchannels_in"))
    ));
    assert!(matches!(
        engine.load_module("scale"),
        Err(EngineError::AlreadyActive(EngineState::Stopped))
    ));
    assert_eq!(engine.nchannels_out(), 2);
    assert_eq!(
        harness.module_log(),
        vec!["scale:prepare:2".to_owned()]
    );
}

#[test]
fn loading_an_empty_name_unloads() {
    let harness = Harness::loaded(true);
    assert_eq!(
        harness.engine.loaded_libraries(),
        vec!["scale".to_owned(), "mock".to_owned()]
    );
    harness.engine.load_module("").expect("unload module");
    harness.engine.load_driver(" ").expect("unload driver");
    assert!(harness.engine.loaded_libraries().is_empty());
}
