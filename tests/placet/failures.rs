use placetmachine::placet::{Communicator, CommunicatorConfig, PlacetError};

use crate::fake_config;

#[tokio::test]
async fn given_error_keyword_in_reply_then_simulator_error_is_returned() {
    let mut config = fake_config();
    config.output_lines.insert("fail".to_string(), 1);
    let mut simulator = Communicator::spawn(config).await.expect("spawn");

    let err = simulator
        .run_command("fail TestSimpleCorrection")
        .await
        .expect_err("error line must fail");
    match err {
        PlacetError::Simulator(line) => assert!(line.contains("TestSimpleCorrection")),
        other => panic!("expected simulator error, got {other:?}"),
    }
    simulator.close().await.expect("close");
}

#[tokio::test]
async fn given_unresponsive_shell_then_read_times_out() {
    let config = CommunicatorConfig::for_program("sh")
        .with_args(["-c", "cat > /dev/null"])
        .with_intro_lines(0)
        .with_timeout_ms(200);
    let mut simulator = Communicator::spawn(config).await.expect("spawn");

    let err = simulator
        .read_scalar("emitt_y")
        .await
        .expect_err("no reply must time out");
    assert!(
        matches!(err, PlacetError::Timeout { timeout_ms: 200, .. }),
        "unexpected error: {err:?}"
    );
    simulator.close().await.expect("close");
}

#[tokio::test]
async fn given_missing_program_then_spawn_fails() {
    let config = CommunicatorConfig::for_program("placetmachine-missing-simulator");
    let err = Communicator::spawn(config).await.err().expect("spawn must fail");
    assert!(matches!(err, PlacetError::Spawn { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn given_short_banner_then_spawn_reports_exit() {
    let config = CommunicatorConfig::for_program("sh")
        .with_args(["-c", "echo banner"])
        .with_intro_lines(3)
        .with_timeout_ms(5_000);
    let err = Communicator::spawn(config).await.err().expect("banner too short");
    assert!(matches!(err, PlacetError::ProcessExited), "unexpected error: {err:?}");
}

#[tokio::test]
async fn given_exited_shell_then_commands_fail() {
    let config = CommunicatorConfig::for_program("sh")
        .with_args(["-c", "exit 0"])
        .with_intro_lines(0)
        .with_timeout_ms(5_000);
    let mut simulator = Communicator::spawn(config).await.expect("spawn");

    let err = simulator
        .read_scalar("emitt_y")
        .await
        .expect_err("exited shell cannot answer");
    assert!(
        matches!(err, PlacetError::ProcessExited | PlacetError::Io(_)),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn given_error_before_remaining_reply_lines_then_next_command_reads_its_own_reply() {
    let mut config = fake_config();
    config.output_lines.insert("Track".to_string(), 3);
    let mut simulator = Communicator::spawn(config).await.expect("spawn");

    let err = simulator
        .run_command("Track beam0")
        .await
        .expect_err("error line must fail");
    assert!(
        matches!(&err, PlacetError::Simulator(line) if line.contains("tracking failed")),
        "unexpected error: {err:?}"
    );

    simulator
        .set_variable("emitt_y", "42")
        .await
        .expect("stream is in sync after the failed command");
    let value = simulator.read_scalar("emitt_y").await.expect("scalar reads");
    assert_eq!(value, 42.0);
    simulator.close().await.expect("close");
}
