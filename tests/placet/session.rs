use placetmachine::{
    lattice::Offsets,
    placet::{Communicator, SimulatorPort},
};

use crate::{fake_config, spawn_fake};

async fn roundtrip_through_port<S: SimulatorPort + ?Sized>(simulator: &mut S) -> f64 {
    simulator
        .set_variable("emitt_y", "12.75")
        .await
        .expect("set succeeds");
    simulator.read_scalar("emitt_y").await.expect("scalar reads")
}

#[tokio::test]
async fn given_fake_shell_when_variable_is_set_then_it_reads_back_without_prompts() {
    let mut simulator = spawn_fake().await;
    assert!(simulator.is_alive());

    let value = roundtrip_through_port(&mut simulator).await;
    assert_eq!(value, 12.75);

    simulator.close().await.expect("shell exits on closed stdin");
}

#[tokio::test]
async fn given_list_variable_then_every_token_is_parsed() {
    let mut simulator = spawn_fake().await;
    let values = simulator.read_list("ys").await.expect("list reads");
    assert_eq!(values, vec![1.0, 2.5, -3.0]);
    simulator.close().await.expect("close");
}

#[tokio::test]
async fn given_configured_output_lines_then_run_command_returns_them() {
    let mut config = fake_config();
    config
        .output_lines
        .insert("ElementSetToOffset".to_string(), 1);
    config.output_lines.insert("warn".to_string(), 1);
    let mut simulator = Communicator::spawn(config).await.expect("spawn");

    let offsets = Offsets {
        y: 2.5,
        ..Offsets::default()
    };
    let lines = simulator
        .run_command(&placetmachine::placet::communicator::element_set_to_offset_command(
            3, &offsets,
        ))
        .await
        .expect("command runs");
    assert_eq!(
        lines,
        vec!["ElementSetToOffset 3 -x 0 -y 2.5 -xp 0 -yp 0 -roll 0".to_string()]
    );

    // Warnings are logged, not raised.
    let lines = simulator.run_command("warn TestNoCorrection").await.expect("warning only");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("WARNING"));

    simulator.close().await.expect("close");
}

#[tokio::test]
async fn given_silent_command_then_session_stays_in_sync() {
    let mut simulator = spawn_fake().await;
    // No builtin output and no override: nothing is read back.
    let lines = simulator.run_command("Octave").await.expect("silent command");
    assert!(lines.is_empty());

    simulator.set_variable("sigma", "0.5").await.expect("set");
    assert_eq!(simulator.read_scalar("sigma").await.expect("scalar"), 0.5);
    simulator.close().await.expect("close");
}
