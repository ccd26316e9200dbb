mod failures;
mod session;

use placetmachine::placet::{Communicator, CommunicatorConfig};

/// Minimal stand-in for the Placet shell: two banner lines, a `% ` prompt,
/// `set`/`puts` on plain variables and a few canned replies.
pub const FAKE_PLACET: &str = r#"
echo "fake placet"
echo "ready"
while IFS= read -r line; do
  case "$line" in
    "set "*)
      set -- $line
      eval "v_$2=\$3"
      echo "% $3"
      ;;
    'puts $ys')
      echo "% 1 2.5 -3"
      ;;
    'puts $'*)
      name=${line#'puts $'}
      eval "echo \"% % \$v_$name\""
      ;;
    ElementSetToOffset*)
      echo "% $line"
      ;;
    Track*)
      echo "ERROR: tracking failed"
      echo "% trailing line"
      echo "% 2 of 3"
      ;;
    fail*)
      echo "ERROR: $line failed"
      ;;
    warn*)
      echo "WARNING: $line is deprecated"
      ;;
  esac
done
"#;

pub fn fake_config() -> CommunicatorConfig {
    CommunicatorConfig::for_program("sh")
        .with_args(["-c", FAKE_PLACET])
        .with_intro_lines(2)
        .with_timeout_ms(5_000)
}

pub async fn spawn_fake() -> Communicator {
    Communicator::spawn(fake_config())
        .await
        .expect("fake shell should start")
}
