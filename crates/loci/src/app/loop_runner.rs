use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use tracing::info;

use super::bootstrap::SessionWiring;
use super::session::SessionInput;

const FIXED_DT_SECONDS: f32 = 1.0 / 60.0;

pub(crate) fn run(wiring: SessionWiring) -> ExitCode {
    let SessionWiring {
        mut session,
        mut store,
        mut gateway,
        user,
    } = wiring;

    let input = SessionInput { user };
    loop {
        session.update(FIXED_DT_SECONDS, &input, &mut store, &mut gateway);
        for event in session.drain_events() {
            info!(?event, "session_event");
        }
        thread::sleep(Duration::from_secs_f32(FIXED_DT_SECONDS));
    }
}
