// Keyboard teleop: W/S drive, A/D steer toward a lateral speed, R/F speed, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use carbot_steer_runtime::config::TOPIC_CMD_VEL;
use carbot_steer_runtime::messages::VelocityCommand;

const SPEEDS: [f64; 3] = [0.2, 0.5, 1.0]; // m/s
const LATERAL_RATIO: f64 = 0.1; // lateral speed as a fraction of forward speed when steering
const INPUT_TIMEOUT_MS: u64 = 100; // Reset velocities after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_VEL).await?;

    info!("Controls: W/S=drive, A/D=steer, R/F=speed, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    // Persistent command state
    let mut direction = 0.0;
    let mut steer = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 50ms timeout (20Hz, the runtime's default rate)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('w') if pressed => {
                        direction = 1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        direction = -1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        steer = 1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        steer = -1.0;
                        last_movement_input = Instant::now();
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            direction = 0.0;
            steer = 0.0;
        }

        // Steering without driving has no solution, so lateral only follows forward
        let forward = direction * SPEEDS[speed_idx];
        let cmd = VelocityCommand::new(forward, steer * LATERAL_RATIO * forward.abs());
        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
