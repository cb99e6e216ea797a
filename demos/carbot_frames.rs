// Publishes the carbot's static frame tree so the runtime can be tried without a robot
use std::time::Duration;

use tokio::time::interval;
use tracing::info;

use carbot_steer_runtime::config::TOPIC_TF;
use carbot_steer_runtime::messages::TransformMessage;

// (parent, child, translation)
const FRAMES: [(&str, &str, [f64; 3]); 3] = [
    ("base_link", "back_axle", [-0.6, 0.0, 0.15]),
    ("base_link", "lead_steer", [0.6, 0.0, 0.15]),
    ("lead_steer", "lead_wheel", [0.0, 0.0, 0.0]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_TF).await?;
    info!("Publishing {} static frames on {}", FRAMES.len(), TOPIC_TF);

    // Re-sent periodically so late joiners pick them up
    let mut tick = interval(Duration::from_secs(1));
    loop {
        tick.tick().await;
        for (parent, child, translation) in FRAMES {
            let msg = TransformMessage {
                parent: parent.to_string(),
                child: child.to_string(),
                stamp: None,
                translation,
                rotation: [0.0, 0.0, 0.0, 1.0],
            };
            publisher.put(serde_json::to_string(&msg)?).await?;
        }
    }
}
