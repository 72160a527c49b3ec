//! UDP JSON bridge to the trajectory planner.
//!
//! Inbound datagrams carry planner samples and operator goal signals; outbound
//! datagrams carry the navigation goals GOTO waypoints hand to the planner.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use waypilot_nav::{Inputs, PlannerLink};
use waypilot_proto::{PlannerSample, Vec3};

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerCfg {
    /// Local UDP address receiving samples and goal signals, e.g. "0.0.0.0:14600".
    pub listen: String,
    /// Where the planner listens for navigation goals.
    pub goal_addr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerMsg {
    Sample {
        position: Vec3,
        velocity: Vec3,
        yaw: f64,
        #[serde(default)]
        yaw_rate: f64,
    },
    Goal { x: f64, y: f64, z: f64 },
}

impl PlannerMsg {
    pub fn goal(v: Vec3) -> Self {
        PlannerMsg::Goal { x: v.x, y: v.y, z: v.z }
    }
}

/// Goal publisher used by the control tick. Never waits on the socket: a full
/// queue drops the goal (the next priming tick sends it again).
pub struct ChannelPlanner {
    tx: mpsc::Sender<Vec3>,
}

impl PlannerLink for ChannelPlanner {
    fn publish_goal(&mut self, goal: Vec3) -> Result<()> {
        self.tx.try_send(goal).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => anyhow::anyhow!("planner goal queue full"),
            mpsc::error::TrySendError::Closed(_) => anyhow::anyhow!("planner goal sender stopped"),
        })
    }
}

pub struct Bridge {
    socket: Arc<UdpSocket>,
    goal_addr: SocketAddr,
}

impl Bridge {
    pub async fn bind(cfg: &PlannerCfg) -> Result<Self> {
        let goal_addr: SocketAddr = cfg
            .goal_addr
            .parse()
            .with_context(|| format!("planner.goal_addr {}", cfg.goal_addr))?;
        let socket = UdpSocket::bind(&cfg.listen)
            .await
            .with_context(|| format!("bind planner socket {}", cfg.listen))?;
        info!("planner: listening on {}, goals to {}", cfg.listen, goal_addr);
        Ok(Self { socket: Arc::new(socket), goal_addr })
    }

    /// Starts the receive and goal-send tasks and returns the tick-side link.
    pub fn spawn(self, inputs: Inputs) -> ChannelPlanner {
        let (tx, mut rx) = mpsc::channel::<Vec3>(8);

        let sock = self.socket.clone();
        let goal_addr = self.goal_addr;
        let forward = tx.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                let (n, from) = match sock.recv_from(&mut buf).await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("planner: recv failed: {:#}", e);
                        continue;
                    }
                };
                match serde_json::from_slice::<PlannerMsg>(&buf[..n]) {
                    Ok(msg) => dispatch(msg, &inputs, &forward),
                    Err(e) => debug!("planner: bad datagram from {}: {}", from, e),
                }
            }
        });

        let sock = self.socket;
        tokio::spawn(async move {
            while let Some(goal) = rx.recv().await {
                let body = match serde_json::to_vec(&PlannerMsg::goal(goal)) {
                    Ok(b) => b,
                    Err(e) => {
                        warn!("planner: encode goal: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sock.send_to(&body, goal_addr).await {
                    warn!("planner: goal send to {} failed: {:#}", goal_addr, e);
                }
            }
        });

        ChannelPlanner { tx }
    }
}

fn dispatch(msg: PlannerMsg, inputs: &Inputs, forward: &mpsc::Sender<Vec3>) {
    match msg {
        PlannerMsg::Sample { position, velocity, yaw, yaw_rate } => {
            inputs.planner.publish(PlannerSample { position, velocity, yaw, yaw_rate });
        }
        PlannerMsg::Goal { x, y, z } => {
            let goal = Vec3::new(x, y, z);
            info!("planner: operator goal ({:.2}, {:.2}, {:.2})", x, y, z);
            inputs.goals.signal(goal);
            // the planner has to plan toward it as well
            if forward.try_send(goal).is_err() {
                warn!("planner: goal queue full, operator goal not forwarded");
            }
        }
    }
}
