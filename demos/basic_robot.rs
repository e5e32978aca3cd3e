//! # Demo: basic_robot
//!
//! A two-motor robot with a joystick, driven through one match:
//! `Disabled (1s) → Autonomous (3s) → Teleoperated (3s) → Disabled`.
//!
//! - `drive` (a [`Task`] impl): drives a fixed pattern in autonomous and
//!   follows the joystick in teleop; the autonomous routine is cut short the
//!   moment the driver switches to teleop.
//! - `joystick` (a [`TaskFn`]): simulates stick movement in teleop.
//! - `status` (a [`TaskFn`]): reports motor outputs in every mode without
//!   ever blocking on them.
//!
//! Resources live in one [`AnyRegistry`]; motors are always taken in the
//! order LEFT then RIGHT.
//!
//! ## Run
//! ```bash
//! RUST_LOG=info,modevisor=debug cargo run --example basic_robot --features logging
//! ```

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use modevisor::{
    AnyRegistry, Config, IdentityKey, LogWriter, Mode, Subscribe, Supervisor, Task, TaskContext,
    TaskError, TaskFn,
};

static JOYSTICK: LazyLock<IdentityKey> = LazyLock::new(IdentityKey::new);
static MOTORS: LazyLock<[IdentityKey; 2]> = LazyLock::new(IdentityKey::create_array::<2>);

#[derive(Debug, Default)]
struct Joystick {
    forward: f64,
    turn: f64,
}

#[derive(Debug, Default)]
struct Motor {
    output: f64,
}

fn motor_error(side: usize) -> TaskError {
    TaskError::fail(format!("motor {side} is not a Motor"))
}

/// Writes `outputs` to both motors, left first.
async fn set_motors(reg: &AnyRegistry, ctx: &TaskContext, outputs: [f64; 2]) -> Result<(), TaskError> {
    let mut guards = Vec::with_capacity(2);
    for key in MOTORS.iter() {
        if let Some(guard) = reg.borrow(*key, ctx).await? {
            guards.push(guard);
        }
    }
    for (side, (guard, out)) in guards.iter_mut().zip(outputs).enumerate() {
        guard.downcast_mut::<Motor>().ok_or_else(|| motor_error(side))?.output = out;
    }
    Ok(())
}

struct Drive {
    reg: AnyRegistry,
}

#[async_trait]
impl Task for Drive {
    fn name(&self) -> &str {
        "drive"
    }

    async fn disabled(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        set_motors(&self.reg, ctx, [0.0, 0.0]).await?;
        ctx.sleep(Duration::from_millis(100)).await
    }

    async fn autonomous(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        for (outputs, hold) in [([0.5, 0.5], 1000), ([0.3, -0.3], 500), ([0.5, 0.5], 5000)] {
            set_motors(&self.reg, ctx, outputs).await?;
            ctx.sleep(Duration::from_millis(hold)).await?;
        }
        Ok(())
    }

    async fn teleop(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        let (forward, turn) = match self.reg.borrow(*JOYSTICK, ctx).await? {
            Some(js) => {
                let js = js.downcast_ref::<Joystick>().ok_or_else(|| TaskError::fail("bad joystick"))?;
                (js.forward, js.turn)
            }
            None => (0.0, 0.0),
        };
        set_motors(&self.reg, ctx, [forward + turn, forward - turn]).await?;
        ctx.sleep(Duration::from_millis(20)).await
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,modevisor=debug".into()),
        )
        .init();

    // Startup wiring: register every resource, then seal.
    let reg = AnyRegistry::new();
    reg.register_any(*JOYSTICK, Joystick::default())?;
    for key in MOTORS.iter() {
        reg.register_any(*key, Motor::default())?;
    }
    reg.seal();

    let mut cfg = Config::default();
    cfg.grace = Duration::from_secs(2);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(cfg).with_subscribers(subs).build();

    sup.add_task(Drive { reg: reg.clone() })?;

    let js_reg = reg.clone();
    let mut phase = 0.0_f64;
    sup.add_task(TaskFn::new("joystick").on_teleop(move |ctx: TaskContext| {
        phase += 0.1;
        let (forward, turn) = (phase.sin() * 0.8, phase.cos() * 0.2);
        let reg = js_reg.clone();
        async move {
            if let Some(mut js) = reg.borrow(*JOYSTICK, &ctx).await? {
                if let Some(js) = js.downcast_mut::<Joystick>() {
                    js.forward = forward;
                    js.turn = turn;
                }
            }
            ctx.sleep(Duration::from_millis(50)).await
        }
    }))?;

    let status_reg = reg.clone();
    let report = move |ctx: TaskContext| {
        let reg = status_reg.clone();
        async move {
            let outputs: Vec<String> = MOTORS
                .iter()
                .map(|key| match reg.try_borrow(*key, &ctx) {
                    Some(guard) => guard
                        .downcast_ref::<Motor>()
                        .map_or_else(|| "?".to_string(), |m| format!("{:+.2}", m.output)),
                    None => "busy".to_string(),
                })
                .collect();
            tracing::info!(mode = %ctx.mode(), motors = ?outputs, "status");
            ctx.sleep(Duration::from_millis(500)).await
        }
    };
    sup.add_task(
        TaskFn::new("status")
            .on_disabled(report.clone())
            .on_autonomous(report.clone())
            .on_teleop(report),
    )?;

    // Simulated driver station.
    for (mode, secs) in [
        (Mode::Disabled, 1),
        (Mode::Autonomous, 3),
        (Mode::Teleoperated, 3),
        (Mode::Disabled, 1),
    ] {
        sup.broadcast(mode);
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    sup.shutdown().await?;
    Ok(())
}
