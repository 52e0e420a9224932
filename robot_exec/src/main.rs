//! Main robot executable entry point.
//!
//! # Architecture
//!
//! Every subsystem runs its own loop on its own thread, reading its named channel:
//!
//!     - Drivetrain, plus the cheezy filter thread
//!     - Arm, shooter, hanger and tail
//!     - Autonomous, which drives the sequencer thread
//!
//! The main loop owns the robot state. Each cycle it:
//!
//!     - Steps the simulated plant standing in for the hardware
//!     - Runs the dispatcher, which announces state changes and forwards operator commands
//!     - Writes telemetry
//!
//! Off-robot the exec plays a simulated match: disabled, autonomous, teleop, then disabled again.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use comms_if::{chan::ChannelHub, tm::Telemetry};
use robot_lib::{
    auto::{self, Autonomous, SeqControl, Sequencer},
    channels,
    dispatcher::{scheduled_state, Dispatcher},
    drivetrain::{self, cheezy::CheezyLoop, DriveHw, Drivetrain},
    mech::{Arm, ArmHw, Hanger, HangerHw, MechParams, Shooter, ShooterHw, Tail},
    params::{ExecParams, JoystickLayout},
    sim::{
        SimBearingCamera, SimJoystick, SimPlant, SimPowerMonitor, SimSolenoid, SimSwitch,
    },
    telemetry::{TmStore, TmWriter},
};
use util::{
    host,
    logger::{logger_init, parse_level},
    module::{Component, ComponentTask},
    session::Session,
    time::{Clock, MonotonicClock},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "robot_exec", about = "Robot control executable")]
struct Opts {
    /// Autonomous script to run, overriding the parameter file
    #[structopt(long, parse(from_os_str))]
    script: Option<PathBuf>,

    /// Length of the autonomous period in seconds
    #[structopt(long)]
    autonomous_s: Option<f64>,

    /// Length of the teleop period in seconds
    #[structopt(long)]
    teleop_s: Option<f64>,

    /// Minimum log level: info, debug or trace
    #[structopt(long, default_value = "info")]
    log_level: String,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    let session =
        Session::new("robot_exec", "sessions").wrap_err("Failed to create the session")?;

    let level = parse_level(&opts.log_level).wrap_err("Invalid log level")?;
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    info!("Robot Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut exec_params: ExecParams =
        util::params::load("robot_exec.toml").wrap_err("Could not load exec params")?;
    let drive_params: drivetrain::Params =
        util::params::load("drivetrain.toml").wrap_err("Could not load drivetrain params")?;
    let mut auto_params: auto::Params =
        util::params::load("autonomous.toml").wrap_err("Could not load autonomous params")?;
    let mech_params: MechParams =
        util::params::load("mechanisms.toml").wrap_err("Could not load mechanism params")?;
    let layout: JoystickLayout =
        util::params::load("joystick.toml").wrap_err("Could not load joystick layout")?;

    if let Some(s) = opts.script {
        auto_params.script_path = s;
    }
    if auto_params.script_path.is_relative() {
        let root = host::get_sw_root().wrap_err("Could not find the software root")?;
        auto_params.script_path = root.join(&auto_params.script_path);
    }
    if let Some(t) = opts.autonomous_s {
        exec_params.autonomous_s = t;
    }
    if let Some(t) = opts.teleop_s {
        exec_params.teleop_s = t;
    }

    info!("Parameters loaded");

    // ---- PROVISION CHANNELS ----

    let hub = Arc::new(ChannelHub::new());

    let drive_rx = hub
        .provision(channels::DRIVE)
        .wrap_err("Failed to provision the drivetrain channel")?;
    let auto_rx = hub
        .provision(channels::AUTO)
        .wrap_err("Failed to provision the autonomous channel")?;
    let auto_reply_rx = hub
        .provision(channels::AUTO_REPLY)
        .wrap_err("Failed to provision the autonomous reply channel")?;
    let arm_rx = hub
        .provision(channels::ARM)
        .wrap_err("Failed to provision the arm channel")?;
    let shooter_rx = hub
        .provision(channels::SHOOTER)
        .wrap_err("Failed to provision the shooter channel")?;
    let hanger_rx = hub
        .provision(channels::HANGER)
        .wrap_err("Failed to provision the hanger channel")?;
    let tail_rx = hub
        .provision(channels::TAIL)
        .wrap_err("Failed to provision the tail channel")?;

    info!("Channels provisioned: {:?}", hub.names());

    // ---- SIMULATED HARDWARE ----

    let sim = exec_params.sim.clone();
    let plant = SimPlant::new(sim.plant);
    let (left, right) = plant.drive_motors();
    let gyro = plant.gyro();

    let drive_hw = DriveHw {
        left: Box::new(left),
        right: Box::new(right),
        gyro: Arc::new(gyro.clone()),
        range_sensor: Arc::new(SimSwitch::default()),
        goal_camera: Arc::new(SimBearingCamera::new(
            gyro.clone(),
            sim.goal_bearing_deg,
            sim.camera_half_fov_deg,
        )),
        ball_camera: Arc::new(SimBearingCamera::new(
            gyro,
            sim.ball_bearing_deg,
            sim.camera_half_fov_deg,
        )),
    };
    let arm_hw = ArmHw {
        lever: Box::new(plant.add_motor()),
        rollers: Box::new(plant.add_motor()),
    };
    let shooter_hw = ShooterHw {
        jaw: Box::new(SimSolenoid::default()),
        shooters: Box::new(SimSolenoid::default()),
    };
    let hanger_hw = HangerHw {
        motor: Box::new(plant.add_motor()),
    };
    let tail_motor = Box::new(plant.add_motor());
    let power = Arc::new(SimPowerMonitor {
        voltage: sim.battery_v,
    });

    // ---- START SUBSYSTEMS ----

    info!("Starting subsystems...");

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let tm_store = Arc::new(TmStore::new());
    let tm: Arc<dyn Telemetry> = tm_store.clone();
    let stop = Arc::new(AtomicBool::new(false));
    let recv_timeout = Duration::from_secs_f64(exec_params.recv_timeout_s);

    let cheezy = CheezyLoop::new(drive_params.cheezy.clone());
    let cheezy_handle = cheezy
        .spawn(clock.clone(), stop.clone())
        .wrap_err("Failed to start the cheezy filter")?;

    let control = SeqControl::new();

    let mut handles: Vec<(&str, JoinHandle<()>)> = vec![("Cheezy", cheezy_handle)];

    handles.push((
        "Drivetrain",
        spawn_task(
            Drivetrain::new(drive_params, drive_hw, hub.clone(), tm.clone(), cheezy),
            drive_rx,
            recv_timeout,
            &clock,
            &stop,
        )?,
    ));
    handles.push((
        "Autonomous",
        spawn_task(
            Autonomous::new(control.clone(), tm.clone()),
            auto_rx,
            recv_timeout,
            &clock,
            &stop,
        )?,
    ));
    handles.push((
        "Arm",
        spawn_task(
            Arm::new(mech_params.arm, arm_hw, hub.clone(), tm.clone()),
            arm_rx,
            recv_timeout,
            &clock,
            &stop,
        )?,
    ));
    handles.push((
        "Shooter",
        spawn_task(
            Shooter::new(mech_params.shooter, shooter_hw, hub.clone(), tm.clone()),
            shooter_rx,
            recv_timeout,
            &clock,
            &stop,
        )?,
    ));
    handles.push((
        "Hanger",
        spawn_task(
            Hanger::new(mech_params.hanger, hanger_hw, tm.clone()),
            hanger_rx,
            recv_timeout,
            &clock,
            &stop,
        )?,
    ));
    handles.push((
        "Tail",
        spawn_task(
            Tail::new(mech_params.tail, tail_motor, tm.clone()),
            tail_rx,
            recv_timeout,
            &clock,
            &stop,
        )?,
    ));

    let sequencer = Sequencer::new(
        auto_params,
        hub.clone(),
        auto_reply_rx,
        tm.clone(),
        clock.clone(),
        control.clone(),
    );
    handles.push((
        "Sequencer",
        sequencer
            .spawn()
            .wrap_err("Failed to start the autonomous sequencer")?,
    ));

    let mut dispatcher = Dispatcher::new(
        exec_params.clone(),
        layout,
        hub.clone(),
        Box::new(SimJoystick::default()),
        power,
        clock.clone(),
    )
    .with_sequencer(control.clone());

    let mut tm_writer =
        TmWriter::new(&session.tm_file_path).wrap_err("Failed to open the telemetry file")?;

    info!("Subsystems started\n");

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let mut last_step_s = clock.now_s();
    let mut last_tm_s = f64::NEG_INFINITY;
    let mut num_cycles: u64 = 0;

    loop {
        let cycle_start_instant = Instant::now();
        let now_s = clock.now_s();

        let state = match scheduled_state(&exec_params, now_s) {
            Some(s) => s,
            None => {
                info!("End of match reached, stopping");
                break;
            }
        };

        // ---- SIMULATION ----

        plant.step(now_s - last_step_s);
        last_step_s = now_s;

        // ---- DISPATCH ----

        dispatcher.cycle(state, now_s);

        // ---- TELEMETRY ----

        if now_s - last_tm_s >= exec_params.tm_period_s {
            if let Err(e) = tm_writer.write(now_s, &tm_store) {
                warn!("Could not write telemetry: {}", e);
            }
            last_tm_s = now_s;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            ),
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    stop.store(true, Ordering::Relaxed);
    control.shutdown();

    for (name, handle) in handles {
        if handle.join().is_err() {
            warn!("{} thread panicked", name);
        }
    }

    info!(
        "End of execution after {} cycles, {} telemetry records written",
        num_cycles,
        tm_writer.num_written()
    );

    Ok(())
}

/// Run a component on its own thread, discarding the component when its loop ends.
fn spawn_task<C: Component + 'static>(
    component: C,
    inbound: comms_if::chan::ChannelReceiver,
    recv_timeout: Duration,
    clock: &Arc<dyn Clock>,
    stop: &Arc<AtomicBool>,
) -> Result<JoinHandle<()>, Report> {
    let name = component.name().to_string();
    let stop = stop.clone();
    let task = ComponentTask::new(component, inbound, recv_timeout, clock.clone());

    thread::Builder::new()
        .name(format!("t{}", name))
        .spawn(move || {
            task.run_until(stop);
        })
        .wrap_err_with(|| format!("Failed to start the {} task", name))
}
