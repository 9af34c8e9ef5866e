use std::time::Duration;
use anyhow::Context;
use ndarray as nd;
use tdse2d::{
    config::{ Damping, SimConfig },
    controller::{ Frame, RunController, RunState },
    potential::DoubleSlit,
};

// fraction of the probability that has made it past the wall
fn transmitted(frame: &Frame, slit: &DoubleSlit, extent: [f64; 2]) -> f64 {
    let rho: nd::Array2<f64> = match frame.wf.marginal_density(0) {
        Ok(rho) => rho,
        Err(_) => return f64::NAN,
    };
    let dx = frame.wf.spacing();
    let cut = slit.offset * extent[0];
    rho.indexed_iter()
        .filter(|((i, j), _)| (*i + *j) as f64 * dx > cut)
        .map(|(_, r)| r * dx * dx)
        .sum()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = SimConfig {
        dt: 0.1,
        total_time: 250.0,
        frames: 25,
        damping: Damping { width: 16.0, factor: 0.1 },
        ..SimConfig::default()
    };
    let extent = config.domain_extent();
    let slit = DoubleSlit::default();
    let initial = config.initial_wavefunction()
        .context("failed to build initial wavepacket")?;

    let controller = RunController::new(config, slit);
    let handle = controller.handle();
    let job = controller.spawn(
        initial,
        move |frame: Frame| {
            let [x, y] = frame.wf.mean_position(0).unwrap_or([f64::NAN; 2]);
            println!(
                "frame {:>3}  t = {:>8.2}  norm = {:.6}  <r> = ({:>7.2}, {:>7.2})  past wall = {:.4}",
                frame.index,
                frame.time,
                frame.wf.norm(),
                x,
                y,
                transmitted(&frame, &slit, extent),
            );
        },
    )?;

    while !handle.wait_for(RunState::Completed, Duration::from_secs(5)) {
        if handle.state().is_terminal() { break; }
        log::info!("progress: {:.1}%", 100.0 * handle.progress());
    }
    let (res, _) = job.join();
    let summary = res.context("double-slit run failed")?;
    println!(
        "finished after {} steps (t = {:.2}); final norm {:.6}",
        summary.steps, summary.time, summary.norm,
    );
    Ok(())
}
