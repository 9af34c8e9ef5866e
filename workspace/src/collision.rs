use anyhow::Context;
use ndarray as nd;
use tdse2d::{
    config::{ Damping, Packet, Particle, PotentialSampling, SimConfig },
    controller::{ Frame, RunController, RunStatus },
    potential::{ Free, SoftCoulomb },
};

const N: usize = 40;

// probability that the two particles are within `r` of each other
fn contact_probability(frame: &Frame, r: f64) -> f64 {
    let dx = frame.wf.spacing();
    let vol = dx.powi(4);
    frame.wf.density().into_dimensionality::<nd::Ix4>()
        .map(|rho| {
            rho.indexed_iter()
                .filter(|((i1, j1, i2, j2), _)| {
                    let ddx = (*i1 as f64 - *i2 as f64) * dx;
                    let ddy = (*j1 as f64 - *j2 as f64) * dx;
                    ddx.hypot(ddy) < r
                })
                .map(|(_, p)| p * vol)
                .sum::<f64>()
        })
        .unwrap_or(f64::NAN)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let y0 = (N / 2) as f64;
    let config = SimConfig {
        grid_size: [N, N],
        spacing: 1.0,
        particles: vec![
            Particle {
                mass: 1.0,
                packet: Packet { center: [10.0, y0], width: [2.5, 2.5], momentum: [0.8, 0.0] },
            },
            Particle {
                mass: 2.0,
                packet: Packet { center: [30.0, y0], width: [2.5, 2.5], momentum: [-0.8, 0.0] },
            },
        ],
        dt: 0.05,
        total_time: 30.0,
        frames: 15,
        damping: Damping { width: 4.0, factor: 0.05 },
        sampling: PotentialSampling::Static,
        ..SimConfig::default()
    };
    let initial = config.initial_wavefunction()
        .context("failed to build initial two-particle state")?;

    let controller = RunController::new(config, Free)
        .with_interaction(SoftCoulomb { strength: 1.0, softening: 1.0 });
    let mut on_frame = |frame: Frame| {
        let r1 = frame.wf.mean_position(0).unwrap_or([f64::NAN; 2]);
        let r2 = frame.wf.mean_position(1).unwrap_or([f64::NAN; 2]);
        let p1 = frame.wf.mean_momentum(0).unwrap_or([f64::NAN; 2]);
        let p2 = frame.wf.mean_momentum(1).unwrap_or([f64::NAN; 2]);
        println!(
            "frame {:>2}  t = {:>6.2}  x1 = {:>6.2}  x2 = {:>6.2}  p1 = {:>6.3}  p2 = {:>6.3}  contact = {:.4}",
            frame.index, frame.time, r1[0], r2[0], p1[0], p2[0],
            contact_probability(&frame, 2.0),
        );
    };
    let summary = controller.run(initial, &mut on_frame)
        .context("collision run failed")?;
    if summary.status == RunStatus::Cancelled {
        log::warn!("run was cancelled");
    }
    println!("final norm {:.6} after {} steps", summary.norm, summary.steps);
    Ok(())
}
