use neuroplast::monitor::MonitorOutput;
use neuroplast::rate_generator::PoissonRate;
use neuroplast::simulation::SimulationContext;
use rand::{distributions::Uniform, prelude::Distribution, rngs::StdRng, SeedableRng};
use statrs::distribution::Poisson;

#[path = "../scenario_params.rs"]
mod scenario_params;

fn main() {
    env_logger::init();

    let mut sim =
        SimulationContext::from_params("benchmark", scenario_params::get_scenario_params()).unwrap();
    sim.setup_network().unwrap();

    let input = sim.group_id("input").unwrap();
    let excitatory = sim.group_id("excitatory").unwrap();
    let num_inputs = sim.group_num_neurons(input).unwrap();
    let exc_monitor = sim
        .set_spike_monitor(excitatory, MonitorOutput::Memory)
        .unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    let mean_rate_dist = Poisson::new(10.0).unwrap();
    let jitter_dist = Uniform::new(0.5, 1.5);

    let num_seconds = 50;
    let mut spike_count = 0usize;
    let mut synaptic_transmission_count = 0usize;
    let mut wall_time = std::time::Duration::ZERO;

    for _ in 0..num_seconds {
        let mean_rate = mean_rate_dist.sample(&mut rng) as f32;
        let mut rates = PoissonRate::new(num_inputs);
        rates
            .set_rates(
                (0..num_inputs)
                    .map(|_| mean_rate * jitter_dist.sample(&mut rng))
                    .collect(),
            )
            .unwrap();
        sim.set_spike_rate(input, &rates).unwrap();

        let summary = sim.run_network(1, 0).unwrap();
        spike_count += summary.spike_count;
        synaptic_transmission_count += summary.synaptic_transmission_count;
        wall_time += summary.wall_time;
    }

    let exc_monitor = sim.spike_monitor(exc_monitor).unwrap();
    let checksum: usize = exc_monitor.events().iter().map(|event| event.nid).sum();

    let t_stop = sim.current_time_ms();
    let synaptic_transm_proc_throughput =
        synaptic_transmission_count as f64 / wall_time.as_secs_f64();

    eprintln!("Spikes per cycle: {}", spike_count as f64 / t_stop as f64);
    eprintln!(
        "Excitatory population rate: {:.2} Hz",
        exc_monitor.population_rate()
    );
    eprintln!(
        "Synaptic transmission processing throughput: {:.3e} ({:.3} ns per transmission)",
        synaptic_transm_proc_throughput,
        1e9 / synaptic_transm_proc_throughput
    );
    eprintln!("Checksum: {}", checksum);
}
