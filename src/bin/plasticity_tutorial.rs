use neuroplast::monitor::MonitorOutput;
use neuroplast::params::{
    Polarity, RadiusRF, RangeDelay, RangeWeight, StdpCurve, StdpMode, SynapseKind,
    TechnicalParams, Topology,
};
use neuroplast::rate_generator::PoissonRate;
use neuroplast::simulation::SimulationContext;

const NUM_INPUTS: usize = 100;
const MAX_WEIGHT: f32 = 0.03;
const INIT_WEIGHT: f32 = 0.01;
const TARGET_RATE: f32 = 35.0;

fn main() {
    env_logger::init();

    // optional first argument: simulated duration in seconds
    let duration_sec: i32 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse().unwrap())
        .unwrap_or(1000);

    let mut sim = SimulationContext::new("plasticity simulation", TechnicalParams::default());

    let input = sim
        .create_spike_generator_group("input", NUM_INPUTS, Polarity::Excitatory)
        .unwrap();
    let output = sim
        .create_group("output", 1, Polarity::Excitatory)
        .unwrap();
    sim.set_neuron_parameters(output, 0.02, 0.2, -65.0, 8.0)
        .unwrap();

    sim.connect(
        input,
        output,
        Topology::Full,
        RangeWeight::new(0.0, MAX_WEIGHT),
        INIT_WEIGHT / MAX_WEIGHT,
        RangeDelay::fixed(1),
        RadiusRF::unbounded(),
        SynapseKind::Plastic,
    )
    .unwrap();

    sim.set_conductances(true).unwrap();

    let stdp_curve = StdpCurve::exp(0.001 / 5.0, 20.0, 0.00033 / 5.0, 20.0);
    sim.set_stdp(output, true, StdpMode::Standard, stdp_curve)
        .unwrap();
    sim.set_homeostasis(output, true, 1.0, 5.0).unwrap();
    sim.set_homeo_base_firing_rate(output, TARGET_RATE, 0.0)
        .unwrap();

    sim.setup_network().unwrap();

    let mut rates = PoissonRate::new(NUM_INPUTS);
    for neuron_idx in 0..NUM_INPUTS {
        rates
            .set_rate(neuron_idx, (neuron_idx + 1) as f32 * 0.2)
            .unwrap();
    }
    sim.set_spike_rate(input, &rates).unwrap();

    let output_monitor = sim.set_spike_monitor(output, MonitorOutput::Memory).unwrap();
    let weight_monitor = sim
        .set_connection_monitor(input, output, MonitorOutput::Memory)
        .unwrap();
    sim.set_update_time_interval_sec(weight_monitor, -1).unwrap();

    let initial = sim.take_snapshot(weight_monitor).unwrap().clone();
    let summary = sim.run_network(duration_sec, 0).unwrap();
    let snapshot = sim.take_snapshot(weight_monitor).unwrap().clone();

    println!(
        "simulated {} ms in {:.3} s, {} spikes",
        summary.t_end - summary.t_start,
        summary.wall_time.as_secs_f64(),
        summary.spike_count
    );
    println!(
        "output firing rate: {:.2} Hz (target {} Hz)",
        sim.spike_monitor(output_monitor).unwrap().population_rate(),
        TARGET_RATE
    );

    println!(
        "total weight change: {:.5}",
        snapshot.abs_weight_change_since(&initial)
    );

    println!("input rate (Hz)  initial  final");
    for (before, after) in initial.weights.iter().zip(&snapshot.weights) {
        println!(
            "{:>15.1}  {:.5}  {:.5}",
            rates.rates()[after.pre],
            before.weight,
            after.weight
        );
    }
}
