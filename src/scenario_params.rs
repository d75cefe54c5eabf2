use neuroplast::params::NetworkParams;

pub fn get_scenario_params() -> NetworkParams {
    let params_yaml_str = r#"
groups:
- name: input
  num_neurons: 100
  polarity: Excitatory
  model: !PoissonSource
    rates: null
  grid:
    x: 100
    y: 1
    z: 1
  stdp: null
  homeostasis: null
- name: excitatory
  num_neurons: 800
  polarity: Excitatory
  model: !Dynamical
    params:
      a: 0.02
      b: 0.2
      c: -65.0
      d: 8.0
  grid:
    x: 800
    y: 1
    z: 1
  stdp:
    mode: Standard
    curve: !Exp
      potentiation_amplitude: 0.1
      potentiation_tau: 20.0
      depression_amplitude: 0.12
      depression_tau: 20.0
  homeostasis:
    scale: 0.1
    avg_time_scale_sec: 10.0
    base_firing:
      target_rate: 10.0
      std_dev: 2.0
- name: inhibitory
  num_neurons: 200
  polarity: Inhibitory
  model: !Dynamical
    params:
      a: 0.1
      b: 0.2
      c: -65.0
      d: 2.0
  grid:
    x: 200
    y: 1
    z: 1
  stdp: null
  homeostasis: null
connections:
- from: 0
  to: 1
  topology: !Random
    probability: 0.05
  weight_range:
    min: 0.0
    max: 20.0
  init_weight_fraction: 1.0
  delay_range:
    min: 1
    max: 1
  radius:
    x: -1.0
    y: -1.0
    z: -1.0
  kind: Fixed
- from: 1
  to: 1
  topology: !Random
    probability: 0.1
  weight_range:
    min: 0.0
    max: 10.0
  init_weight_fraction: 0.6
  delay_range:
    min: 1
    max: 20
  radius:
    x: -1.0
    y: -1.0
    z: -1.0
  kind: Plastic
- from: 1
  to: 2
  topology: !Random
    probability: 0.1
  weight_range:
    min: 0.0
    max: 10.0
  init_weight_fraction: 0.6
  delay_range:
    min: 1
    max: 20
  radius:
    x: -1.0
    y: -1.0
    z: -1.0
  kind: Fixed
- from: 2
  to: 1
  topology: !Random
    probability: 0.125
  weight_range:
    min: 0.0
    max: 5.0
  init_weight_fraction: 1.0
  delay_range:
    min: 1
    max: 1
  radius:
    x: -1.0
    y: -1.0
    z: -1.0
  kind: Fixed
conductances: null
technical_params:
  num_threads: 1
  pin_threads: false
  seed_override: null
"#;

    serde_yaml::from_str(params_yaml_str).unwrap()
}
